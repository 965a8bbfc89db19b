//! # tvx-schema: Conformance Test Vector Format
//!
//! Record types and canonical encodings shared by the vector builder, the
//! generator and conformance drivers.
//!
//! ## Modules
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`encoding`] | `Base64Bytes`, decimal-string big integer adapters |
//! | [`cid`] | `Cid`: content identifier of a block |
//! | [`address`] | `Address`: actor addresses and their string form |
//! | [`randomness`] | Ordered randomness rules and first-match lookup |
//! | [`vector`] | `TestVector` and every record it contains |
//! | [`error`] | `SchemaError`, `SchemaResult` |
//!
//! ## Wire Conventions
//!
//! - Opaque bytes are standard padded base64; `""` is the absent value.
//! - Token amounts are decimal strings, never JSON numbers.
//! - CIDs and addresses use their own string forms in every encoding.

pub mod address;
pub mod cid;
pub mod encoding;
pub mod error;
pub mod randomness;
pub mod vector;

pub use address::{Address, Protocol};
pub use cid::Cid;
pub use encoding::{bigint_string, opt_bigint_string, parse_decimal, Base64Bytes};
pub use error::{SchemaError, SchemaResult};
pub use randomness::{
    Randomness, RandomnessKind, RandomnessMatch, RandomnessRule, RANDOMNESS_FALLBACK,
};
pub use vector::{
    ApplyMessage, Block, Class, Diagnostics, GenerationData, Metadata, Postconditions,
    Preconditions, Receipt, Selector, StateTree, TestVector, Tipset, DEFAULT_BASE_FEE,
    HINT_INCORRECT, HINT_NEGATE,
};
