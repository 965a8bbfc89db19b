//! # tvx-builders: Vector Builder
//!
//! Builds one conformance vector by driving the reference VM through
//! declared preconditions, staged messages and assertions, then emitting a
//! [`tvx_schema::TestVector`].
//!
//! ```text
//!  Builder::message(meta)
//!     │  account(..), enable_chaos(), randomness_rule(..)
//!     ▼
//!  commit_preconditions()  ── pre root + CAR snapshot
//!     │  transfer(..), create_paych_actor(..), chaos_*(..)
//!     ▼
//!  commit_applies()        ── receipts + post root
//!     │  assert()?.every_message_result_satisfies(exit_code(..))
//!     ▼
//!  finish()                ── TestVector
//! ```
//!
//! ## Modules
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`builder`] | `Builder`, stages, message staging, emission |
//! | [`asserter`] | Strict or lenient checks over the outcome |
//! | [`predicates`] | Reusable result and actor predicates |
//! | [`messages`] | Message options, defaults, staged messages |
//! | [`error`] | `BuilderError` |

pub mod asserter;
pub mod builder;
pub mod error;
pub mod messages;
pub mod predicates;

pub use asserter::{Asserter, AssertionMode};
pub use builder::{AddressHandle, Builder, Stage, VectorOptions, SELECTOR_CHAOS_ACTOR};
pub use error::{BuilderError, BuilderResult};
pub use messages::{
    ApplicableMessage, MessageHandle, MsgDefaults, MsgOpt, DEFAULT_GAS_FEE_CAP,
    DEFAULT_GAS_LIMIT, DEFAULT_GAS_PREMIUM,
};
pub use predicates::{balance_updated, calculate_deduction, exit_code, PredicateResult};
