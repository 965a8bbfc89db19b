//! # Builder Error Types
//!
//! Every variant is generation-fatal: the vector being built must not be
//! emitted.
//!
//! | Category | Variants |
//! |----------|----------|
//! | Phase ordering | `StageViolation`, `PreconditionsAlreadyCommitted` |
//! | Declaration | `EmptyPreconditions`, `UnsupportedProtocol`, `InvalidDefault`, `DuplicateRandomnessRule` |
//! | Applies | `NonceReuse`, `UnknownMessage`, `ClassMismatch`, `NoBlockStaged` |
//! | Outcome | `Assertion` |
//! | Collaborators | `Vm`, `Schema` |

use thiserror::Error;
use tvx_runtime_vm::VmError;
use tvx_schema::{Address, Class, Protocol, SchemaError};

use crate::builder::Stage;

#[derive(Error, Debug)]
pub enum BuilderError {
    /// An operation was called in a stage that does not allow it.
    #[error("{op} is not allowed in stage {stage}")]
    StageViolation {
        /// Operation attempted.
        op: &'static str,
        /// Stage the builder was in.
        stage: Stage,
    },

    /// `commit_preconditions` was called a second time.
    #[error("preconditions already committed")]
    PreconditionsAlreadyCommitted,

    /// `commit_preconditions` was called with nothing declared.
    #[error("no actors declared before committing preconditions")]
    EmptyPreconditions,

    /// Accounts are keyed by secp256k1 or BLS addresses only.
    #[error("accounts cannot use address protocol {0:?}")]
    UnsupportedProtocol(Protocol),

    /// A sender's nonce was used twice in one vector.
    #[error("nonce {nonce} already used by sender {sender}")]
    NonceReuse {
        /// Sender as given on the message.
        sender: Address,
        /// Repeated nonce.
        nonce: u64,
    },

    /// A randomness rule for the same request was declared twice.
    #[error("randomness rule already declared for this request")]
    DuplicateRandomnessRule,

    /// A message handle does not belong to this builder.
    #[error("unknown message handle {0}")]
    UnknownMessage(usize),

    /// The operation belongs to the other vector class.
    #[error("{op} is not available for {class:?} vectors")]
    ClassMismatch {
        /// Operation attempted.
        op: &'static str,
        /// Class of this builder.
        class: Class,
    },

    /// A tipset message was added before any block was staged.
    #[error("no block staged to receive the message")]
    NoBlockStaged,

    /// `set_defaults` accepts only gas options.
    #[error("option {0} cannot be a message default")]
    InvalidDefault(&'static str),

    /// A strict assertion did not hold.
    #[error("assertion failed: {0}")]
    Assertion(String),

    /// The reference VM failed.
    #[error(transparent)]
    Vm(#[from] VmError),

    /// The assembled record is invalid.
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

pub type BuilderResult<T> = Result<T, BuilderError>;
