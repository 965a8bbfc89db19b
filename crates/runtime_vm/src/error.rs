//! Error types of the reference VM.
//!
//! Two layers:
//!
//! - [`ActorError`]: raised inside an invocation. `Abort` becomes a receipt
//!   exit code; `Fatal` marks an invariant violation that must never happen
//!   in a correct actor and aborts the whole message.
//! - [`VmError`]: host-level failures returned from VM entry points.

use thiserror::Error;
use tvx_schema::{Address, Cid, SchemaError};

use crate::exit_code::ExitCode;

/// Failure raised while executing actor code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActorError {
    /// Recoverable abort surfaced to the caller as an exit code.
    #[error("abort {code}: {msg}")]
    Abort {
        /// Exit code recorded in the receipt.
        code: ExitCode,
        /// Human-readable reason.
        msg: String,
    },

    /// Actor invariant violation; the message produces no receipt.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl ActorError {
    pub fn abort(code: ExitCode, msg: impl Into<String>) -> Self {
        ActorError::Abort {
            code,
            msg: msg.into(),
        }
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        ActorError::Fatal(msg.into())
    }

    /// Exit code of an abort, `None` for fatal errors.
    pub fn exit_code(&self) -> Option<ExitCode> {
        match self {
            ActorError::Abort { code, .. } => Some(*code),
            ActorError::Fatal(_) => None,
        }
    }
}

/// Result alias for actor method bodies.
pub type ActorResult<T> = Result<T, ActorError>;

/// Host-level VM failure.
#[derive(Error, Debug)]
pub enum VmError {
    /// An actor violated a VM invariant while applying a message.
    #[error("fatal vm error: {0}")]
    Fatal(String),

    /// A referenced block is not in the blockstore.
    #[error("block not found: {0}")]
    MissingBlock(Cid),

    /// The address does not resolve to an actor.
    #[error("actor not found: {0}")]
    ActorNotFound(Address),

    /// The address is already bound to an actor.
    #[error("actor already exists: {0}")]
    ActorExists(Address),

    /// Snapshot bytes are malformed or fail verification.
    #[error("invalid snapshot: {0}")]
    InvalidCar(String),

    /// A method dispatch table declared the same method number twice.
    #[error("duplicate method {method} in dispatch table of {actor}")]
    DuplicateMethod {
        /// Actor whose table was being built.
        actor: &'static str,
        /// Repeated method number.
        method: u64,
    },

    /// Binary encoding or decoding failed.
    #[error("encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    /// Canonical schema type failed to parse.
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Result alias for VM entry points.
pub type VmResult<T> = Result<T, VmError>;

impl From<ActorError> for VmError {
    fn from(err: ActorError) -> Self {
        match err {
            ActorError::Fatal(msg) => VmError::Fatal(msg),
            ActorError::Abort { code, msg } => {
                VmError::Fatal(format!("unexpected abort {code}: {msg}"))
            }
        }
    }
}

impl From<VmError> for ActorError {
    fn from(err: VmError) -> Self {
        ActorError::Fatal(err.to_string())
    }
}
