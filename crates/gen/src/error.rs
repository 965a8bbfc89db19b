//! # Generator Error Types
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | `Config`, `Io` |
//! | Emission | `Json`, `MissingId`, `DuplicateId`, `InvalidName`, `Closed` |
//! | Replay input | `MalformedVector` |
//! | Collaborators | `Builder`, `Vm`, `Schema` |
//!
//! A vector closure that returns an error is reported as a failed job;
//! these variants surface only when the harness or driver itself cannot
//! proceed.

use std::path::PathBuf;

use thiserror::Error;
use tvx_builders::BuilderError;
use tvx_runtime_vm::VmError;
use tvx_schema::SchemaError;

#[derive(Error, Debug)]
pub enum GenError {
    /// A file could not be read or written.
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML configuration did not parse.
    #[error("invalid config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A vector without `_meta.id` cannot be named on disk.
    #[error("vector in group {group} has no id")]
    MissingId { group: String },

    /// A second vector with the same id in one group would overwrite the
    /// first.
    #[error("duplicate vector id {id} in group {group}")]
    DuplicateId { group: String, id: String },

    /// A group or id that cannot be used as a path below the output root.
    #[error("invalid {what} {name:?}: {reason}")]
    InvalidName {
        what: &'static str,
        name: String,
        reason: &'static str,
    },

    /// Jobs were submitted after the worker pool shut down.
    #[error("generator is no longer accepting jobs")]
    Closed,

    /// A vector handed to the driver cannot be replayed at all.
    #[error("malformed vector {id}: {reason}")]
    MalformedVector { id: String, reason: String },

    #[error(transparent)]
    Builder(#[from] BuilderError),

    #[error(transparent)]
    Vm(#[from] VmError),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl GenError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GenError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type GenResult<T> = Result<T, GenError>;
