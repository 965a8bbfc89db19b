//! Error type for decoding and validating canonical encodings and records.

use thiserror::Error;

/// Errors from parsing canonical encodings or validating a test vector.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// Content identifier string or bytes are not a supported CID.
    #[error("invalid cid: {0}")]
    InvalidCid(String),

    /// Address string or bytes are malformed.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// A byte field was not valid standard base64.
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    /// A big integer field was not a canonical decimal string.
    #[error("invalid big integer: {0:?}")]
    InvalidBigInt(String),

    /// Message-class vector whose receipts do not line up with its messages.
    #[error(
        "length of postcondition receipts ({receipts}) \
         must match length of messages to apply ({messages})"
    )]
    ReceiptCountMismatch {
        /// Number of receipts in the postconditions.
        receipts: usize,
        /// Number of messages in `apply_messages`.
        messages: usize,
    },

    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias used throughout the schema crate.
pub type SchemaResult<T> = Result<T, SchemaError>;
