//! # Canonical Encodings for Opaque Bytes and Big Integers
//!
//! - [`Base64Bytes`]: raw bytes in memory, a standard padded base64 string
//!   on the wire. The empty string decodes to the absent value, so "no data"
//!   and "zero-length data" are never distinguished on the wire.
//! - [`bigint_string`] / [`opt_bigint_string`]: serde adapters writing
//!   arbitrary-precision integers as decimal strings. Token amounts routinely
//!   exceed 64 bits, so JSON numbers are rejected on input.

use std::fmt;
use std::ops::Deref;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use num_bigint::BigInt;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{SchemaError, SchemaResult};

// ════════════════════════════════════════════════════════════════════════════════
// BASE64 BYTES
// ════════════════════════════════════════════════════════════════════════════════

/// Opaque byte blob encoded as base64 in the persisted form.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Base64Bytes(Vec<u8>);

impl Base64Bytes {
    /// Wraps raw bytes.
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// The absent value.
    #[must_use]
    pub fn absent() -> Self {
        Self(Vec::new())
    }

    /// Whether this blob carries no data.
    pub fn is_absent(&self) -> bool {
        self.0.is_empty()
    }

    /// `None` when absent, the bytes otherwise.
    pub fn as_option(&self) -> Option<&[u8]> {
        if self.0.is_empty() {
            None
        } else {
            Some(&self.0)
        }
    }

    /// Borrow the raw bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Take ownership of the raw bytes.
    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }

    /// Standard padded base64 of the bytes; `""` when absent.
    pub fn encode(&self) -> String {
        STANDARD.encode(&self.0)
    }

    /// Decodes standard padded base64; `""` yields the absent value.
    pub fn decode(s: &str) -> SchemaResult<Self> {
        if s.is_empty() {
            return Ok(Self::absent());
        }
        Ok(Self(STANDARD.decode(s)?))
    }
}

impl From<Vec<u8>> for Base64Bytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for Base64Bytes {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl Deref for Base64Bytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for Base64Bytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Base64Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl fmt::Debug for Base64Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Base64Bytes({:?})", self.encode())
    }
}

impl Serialize for Base64Bytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for Base64Bytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Base64Bytes::decode(&s).map_err(de::Error::custom)
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// BIG INTEGERS
// ════════════════════════════════════════════════════════════════════════════════

/// Parses a canonical decimal integer: optional `-`, then digits, no leading
/// zeros, no `+`, no whitespace.
pub fn parse_decimal(s: &str) -> SchemaResult<BigInt> {
    let digits = s.strip_prefix('-').unwrap_or(s);
    let canonical = !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit())
        && !(digits.len() > 1 && digits.starts_with('0'))
        && !(s.starts_with('-') && digits == "0");
    if !canonical {
        return Err(SchemaError::InvalidBigInt(s.to_string()));
    }
    s.parse::<BigInt>()
        .map_err(|_| SchemaError::InvalidBigInt(s.to_string()))
}

/// Serde adapter for `BigInt` fields as decimal strings.
pub mod bigint_string {
    use super::*;

    pub fn serialize<S: Serializer>(value: &BigInt, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_str_radix(10))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigInt, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse_decimal(&s).map_err(de::Error::custom)
    }
}

/// Serde adapter for `Option<BigInt>` fields as decimal strings.
///
/// Pair with `#[serde(default, skip_serializing_if = "Option::is_none")]`.
pub mod opt_bigint_string {
    use super::*;

    pub fn serialize<S: Serializer>(
        value: &Option<BigInt>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_some(&v.to_str_radix(10)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<BigInt>, D::Error> {
        let s: Option<String> = Option::deserialize(deserializer)?;
        s.map(|s| parse_decimal(&s).map_err(de::Error::custom))
            .transpose()
    }
}
