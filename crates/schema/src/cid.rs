//! # Content Identifiers
//!
//! [`Cid`] addresses a block by the SHA3-256 digest of its bytes. The binary
//! form is a CIDv1 with the `raw` codec and a SHA3-256 multihash:
//!
//! ```text
//! 0x01 (cidv1) | 0x55 (raw) | 0x16 (sha3-256) | 0x20 (len) | digest[32]
//! ```
//!
//! The string form is multibase base16: `f` followed by the lowercase hex of
//! the binary form. CIDs are opaque: consumers compare them for equality and
//! never reinterpret the digest.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use sha3::{Digest, Sha3_256};

use crate::error::{SchemaError, SchemaResult};

/// CID version byte.
pub const CID_V1: u8 = 0x01;

/// Multicodec for opaque raw blocks.
pub const RAW_CODEC: u8 = 0x55;

/// Multihash code for SHA3-256.
pub const SHA3_256_CODE: u8 = 0x16;

/// Multibase prefix for lowercase base16.
const MULTIBASE_BASE16: char = 'f';

const DIGEST_LEN: usize = 32;
const HEADER: [u8; 4] = [CID_V1, RAW_CODEC, SHA3_256_CODE, DIGEST_LEN as u8];

/// Self-describing content identifier of a block.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cid {
    digest: [u8; DIGEST_LEN],
}

impl Cid {
    /// Computes the CID of `block`.
    #[must_use]
    pub fn of(block: &[u8]) -> Self {
        let mut hasher = Sha3_256::new();
        hasher.update(block);
        Self {
            digest: hasher.finalize().into(),
        }
    }

    /// Wraps an already computed SHA3-256 digest.
    #[must_use]
    pub fn from_digest(digest: [u8; DIGEST_LEN]) -> Self {
        Self { digest }
    }

    /// The raw SHA3-256 digest.
    pub fn digest(&self) -> &[u8; DIGEST_LEN] {
        &self.digest
    }

    /// Binary form: header followed by the digest.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER.len() + DIGEST_LEN);
        out.extend_from_slice(&HEADER);
        out.extend_from_slice(&self.digest);
        out
    }

    /// Parses the binary form.
    pub fn from_bytes(bytes: &[u8]) -> SchemaResult<Self> {
        if bytes.len() != HEADER.len() + DIGEST_LEN {
            return Err(SchemaError::InvalidCid(format!(
                "expected {} bytes, got {}",
                HEADER.len() + DIGEST_LEN,
                bytes.len()
            )));
        }
        if bytes[..HEADER.len()] != HEADER {
            return Err(SchemaError::InvalidCid(format!(
                "unsupported header {}",
                hex::encode(&bytes[..HEADER.len()])
            )));
        }
        let mut digest = [0u8; DIGEST_LEN];
        digest.copy_from_slice(&bytes[HEADER.len()..]);
        Ok(Self { digest })
    }

    /// Parses the multibase base16 string form.
    pub fn parse(s: &str) -> SchemaResult<Self> {
        let body = s
            .strip_prefix(MULTIBASE_BASE16)
            .ok_or_else(|| SchemaError::InvalidCid(format!("unsupported multibase in {s:?}")))?;
        let bytes = hex::decode(body).map_err(|e| SchemaError::InvalidCid(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Short prefix form useful for logging (first 12 hex chars of the digest).
    pub fn short(&self) -> String {
        hex::encode(&self.digest[..6])
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", MULTIBASE_BASE16, hex::encode(self.to_bytes()))
    }
}

impl fmt::Debug for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cid({self})")
    }
}

impl FromStr for Cid {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Cid::parse(s)
    }
}

impl Serialize for Cid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Cid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Cid::parse(&s).map_err(de::Error::custom)
    }
}
