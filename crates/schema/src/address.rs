//! # Actor Addresses
//!
//! | Protocol | Payload | String form |
//! |----------|---------|-------------|
//! | `ID` (0) | actor id (`u64`) | `t0<decimal>` |
//! | `SECP256K1` (1) | 20-byte SHA3-256 truncation of the public key | `t1<hex>` |
//! | `ACTOR` (2) | 20-byte SHA3-256 truncation of the creation seed | `t2<hex>` |
//! | `BLS` (3) | 48-byte public key | `t3<hex>` |
//!
//! Addresses serialize as their string form in every encoding, so an empty
//! or truncated payload never decodes.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use sha3::{Digest, Sha3_256};

use crate::error::{SchemaError, SchemaResult};

/// Network prefix of the string form.
pub const NETWORK_PREFIX: char = 't';

/// Payload length of hashed (secp256k1 / actor) addresses.
pub const HASH_PAYLOAD_LEN: usize = 20;

/// Payload length of BLS addresses.
pub const BLS_PUBKEY_LEN: usize = 48;

/// Address protocol indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Protocol {
    /// Numeric actor id assigned by the init actor.
    Id = 0,
    /// Hash of a secp256k1 public key.
    Secp256k1 = 1,
    /// Hash of an actor creation seed.
    Actor = 2,
    /// BLS public key.
    Bls = 3,
}

/// Address of an actor.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Address {
    /// `t0` address.
    Id(u64),
    /// `t1` address.
    Secp256k1([u8; HASH_PAYLOAD_LEN]),
    /// `t2` address.
    Actor([u8; HASH_PAYLOAD_LEN]),
    /// `t3` address.
    Bls([u8; BLS_PUBKEY_LEN]),
}

fn hash_payload(data: &[u8]) -> [u8; HASH_PAYLOAD_LEN] {
    let mut hasher = Sha3_256::new();
    hasher.update(data);
    let digest = hasher.finalize();
    let mut out = [0u8; HASH_PAYLOAD_LEN];
    out.copy_from_slice(&digest[..HASH_PAYLOAD_LEN]);
    out
}

impl Address {
    /// ID address for `id`.
    #[must_use]
    pub const fn new_id(id: u64) -> Self {
        Address::Id(id)
    }

    /// Secp256k1 address derived from `pubkey`.
    #[must_use]
    pub fn new_secp256k1(pubkey: &[u8]) -> Self {
        Address::Secp256k1(hash_payload(pubkey))
    }

    /// Actor address derived from a creation seed.
    #[must_use]
    pub fn new_actor(seed: &[u8]) -> Self {
        Address::Actor(hash_payload(seed))
    }

    /// BLS address wrapping a 48-byte public key.
    pub fn new_bls(pubkey: &[u8]) -> SchemaResult<Self> {
        let key: [u8; BLS_PUBKEY_LEN] = pubkey.try_into().map_err(|_| {
            SchemaError::InvalidAddress(format!(
                "bls key must be {BLS_PUBKEY_LEN} bytes, got {}",
                pubkey.len()
            ))
        })?;
        Ok(Address::Bls(key))
    }

    /// Protocol of this address.
    pub fn protocol(&self) -> Protocol {
        match self {
            Address::Id(_) => Protocol::Id,
            Address::Secp256k1(_) => Protocol::Secp256k1,
            Address::Actor(_) => Protocol::Actor,
            Address::Bls(_) => Protocol::Bls,
        }
    }

    /// Actor id, for ID addresses.
    pub fn id(&self) -> Option<u64> {
        match self {
            Address::Id(id) => Some(*id),
            _ => None,
        }
    }

    /// Whether this is a public-key (secp256k1 or BLS) address.
    pub fn is_pubkey(&self) -> bool {
        matches!(self, Address::Secp256k1(_) | Address::Bls(_))
    }

    /// Binary form: protocol byte followed by the payload (ID as big-endian u64).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = vec![self.protocol() as u8];
        match self {
            Address::Id(id) => out.extend_from_slice(&id.to_be_bytes()),
            Address::Secp256k1(p) | Address::Actor(p) => out.extend_from_slice(p),
            Address::Bls(k) => out.extend_from_slice(k),
        }
        out
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let protocol = self.protocol() as u8;
        match self {
            Address::Id(id) => write!(f, "{NETWORK_PREFIX}{protocol}{id}"),
            Address::Secp256k1(p) | Address::Actor(p) => {
                write!(f, "{NETWORK_PREFIX}{protocol}{}", hex::encode(p))
            }
            Address::Bls(k) => write!(f, "{NETWORK_PREFIX}{protocol}{}", hex::encode(k)),
        }
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |why: &str| SchemaError::InvalidAddress(format!("{s:?}: {why}"));

        let rest = s
            .strip_prefix(NETWORK_PREFIX)
            .ok_or_else(|| invalid("missing network prefix"))?;
        let mut chars = rest.chars();
        let protocol = chars.next().ok_or_else(|| invalid("missing protocol"))?;
        let payload = chars.as_str();
        if payload.is_empty() {
            return Err(invalid("empty payload"));
        }

        match protocol {
            '0' => {
                if !payload.bytes().all(|b| b.is_ascii_digit())
                    || (payload.len() > 1 && payload.starts_with('0'))
                {
                    return Err(invalid("id payload must be a canonical decimal"));
                }
                payload
                    .parse::<u64>()
                    .map(Address::Id)
                    .map_err(|e| invalid(&e.to_string()))
            }
            '1' | '2' => {
                let bytes = hex::decode(payload).map_err(|e| invalid(&e.to_string()))?;
                let p: [u8; HASH_PAYLOAD_LEN] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| invalid("hash payload must be 20 bytes"))?;
                Ok(if protocol == '1' {
                    Address::Secp256k1(p)
                } else {
                    Address::Actor(p)
                })
            }
            '3' => {
                let bytes = hex::decode(payload).map_err(|e| invalid(&e.to_string()))?;
                Address::new_bls(&bytes).map_err(|_| invalid("bls payload must be 48 bytes"))
            }
            _ => Err(invalid("unknown protocol")),
        }
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
