//! Unsigned messages and their binary form.
//!
//! A vector stores each message as the bytes produced by [`Message::encode`].
//! Drivers decode them with [`Message::decode`]; bytes that do not decode
//! never reach the VM.

use num_bigint::BigInt;
use serde::{Deserialize, Serialize};
use tvx_schema::{Address, Cid};

use crate::encoding;
use crate::error::VmResult;

/// Bare value transfer, no code invoked.
pub const METHOD_SEND: u64 = 0;

/// Constructor of every actor.
pub const METHOD_CONSTRUCTOR: u64 = 1;

/// Current message format version.
pub const MESSAGE_VERSION: u64 = 0;

/// A call from one actor to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub version: u64,
    pub to: Address,
    pub from: Address,
    pub nonce: u64,
    pub value: BigInt,
    pub gas_limit: i64,
    pub gas_fee_cap: BigInt,
    pub gas_premium: BigInt,
    pub method: u64,
    pub params: Vec<u8>,
}

impl Message {
    pub fn encode(&self) -> VmResult<Vec<u8>> {
        encoding::to_vec(self)
    }

    pub fn decode(bytes: &[u8]) -> VmResult<Self> {
        encoding::from_slice(bytes)
    }

    /// CID of the encoded message.
    pub fn cid(&self) -> VmResult<Cid> {
        Ok(Cid::of(&self.encode()?))
    }

    /// Gas escrow: `gas_limit × gas_fee_cap`.
    pub fn gas_escrow(&self) -> BigInt {
        BigInt::from(self.gas_limit) * &self.gas_fee_cap
    }

    /// Funds the sender must hold for the message to be accepted.
    pub fn required_funds(&self) -> BigInt {
        self.gas_escrow() + &self.value
    }
}
