//! Messages staged on a builder and the options that shape them.

use num_bigint::BigInt;
use tvx_runtime_vm::{ApplyRet, Message};

use crate::error::{BuilderError, BuilderResult};

/// Gas limit applied when neither the message nor the defaults set one.
pub const DEFAULT_GAS_LIMIT: i64 = 1_000_000_000;

pub const DEFAULT_GAS_PREMIUM: i64 = 1;

pub const DEFAULT_GAS_FEE_CAP: i64 = 200;

/// Per-message override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MsgOpt {
    Nonce(u64),
    Value(BigInt),
    GasLimit(i64),
    GasPremium(BigInt),
    GasFeeCap(BigInt),
    /// Epoch the message is applied at (message class only).
    Epoch(i64),
}

impl MsgOpt {
    fn name(&self) -> &'static str {
        match self {
            MsgOpt::Nonce(_) => "Nonce",
            MsgOpt::Value(_) => "Value",
            MsgOpt::GasLimit(_) => "GasLimit",
            MsgOpt::GasPremium(_) => "GasPremium",
            MsgOpt::GasFeeCap(_) => "GasFeeCap",
            MsgOpt::Epoch(_) => "Epoch",
        }
    }
}

/// Gas parameters used when a message does not set its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgDefaults {
    pub gas_limit: i64,
    pub gas_premium: BigInt,
    pub gas_fee_cap: BigInt,
}

impl Default for MsgDefaults {
    fn default() -> Self {
        Self {
            gas_limit: DEFAULT_GAS_LIMIT,
            gas_premium: BigInt::from(DEFAULT_GAS_PREMIUM),
            gas_fee_cap: BigInt::from(DEFAULT_GAS_FEE_CAP),
        }
    }
}

impl MsgDefaults {
    /// Applies gas options; anything else is rejected.
    pub fn apply(&mut self, opts: &[MsgOpt]) -> BuilderResult<()> {
        for opt in opts {
            match opt {
                MsgOpt::GasLimit(v) => self.gas_limit = *v,
                MsgOpt::GasPremium(v) => self.gas_premium = v.clone(),
                MsgOpt::GasFeeCap(v) => self.gas_fee_cap = v.clone(),
                other => return Err(BuilderError::InvalidDefault(other.name())),
            }
        }
        Ok(())
    }
}

/// Options of one message after folding in the defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResolvedOpts {
    pub nonce: Option<u64>,
    pub value: BigInt,
    pub gas_limit: i64,
    pub gas_premium: BigInt,
    pub gas_fee_cap: BigInt,
    pub epoch: Option<i64>,
}

impl ResolvedOpts {
    /// Later options win over earlier ones.
    pub fn resolve(defaults: &MsgDefaults, opts: &[MsgOpt]) -> Self {
        let mut out = Self {
            nonce: None,
            value: BigInt::default(),
            gas_limit: defaults.gas_limit,
            gas_premium: defaults.gas_premium.clone(),
            gas_fee_cap: defaults.gas_fee_cap.clone(),
            epoch: None,
        };
        for opt in opts {
            match opt {
                MsgOpt::Nonce(v) => out.nonce = Some(*v),
                MsgOpt::Value(v) => out.value = v.clone(),
                MsgOpt::GasLimit(v) => out.gas_limit = *v,
                MsgOpt::GasPremium(v) => out.gas_premium = v.clone(),
                MsgOpt::GasFeeCap(v) => out.gas_fee_cap = v.clone(),
                MsgOpt::Epoch(v) => out.epoch = Some(*v),
            }
        }
        out
    }
}

/// Index of a staged message, in application order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageHandle(pub(crate) usize);

impl MessageHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A staged message and, once applies are committed, its outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicableMessage {
    pub message: Message,
    /// Epoch override for message-class vectors.
    pub epoch: Option<i64>,
    /// Base fee in force when the message was applied.
    pub base_fee: BigInt,
    /// `None` until applied, and for messages that never produced a
    /// receipt.
    pub result: Option<ApplyRet>,
}
