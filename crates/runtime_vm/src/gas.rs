//! # Gas Accounting
//!
//! Fixed price list, a per-message [`GasTracker`], and the settlement split
//! computed by [`GasOutputs::compute`].
//!
//! ## Settlement
//!
//! ```text
//! escrow      = gas_limit × fee_cap                      (pre-charged)
//! burn        = gas_used  × min(base_fee, fee_cap)       → burnt funds actor
//! miner_tip   = gas_limit × max(0, min(premium, fee_cap − base_fee))  → miner
//! refund      = escrow − burn − miner_tip                → sender
//! ```
//!
//! All prices are part of the recorded outcome: changing any of them changes
//! every receipt and every post-state root.

use num_bigint::BigInt;
use num_traits::{Signed, Zero};
use serde::{Deserialize, Serialize};

use crate::error::{ActorError, ActorResult};
use crate::exit_code::ExitCode;

// ════════════════════════════════════════════════════════════════════════════════
// PRICE LIST
// ════════════════════════════════════════════════════════════════════════════════

/// Flat charge for including any message on chain.
pub const ON_CHAIN_MESSAGE_BASE: i64 = 38_863;

/// Per serialized message byte (plus [`ON_CHAIN_MESSAGE_OVERHEAD_BYTES`]).
pub const ON_CHAIN_MESSAGE_PER_BYTE: i64 = 1_300;

/// Storage overhead counted for every message regardless of size.
pub const ON_CHAIN_MESSAGE_OVERHEAD_BYTES: i64 = 36;

/// Per byte of return value stored in the receipt.
pub const ON_CHAIN_RETURN_PER_BYTE: i64 = 1_300;

/// Every send, including the top-level one.
pub const SEND_BASE: i64 = 29_233;

/// Extra for sends that move a non-zero value.
pub const SEND_TRANSFER_FUNDS: i64 = 27_500;

/// Extra for sends that invoke a method other than the bare transfer.
pub const SEND_INVOKE_METHOD: i64 = 5_377;

/// Creating a new actor in the state tree.
pub const CREATE_ACTOR: i64 = 1_108_454;

/// Reading an actor state block.
pub const STATE_READ_BASE: i64 = 75_242;

/// Writing an actor state block.
pub const STATE_WRITE_BASE: i64 = 84_070;

/// Per written state byte.
pub const STATE_WRITE_PER_BYTE: i64 = 1_300;

/// Asking the randomness oracle.
pub const GET_RANDOMNESS_BASE: i64 = 10_000;

/// Largest gas limit a single message may declare.
pub const BLOCK_GAS_LIMIT: i64 = 10_000_000_000;

/// Gas charged for including a message of `msg_len` serialized bytes.
#[must_use]
pub fn on_chain_message(msg_len: usize) -> i64 {
    let len = i64::try_from(msg_len).unwrap_or(i64::MAX / ON_CHAIN_MESSAGE_PER_BYTE);
    let per_bytes =
        (ON_CHAIN_MESSAGE_OVERHEAD_BYTES + len).saturating_mul(ON_CHAIN_MESSAGE_PER_BYTE);
    ON_CHAIN_MESSAGE_BASE.saturating_add(per_bytes)
}

/// Gas charged for a return value of `len` bytes.
#[must_use]
pub fn on_chain_return(len: usize) -> i64 {
    i64::try_from(len)
        .unwrap_or(i64::MAX)
        .saturating_mul(ON_CHAIN_RETURN_PER_BYTE)
}

/// Gas charged for one send.
#[must_use]
pub fn send(value_nonzero: bool, invokes_method: bool) -> i64 {
    let mut gas = SEND_BASE;
    if value_nonzero {
        gas += SEND_TRANSFER_FUNDS;
    }
    if invokes_method {
        gas += SEND_INVOKE_METHOD;
    }
    gas
}

/// Gas charged for writing a state block of `len` bytes.
#[must_use]
pub fn state_write(len: usize) -> i64 {
    STATE_WRITE_BASE.saturating_add(
        i64::try_from(len)
            .unwrap_or(i64::MAX)
            .saturating_mul(STATE_WRITE_PER_BYTE),
    )
}

// ════════════════════════════════════════════════════════════════════════════════
// TRACKER
// ════════════════════════════════════════════════════════════════════════════════

/// Running gas counter of one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GasTracker {
    limit: i64,
    used: i64,
}

impl GasTracker {
    pub fn new(limit: i64) -> Self {
        Self { limit, used: 0 }
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    pub fn used(&self) -> i64 {
        self.used
    }

    /// Charges `amount`. Exceeding the limit consumes the whole limit and
    /// aborts with `SysErrOutOfGas`.
    pub fn charge(&mut self, what: &str, amount: i64) -> ActorResult<()> {
        let next = self.used.saturating_add(amount);
        if next > self.limit {
            self.used = self.limit;
            return Err(ActorError::abort(
                ExitCode::SYS_ERR_OUT_OF_GAS,
                format!("not enough gas for {what}: used={} limit={}", next, self.limit),
            ));
        }
        self.used = next;
        Ok(())
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// SETTLEMENT
// ════════════════════════════════════════════════════════════════════════════════

/// How the escrowed gas funds of one message are distributed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasOutputs {
    pub base_fee_burn: BigInt,
    pub miner_tip: BigInt,
    pub refund: BigInt,
}

impl GasOutputs {
    /// Nothing charged: the message was rejected before escrow.
    pub fn zero() -> Self {
        Self::default()
    }

    /// Computes the split for a message that was charged.
    pub fn compute(
        gas_used: i64,
        gas_limit: i64,
        base_fee: &BigInt,
        fee_cap: &BigInt,
        premium: &BigInt,
    ) -> Self {
        let effective_base = if base_fee < fee_cap { base_fee } else { fee_cap };
        let base_fee_burn = BigInt::from(gas_used) * effective_base;

        let headroom = fee_cap - base_fee;
        let mut tip_rate = if premium < &headroom {
            premium.clone()
        } else {
            headroom
        };
        if tip_rate.is_negative() {
            tip_rate = BigInt::zero();
        }
        let miner_tip = BigInt::from(gas_limit) * tip_rate;

        let escrow = BigInt::from(gas_limit) * fee_cap;
        let refund = escrow - &base_fee_burn - &miner_tip;

        Self {
            base_fee_burn,
            miner_tip,
            refund,
        }
    }

    /// What the sender ends up paying for gas.
    pub fn total_charged(&self) -> BigInt {
        &self.base_fee_burn + &self.miner_tip
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// TESTS
// ════════════════════════════════════════════════════════════════════════════════


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn proptest_outputs_account_for_the_whole_escrow(
            limit in 1i64..10_000_000,
            used_pct in 0i64..=100,
            base_fee in 0i64..1_000,
            fee_cap in 0i64..1_000,
            premium in 0i64..1_000,
        ) {
            let used = limit * used_pct / 100;
            let out = GasOutputs::compute(
                used,
                limit,
                &BigInt::from(base_fee),
                &BigInt::from(fee_cap),
                &BigInt::from(premium),
            );
            let escrow = BigInt::from(limit) * fee_cap;
            prop_assert_eq!(&out.base_fee_burn + &out.miner_tip + &out.refund, escrow);
            prop_assert!(!out.refund.is_negative());
            prop_assert!(!out.miner_tip.is_negative());
        }
    }
}
