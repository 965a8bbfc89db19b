//! # Assertion Predicates
//!
//! Two shapes of predicate, both returning a human-readable reason on
//! failure:
//!
//! | Shape | Evaluated over | Constructors |
//! |-------|----------------|--------------|
//! | result predicate | one [`ApplyRet`] | [`exit_code`] |
//! | actor predicate | an actor before and after, plus the messages it sent | [`balance_updated`] |
//!
//! ## Deduction
//!
//! ```text
//! calculate_deduction(am) =
//!     0                                          if the message was rejected (gas_used = 0)
//!     burn + tip                                 if it failed after escrow
//!     burn + tip + value                         if it succeeded
//! ```

use num_bigint::BigInt;
use tvx_runtime_vm::{ActorState, ApplyRet, ExitCode, GasOutputs};

use crate::messages::ApplicableMessage;

/// Outcome of one predicate evaluation.
pub type PredicateResult = Result<(), String>;

/// Passes when the message exited with `expected`.
pub fn exit_code(expected: ExitCode) -> impl Fn(&ApplyRet) -> PredicateResult {
    move |ret| {
        if ret.exit_code() == expected {
            Ok(())
        } else {
            Err(format!(
                "expected exit code {expected}, got {}{}",
                ret.exit_code(),
                ret.failure
                    .as_deref()
                    .map(|f| format!(" ({f})"))
                    .unwrap_or_default()
            ))
        }
    }
}

/// What `am` cost its sender.
#[must_use]
pub fn calculate_deduction(am: &ApplicableMessage) -> BigInt {
    let Some(ret) = &am.result else {
        return BigInt::default();
    };
    if ret.receipt.gas_used == 0 {
        return BigInt::default();
    }
    let msg = &am.message;
    let gas = GasOutputs::compute(
        ret.receipt.gas_used,
        msg.gas_limit,
        &am.base_fee,
        &msg.gas_fee_cap,
        &msg.gas_premium,
    );
    let mut deduction = gas.total_charged();
    if ret.exit_code() == ExitCode::OK {
        deduction += &msg.value;
    }
    deduction
}

/// Passes when the actor's balance moved only by the deductions of the
/// messages it sent, plus `offset`.
pub fn balance_updated(
    offset: BigInt,
) -> impl Fn(&ActorState, &ActorState, &[&ApplicableMessage]) -> PredicateResult {
    move |pre, post, sent| {
        let deductions: BigInt = sent.iter().map(|am| calculate_deduction(am)).sum();
        let expected = &pre.balance - deductions + &offset;
        if post.balance == expected {
            Ok(())
        } else {
            Err(format!(
                "expected balance {expected}, got {} (pre-state {}, offset {offset})",
                post.balance, pre.balance
            ))
        }
    }
}
