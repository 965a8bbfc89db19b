//! Plain value transfers, accepted and rejected.

use num_bigint::BigInt;
use tvx_builders::{balance_updated, exit_code, Builder, BuilderResult, MsgOpt};
use tvx_runtime_vm::ExitCode;
use tvx_schema::{Address, Metadata, Protocol};

use super::Suite;
use crate::item::{VectorGenItem, VectorGroup};

fn funds() -> BigInt {
    BigInt::from(10u64.pow(18))
}

pub fn suite() -> Suite {
    Suite {
        name: "transfer",
        groups: vec![
            VectorGroup::message(
                "basic",
                vec![
                    VectorGenItem::new(
                        Metadata::new("ok-transfer")
                            .with_version("v1")
                            .with_description("10,000 moves between two funded accounts"),
                        ok_transfer,
                    ),
                    VectorGenItem::new(
                        Metadata::new("ok-self-transfer").with_version("v1"),
                        self_transfer,
                    ),
                    VectorGenItem::new(
                        Metadata::new("ok-sequential-nonces").with_version("v1"),
                        sequential_nonces,
                    ),
                ],
            ),
            VectorGroup::message(
                "rejected",
                vec![
                    VectorGenItem::new(
                        Metadata::new("fail-insufficient-balance").with_version("v1"),
                        insufficient_balance,
                    ),
                    VectorGenItem::new(
                        Metadata::new("fail-nonce-gap").with_version("v1"),
                        nonce_gap,
                    ),
                    VectorGenItem::new(
                        Metadata::new("fail-gas-limit-too-low").with_version("v1"),
                        gas_limit_too_low,
                    ),
                    VectorGenItem::new(
                        Metadata::new("fail-unknown-sender").with_version("v1"),
                        unknown_sender,
                    ),
                ],
            ),
        ],
    }
}

fn pair(v: &mut Builder, alice_balance: BigInt) -> BuilderResult<(Address, Address)> {
    let alice = v.account(Protocol::Secp256k1, alice_balance)?;
    let bob = v.account(Protocol::Secp256k1, funds())?;
    v.commit_preconditions()?;
    Ok((alice.robust, bob.robust))
}

fn ok_transfer(v: &mut Builder) -> BuilderResult<()> {
    let amount = BigInt::from(10_000);
    let (alice, bob) = pair(v, funds())?;
    v.transfer(alice, bob, &[MsgOpt::Value(amount.clone())])?;
    v.commit_applies()?;

    let a = v.assert()?;
    a.every_message_result_satisfies(exit_code(ExitCode::OK))?;
    a.every_message_sender_satisfies(balance_updated(BigInt::default()))?;
    a.balance_eq(&bob, &(funds() + amount))?;
    a.nonce_eq(&alice, 1)
}

fn self_transfer(v: &mut Builder) -> BuilderResult<()> {
    let (alice, _) = pair(v, funds())?;
    v.transfer(alice, alice, &[MsgOpt::Value(BigInt::from(1_000))])?;
    v.commit_applies()?;
    let a = v.assert()?;
    a.every_message_result_satisfies(exit_code(ExitCode::OK))?;
    // The value leaves and comes back; only gas is lost.
    a.every_message_sender_satisfies(move |pre, post, sent| {
        let offset = sent
            .iter()
            .filter(|am| am.result.as_ref().is_some_and(|r| r.exit_code() == ExitCode::OK))
            .map(|am| am.message.value.clone())
            .sum::<BigInt>();
        balance_updated(offset)(pre, post, sent)
    })
}

fn sequential_nonces(v: &mut Builder) -> BuilderResult<()> {
    let (alice, bob) = pair(v, funds())?;
    for _ in 0..3 {
        v.transfer(alice, bob, &[MsgOpt::Value(BigInt::from(1))])?;
    }
    v.commit_applies()?;
    let a = v.assert()?;
    a.every_message_result_satisfies(exit_code(ExitCode::OK))?;
    a.every_message_sender_satisfies(balance_updated(BigInt::default()))?;
    a.nonce_eq(&alice, 3)
}

fn insufficient_balance(v: &mut Builder) -> BuilderResult<()> {
    let (alice, bob) = pair(v, BigInt::from(9_999))?;
    v.transfer(alice, bob, &[MsgOpt::Value(BigInt::from(10_000))])?;
    v.commit_applies()?;
    let a = v.assert()?;
    a.every_message_result_satisfies(exit_code(ExitCode::SYS_ERR_SENDER_STATE_INVALID))?;
    a.every_message_sender_satisfies(balance_updated(BigInt::default()))?;
    a.balance_eq(&alice, &BigInt::from(9_999))?;
    a.nonce_eq(&alice, 0)
}

fn nonce_gap(v: &mut Builder) -> BuilderResult<()> {
    let (alice, bob) = pair(v, funds())?;
    v.transfer(alice, bob, &[MsgOpt::Nonce(1), MsgOpt::Value(BigInt::from(1))])?;
    v.commit_applies()?;
    let a = v.assert()?;
    a.every_message_result_satisfies(exit_code(ExitCode::SYS_ERR_SENDER_STATE_INVALID))?;
    a.every_message_sender_satisfies(balance_updated(BigInt::default()))
}

fn gas_limit_too_low(v: &mut Builder) -> BuilderResult<()> {
    let (alice, bob) = pair(v, funds())?;
    v.transfer(alice, bob, &[MsgOpt::GasLimit(1), MsgOpt::Value(BigInt::from(1))])?;
    v.commit_applies()?;
    let a = v.assert()?;
    a.every_message_result_satisfies(exit_code(ExitCode::SYS_ERR_OUT_OF_GAS))?;
    a.every_message_sender_satisfies(balance_updated(BigInt::default()))
}

fn unknown_sender(v: &mut Builder) -> BuilderResult<()> {
    let (_, bob) = pair(v, funds())?;
    let ghost = Address::new_secp256k1(b"never-funded");
    v.transfer(ghost, bob, &[MsgOpt::Value(BigInt::from(1))])?;
    v.commit_applies()?;
    let a = v.assert()?;
    a.every_message_result_satisfies(exit_code(ExitCode::SYS_ERR_SENDER_INVALID))?;
    a.actor_missing(&ghost)?;
    a.balance_eq(&bob, &funds())
}
