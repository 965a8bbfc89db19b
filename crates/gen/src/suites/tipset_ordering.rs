//! Message order inside a tipset, and duplicate elimination.
//!
//! ```text
//!   tipset @ epoch 1
//!     block 0 (miner t02) ── m0, m1, ...
//!     block 1 (miner t02) ── mN, ...
//!   messages apply block by block, in block order;
//!   a message whose CID was already seen in the tipset is skipped
//! ```

use num_bigint::BigInt;
use tvx_builders::{balance_updated, exit_code, AddressHandle, Builder, BuilderResult, MsgOpt};
use tvx_runtime_vm::actors::REWARD_ACTOR_ADDR;
use tvx_runtime_vm::ExitCode;
use tvx_schema::{Metadata, Protocol, DEFAULT_BASE_FEE};

use super::Suite;
use crate::item::{VectorGenItem, VectorGroup};

const EPOCH: i64 = 1;

pub fn suite() -> Suite {
    Suite {
        name: "tipset_ordering",
        groups: vec![
            VectorGroup::tipset(
                "nonce_order",
                vec![
                    VectorGenItem::new(
                        Metadata::new("ok-ascending-nonces")
                            .with_version("v1")
                            .with_description("messages apply in block order"),
                        |v| nonce_order(v, false),
                    ),
                    VectorGenItem::new(
                        Metadata::new("fail-descending-nonces")
                            .with_version("v1")
                            .with_description("a later nonce ahead of an earlier one is rejected"),
                        |v| nonce_order(v, true),
                    ),
                ],
            ),
            VectorGroup::tipset(
                "duplicates",
                vec![
                    VectorGenItem::new(
                        Metadata::new("ok-duplicate-in-block-skipped").with_version("v1"),
                        |v| duplicate(v, false),
                    ),
                    VectorGenItem::new(
                        Metadata::new("ok-duplicate-across-blocks-skipped").with_version("v1"),
                        |v| duplicate(v, true),
                    ),
                ],
            ),
        ],
    }
}

fn pair(v: &mut Builder) -> BuilderResult<(AddressHandle, AddressHandle)> {
    let funds = BigInt::from(10u64.pow(18));
    let alice = v.account(Protocol::Secp256k1, funds.clone())?;
    let bob = v.account(Protocol::Secp256k1, funds)?;
    v.commit_preconditions()?;
    v.stage_tipset(EPOCH, BigInt::from(DEFAULT_BASE_FEE))?;
    v.stage_block(REWARD_ACTOR_ADDR, 1)?;
    Ok((alice, bob))
}

fn nonce_order(v: &mut Builder, descending: bool) -> BuilderResult<()> {
    let (alice, bob) = pair(v)?;
    let nonces = if descending { [1, 0] } else { [0, 1] };
    let handles = nonces
        .into_iter()
        .map(|n| v.transfer(alice.id, bob.id, &[MsgOpt::Nonce(n), MsgOpt::Value(BigInt::from(5))]))
        .collect::<BuilderResult<Vec<_>>>()?;
    v.commit_applies()?;

    let a = v.assert()?;
    if descending {
        a.message_result_satisfies(handles[0], exit_code(ExitCode::SYS_ERR_SENDER_STATE_INVALID))?;
        a.message_result_satisfies(handles[1], exit_code(ExitCode::OK))?;
        a.nonce_eq(&alice.id, 1)?;
    } else {
        a.every_message_result_satisfies(exit_code(ExitCode::OK))?;
        a.nonce_eq(&alice.id, 2)?;
    }
    a.every_message_sender_satisfies(balance_updated(BigInt::default()))
}

fn duplicate(v: &mut Builder, across_blocks: bool) -> BuilderResult<()> {
    let (alice, bob) = pair(v)?;
    let opts = [MsgOpt::Nonce(0), MsgOpt::Value(BigInt::from(5))];
    let first = v.transfer(alice.id, bob.id, &opts)?;
    if across_blocks {
        v.stage_block(REWARD_ACTOR_ADDR, 1)?;
    }
    // Staged under the next nonce, then rewritten into a copy of the first.
    let second = v.transfer(alice.id, bob.id, &[MsgOpt::Value(BigInt::from(5))])?;
    let original = v.applicable(first)?.message.clone();
    *v.message_mut(second)? = original;
    v.commit_applies()?;

    let a = v.assert()?;
    a.message_result_satisfies(first, exit_code(ExitCode::OK))?;
    a.nonce_eq(&alice.id, 1)?;
    a.balance_eq(&bob.id, &(BigInt::from(10u64.pow(18)) + 5))?;
    a.every_message_sender_satisfies(balance_updated(BigInt::default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tvx_schema::Class;

    #[test]
    fn test_groups_are_tipset_class() {
        let s = suite();
        assert_eq!(s.len(), 4);
        assert!(s.groups.iter().all(|g| g.class == Class::Tipset));
    }
}
