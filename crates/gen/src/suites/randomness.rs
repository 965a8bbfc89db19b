//! Randomness requests answered from recorded rules.
//!
//! Each vector records the rules it relies on; a request that matches no
//! rule must resolve to [`RANDOMNESS_FALLBACK`].

use num_bigint::BigInt;
use tvx_builders::{exit_code, Builder, BuilderResult, MsgOpt};
use tvx_runtime_vm::actors::chaos::GetRandomnessArgs;
use tvx_runtime_vm::ExitCode;
use tvx_schema::{Metadata, Protocol, RandomnessKind, RandomnessRule, RANDOMNESS_FALLBACK};

use super::Suite;
use crate::item::{VectorGenItem, VectorGroup};

/// Domain separation tag used by every request in this suite.
const TAG: i64 = 7;

pub fn suite() -> Suite {
    Suite {
        name: "randomness",
        groups: vec![VectorGroup::message(
            "replay",
            vec![
                matched("ok-beacon-rule-matched", RandomnessKind::Beacon, 0xbe),
                matched("ok-chain-rule-matched", RandomnessKind::Chain, 0xc4),
                VectorGenItem::new(
                    Metadata::new("ok-unmatched-request-falls-back")
                        .with_version("v1")
                        .with_description(
                            "a request with no recorded rule gets the fallback value",
                        ),
                    unmatched,
                ),
            ],
        )],
    }
}

fn request(kind: RandomnessKind) -> GetRandomnessArgs {
    GetRandomnessArgs {
        kind,
        tag: TAG,
        epoch: 0,
        entropy: b"tvx-entropy".to_vec(),
    }
}

fn expect_return(v: &Builder, want: Vec<u8>) -> BuilderResult<()> {
    let a = v.assert()?;
    a.every_message_result_satisfies(exit_code(ExitCode::OK))?;
    a.every_message_result_satisfies(move |ret| {
        if ret.receipt.return_data == want {
            Ok(())
        } else {
            Err(format!(
                "expected randomness {}, got {}",
                hex::encode(&want),
                hex::encode(&ret.receipt.return_data)
            ))
        }
    })
}

fn matched(id: &str, kind: RandomnessKind, fill: u8) -> VectorGenItem {
    VectorGenItem::new(Metadata::new(id).with_version("v1"), move |v| {
        let alice = v.account(Protocol::Secp256k1, BigInt::from(10u64.pow(18)))?;
        v.enable_chaos()?;
        let args = request(kind);
        let ret = vec![fill; 32];
        v.randomness_rule(
            RandomnessRule::new(kind, args.tag, args.epoch, args.entropy.clone()),
            ret.clone(),
        )?;
        v.commit_preconditions()?;
        v.chaos_get_randomness(alice.id, &args, &[MsgOpt::Nonce(0)])?;
        v.commit_applies()?;
        expect_return(v, ret)
    })
}

fn unmatched(v: &mut Builder) -> BuilderResult<()> {
    let alice = v.account(Protocol::Secp256k1, BigInt::from(10u64.pow(18)))?;
    v.enable_chaos()?;
    // Recorded for the beacon, requested from the chain.
    let recorded = request(RandomnessKind::Beacon);
    v.randomness_rule(
        RandomnessRule::new(RandomnessKind::Beacon, recorded.tag, recorded.epoch, recorded.entropy),
        vec![1u8; 32],
    )?;
    v.commit_preconditions()?;
    v.chaos_get_randomness(alice.id, &request(RandomnessKind::Chain), &[])?;
    v.commit_applies()?;
    expect_return(v, RANDOMNESS_FALLBACK.to_vec())
}
