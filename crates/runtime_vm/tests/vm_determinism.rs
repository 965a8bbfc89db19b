//! # Reference VM Integration Tests
//!
//! End-to-end behaviour of `Vm` through its public surface:
//! - Replays from a snapshot are byte-identical
//! - Runtime rules enforced through the chaos actor
//! - Params that fail to decode, including zero-padded payloads
//! - Init `Exec` of payment channels
//! - Tipset deduplication and order sensitivity

use num_bigint::BigInt;
use tvx_runtime_vm::actors::chaos::{
    CreateActorArgs, GetRandomnessArgs, METHOD_CALLER_VALIDATION, METHOD_CREATE_ACTOR,
    METHOD_GET_RANDOMNESS,
};
use tvx_runtime_vm::actors::init::{ExecParams, ExecReturn, METHOD_EXEC};
use tvx_runtime_vm::actors::paych::PaychConstructorParams;
use tvx_runtime_vm::actors::{ActorKind, CHAOS_ACTOR_ADDR, INIT_ACTOR_ADDR, REWARD_ACTOR_ADDR};
use tvx_runtime_vm::message::MESSAGE_VERSION;
use tvx_runtime_vm::{
    encoding, ActorSeed, ExitCode, Message, ReferenceVm, ReplayingRand, TipsetBlock, Vm,
    VmConfig, VmError, METHOD_CONSTRUCTOR, METHOD_SEND,
};
use tvx_schema::{Address, Randomness, RandomnessKind, RandomnessRule, RANDOMNESS_FALLBACK};

// ════════════════════════════════════════════════════════════════════════════════
// HELPERS
// ════════════════════════════════════════════════════════════════════════════════

fn funds() -> BigInt {
    BigInt::from(10u64.pow(18))
}

struct Fixture {
    vm: Vm,
    alice: Address,
    bob: Address,
    nonce: u64,
}

impl Fixture {
    fn new() -> Self {
        Self::with_config(VmConfig::default())
    }

    fn with_config(config: VmConfig) -> Self {
        let mut vm = Vm::new(config).expect("genesis");
        let alice = vm
            .install_actor(ActorSeed::Account(Address::new_secp256k1(b"alice")), funds())
            .expect("alice");
        let bob = vm
            .install_actor(ActorSeed::Account(Address::new_secp256k1(b"bob")), funds())
            .expect("bob");
        vm.install_actor(ActorSeed::Chaos, BigInt::default())
            .expect("chaos");
        vm.set_base_fee(BigInt::from(100));
        Self {
            vm,
            alice,
            bob,
            nonce: 0,
        }
    }

    fn msg(&mut self, to: Address, method: u64, params: Vec<u8>, value: i64) -> Message {
        let msg = Message {
            version: MESSAGE_VERSION,
            to,
            from: self.alice,
            nonce: self.nonce,
            value: BigInt::from(value),
            gas_limit: 1_000_000_000,
            gas_fee_cap: BigInt::from(200),
            gas_premium: BigInt::from(1),
            method,
            params,
        };
        self.nonce += 1;
        msg
    }

    fn apply(&mut self, to: Address, method: u64, params: Vec<u8>) -> ExitCode {
        let msg = self.msg(to, method, params, 0);
        self.vm.apply_message(&msg).expect("apply").exit_code()
    }
}

fn enc<T: serde::Serialize>(value: &T) -> Vec<u8> {
    encoding::to_vec(value).expect("encode")
}

fn create_actor_args(code: Option<ActorKind>, addr: Option<Address>) -> Vec<u8> {
    enc(&CreateActorArgs {
        undef_actor_cid: code.is_none(),
        actor_cid: code.unwrap_or(ActorKind::Account).code_cid(),
        undef_address: addr.is_none(),
        address: addr.unwrap_or(Address::new_id(0)),
    })
}

// ════════════════════════════════════════════════════════════════════════════════
// DETERMINISM
// ════════════════════════════════════════════════════════════════════════════════

#[test]
fn snapshot_replay_is_identical() {
    let mut fx = Fixture::new();
    let pre_root = fx.vm.flush().expect("flush");
    let car = fx.vm.export_car(&[pre_root]).expect("car");

    let bob = fx.bob;
    let msg = fx.msg(bob, METHOD_SEND, Vec::new(), 10_000);
    let ret = fx.vm.apply_message(&msg).expect("apply");
    let post_root = fx.vm.flush().expect("flush");

    for _ in 0..3 {
        let mut replay = Vm::from_snapshot(VmConfig::default(), &car, &pre_root).expect("load");
        replay.set_base_fee(BigInt::from(100));
        assert_eq!(replay.apply_message(&msg).expect("apply"), ret);
        assert_eq!(replay.flush().expect("flush"), post_root);
    }
}

#[test]
fn transfer_to_new_pubkey_creates_account() {
    let mut fx = Fixture::new();
    let carol = Address::new_bls(&[7u8; 48]).expect("bls");
    let msg = fx.msg(carol, METHOD_SEND, Vec::new(), 10_000);
    let ret = fx.vm.apply_message(&msg).expect("apply");
    assert_eq!(ret.exit_code(), ExitCode::OK);
    let actor = fx.vm.actor(&carol).expect("lookup").expect("created");
    assert_eq!(actor.balance, BigInt::from(10_000));
    assert_eq!(fx.vm.actor_kind(&carol).expect("kind"), Some(ActorKind::Account));
}

#[test]
fn insufficient_balance_is_sender_state_invalid_without_charge() {
    let mut vm = Vm::new(VmConfig::default()).expect("genesis");
    let poor = vm
        .install_actor(ActorSeed::Account(Address::new_secp256k1(b"poor")), BigInt::from(9_999))
        .expect("install");
    let msg = Message {
        version: MESSAGE_VERSION,
        to: REWARD_ACTOR_ADDR,
        from: poor,
        nonce: 0,
        value: BigInt::from(10_000),
        gas_limit: 1_000_000_000,
        gas_fee_cap: BigInt::from(200),
        gas_premium: BigInt::from(1),
        method: METHOD_SEND,
        params: Vec::new(),
    };
    let ret = vm.apply_message(&msg).expect("apply");
    assert_eq!(ret.exit_code(), ExitCode::SYS_ERR_SENDER_STATE_INVALID);
    assert_eq!(ret.receipt.gas_used, 0);
    assert_eq!(vm.actor(&poor).expect("lookup").expect("poor").balance, BigInt::from(9_999));
}

#[test]
fn nonce_mismatch_is_sender_state_invalid() {
    let mut fx = Fixture::new();
    fx.nonce = 5;
    let bob = fx.bob;
    assert_eq!(
        fx.apply(bob, METHOD_SEND, Vec::new()),
        ExitCode::SYS_ERR_SENDER_STATE_INVALID
    );
}

#[test]
fn gas_limit_below_inclusion_cost_is_out_of_gas() {
    let mut fx = Fixture::new();
    let bob = fx.bob;
    let mut msg = fx.msg(bob, METHOD_SEND, Vec::new(), 1);
    msg.gas_limit = 100;
    let ret = fx.vm.apply_message(&msg).expect("apply");
    assert_eq!(ret.exit_code(), ExitCode::SYS_ERR_OUT_OF_GAS);
    assert_eq!(ret.receipt.gas_used, 0);
}

// ════════════════════════════════════════════════════════════════════════════════
// RUNTIME RULES (CHAOS)
// ════════════════════════════════════════════════════════════════════════════════

#[test]
fn caller_validation_branches() {
    let cases = [
        (0u64, ExitCode::SYS_ERR_ILLEGAL_ACTOR),
        (1, ExitCode::SYS_ERR_ILLEGAL_ACTOR),
        (2, ExitCode::SYS_ERR_FORBIDDEN),
        (3, ExitCode::SYS_ERR_FORBIDDEN),
    ];
    for (branch, expected) in cases {
        let mut fx = Fixture::new();
        assert_eq!(
            fx.apply(CHAOS_ACTOR_ADDR, METHOD_CALLER_VALIDATION, enc(&branch)),
            expected,
            "branch {branch}"
        );
    }
}

#[test]
fn unknown_caller_validation_branch_is_fatal_and_reverts() {
    let mut fx = Fixture::new();
    let before = fx.vm.flush().expect("flush");
    let msg = fx.msg(CHAOS_ACTOR_ADDR, METHOD_CALLER_VALIDATION, enc(&4u64), 0);
    assert!(matches!(fx.vm.apply_message(&msg), Err(VmError::Fatal(_))));
    assert_eq!(fx.vm.flush().expect("flush"), before);
}

#[test]
fn chaos_constructor_is_fatal() {
    let mut fx = Fixture::new();
    let msg = fx.msg(CHAOS_ACTOR_ADDR, METHOD_CONSTRUCTOR, Vec::new(), 0);
    assert!(matches!(fx.vm.apply_message(&msg), Err(VmError::Fatal(_))));
}

#[test]
fn unknown_method_is_invalid_method() {
    let mut fx = Fixture::new();
    assert_eq!(
        fx.apply(CHAOS_ACTOR_ADDR, 77, Vec::new()),
        ExitCode::SYS_ERR_INVALID_METHOD
    );
}

#[test]
fn create_actor_rules() {
    let alice = Fixture::new().alice;
    let cases = [
        (create_actor_args(None, Some(Address::new_id(500))), ExitCode::SYS_ERR_ILLEGAL_ARGUMENT),
        (create_actor_args(Some(ActorKind::Account), None), ExitCode::SYS_ERR_ILLEGAL_ARGUMENT),
        (
            create_actor_args(Some(ActorKind::Chaos), Some(Address::new_id(500))),
            ExitCode::SYS_ERR_ILLEGAL_ARGUMENT,
        ),
        (
            create_actor_args(Some(ActorKind::Account), Some(Address::new_secp256k1(b"x"))),
            ExitCode::SYS_ERR_ILLEGAL_ARGUMENT,
        ),
        (
            create_actor_args(Some(ActorKind::Account), Some(alice)),
            ExitCode::SYS_ERR_ILLEGAL_ARGUMENT,
        ),
        (create_actor_args(Some(ActorKind::Account), Some(Address::new_id(500))), ExitCode::OK),
    ];
    for (i, (params, expected)) in cases.into_iter().enumerate() {
        let mut fx = Fixture::new();
        assert_eq!(fx.apply(CHAOS_ACTOR_ADDR, METHOD_CREATE_ACTOR, params), expected, "case {i}");
    }
}

#[test]
fn get_randomness_replays_rules() {
    let mut fx = Fixture::new();
    let mut rules = Randomness::default();
    rules.push(
        RandomnessRule::new(RandomnessKind::Chain, 7, 10, b"seed".to_vec()),
        vec![0x42; 32],
    );
    fx.vm.set_rand(Box::new(ReplayingRand::new(rules)));

    let args = |entropy: &[u8]| {
        enc(&GetRandomnessArgs {
            kind: RandomnessKind::Chain,
            tag: 7,
            epoch: 10,
            entropy: entropy.to_vec(),
        })
    };
    let m1 = fx.msg(CHAOS_ACTOR_ADDR, METHOD_GET_RANDOMNESS, args(b"seed"), 0);
    let ret = fx.vm.apply_message(&m1).expect("apply");
    assert_eq!(ret.receipt.return_data, vec![0x42; 32]);

    let m2 = fx.msg(CHAOS_ACTOR_ADDR, METHOD_GET_RANDOMNESS, args(b"other"), 0);
    let ret = fx.vm.apply_message(&m2).expect("apply");
    assert_eq!(ret.receipt.return_data, RANDOMNESS_FALLBACK.to_vec());
}

// ════════════════════════════════════════════════════════════════════════════════
// PARAMS DECODING
// ════════════════════════════════════════════════════════════════════════════════

#[test]
fn zero_padded_params_never_decode() {
    let mut fx = Fixture::new();
    let mut params = vec![0u8; 11];
    params.extend(create_actor_args(Some(ActorKind::Account), Some(Address::new_id(500))));
    let msg = fx.msg(CHAOS_ACTOR_ADDR, METHOD_CREATE_ACTOR, params, 0);
    let ret = fx.vm.apply_message(&msg).expect("apply");
    assert_eq!(ret.exit_code(), ExitCode::SYS_ERR_SENDER_INVALID);
    assert!(ret.receipt.gas_used > 0, "gas is charged for undecodable params");
    assert!(ret.gas_outputs.total_charged() > BigInt::default());
}

#[test]
fn params_decode_class_is_configurable() {
    let config = VmConfig {
        params_decode_exit: ExitCode::ERR_SERIALIZATION,
        ..VmConfig::default()
    };
    let mut fx = Fixture::with_config(config);
    assert_eq!(
        fx.apply(INIT_ACTOR_ADDR, METHOD_EXEC, vec![0xFF; 3]),
        ExitCode::ERR_SERIALIZATION
    );
}

// ════════════════════════════════════════════════════════════════════════════════
// INIT EXEC
// ════════════════════════════════════════════════════════════════════════════════

#[test]
fn exec_payment_channel() {
    let mut fx = Fixture::new();
    let (alice, bob) = (fx.alice, fx.bob);
    let params = enc(&ExecParams {
        code_cid: ActorKind::PaymentChannel.code_cid(),
        constructor_params: enc(&PaychConstructorParams { from: alice, to: bob }),
    });
    let msg = fx.msg(INIT_ACTOR_ADDR, METHOD_EXEC, params, 500);
    let ret = fx.vm.apply_message(&msg).expect("apply");
    assert_eq!(ret.exit_code(), ExitCode::OK, "{:?}", ret.failure);

    let out: ExecReturn = encoding::from_slice(&ret.receipt.return_data).expect("decode");
    assert_eq!(fx.vm.resolve(&out.robust_address).expect("resolve"), out.id_address.id());
    let paych = fx.vm.actor(&out.id_address).expect("lookup").expect("paych");
    assert_eq!(paych.code, ActorKind::PaymentChannel.code_cid());
    assert_eq!(paych.balance, BigInt::from(500));
}

#[test]
fn exec_with_unparsable_constructor_params() {
    let mut fx = Fixture::new();
    let params = enc(&ExecParams {
        code_cid: ActorKind::PaymentChannel.code_cid(),
        constructor_params: vec![0xDE, 0xAD],
    });
    let before = fx.vm.actor(&fx.alice).expect("lookup").expect("alice").balance;
    let msg = fx.msg(INIT_ACTOR_ADDR, METHOD_EXEC, params, 500);
    let ret = fx.vm.apply_message(&msg).expect("apply");
    assert_eq!(ret.exit_code(), ExitCode::SYS_ERR_SENDER_INVALID);
    let after = fx.vm.actor(&fx.alice).expect("lookup").expect("alice").balance;
    assert_eq!(after, before - ret.gas_outputs.total_charged());
}

#[test]
fn exec_of_non_execable_code_is_forbidden() {
    let mut fx = Fixture::new();
    let params = enc(&ExecParams {
        code_cid: ActorKind::Account.code_cid(),
        constructor_params: Vec::new(),
    });
    assert_eq!(fx.apply(INIT_ACTOR_ADDR, METHOD_EXEC, params), ExitCode::ERR_FORBIDDEN);
}

#[test]
fn paych_parties_must_be_accounts() {
    let mut fx = Fixture::new();
    let alice = fx.alice;
    let params = enc(&ExecParams {
        code_cid: ActorKind::PaymentChannel.code_cid(),
        constructor_params: enc(&PaychConstructorParams {
            from: alice,
            to: CHAOS_ACTOR_ADDR,
        }),
    });
    assert_eq!(fx.apply(INIT_ACTOR_ADDR, METHOD_EXEC, params), ExitCode::ERR_FORBIDDEN);
}

// ════════════════════════════════════════════════════════════════════════════════
// TIPSETS
// ════════════════════════════════════════════════════════════════════════════════

#[test]
fn tipset_skips_duplicates_and_pays_block_miner() {
    let mut fx = Fixture::new();
    let bob = fx.bob;
    let m0 = fx.msg(REWARD_ACTOR_ADDR, METHOD_SEND, Vec::new(), 1);
    let m1 = fx.msg(REWARD_ACTOR_ADDR, METHOD_SEND, Vec::new(), 2);
    let blocks = vec![
        TipsetBlock {
            miner: bob,
            win_count: 1,
            messages: vec![m0.clone(), m1.clone()],
        },
        TipsetBlock {
            miner: REWARD_ACTOR_ADDR,
            win_count: 1,
            messages: vec![m1],
        },
    ];
    let bob_before = fx.vm.actor(&bob).expect("lookup").expect("bob").balance;
    let ret = fx.vm.apply_tipset(1, BigInt::from(100), &blocks).expect("tipset");
    assert_eq!(ret.applied.len(), 2);
    assert!(ret.applied.iter().all(|r| r.exit_code() == ExitCode::OK));

    let tips: BigInt = ret.applied.iter().map(|r| r.gas_outputs.miner_tip.clone()).sum();
    let bob_after = fx.vm.actor(&bob).expect("lookup").expect("bob").balance;
    assert_eq!(bob_after - bob_before, tips);
}

#[test]
fn tipset_order_changes_outcome() {
    let run = |swap: bool| {
        let mut fx = Fixture::new();
        let m0 = fx.msg(REWARD_ACTOR_ADDR, METHOD_SEND, Vec::new(), 1);
        let m1 = fx.msg(REWARD_ACTOR_ADDR, METHOD_SEND, Vec::new(), 1);
        let messages = if swap { vec![m1, m0] } else { vec![m0, m1] };
        let blocks = [TipsetBlock {
            miner: REWARD_ACTOR_ADDR,
            win_count: 1,
            messages,
        }];
        let ret = fx.vm.apply_tipset(1, BigInt::from(100), &blocks).expect("tipset");
        (ret.receipts_root, fx.vm.flush().expect("flush"))
    };
    let (root_a, state_a) = run(false);
    let (root_b, state_b) = run(true);
    assert_ne!(root_a, root_b);
    assert_ne!(state_a, state_b);
}

#[test]
fn tipset_with_unknown_miner_fails() {
    let mut fx = Fixture::new();
    let blocks = [TipsetBlock {
        miner: Address::new_id(4242),
        win_count: 1,
        messages: Vec::new(),
    }];
    assert!(matches!(
        fx.vm.apply_tipset(1, BigInt::from(100), &blocks),
        Err(VmError::ActorNotFound(_))
    ));
}

// ════════════════════════════════════════════════════════════════════════════════
// COLLABORATOR TRAIT
// ════════════════════════════════════════════════════════════════════════════════

fn install_and_flush<V: ReferenceVm>(vm: &mut V) -> (Address, tvx_schema::Cid) {
    let addr = vm
        .install_actor(ActorSeed::Account(Address::new_secp256k1(b"dave")), BigInt::from(1))
        .expect("install");
    (addr, vm.flush().expect("flush"))
}

#[test]
fn reference_vm_trait_is_deterministic() {
    let mut a = Vm::new(VmConfig::default()).expect("genesis");
    let mut b = Vm::new(VmConfig::default()).expect("genesis");
    let (addr_a, root_a) = install_and_flush(&mut a);
    let (addr_b, root_b) = install_and_flush(&mut b);
    assert_eq!(addr_a, addr_b);
    assert_eq!(root_a, root_b);
    assert_eq!(
        ReferenceVm::actor(&a, &addr_a).expect("lookup").map(|s| s.balance),
        Some(BigInt::from(1))
    );
}
