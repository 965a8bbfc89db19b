//! # Builder Integration Tests
//!
//! Whole vectors built through the public surface:
//! - Transfers, paych creation through init and chaos-driven violations
//! - Stage ordering and declaration errors
//! - Determinism of the emitted record
//! - Tipset staging and order sensitivity
//! - Strict versus lenient assertions

use num_bigint::BigInt;
use tvx_builders::{
    balance_updated, exit_code, AssertionMode, Builder, BuilderError, MsgOpt, Stage, VectorOptions,
};
use tvx_runtime_vm::actors::chaos::{CallerValidationBranch, CreateActorArgs};
use tvx_runtime_vm::actors::{ActorKind, REWARD_ACTOR_ADDR};
use tvx_runtime_vm::ExitCode;
use tvx_schema::{
    Address, Class, Metadata, Protocol, RandomnessKind, RandomnessRule, HINT_INCORRECT, HINT_NEGATE,
};

// ════════════════════════════════════════════════════════════════════════════════
// HELPERS
// ════════════════════════════════════════════════════════════════════════════════

fn big(v: u64) -> BigInt {
    BigInt::from(v)
}

fn meta(id: &str) -> Metadata {
    Metadata::new(id).with_version("v1")
}

fn transfer_vector(id: &str, amount: u64) -> Builder {
    let mut b = Builder::message(meta(id)).expect("builder");
    let alice = b.account(Protocol::Secp256k1, big(1_000_000_000_000_000)).expect("alice");
    let bob = b.account(Protocol::Secp256k1, big(1_000_000_000_000_000)).expect("bob");
    b.commit_preconditions().expect("pre");
    b.transfer(alice.robust, bob.robust, &[MsgOpt::Value(big(amount))])
        .expect("transfer");
    b.commit_applies().expect("applies");
    b
}

// ════════════════════════════════════════════════════════════════════════════════
// SCENARIOS
// ════════════════════════════════════════════════════════════════════════════════

#[test]
fn transfer_between_accounts() {
    let mut b = transfer_vector("transfer-ok", 10_000);
    let a = b.assert().expect("asserter");
    a.every_message_result_satisfies(exit_code(ExitCode::OK))
        .expect("ok");
    a.every_message_sender_satisfies(balance_updated(BigInt::default()))
        .expect("sender charged deduction");
    a.nonce_eq(&Address::new_id(100), 1).expect("nonce bumped");
    a.balance_eq(&Address::new_id(101), &big(1_000_000_000_010_000))
        .expect("receiver credited");

    let vector = b.finish().expect("finish");
    assert_eq!(vector.class, Class::Message);
    assert_eq!(vector.apply_messages.len(), 1);
    assert_eq!(vector.post.receipts.len(), 1);
    assert!(vector.post.apply_message_failures.is_empty());
    assert!(!vector.car.as_slice().is_empty());
    assert_eq!(vector.id(), "transfer-ok");
    assert_ne!(
        vector.pre.state_tree.as_ref().map(|s| s.root_cid),
        Some(vector.post.state_tree.root_cid)
    );
}

#[test]
fn transfer_creates_bls_receiver() {
    let mut b = Builder::message(meta("ok-create-bls")).expect("builder");
    let alice = b.account(Protocol::Secp256k1, big(1_000_000_000_000_000)).expect("alice");
    b.commit_preconditions().expect("pre");

    let mut key = [0u8; 48];
    key[0] = 0xB1;
    let receiver = Address::new_bls(&key).expect("bls");
    b.transfer(alice.id, receiver, &[MsgOpt::Value(big(10_000))])
        .expect("transfer");
    b.commit_applies().expect("applies");

    let a = b.assert().expect("asserter");
    a.every_message_result_satisfies(exit_code(ExitCode::OK))
        .expect("ok");
    a.actor_exists(&receiver).expect("account created");
    a.balance_eq(&receiver, &big(10_000)).expect("funded");
}

#[test]
fn insufficient_balance_is_rejected_without_charge() {
    let mut b = Builder::message(meta("fail-insufficient-balance")).expect("builder");
    let alice = b.account(Protocol::Bls, big(9_999)).expect("alice");
    b.commit_preconditions().expect("pre");
    b.transfer(
        alice.robust,
        Address::new_secp256k1(b"publickeyfoo"),
        &[MsgOpt::Value(big(10_000))],
    )
    .expect("transfer");
    b.commit_applies().expect("applies");

    let a = b.assert().expect("asserter");
    a.every_message_result_satisfies(exit_code(ExitCode::SYS_ERR_SENDER_STATE_INVALID))
        .expect("rejected");
    a.balance_eq(&alice.id, &big(9_999)).expect("untouched");
    a.actor_missing(&Address::new_secp256k1(b"publickeyfoo"))
        .expect("no receiver");
}

#[test]
fn sequential_paych_addresses() {
    let mut b = Builder::message(meta("sequential-10")).expect("builder");
    let sender = b.account(Protocol::Secp256k1, big(1_000_000_000_000_000)).expect("sender");
    let receiver = b.account(Protocol::Secp256k1, big(1_000_000_000_000_000)).expect("receiver");
    b.commit_preconditions().expect("pre");
    for _ in 0..10 {
        b.create_paych_actor(sender.robust, receiver.robust, &[MsgOpt::Value(big(1_000))])
            .expect("paych");
    }
    b.commit_applies().expect("applies");

    let a = b.assert().expect("asserter");
    a.every_message_result_satisfies(exit_code(ExitCode::OK))
        .expect("ok");
    a.every_message_sender_satisfies(balance_updated(BigInt::default()))
        .expect("deductions");
    for id in 102..112 {
        a.actor_exists(&Address::new_id(id)).expect("sequential id");
        assert_eq!(
            b.vm().actor_kind(&Address::new_id(id)).expect("kind"),
            Some(ActorKind::PaymentChannel)
        );
    }
}

#[test]
fn zero_padded_exec_params_fail_as_sender_invalid() {
    let mut b = Builder::message(meta("fails-unparsable-init-actor-exec-msg")).expect("builder");
    let sender = b.account(Protocol::Secp256k1, big(1_000_000_000_000)).expect("sender");
    let receiver = b.account(Protocol::Secp256k1, big(1_000_000_000_000)).expect("receiver");
    b.commit_preconditions().expect("pre");
    let h = b
        .create_paych_actor(sender.robust, receiver.robust, &[MsgOpt::Value(big(10_000))])
        .expect("paych");
    let msg = b.message_mut(h).expect("message");
    let mut padded = vec![0u8; 11];
    padded.extend_from_slice(&msg.params);
    msg.params = padded;
    b.commit_applies().expect("applies");

    let a = b.assert().expect("asserter");
    a.exit_code_eq(h, ExitCode::SYS_ERR_SENDER_INVALID)
        .expect("decode failure");
    a.every_message_sender_satisfies(balance_updated(BigInt::default()))
        .expect("gas only");
    let charged = tvx_builders::calculate_deduction(b.applicable(h).expect("applied"));
    assert!(charged > BigInt::default());
}

#[test]
fn chaos_create_actor_with_undefined_cid() {
    let mut b = Builder::message(meta("fails-undefined-actor-cid")).expect("builder");
    let alice = b.account(Protocol::Secp256k1, big(1_000_000_000_000_000_000)).expect("alice");
    b.account(Protocol::Secp256k1, big(1_000_000_000_000_000_000)).expect("bob");
    b.enable_chaos().expect("chaos");
    b.commit_preconditions().expect("pre");
    let args = CreateActorArgs {
        undef_actor_cid: true,
        actor_cid: ActorKind::System.code_cid(),
        undef_address: false,
        address: Address::new_id(100),
    };
    b.chaos_create_actor(alice.id, &args, &[MsgOpt::Nonce(0)])
        .expect("create");
    b.commit_applies().expect("applies");

    let a = b.assert().expect("asserter");
    a.every_message_result_satisfies(exit_code(ExitCode::SYS_ERR_ILLEGAL_ARGUMENT))
        .expect("illegal argument");
    a.every_message_sender_satisfies(balance_updated(BigInt::default()))
        .expect("gas only");
    let vector = b.finish().expect("finish");
    assert_eq!(
        vector.selector.get(tvx_builders::SELECTOR_CHAOS_ACTOR).map(String::as_str),
        Some("true")
    );
}

#[test]
fn fatal_message_is_recorded_as_failure() {
    let mut b = Builder::message(meta("fatal-branch")).expect("builder");
    let alice = b.account(Protocol::Secp256k1, big(1_000_000_000_000_000)).expect("alice");
    b.enable_chaos().expect("chaos");
    b.commit_preconditions().expect("pre");
    b.chaos_caller_validation(alice.id, CallerValidationBranch::None as u64, &[])
        .expect("valid branch");
    b.chaos_caller_validation(alice.id, 99, &[])
        .expect("unknown branch");
    b.commit_applies().expect("applies");

    let vector = b.finish().expect("finish");
    assert_eq!(vector.post.apply_message_failures, vec![1]);
    assert!(vector.post.receipts[0].is_some());
    assert!(vector.post.receipts[1].is_none());
}

#[test]
fn randomness_rules_are_replayed() {
    let mut b = Builder::message(meta("randomness")).expect("builder");
    let alice = b.account(Protocol::Secp256k1, big(1_000_000_000_000_000)).expect("alice");
    b.enable_chaos().expect("chaos");
    let rule = RandomnessRule::new(RandomnessKind::Beacon, 5, 0, b"entropy".to_vec());
    b.randomness_rule(rule.clone(), vec![7u8; 32]).expect("rule");
    assert!(matches!(
        b.randomness_rule(rule, vec![8u8; 32]),
        Err(BuilderError::DuplicateRandomnessRule)
    ));
    b.commit_preconditions().expect("pre");
    let h = b
        .chaos_get_randomness(
            alice.id,
            &tvx_runtime_vm::actors::chaos::GetRandomnessArgs {
                kind: RandomnessKind::Beacon,
                tag: 5,
                epoch: 0,
                entropy: b"entropy".to_vec(),
            },
            &[],
        )
        .expect("randomness");
    b.commit_applies().expect("applies");

    let ret = b.applicable(h).expect("applied").result.clone().expect("receipt");
    assert_eq!(ret.exit_code(), ExitCode::OK);
    assert_eq!(ret.receipt.return_data, vec![7u8; 32]);
    let vector = b.finish().expect("finish");
    assert_eq!(vector.randomness.len(), 1);
}

// ════════════════════════════════════════════════════════════════════════════════
// STAGES AND DECLARATIONS
// ════════════════════════════════════════════════════════════════════════════════

#[test]
fn operations_outside_their_stage_fail() {
    let mut b = Builder::message(meta("stages")).expect("builder");
    let alice = b.account(Protocol::Secp256k1, big(1_000_000_000_000_000)).expect("alice");
    assert!(matches!(
        b.transfer(alice.id, alice.id, &[]),
        Err(BuilderError::StageViolation { op: "raw_message", stage: Stage::Declaring })
    ));
    assert!(matches!(b.commit_applies(), Err(BuilderError::StageViolation { .. })));
    assert!(matches!(b.assert(), Err(BuilderError::StageViolation { .. })));

    b.commit_preconditions().expect("pre");
    assert!(matches!(
        b.commit_preconditions(),
        Err(BuilderError::PreconditionsAlreadyCommitted)
    ));
    assert!(matches!(
        b.account(Protocol::Secp256k1, big(1)),
        Err(BuilderError::StageViolation { .. })
    ));
    let h = b.transfer(alice.id, alice.id, &[]).expect("transfer");
    b.commit_applies().expect("applies");
    assert!(matches!(
        b.message_mut(h),
        Err(BuilderError::StageViolation { op: "message_mut", stage: Stage::ApplyCommitted })
    ));

    b.finish().expect("finish");
    assert_eq!(b.stage(), Stage::Asserted);
    assert!(matches!(b.finish(), Err(BuilderError::StageViolation { .. })));
    assert!(matches!(b.assert(), Err(BuilderError::StageViolation { .. })));
}

#[test]
fn empty_preconditions_are_rejected() {
    let mut b = Builder::message(meta("empty")).expect("builder");
    assert!(matches!(
        b.commit_preconditions(),
        Err(BuilderError::EmptyPreconditions)
    ));
}

#[test]
fn id_protocol_accounts_are_rejected() {
    let mut b = Builder::message(meta("id-account")).expect("builder");
    assert!(matches!(
        b.account(Protocol::Id, big(1)),
        Err(BuilderError::UnsupportedProtocol(Protocol::Id))
    ));
}

#[test]
fn explicit_nonce_reuse_is_rejected() {
    let mut b = Builder::message(meta("nonce-reuse")).expect("builder");
    let alice = b.account(Protocol::Secp256k1, big(1_000_000_000_000_000)).expect("alice");
    b.commit_preconditions().expect("pre");
    let first = b.transfer(alice.robust, alice.id, &[]).expect("auto nonce");
    let second = b
        .transfer(alice.id, alice.id, &[MsgOpt::Nonce(1)])
        .expect("explicit");
    assert_eq!(b.applicable(first).expect("first").message.nonce, 0);
    assert_eq!(b.applicable(second).expect("second").message.nonce, 1);
    assert!(matches!(
        b.transfer(alice.robust, alice.id, &[MsgOpt::Nonce(0)]),
        Err(BuilderError::NonceReuse { nonce: 0, .. })
    ));
}

#[test]
fn message_mut_edits_are_not_nonce_checked() {
    let mut b = Builder::message(meta("nonce-tamper")).expect("builder");
    let alice = b.account(Protocol::Secp256k1, big(1_000_000_000_000_000)).expect("alice");
    b.commit_preconditions().expect("pre");
    b.transfer(alice.id, alice.id, &[]).expect("nonce 0");
    let second = b.transfer(alice.id, alice.id, &[]).expect("nonce 1");

    b.message_mut(second).expect("staged").nonce = 0;
    assert_eq!(b.applicable(second).expect("second").message.nonce, 0);

    // Bookkeeping still holds 0 and 1.
    let third = b.transfer(alice.id, alice.id, &[]).expect("auto nonce");
    assert_eq!(b.applicable(third).expect("third").message.nonce, 2);
    assert!(matches!(
        b.transfer(alice.id, alice.id, &[MsgOpt::Nonce(1)]),
        Err(BuilderError::NonceReuse { nonce: 1, .. })
    ));
}

#[test]
fn defaults_apply_to_later_messages() {
    let mut b = Builder::message(meta("defaults")).expect("builder");
    let alice = b.account(Protocol::Secp256k1, big(1_000_000_000_000_000)).expect("alice");
    b.set_defaults(&[MsgOpt::GasLimit(2_000_000), MsgOpt::GasPremium(big(3))])
        .expect("defaults");
    assert!(matches!(
        b.set_defaults(&[MsgOpt::Value(big(1))]),
        Err(BuilderError::InvalidDefault("Value"))
    ));
    b.commit_preconditions().expect("pre");
    let h = b.transfer(alice.id, alice.id, &[]).expect("transfer");
    let msg = &b.applicable(h).expect("staged").message;
    assert_eq!(msg.gas_limit, 2_000_000);
    assert_eq!(msg.gas_premium, big(3));
}

#[test]
fn same_script_emits_identical_vectors() {
    let one = transfer_vector("same", 42).finish().expect("one");
    let two = transfer_vector("same", 42).finish().expect("two");
    assert_eq!(
        one.to_json().expect("json"),
        two.to_json().expect("json")
    );
}

// ════════════════════════════════════════════════════════════════════════════════
// TIPSETS
// ════════════════════════════════════════════════════════════════════════════════

fn ordered_tipset(reversed: bool) -> Builder {
    let mut b = Builder::tipset(meta("tipset-order")).expect("builder");
    let alice = b.account(Protocol::Secp256k1, big(1_000_000_000_000_000)).expect("alice");
    let bob = b.account(Protocol::Secp256k1, big(1_000_000_000_000_000)).expect("bob");
    b.commit_preconditions().expect("pre");
    b.stage_tipset(1, big(100)).expect("tipset");
    b.stage_block(REWARD_ACTOR_ADDR, 1).expect("block");
    let nonces = if reversed { [1, 0] } else { [0, 1] };
    for nonce in nonces {
        b.transfer(alice.id, bob.id, &[MsgOpt::Nonce(nonce), MsgOpt::Value(big(5))])
            .expect("transfer");
    }
    b.commit_applies().expect("applies");
    b
}

#[test]
fn tipset_order_is_observable() {
    let mut in_order = ordered_tipset(false);
    let mut reversed = ordered_tipset(true);

    in_order
        .assert()
        .expect("asserter")
        .every_message_result_satisfies(exit_code(ExitCode::OK))
        .expect("both apply");
    let results: Vec<ExitCode> = reversed
        .messages()
        .iter()
        .map(|am| am.result.as_ref().expect("receipt").exit_code())
        .collect();
    assert_eq!(results, vec![ExitCode::SYS_ERR_SENDER_STATE_INVALID, ExitCode::OK]);

    let a = in_order.finish().expect("in order");
    let b = reversed.finish().expect("reversed");
    assert_eq!(a.class, Class::Tipset);
    assert_eq!(a.apply_tipsets.len(), 1);
    assert_eq!(a.post.receipts_roots.len(), 1);
    assert_ne!(a.post.state_tree.root_cid, b.post.state_tree.root_cid);
    assert_ne!(a.post.receipts_roots, b.post.receipts_roots);
}

#[test]
fn tipset_messages_need_a_block() {
    let mut b = Builder::tipset(meta("no-block")).expect("builder");
    let alice = b.account(Protocol::Secp256k1, big(1_000_000_000_000_000)).expect("alice");
    b.commit_preconditions().expect("pre");
    assert!(matches!(
        b.transfer(alice.id, alice.id, &[]),
        Err(BuilderError::NoBlockStaged)
    ));
    assert!(matches!(
        b.stage_block(REWARD_ACTOR_ADDR, 1),
        Err(BuilderError::NoBlockStaged)
    ));
    b.stage_tipset(1, big(100)).expect("tipset");
    b.stage_block(REWARD_ACTOR_ADDR, 1).expect("block");
    assert!(matches!(
        b.transfer(alice.id, alice.id, &[MsgOpt::Epoch(3)]),
        Err(BuilderError::ClassMismatch { .. })
    ));
}

#[test]
fn message_builders_cannot_stage_tipsets() {
    let mut b = Builder::message(meta("no-tipsets")).expect("builder");
    b.account(Protocol::Secp256k1, big(1)).expect("alice");
    b.commit_preconditions().expect("pre");
    assert!(matches!(
        b.stage_tipset(1, big(100)),
        Err(BuilderError::ClassMismatch { op: "stage_tipset", class: Class::Message })
    ));
}

// ════════════════════════════════════════════════════════════════════════════════
// ASSERTION MODES
// ════════════════════════════════════════════════════════════════════════════════

#[test]
fn strict_mode_fails_and_lenient_mode_warns() {
    let mut strict = transfer_vector("strict", 1);
    let err = strict
        .assert()
        .expect("asserter")
        .every_message_result_satisfies(exit_code(ExitCode::SYS_ERR_FORBIDDEN))
        .expect_err("strict");
    assert!(matches!(err, BuilderError::Assertion(_)));

    let options = VectorOptions {
        hints: vec![HINT_INCORRECT.into(), HINT_NEGATE.into()],
        mode: AssertionMode::Lenient,
        ..VectorOptions::default()
    };
    let mut lenient = Builder::new(Class::Message, meta("lenient"), options).expect("builder");
    let alice = lenient
        .account(Protocol::Secp256k1, big(1_000_000_000_000_000))
        .expect("alice");
    lenient.commit_preconditions().expect("pre");
    lenient.transfer(alice.id, alice.id, &[]).expect("transfer");
    lenient.commit_applies().expect("applies");
    lenient
        .assert()
        .expect("asserter")
        .every_message_result_satisfies(exit_code(ExitCode::SYS_ERR_FORBIDDEN))
        .expect("lenient passes");
    let vector = lenient.finish().expect("finish");
    assert!(vector.has_hint(HINT_NEGATE));
}

#[test]
fn blockseq_builders_are_rejected() {
    assert!(matches!(
        Builder::new(Class::Blockseq, meta("blockseq"), VectorOptions::default()),
        Err(BuilderError::ClassMismatch { op: "new", .. })
    ));
}
