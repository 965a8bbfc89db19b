//! Runtime rules the VM must enforce, provoked through the chaos actor.

use num_bigint::BigInt;
use tvx_builders::{balance_updated, exit_code, AddressHandle, Builder, BuilderResult, MsgOpt};
use tvx_runtime_vm::actors::chaos::{CallerValidationBranch, CreateActorArgs};
use tvx_runtime_vm::actors::ActorKind;
use tvx_runtime_vm::ExitCode;
use tvx_schema::{Address, Metadata, Protocol};

use super::Suite;
use crate::item::{VectorGenItem, VectorGroup};

pub fn suite() -> Suite {
    Suite {
        name: "vm_violations",
        groups: vec![
            VectorGroup::message(
                "caller_validation",
                vec![
                    caller_validation(
                        "fails-caller-validation-none",
                        CallerValidationBranch::None,
                        ExitCode::SYS_ERR_ILLEGAL_ACTOR,
                    ),
                    caller_validation(
                        "fails-caller-validation-twice",
                        CallerValidationBranch::Twice,
                        ExitCode::SYS_ERR_ILLEGAL_ACTOR,
                    ),
                    caller_validation(
                        "fails-caller-validation-nil-addr-set",
                        CallerValidationBranch::AddrNilSet,
                        ExitCode::SYS_ERR_FORBIDDEN,
                    ),
                    caller_validation(
                        "fails-caller-validation-nil-type-set",
                        CallerValidationBranch::TypeNilSet,
                        ExitCode::SYS_ERR_FORBIDDEN,
                    ),
                ],
            ),
            VectorGroup::message(
                "actor_creation",
                vec![
                    create_actor(
                        "fails-create-actor-undef-code",
                        Target::Fixed(Address::new_id(200)),
                        None,
                        ExitCode::SYS_ERR_ILLEGAL_ARGUMENT,
                    ),
                    create_actor(
                        "fails-create-actor-singleton-code",
                        Target::Fixed(Address::new_id(200)),
                        Some(ActorKind::Init),
                        ExitCode::SYS_ERR_ILLEGAL_ARGUMENT,
                    ),
                    create_actor(
                        "fails-create-actor-undef-address",
                        Target::Undefined,
                        Some(ActorKind::Account),
                        ExitCode::SYS_ERR_ILLEGAL_ARGUMENT,
                    ),
                    create_actor(
                        "fails-create-actor-non-id-address",
                        Target::Fixed(Address::new_secp256k1(b"not-an-id")),
                        Some(ActorKind::Account),
                        ExitCode::SYS_ERR_ILLEGAL_ARGUMENT,
                    ),
                    create_actor(
                        "fails-create-actor-existing-address",
                        Target::Sender,
                        Some(ActorKind::Account),
                        ExitCode::SYS_ERR_ILLEGAL_ARGUMENT,
                    ),
                    create_actor(
                        "ok-create-actor-fresh-id",
                        Target::Fixed(Address::new_id(200)),
                        Some(ActorKind::Account),
                        ExitCode::OK,
                    ),
                ],
            ),
        ],
    }
}

/// Funds each side of a chaos vector.
fn funds() -> BigInt {
    BigInt::from(10u64.pow(18))
}

fn setup(v: &mut Builder) -> BuilderResult<AddressHandle> {
    v.set_defaults(&[
        MsgOpt::GasLimit(1_000_000_000),
        MsgOpt::GasPremium(BigInt::from(1)),
        MsgOpt::GasFeeCap(BigInt::from(200)),
    ])?;
    let mut actors = v.accounts(Protocol::Secp256k1, funds(), 2)?;
    v.enable_chaos()?;
    v.commit_preconditions()?;
    Ok(actors.swap_remove(0))
}

fn caller_validation(
    id: &str,
    branch: CallerValidationBranch,
    expected: ExitCode,
) -> VectorGenItem {
    VectorGenItem::new(Metadata::new(id).with_version("v1"), move |v| {
        let alice = setup(v)?;
        v.chaos_caller_validation(alice.id, branch as u64, &[MsgOpt::Nonce(0)])?;
        v.commit_applies()?;
        let a = v.assert()?;
        a.every_message_result_satisfies(exit_code(expected))?;
        a.every_message_sender_satisfies(balance_updated(BigInt::default()))
    })
}

/// Address the chaos actor is asked to create at.
#[derive(Debug, Clone, Copy)]
enum Target {
    Undefined,
    Sender,
    Fixed(Address),
}

fn create_actor(
    id: &str,
    target: Target,
    code: Option<ActorKind>,
    expected: ExitCode,
) -> VectorGenItem {
    VectorGenItem::new(Metadata::new(id).with_version("v1"), move |v| {
        let alice = setup(v)?;
        let address = match target {
            Target::Undefined => None,
            Target::Sender => Some(alice.id),
            Target::Fixed(addr) => Some(addr),
        };
        // Undefined values still carry a well-formed placeholder.
        let args = CreateActorArgs {
            undef_actor_cid: code.is_none(),
            actor_cid: code.unwrap_or(ActorKind::System).code_cid(),
            undef_address: address.is_none(),
            address: address.unwrap_or(Address::new_id(100)),
        };
        let opts = [MsgOpt::Nonce(0), MsgOpt::Value(BigInt::default())];
        v.chaos_create_actor(alice.id, &args, &opts)?;
        v.commit_applies()?;
        let a = v.assert()?;
        a.every_message_result_satisfies(exit_code(expected))?;
        a.every_message_sender_satisfies(balance_updated(BigInt::default()))
    })
}
