//! Actor creation through the init actor and through value transfers.

use num_bigint::BigInt;
use tvx_builders::{balance_updated, exit_code, Builder, BuilderResult, MsgOpt};
use tvx_runtime_vm::actors::init::{ExecParams, ExecReturn, METHOD_EXEC};
use tvx_runtime_vm::actors::paych::PaychConstructorParams;
use tvx_runtime_vm::actors::{ActorKind, INIT_ACTOR_ADDR};
use tvx_runtime_vm::domain::actor_address_seed;
use tvx_runtime_vm::{encoding, ExitCode};
use tvx_schema::{Address, Metadata, Protocol, HINT_INCORRECT, HINT_NEGATE};

use super::Suite;
use crate::item::{VectorGenItem, VectorGroup};

const PAYCH_COUNT: u64 = 10;

pub fn suite() -> Suite {
    Suite {
        name: "actor_creation",
        groups: vec![
            VectorGroup::message(
                "addresses",
                vec![VectorGenItem::new(
                    Metadata::new("sequential-10")
                        .with_version("v1")
                        .with_description("actor addresses are sequential"),
                    sequential_addresses,
                )],
            ),
            VectorGroup::message(
                "on_transfer",
                vec![
                    on_transfer_item(
                        "ok-create-secp256k1",
                        1_000_000_000_000_000,
                        Receiver::Secp256k1,
                        ExitCode::OK,
                    ),
                    on_transfer_item(
                        "ok-create-bls",
                        1_000_000_000_000_000,
                        Receiver::Bls,
                        ExitCode::OK,
                    ),
                    on_transfer_item(
                        "fail-secp256k1-insufficient-balance",
                        9_999,
                        Receiver::Secp256k1,
                        ExitCode::SYS_ERR_SENDER_STATE_INVALID,
                    ),
                    on_transfer_item(
                        "fail-bls-insufficient-balance",
                        9_999,
                        Receiver::Bls,
                        ExitCode::SYS_ERR_SENDER_STATE_INVALID,
                    ),
                ],
            ),
            VectorGroup::message(
                "params",
                vec![
                    VectorGenItem::new(
                        Metadata::new("fails-unparsable-init-actor-exec-msg")
                            .with_version("v1")
                            .with_description(
                                "actor creation fails and gas is deducted \
                                 when the init exec params are unparsable",
                            )
                            .with_comment(
                                "should not return SysErrSenderInvalid; \
                                 a serialization error is the likely correct class",
                            ),
                        exec_unparsable_params,
                    )
                    .lenient(&[HINT_INCORRECT, HINT_NEGATE]),
                    VectorGenItem::new(
                        Metadata::new("fails-unparsable-constructor-params-via-init-actor")
                            .with_version("v1")
                            .with_description(
                                "actor creation fails and gas is deducted \
                                 when the constructor params are unparsable",
                            )
                            .with_comment(
                                "should not return SysErrSenderInvalid; \
                                 the failure is in actor space, \
                                 so ErrSerialization is the likely correct class",
                            ),
                        constructor_unparsable_params,
                    )
                    .lenient(&[HINT_INCORRECT, HINT_NEGATE]),
                ],
            ),
        ],
    }
}

/// Receiver of a creating transfer; it does not exist beforehand.
#[derive(Debug, Clone, Copy)]
enum Receiver {
    Secp256k1,
    Bls,
}

impl Receiver {
    fn address(self) -> BuilderResult<Address> {
        match self {
            Receiver::Secp256k1 => Ok(Address::new_secp256k1(b"publickeyfoo")),
            Receiver::Bls => {
                let mut key = [0u8; 48];
                key[47] = 1;
                Ok(Address::new_bls(&key)?)
            }
        }
    }
}

fn sequential_addresses(v: &mut Builder) -> BuilderResult<()> {
    v.set_defaults(&[
        MsgOpt::GasLimit(1_000_000_000),
        MsgOpt::GasPremium(BigInt::from(1)),
        MsgOpt::GasFeeCap(BigInt::from(200)),
    ])?;
    let initial = BigInt::from(1_000_000_000_000_000u64);
    let sender = v.account(Protocol::Secp256k1, initial.clone())?;
    let receiver = v.account(Protocol::Secp256k1, initial)?;
    v.commit_preconditions()?;

    let handles = (0..PAYCH_COUNT)
        .map(|_| {
            v.create_paych_actor(
                sender.robust,
                receiver.robust,
                &[MsgOpt::Value(BigInt::from(1_000))],
            )
        })
        .collect::<BuilderResult<Vec<_>>>()?;
    v.commit_applies()?;

    let base = receiver.id.id().unwrap_or_default();
    let a = v.assert()?;
    for (i, handle) in handles.into_iter().enumerate() {
        let nonce = v.applicable(handle)?.message.nonce;
        let expected = ExecReturn {
            id_address: Address::new_id(base + i as u64 + 1),
            robust_address: Address::new_actor(&actor_address_seed(&sender.id, nonce, 0)),
        };
        a.message_result_satisfies(handle, move |ret| {
            let got: ExecReturn = encoding::from_slice(&ret.receipt.return_data)
                .map_err(|e| format!("undecodable exec return: {e}"))?;
            if got == expected {
                Ok(())
            } else {
                Err(format!("expected {expected:?}, got {got:?}"))
            }
        })?;
    }
    a.every_message_result_satisfies(exit_code(ExitCode::OK))?;
    a.every_message_sender_satisfies(balance_updated(BigInt::default()))
}

fn on_transfer_item(
    id: &str,
    sender_balance: u64,
    receiver: Receiver,
    expected: ExitCode,
) -> VectorGenItem {
    VectorGenItem::new(Metadata::new(id).with_version("v1"), move |v| {
        on_transfer(v, BigInt::from(sender_balance), receiver, expected)
    })
}

fn on_transfer(
    v: &mut Builder,
    sender_balance: BigInt,
    receiver: Receiver,
    expected: ExitCode,
) -> BuilderResult<()> {
    let amount = BigInt::from(10_000);
    let receiver = receiver.address()?;
    let sender = v.account(Protocol::Secp256k1, sender_balance)?;
    v.commit_preconditions()?;
    v.transfer(sender.robust, receiver, &[MsgOpt::Value(amount.clone())])?;
    v.commit_applies()?;

    let a = v.assert()?;
    a.every_message_result_satisfies(exit_code(expected))?;
    a.every_message_sender_satisfies(balance_updated(BigInt::default()))?;
    if expected == ExitCode::OK {
        a.actor_exists(&receiver)?;
        a.balance_eq(&receiver, &amount)
    } else {
        a.actor_missing(&receiver)
    }
}

/// Accounts funded like the params vectors expect.
fn params_accounts(v: &mut Builder) -> BuilderResult<(Address, Address)> {
    v.set_defaults(&[
        MsgOpt::GasLimit(1_000_000_000),
        MsgOpt::GasPremium(BigInt::from(1)),
        MsgOpt::GasFeeCap(BigInt::from(200)),
    ])?;
    let balance = BigInt::from(1_000_000_000_000u64);
    let sender = v.account(Protocol::Secp256k1, balance.clone())?;
    let receiver = v.account(Protocol::Secp256k1, balance)?;
    v.commit_preconditions()?;
    Ok((sender.robust, receiver.robust))
}

fn zero_padded(bytes: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; 11];
    out.extend_from_slice(bytes);
    out
}

fn assert_unparsable(v: &mut Builder) -> BuilderResult<()> {
    v.commit_applies()?;
    let a = v.assert()?;
    a.every_message_result_satisfies(exit_code(ExitCode::SYS_ERR_SENDER_INVALID))?;
    a.every_message_sender_satisfies(balance_updated(BigInt::default()))
}

fn exec_unparsable_params(v: &mut Builder) -> BuilderResult<()> {
    let (sender, receiver) = params_accounts(v)?;
    let handle = v.create_paych_actor(sender, receiver, &[MsgOpt::Value(BigInt::from(10_000))])?;
    let msg = v.message_mut(handle)?;
    msg.params = zero_padded(&msg.params);
    assert_unparsable(v)
}

fn constructor_unparsable_params(v: &mut Builder) -> BuilderResult<()> {
    let (sender, receiver) = params_accounts(v)?;
    let ctor = encoding::to_vec(&PaychConstructorParams {
        from: sender,
        to: receiver,
    })?;
    let params = encoding::to_vec(&ExecParams {
        code_cid: ActorKind::PaymentChannel.code_cid(),
        constructor_params: zero_padded(&ctor),
    })?;
    v.raw_message(
        sender,
        INIT_ACTOR_ADDR,
        METHOD_EXEC,
        params,
        &[MsgOpt::Value(BigInt::from(10_000))],
    )?;
    assert_unparsable(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suite_shape() {
        let s = suite();
        assert_eq!(s.groups.len(), 3);
        assert_eq!(s.len(), 7);
        let params = &s.groups[2];
        assert!(params.items.iter().all(|i| i.hints.len() == 2));
    }

    #[test]
    fn test_receivers_are_pubkey() {
        let secp = Receiver::Secp256k1.address().expect("secp");
        let bls = Receiver::Bls.address().expect("bls");
        assert!(secp.is_pubkey());
        assert_eq!(bls.protocol(), Protocol::Bls);
    }

    #[test]
    fn test_zero_padding_prefixes_eleven_bytes() {
        let padded = zero_padded(&[1, 2]);
        assert_eq!(padded.len(), 13);
        assert_eq!(&padded[11..], &[1, 2]);
    }
}
