//! Payment channel actor. Only the constructor is implemented; it is what
//! init's Exec instantiates.

use num_bigint::BigInt;
use serde::{Deserialize, Serialize};
use tvx_schema::Address;

use crate::error::{ActorError, ActorResult, VmResult};
use crate::exit_code::ExitCode;
use crate::message::METHOD_CONSTRUCTOR;
use crate::runtime::Runtime;

use super::{ActorKind, MethodTable};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaychConstructorParams {
    pub from: Address,
    pub to: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaychState {
    /// ID address of the funding party.
    pub from: Address,
    /// ID address of the recipient.
    pub to: Address,
    pub to_send: BigInt,
    pub settling_at: i64,
    pub min_settle_height: i64,
}

pub fn methods() -> VmResult<MethodTable> {
    MethodTable::new("paymentchannel").register(METHOD_CONSTRUCTOR, "Constructor", constructor)
}

fn constructor(rt: &mut Runtime<'_>, params: &[u8]) -> ActorResult<Vec<u8>> {
    rt.validate_immediate_caller_type(&[ActorKind::Init])?;
    let params: PaychConstructorParams = rt.decode_params(params)?;

    let from = resolve_account(rt, &params.from)?;
    let to = resolve_account(rt, &params.to)?;

    rt.set_state(&PaychState {
        from,
        to,
        to_send: BigInt::default(),
        settling_at: 0,
        min_settle_height: 0,
    })?;
    Ok(Vec::new())
}

/// ID address of the account behind `addr`.
fn resolve_account(rt: &Runtime<'_>, addr: &Address) -> ActorResult<Address> {
    let id = rt.resolve_address(addr)?.ok_or_else(|| {
        ActorError::abort(
            ExitCode::ERR_ILLEGAL_ARGUMENT,
            format!("no id address for {addr}"),
        )
    })?;
    if rt.actor_kind(id) != Some(ActorKind::Account) {
        return Err(ActorError::abort(
            ExitCode::ERR_FORBIDDEN,
            format!("party {addr} must be an account actor"),
        ));
    }
    Ok(Address::new_id(id))
}
