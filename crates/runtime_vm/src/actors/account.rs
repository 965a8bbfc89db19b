//! Account actor: a principal holding a public-key address.

use serde::{Deserialize, Serialize};
use tvx_schema::Address;

use crate::encoding;
use crate::error::{ActorError, ActorResult, VmResult};
use crate::exit_code::ExitCode;
use crate::message::METHOD_CONSTRUCTOR;
use crate::runtime::Runtime;

use super::{MethodTable, SYSTEM_ACTOR_ADDR};

pub const METHOD_PUBKEY_ADDRESS: u64 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    pub address: Address,
}

pub fn methods() -> VmResult<MethodTable> {
    MethodTable::new("account")
        .register(METHOD_CONSTRUCTOR, "Constructor", constructor)?
        .register(METHOD_PUBKEY_ADDRESS, "PubkeyAddress", pubkey_address)
}

fn constructor(rt: &mut Runtime<'_>, params: &[u8]) -> ActorResult<Vec<u8>> {
    rt.validate_immediate_caller_is(&[SYSTEM_ACTOR_ADDR])?;
    let address: Address = rt.decode_params(params)?;
    if !address.is_pubkey() {
        return Err(ActorError::abort(
            ExitCode::ERR_ILLEGAL_ARGUMENT,
            format!("account actor address {address} must be a public key"),
        ));
    }
    rt.set_state(&AccountState { address })?;
    Ok(Vec::new())
}

fn pubkey_address(rt: &mut Runtime<'_>, _params: &[u8]) -> ActorResult<Vec<u8>> {
    rt.validate_immediate_caller_accept_any()?;
    let st: AccountState = rt.state()?;
    Ok(encoding::to_vec(&st.address)?)
}
