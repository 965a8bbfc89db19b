//! # Init Actor
//!
//! Hands out actor IDs and keeps the robust address → ID map.
//!
//! | Method | Number | Caller | Params |
//! |--------|--------|--------|--------|
//! | Constructor | 1 | system | network name |
//! | Exec | 2 | anyone | [`ExecParams`] |
//!
//! Exec creates an actor of a code that callers may instantiate freely (only
//! payment channels here), then runs its constructor with the value the
//! caller sent along.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tvx_schema::{Address, Cid};

use crate::encoding;
use crate::error::{ActorError, ActorResult, VmResult};
use crate::exit_code::ExitCode;
use crate::message::METHOD_CONSTRUCTOR;
use crate::runtime::Runtime;

use super::{ActorKind, MethodTable, FIRST_NON_SINGLETON_ID, SYSTEM_ACTOR_ADDR};

pub const METHOD_EXEC: u64 = 2;

/// State of the init actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitState {
    pub address_map: BTreeMap<Address, u64>,
    pub next_id: u64,
    pub network_name: String,
}

impl InitState {
    pub fn new(network_name: impl Into<String>) -> Self {
        Self {
            address_map: BTreeMap::new(),
            next_id: FIRST_NON_SINGLETON_ID,
            network_name: network_name.into(),
        }
    }

    /// Binds `addr` to the next free ID. An address already mapped keeps
    /// its ID.
    pub fn map_address(&mut self, addr: Address) -> u64 {
        if let Some(id) = self.address_map.get(&addr) {
            return *id;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.address_map.insert(addr, id);
        id
    }

    /// ID bound to `addr`. ID addresses resolve to themselves.
    pub fn resolve(&self, addr: &Address) -> Option<u64> {
        addr.id().or_else(|| self.address_map.get(addr).copied())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecParams {
    pub code_cid: Cid,
    pub constructor_params: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecReturn {
    pub id_address: Address,
    pub robust_address: Address,
}

pub fn methods() -> VmResult<MethodTable> {
    MethodTable::new("init")
        .register(METHOD_CONSTRUCTOR, "Constructor", constructor)?
        .register(METHOD_EXEC, "Exec", exec)
}

fn constructor(rt: &mut Runtime<'_>, params: &[u8]) -> ActorResult<Vec<u8>> {
    rt.validate_immediate_caller_is(&[SYSTEM_ACTOR_ADDR])?;
    let network_name: String = rt.decode_params(params)?;
    rt.set_state(&InitState::new(network_name))?;
    Ok(Vec::new())
}

fn exec(rt: &mut Runtime<'_>, params: &[u8]) -> ActorResult<Vec<u8>> {
    rt.validate_immediate_caller_accept_any()?;
    let params: ExecParams = rt.decode_params(params)?;

    let kind = ActorKind::from_code(&params.code_cid);
    if kind != Some(ActorKind::PaymentChannel) {
        return Err(ActorError::abort(
            ExitCode::ERR_FORBIDDEN,
            format!("caller type cannot exec actor code {}", params.code_cid),
        ));
    }

    let robust_address = rt.new_actor_address();
    let mut st: InitState = rt.state()?;
    let id = st.map_address(robust_address);
    rt.set_state(&st)?;

    let id_address = Address::new_id(id);
    rt.create_actor(Some(params.code_cid), Some(id_address))?;

    let value = rt.value_received().clone();
    rt.send(
        &id_address,
        METHOD_CONSTRUCTOR,
        &params.constructor_params,
        &value,
    )?;

    Ok(encoding::to_vec(&ExecReturn {
        id_address,
        robust_address,
    })?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_address_allocates_sequentially() {
        let mut st = InitState::new("test");
        let a = Address::new_secp256k1(b"a");
        let b = Address::new_secp256k1(b"b");
        assert_eq!(st.map_address(a), FIRST_NON_SINGLETON_ID);
        assert_eq!(st.map_address(b), FIRST_NON_SINGLETON_ID + 1);
        assert_eq!(st.map_address(a), FIRST_NON_SINGLETON_ID);
        assert_eq!(st.next_id, FIRST_NON_SINGLETON_ID + 2);
    }

    #[test]
    fn test_resolve() {
        let mut st = InitState::new("test");
        let a = Address::new_secp256k1(b"a");
        assert_eq!(st.resolve(&a), None);
        let id = st.map_address(a);
        assert_eq!(st.resolve(&a), Some(id));
        assert_eq!(st.resolve(&Address::new_id(7)), Some(7));
    }
}
