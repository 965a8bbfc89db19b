//! Reward actor. Default recipient of miner tips for single messages.

use crate::error::{ActorResult, VmResult};
use crate::message::METHOD_CONSTRUCTOR;
use crate::runtime::Runtime;

use super::{MethodTable, SYSTEM_ACTOR_ADDR};

pub fn methods() -> VmResult<MethodTable> {
    MethodTable::new("reward").register(METHOD_CONSTRUCTOR, "Constructor", constructor)
}

fn constructor(rt: &mut Runtime<'_>, _params: &[u8]) -> ActorResult<Vec<u8>> {
    rt.validate_immediate_caller_is(&[SYSTEM_ACTOR_ADDR])?;
    rt.set_state(&())?;
    Ok(Vec::new())
}
