//! # Chaos Actor
//!
//! Test-only actor whose methods break runtime rules on request, so vectors
//! can observe how the VM reacts.
//!
//! | Method | Number | Effect |
//! |--------|--------|--------|
//! | Constructor | 1 | always fatal; chaos is installed, never constructed |
//! | CallerValidation | 2 | validates its caller according to a [`CallerValidationBranch`] |
//! | CreateActor | 3 | calls `create_actor` with possibly undefined arguments |
//! | GetRandomness | 4 | returns whatever the randomness oracle answers |

use serde::{Deserialize, Serialize};
use tvx_schema::{Address, Cid, RandomnessKind};

use crate::error::{ActorError, ActorResult, VmResult};
use crate::message::METHOD_CONSTRUCTOR;
use crate::runtime::Runtime;

use super::MethodTable;

pub const METHOD_CALLER_VALIDATION: u64 = 2;
pub const METHOD_CREATE_ACTOR: u64 = 3;
pub const METHOD_GET_RANDOMNESS: u64 = 4;

/// Argument of CallerValidation, sent as its raw `u64` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerValidationBranch {
    /// Validate nothing.
    None = 0,
    /// Validate twice.
    Twice = 1,
    /// Validate against an empty address set.
    AddrNilSet = 2,
    /// Validate against an empty type set.
    TypeNilSet = 3,
}

impl CallerValidationBranch {
    pub fn from_u64(v: u64) -> Option<Self> {
        match v {
            0 => Some(Self::None),
            1 => Some(Self::Twice),
            2 => Some(Self::AddrNilSet),
            3 => Some(Self::TypeNilSet),
            _ => None,
        }
    }
}

/// Arguments of CreateActor. The `undef_*` flags pass an undefined value
/// instead of the paired field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateActorArgs {
    pub undef_actor_cid: bool,
    pub actor_cid: Cid,
    pub undef_address: bool,
    pub address: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetRandomnessArgs {
    pub kind: RandomnessKind,
    pub tag: i64,
    pub epoch: i64,
    pub entropy: Vec<u8>,
}

pub fn methods() -> VmResult<MethodTable> {
    MethodTable::new("chaos")
        .register(METHOD_CONSTRUCTOR, "Constructor", constructor)?
        .register(METHOD_CALLER_VALIDATION, "CallerValidation", caller_validation)?
        .register(METHOD_CREATE_ACTOR, "CreateActor", create_actor)?
        .register(METHOD_GET_RANDOMNESS, "GetRandomness", get_randomness)
}

fn constructor(_rt: &mut Runtime<'_>, _params: &[u8]) -> ActorResult<Vec<u8>> {
    Err(ActorError::fatal("constructor should not be called; the Chaos actor is a singleton actor"))
}

fn caller_validation(rt: &mut Runtime<'_>, params: &[u8]) -> ActorResult<Vec<u8>> {
    let raw: u64 = rt.decode_params(params)?;
    match CallerValidationBranch::from_u64(raw) {
        Some(CallerValidationBranch::None) => {}
        Some(CallerValidationBranch::Twice) => {
            rt.validate_immediate_caller_accept_any()?;
            rt.validate_immediate_caller_accept_any()?;
        }
        Some(CallerValidationBranch::AddrNilSet) => rt.validate_immediate_caller_is(&[])?,
        Some(CallerValidationBranch::TypeNilSet) => rt.validate_immediate_caller_type(&[])?,
        None => return Err(ActorError::fatal(format!("invalid caller validation branch {raw}"))),
    }
    Ok(Vec::new())
}

fn create_actor(rt: &mut Runtime<'_>, params: &[u8]) -> ActorResult<Vec<u8>> {
    rt.validate_immediate_caller_accept_any()?;
    let args: CreateActorArgs = rt.decode_params(params)?;
    let code = (!args.undef_actor_cid).then_some(args.actor_cid);
    let addr = (!args.undef_address).then_some(args.address);
    rt.create_actor(code, addr)?;
    Ok(Vec::new())
}

fn get_randomness(rt: &mut Runtime<'_>, params: &[u8]) -> ActorResult<Vec<u8>> {
    rt.validate_immediate_caller_accept_any()?;
    let args: GetRandomnessArgs = rt.decode_params(params)?;
    rt.get_randomness(args.kind, args.tag, args.epoch, &args.entropy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_branch_from_u64() {
        assert_eq!(CallerValidationBranch::from_u64(1), Some(CallerValidationBranch::Twice));
        assert_eq!(CallerValidationBranch::from_u64(3), Some(CallerValidationBranch::TypeNilSet));
        assert_eq!(CallerValidationBranch::from_u64(4), None);
    }
}
