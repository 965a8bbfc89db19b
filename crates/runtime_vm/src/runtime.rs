//! # Invocation Runtime
//!
//! [`Machine`] owns everything one message may touch: blockstore, state
//! tree, dispatch tables, randomness, gas. [`Runtime`] is the view an actor
//! method gets for one invocation.
//!
//! ## Send
//!
//! ```text
//! send(from, to, method, params, value)
//!   ├─ charge send gas
//!   ├─ resolve `to`; a missing pubkey address becomes a new account
//!   ├─ transfer value
//!   ├─ METHOD_SEND ⇒ done
//!   ├─ dispatch(kind(to), method) ─► handler(rt, params)
//!   └─ handler returned Ok without validating its caller ⇒ SysErrorIllegalActor
//! ```
//!
//! Any error rolls the state tree back to where the send started. Gas spent
//! stays spent.
//!
//! ## Runtime Rules
//!
//! | Rule | Violation |
//! |------|-----------|
//! | Caller validated exactly once per invocation | `SysErrorIllegalActor` |
//! | Caller in the accepted set (an empty set accepts nobody) | `SysErrForbidden` |
//! | `create_actor` only for built-in, non-singleton code at an unused ID | `SysErrorIllegalArgument` |
//! | Params decode with the method's type | configured class, see [`Machine::params_decode_exit`] |

use num_bigint::BigInt;
use num_traits::{Signed, Zero};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::trace;
use tvx_schema::{Address, Cid, RandomnessKind};

use crate::actors::{ActorKind, Registry, SYSTEM_ACTOR_ID};
use crate::blockstore::MemoryBlockstore;
use crate::domain::actor_address_seed;
use crate::encoding;
use crate::error::{ActorError, ActorResult, VmError, VmResult};
use crate::exit_code::ExitCode;
use crate::gas::{self, GasTracker};
use crate::message::{METHOD_CONSTRUCTOR, METHOD_SEND};
use crate::rand::Rand;
use crate::state_tree::{ActorState, StateTree};

/// Nested sends deeper than this abort with `SysErrForbidden`.
pub const MAX_CALL_DEPTH: u32 = 1024;

// ════════════════════════════════════════════════════════════════════════════════
// MACHINE
// ════════════════════════════════════════════════════════════════════════════════

/// Execution environment shared by every invocation of a message.
pub struct Machine {
    pub(crate) store: MemoryBlockstore,
    pub(crate) state: StateTree,
    pub(crate) registry: Registry,
    pub(crate) rand: Box<dyn Rand>,
    pub(crate) epoch: i64,
    pub(crate) base_fee: BigInt,
    pub(crate) circ_supply: BigInt,
    /// Exit code raised when method params fail to decode.
    pub(crate) params_decode_exit: ExitCode,
    pub(crate) gas: GasTracker,
    pub(crate) origin: Address,
    pub(crate) origin_nonce: u64,
    pub(crate) actors_created: u64,
    depth: u32,
}

impl Machine {
    pub(crate) fn new(
        store: MemoryBlockstore,
        state: StateTree,
        registry: Registry,
        rand: Box<dyn Rand>,
        params_decode_exit: ExitCode,
    ) -> Self {
        Self {
            store,
            state,
            registry,
            rand,
            epoch: 0,
            base_fee: BigInt::zero(),
            circ_supply: BigInt::zero(),
            params_decode_exit,
            gas: GasTracker::new(0),
            origin: Address::new_id(SYSTEM_ACTOR_ID),
            origin_nonce: 0,
            actors_created: 0,
            depth: 0,
        }
    }

    /// Resets the per-message context before applying a message.
    pub(crate) fn begin_message(&mut self, origin: Address, nonce: u64, gas_limit: i64) {
        self.gas = GasTracker::new(gas_limit);
        self.origin = origin;
        self.origin_nonce = nonce;
        self.actors_created = 0;
        self.depth = 0;
    }

    pub(crate) fn resolve(&self, addr: &Address) -> VmResult<Option<u64>> {
        self.state.lookup_id(&self.store, addr)
    }

    pub(crate) fn actor_kind(&self, id: u64) -> Option<ActorKind> {
        self.state
            .get_actor(id)
            .and_then(|a| ActorKind::from_code(&a.code))
    }

    pub(crate) fn load_state<T: DeserializeOwned>(&self, id: u64) -> VmResult<T> {
        let actor = self
            .state
            .get_actor(id)
            .ok_or(VmError::ActorNotFound(Address::new_id(id)))?;
        self.store.get_obj(&actor.head)
    }

    pub(crate) fn store_state<T: Serialize>(&mut self, id: u64, value: &T) -> VmResult<usize> {
        let block = encoding::to_vec(value)?;
        let len = block.len();
        let head = self.store.put(block);
        let actor = self
            .state
            .get_actor_mut(id)
            .ok_or(VmError::ActorNotFound(Address::new_id(id)))?;
        actor.head = head;
        Ok(len)
    }

    pub(crate) fn empty_head(&mut self) -> VmResult<Cid> {
        self.store.put_obj(&())
    }

    /// Places a fresh actor with an empty head at `id`.
    pub(crate) fn install(&mut self, id: u64, kind: ActorKind, balance: BigInt) -> VmResult<()> {
        let head = self.empty_head()?;
        self.state.set_actor(
            id,
            ActorState {
                code: kind.code_cid(),
                head,
                nonce: 0,
                balance,
            },
        );
        Ok(())
    }

    /// Allocates an ID for `addr` in the init actor's address map.
    pub(crate) fn register_address(&mut self, addr: &Address) -> VmResult<u64> {
        let mut init = self.state.init_state(&self.store)?;
        let id = init.map_address(*addr);
        self.store_state(crate::actors::INIT_ACTOR_ID, &init)?;
        Ok(id)
    }

    pub(crate) fn transfer(&mut self, from: u64, to: u64, value: &BigInt) -> ActorResult<()> {
        if value.is_negative() {
            return Err(ActorError::abort(
                ExitCode::SYS_ERR_FORBIDDEN,
                format!("attempt to transfer negative value {value}"),
            ));
        }
        if value.is_zero() || from == to {
            return Ok(());
        }
        let from_actor = self
            .state
            .get_actor_mut(from)
            .ok_or_else(|| ActorError::fatal(format!("transfer from missing actor {from}")))?;
        if &from_actor.balance < value {
            return Err(ActorError::abort(
                ExitCode::SYS_ERR_INSUFFICIENT_FUNDS,
                format!(
                    "insufficient balance in t0{from}: {} < {value}",
                    from_actor.balance
                ),
            ));
        }
        from_actor.balance -= value;
        let to_actor = self
            .state
            .get_actor_mut(to)
            .ok_or_else(|| ActorError::fatal(format!("transfer to missing actor {to}")))?;
        to_actor.balance += value;
        Ok(())
    }

    /// Credits `value` out of thin air; only used for gas settlement.
    pub(crate) fn credit(&mut self, id: u64, value: &BigInt) -> VmResult<()> {
        let actor = self
            .state
            .get_actor_mut(id)
            .ok_or(VmError::ActorNotFound(Address::new_id(id)))?;
        actor.balance += value;
        Ok(())
    }

    /// Sends from actor `from`, rolling the state tree back on any error.
    pub(crate) fn send(
        &mut self,
        from: u64,
        to: &Address,
        method: u64,
        params: &[u8],
        value: &BigInt,
    ) -> ActorResult<Vec<u8>> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(ActorError::abort(
                ExitCode::SYS_ERR_FORBIDDEN,
                "message execution exceeds call depth",
            ));
        }
        let snapshot = self.state.clone();
        self.depth += 1;
        let result = self.send_unchecked(from, to, method, params, value);
        self.depth -= 1;
        if result.is_err() {
            self.state = snapshot;
        }
        result
    }

    fn send_unchecked(
        &mut self,
        from: u64,
        to: &Address,
        method: u64,
        params: &[u8],
        value: &BigInt,
    ) -> ActorResult<Vec<u8>> {
        self.gas
            .charge("send", gas::send(!value.is_zero(), method != METHOD_SEND))?;

        let to_id = match self.resolve(to)? {
            Some(id) => id,
            None => self.create_account(to)?,
        };
        self.transfer(from, to_id, value)?;

        if method == METHOD_SEND {
            return Ok(Vec::new());
        }

        let kind = self
            .actor_kind(to_id)
            .ok_or_else(|| ActorError::fatal(format!("actor t0{to_id} has unknown code")))?;
        let handler = self.registry.dispatch(kind, method)?;
        trace!(from, to = to_id, method, actor = kind.name(), "invoke");

        let mut rt = Runtime {
            machine: self,
            caller: Address::new_id(from),
            receiver: Address::new_id(to_id),
            value_received: value.clone(),
            method,
            caller_validated: false,
        };
        let ret = handler(&mut rt, params)?;
        if !rt.caller_validated {
            return Err(ActorError::abort(
                ExitCode::SYS_ERR_ILLEGAL_ACTOR,
                format!("{} method {method} did not validate its caller", kind.name()),
            ));
        }
        Ok(ret)
    }

    /// Creates the account behind a public-key address on first use.
    fn create_account(&mut self, addr: &Address) -> ActorResult<u64> {
        if !addr.is_pubkey() {
            return Err(ActorError::abort(
                ExitCode::SYS_ERR_INVALID_RECEIVER,
                format!("actor {addr} does not exist"),
            ));
        }
        self.gas.charge("create actor", gas::CREATE_ACTOR)?;
        let id = self.register_address(addr)?;
        self.install(id, ActorKind::Account, BigInt::zero())?;
        let params = encoding::to_vec(addr)?;
        self.send(
            SYSTEM_ACTOR_ID,
            &Address::new_id(id),
            METHOD_CONSTRUCTOR,
            &params,
            &BigInt::zero(),
        )?;
        Ok(id)
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// RUNTIME
// ════════════════════════════════════════════════════════════════════════════════

/// What an actor method sees of the VM during one invocation.
pub struct Runtime<'a> {
    machine: &'a mut Machine,
    caller: Address,
    receiver: Address,
    value_received: BigInt,
    method: u64,
    caller_validated: bool,
}

impl<'a> Runtime<'a> {
    /// ID address of the immediate caller.
    pub fn caller(&self) -> Address {
        self.caller
    }

    /// ID address of the actor being invoked.
    pub fn receiver(&self) -> Address {
        self.receiver
    }

    pub fn value_received(&self) -> &BigInt {
        &self.value_received
    }

    pub fn method(&self) -> u64 {
        self.method
    }

    pub fn curr_epoch(&self) -> i64 {
        self.machine.epoch
    }

    pub fn circ_supply(&self) -> &BigInt {
        &self.machine.circ_supply
    }

    fn receiver_id(&self) -> u64 {
        self.receiver.id().unwrap_or(SYSTEM_ACTOR_ID)
    }

    fn caller_id(&self) -> u64 {
        self.caller.id().unwrap_or(SYSTEM_ACTOR_ID)
    }

    // ────────────────────────────────────────────────────────────────────────────
    // Caller validation
    // ────────────────────────────────────────────────────────────────────────────

    fn mark_validated(&mut self) -> ActorResult<()> {
        if self.caller_validated {
            return Err(ActorError::abort(
                ExitCode::SYS_ERR_ILLEGAL_ACTOR,
                "method must validate caller identity exactly once",
            ));
        }
        self.caller_validated = true;
        Ok(())
    }

    pub fn validate_immediate_caller_accept_any(&mut self) -> ActorResult<()> {
        self.mark_validated()
    }

    /// Accepts only callers among `addrs`.
    pub fn validate_immediate_caller_is(&mut self, addrs: &[Address]) -> ActorResult<()> {
        self.mark_validated()?;
        let caller = self.caller_id();
        for addr in addrs {
            if self.machine.resolve(addr)? == Some(caller) {
                return Ok(());
            }
        }
        Err(ActorError::abort(
            ExitCode::SYS_ERR_FORBIDDEN,
            format!("caller {} is not one of {addrs:?}", self.caller),
        ))
    }

    /// Accepts only callers whose code is one of `kinds`.
    pub fn validate_immediate_caller_type(&mut self, kinds: &[ActorKind]) -> ActorResult<()> {
        self.mark_validated()?;
        match self.machine.actor_kind(self.caller_id()) {
            Some(kind) if kinds.contains(&kind) => Ok(()),
            other => Err(ActorError::abort(
                ExitCode::SYS_ERR_FORBIDDEN,
                format!(
                    "caller type {} is not one of {:?}",
                    other.map(ActorKind::name).unwrap_or("unknown"),
                    kinds
                ),
            )),
        }
    }

    // ────────────────────────────────────────────────────────────────────────────
    // Params and state
    // ────────────────────────────────────────────────────────────────────────────

    /// Decodes method params; failure aborts with the configured class.
    pub fn decode_params<T: DeserializeOwned>(&self, params: &[u8]) -> ActorResult<T> {
        encoding::from_slice(params).map_err(|e| {
            ActorError::abort(
                self.machine.params_decode_exit,
                format!("failed to decode parameters: {e}"),
            )
        })
    }

    pub fn state<T: DeserializeOwned>(&mut self) -> ActorResult<T> {
        self.machine.gas.charge("state read", gas::STATE_READ_BASE)?;
        Ok(self.machine.load_state(self.receiver_id())?)
    }

    pub fn set_state<T: Serialize>(&mut self, value: &T) -> ActorResult<()> {
        let block = encoding::to_vec(value)?;
        self.machine
            .gas
            .charge("state write", gas::state_write(block.len()))?;
        self.machine.store_state(self.receiver_id(), value)?;
        Ok(())
    }

    // ────────────────────────────────────────────────────────────────────────────
    // Actors
    // ────────────────────────────────────────────────────────────────────────────

    /// ID of the actor behind `addr`, if it exists.
    pub fn resolve_address(&self, addr: &Address) -> ActorResult<Option<u64>> {
        Ok(self.machine.resolve(addr)?)
    }

    pub fn actor_kind(&self, id: u64) -> Option<ActorKind> {
        self.machine.actor_kind(id)
    }

    /// Robust address for the next actor created by this message.
    pub fn new_actor_address(&mut self) -> Address {
        let seed = actor_address_seed(
            &self.machine.origin,
            self.machine.origin_nonce,
            self.machine.actors_created,
        );
        self.machine.actors_created += 1;
        Address::new_actor(&seed)
    }

    /// Creates an actor; `None` stands for an undefined code or address.
    pub fn create_actor(&mut self, code: Option<Cid>, addr: Option<Address>) -> ActorResult<()> {
        let illegal = |msg: String| ActorError::abort(ExitCode::SYS_ERR_ILLEGAL_ARGUMENT, msg);

        let code = code.ok_or_else(|| illegal("undefined actor code".to_string()))?;
        let kind = ActorKind::from_code(&code)
            .ok_or_else(|| illegal(format!("can only create built-in actors, got {code}")))?;
        if kind.is_singleton() {
            return Err(illegal(format!(
                "can only have one instance of singleton actor {}",
                kind.name()
            )));
        }
        let addr = addr.ok_or_else(|| illegal("undefined actor address".to_string()))?;
        let id = addr
            .id()
            .ok_or_else(|| illegal(format!("actors are created at ID addresses, got {addr}")))?;
        if self.machine.state.contains(id) {
            return Err(illegal(format!("actor address {addr} already exists")));
        }

        self.machine.gas.charge("create actor", gas::CREATE_ACTOR)?;
        self.machine.install(id, kind, BigInt::zero())?;
        Ok(())
    }

    /// Sends from the receiver to `to`.
    pub fn send(
        &mut self,
        to: &Address,
        method: u64,
        params: &[u8],
        value: &BigInt,
    ) -> ActorResult<Vec<u8>> {
        let from = self.receiver_id();
        self.machine.send(from, to, method, params, value)
    }

    pub fn get_randomness(
        &mut self,
        kind: RandomnessKind,
        tag: i64,
        epoch: i64,
        entropy: &[u8],
    ) -> ActorResult<Vec<u8>> {
        self.machine
            .gas
            .charge("get randomness", gas::GET_RANDOMNESS_BASE)?;
        Ok(self.machine.rand.randomness(kind, tag, epoch, entropy))
    }
}
