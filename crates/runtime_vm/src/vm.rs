//! # Reference VM
//!
//! [`Vm`] applies messages and tipsets against an in-memory state tree and
//! reports receipts. It is the collaborator the vector builder drives and
//! the one a conformance driver replays against.
//!
//! ## Genesis
//!
//! | ID | Actor | State |
//! |----|-------|-------|
//! | 0 | system | empty |
//! | 1 | init | empty address map, next ID 100 |
//! | 2 | reward | empty |
//! | 99 | burnt funds | account with address `t099` |
//!
//! The chaos actor (`t098`) exists only when installed through
//! [`ActorSeed::Chaos`].
//!
//! ## Applying a Message
//!
//! ```text
//! apply_message(msg)
//!   ├─ gas_limit < on-chain size charge or > block limit ─► SysErrOutOfGas, no charge
//!   ├─ sender unknown or not an account ──────────────────► SysErrSenderInvalid, no charge
//!   ├─ nonce mismatch or balance < escrow + value ────────► SysErrSenderStateInvalid, no charge
//!   ├─ escrow gas_limit × fee_cap, bump nonce, charge on-chain size
//!   ├─ send(sender → to, method, params, value)
//!   │     Ok     ─► charge return bytes
//!   │     Abort  ─► exit code from the abort
//!   │     Fatal  ─► restore pre-message state, Err(VmError::Fatal)
//!   └─ settle: burn → t099, tip → miner, refund → sender
//! ```

use num_bigint::BigInt;
use tracing::{debug, warn};
use tvx_schema::{Address, Cid, RandomnessKind};

use crate::actors::account::AccountState;
use crate::actors::init::InitState;
use crate::actors::{
    ActorKind, Registry, BURNT_FUNDS_ACTOR_ADDR, BURNT_FUNDS_ACTOR_ID, CHAOS_ACTOR_ID,
    INIT_ACTOR_ID, REWARD_ACTOR_ADDR, REWARD_ACTOR_ID, SYSTEM_ACTOR_ID,
};
use crate::apply_ret::{receipts_root, ApplyRet, MessageReceipt};
use crate::blockstore::MemoryBlockstore;
use crate::car::{export_car, import_car};
use crate::error::{ActorError, VmError, VmResult};
use crate::exit_code::ExitCode;
use crate::gas::{self, GasOutputs};
use crate::message::Message;
use crate::rand::{Rand, ReplayingRand};
use crate::runtime::Machine;
use crate::state_tree::{ActorState, StateTree};

/// Network name recorded in the init actor at genesis.
pub const DEFAULT_NETWORK_NAME: &str = "tvx-localnet";

// ════════════════════════════════════════════════════════════════════════════════
// CONFIG
// ════════════════════════════════════════════════════════════════════════════════

/// Behavioural switches of a [`Vm`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmConfig {
    /// Exit code of a call whose params fail to decode.
    ///
    /// Defaults to `SysErrSenderInvalid`, the class recorded by the
    /// generator. `ErrSerialization` is the arguably correct class; vectors
    /// that depend on the difference carry the `incorrect` + `negate` hints.
    pub params_decode_exit: ExitCode,
    pub network_name: String,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            params_decode_exit: ExitCode::SYS_ERR_SENDER_INVALID,
            network_name: DEFAULT_NETWORK_NAME.to_string(),
        }
    }
}

/// What [`Vm::install_actor`] places in the state tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorSeed {
    /// Account bound to a public-key address.
    Account(Address),
    /// The chaos singleton at `t098`.
    Chaos,
}

/// One block of a tipset, with its messages already decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TipsetBlock {
    pub miner: Address,
    pub win_count: i64,
    pub messages: Vec<Message>,
}

/// Outcome of [`Vm::apply_tipset`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TipsetRet {
    /// One entry per message actually applied, in application order.
    pub applied: Vec<ApplyRet>,
    pub receipts_root: Cid,
}

impl TipsetRet {
    pub fn receipts(&self) -> Vec<MessageReceipt> {
        self.applied.iter().map(|r| r.receipt.clone()).collect()
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// VM
// ════════════════════════════════════════════════════════════════════════════════

pub struct Vm {
    machine: Machine,
    config: VmConfig,
}

impl std::fmt::Debug for Vm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vm")
            .field("config", &self.config)
            .field("epoch", &self.machine.epoch)
            .field("actors", &self.machine.state.len())
            .finish()
    }
}

impl Vm {
    /// Fresh VM holding only the genesis actors.
    pub fn new(config: VmConfig) -> VmResult<Self> {
        let mut vm = Self::with_state(config, MemoryBlockstore::new(), StateTree::new())?;
        vm.genesis()?;
        Ok(vm)
    }

    /// VM positioned at `root` of a snapshot produced by [`Vm::export_car`].
    pub fn from_snapshot(config: VmConfig, car: &[u8], root: &Cid) -> VmResult<Self> {
        let (store, _roots) = import_car(car)?;
        let state = StateTree::load(&store, root)?;
        Self::with_state(config, store, state)
    }

    fn with_state(config: VmConfig, store: MemoryBlockstore, state: StateTree) -> VmResult<Self> {
        let machine = Machine::new(
            store,
            state,
            Registry::builtin()?,
            Box::new(ReplayingRand::default()),
            config.params_decode_exit,
        );
        Ok(Self { machine, config })
    }

    fn genesis(&mut self) -> VmResult<()> {
        let m = &mut self.machine;
        m.install(SYSTEM_ACTOR_ID, ActorKind::System, BigInt::default())?;
        m.install(INIT_ACTOR_ID, ActorKind::Init, BigInt::default())?;
        m.store_state(INIT_ACTOR_ID, &InitState::new(self.config.network_name.clone()))?;
        m.install(REWARD_ACTOR_ID, ActorKind::Reward, BigInt::default())?;
        m.install(BURNT_FUNDS_ACTOR_ID, ActorKind::Account, BigInt::default())?;
        m.store_state(
            BURNT_FUNDS_ACTOR_ID,
            &AccountState {
                address: BURNT_FUNDS_ACTOR_ADDR,
            },
        )?;
        Ok(())
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    // ────────────────────────────────────────────────────────────────────────────
    // Environment
    // ────────────────────────────────────────────────────────────────────────────

    pub fn epoch(&self) -> i64 {
        self.machine.epoch
    }

    pub fn set_epoch(&mut self, epoch: i64) {
        self.machine.epoch = epoch;
    }

    pub fn base_fee(&self) -> &BigInt {
        &self.machine.base_fee
    }

    pub fn set_base_fee(&mut self, base_fee: BigInt) {
        self.machine.base_fee = base_fee;
    }

    pub fn circ_supply(&self) -> &BigInt {
        &self.machine.circ_supply
    }

    pub fn set_circ_supply(&mut self, circ_supply: BigInt) {
        self.machine.circ_supply = circ_supply;
    }

    pub fn set_rand(&mut self, rand: Box<dyn Rand>) {
        self.machine.rand = rand;
    }

    pub fn randomness(
        &self,
        kind: RandomnessKind,
        tag: i64,
        epoch: i64,
        entropy: &[u8],
    ) -> Vec<u8> {
        self.machine.rand.randomness(kind, tag, epoch, entropy)
    }

    // ────────────────────────────────────────────────────────────────────────────
    // State
    // ────────────────────────────────────────────────────────────────────────────

    /// Places an actor with `balance` and returns its ID address.
    pub fn install_actor(&mut self, seed: ActorSeed, balance: BigInt) -> VmResult<Address> {
        let m = &mut self.machine;
        match seed {
            ActorSeed::Account(addr) => {
                if !addr.is_pubkey() {
                    return Err(VmError::Fatal(format!(
                        "accounts are keyed by public-key addresses, got {addr}"
                    )));
                }
                if m.resolve(&addr)?.is_some() {
                    return Err(VmError::ActorExists(addr));
                }
                let id = m.register_address(&addr)?;
                m.install(id, ActorKind::Account, balance)?;
                m.store_state(id, &AccountState { address: addr })?;
                debug!(%addr, id, "installed account");
                Ok(Address::new_id(id))
            }
            ActorSeed::Chaos => {
                let addr = Address::new_id(CHAOS_ACTOR_ID);
                if m.state.contains(CHAOS_ACTOR_ID) {
                    return Err(VmError::ActorExists(addr));
                }
                m.install(CHAOS_ACTOR_ID, ActorKind::Chaos, balance)?;
                debug!("installed chaos actor");
                Ok(addr)
            }
        }
    }

    /// Writes the state tree and returns its root.
    pub fn flush(&mut self) -> VmResult<Cid> {
        let m = &mut self.machine;
        m.state.flush(&mut m.store)
    }

    /// Snapshot of every block with `roots` as entry points.
    pub fn export_car(&self, roots: &[Cid]) -> VmResult<Vec<u8>> {
        export_car(&self.machine.store, roots)
    }

    pub fn blockstore(&self) -> &MemoryBlockstore {
        &self.machine.store
    }

    pub fn resolve(&self, addr: &Address) -> VmResult<Option<u64>> {
        self.machine.resolve(addr)
    }

    /// Current record of the actor behind `addr`.
    pub fn actor(&self, addr: &Address) -> VmResult<Option<ActorState>> {
        Ok(self
            .resolve(addr)?
            .and_then(|id| self.machine.state.get_actor(id))
            .cloned())
    }

    /// Record of the actor behind `addr` in the tree flushed at `root`.
    pub fn actor_at(&self, root: &Cid, addr: &Address) -> VmResult<Option<ActorState>> {
        let tree = StateTree::load(&self.machine.store, root)?;
        Ok(tree
            .lookup_id(&self.machine.store, addr)?
            .and_then(|id| tree.get_actor(id))
            .cloned())
    }

    pub fn actor_kind(&self, addr: &Address) -> VmResult<Option<ActorKind>> {
        Ok(self.resolve(addr)?.and_then(|id| self.machine.actor_kind(id)))
    }

    // ────────────────────────────────────────────────────────────────────────────
    // Messages
    // ────────────────────────────────────────────────────────────────────────────

    /// Applies one message; tips go to the reward actor.
    pub fn apply_message(&mut self, msg: &Message) -> VmResult<ApplyRet> {
        self.apply_message_with_miner(msg, REWARD_ACTOR_ID)
    }

    fn apply_message_with_miner(&mut self, msg: &Message, miner: u64) -> VmResult<ApplyRet> {
        let msg_len = msg.encode()?.len();
        let on_chain = gas::on_chain_message(msg_len);
        if msg.gas_limit < on_chain || msg.gas_limit > gas::BLOCK_GAS_LIMIT {
            return Ok(Self::reject(
                ExitCode::SYS_ERR_OUT_OF_GAS,
                format!(
                    "gas limit {} outside [{on_chain}, {}]",
                    msg.gas_limit,
                    gas::BLOCK_GAS_LIMIT
                ),
            ));
        }

        let Some(sender) = self.machine.resolve(&msg.from)? else {
            return Ok(Self::reject(
                ExitCode::SYS_ERR_SENDER_INVALID,
                format!("sender {} not found", msg.from),
            ));
        };
        if !self
            .machine
            .actor_kind(sender)
            .is_some_and(ActorKind::is_principal)
        {
            return Ok(Self::reject(
                ExitCode::SYS_ERR_SENDER_INVALID,
                format!("sender {} is not an account", msg.from),
            ));
        }

        let pre_message = self.machine.state.clone();
        let escrow = msg.gas_escrow();
        {
            let actor = self
                .machine
                .state
                .get_actor_mut(sender)
                .ok_or(VmError::ActorNotFound(msg.from))?;
            if actor.nonce != msg.nonce {
                let reason = format!("nonce mismatch: expected {} got {}", actor.nonce, msg.nonce);
                return Ok(Self::reject(ExitCode::SYS_ERR_SENDER_STATE_INVALID, reason));
            }
            if actor.balance < msg.required_funds() {
                let reason = format!(
                    "balance {} below required funds {}",
                    actor.balance,
                    msg.required_funds()
                );
                return Ok(Self::reject(ExitCode::SYS_ERR_SENDER_STATE_INVALID, reason));
            }
            actor.balance -= &escrow;
            actor.nonce += 1;
        }

        self.machine
            .begin_message(Address::new_id(sender), msg.nonce, msg.gas_limit);
        let charged = self.machine.gas.charge("on-chain message", on_chain);
        let post_escrow = self.machine.state.clone();

        let outcome = charged.and_then(|()| {
            self.machine
                .send(sender, &msg.to, msg.method, &msg.params, &msg.value)
        });
        let (exit_code, return_data, failure) = match outcome {
            Ok(ret) => {
                match self
                    .machine
                    .gas
                    .charge("return value", gas::on_chain_return(ret.len()))
                {
                    Ok(()) => (ExitCode::OK, ret, None),
                    Err(err) => {
                        self.machine.state = post_escrow;
                        (ExitCode::SYS_ERR_OUT_OF_GAS, Vec::new(), Some(err.to_string()))
                    }
                }
            }
            Err(ActorError::Abort { code, msg: reason }) => (code, Vec::new(), Some(reason)),
            Err(ActorError::Fatal(reason)) => {
                self.machine.state = pre_message;
                warn!(
                    from = %msg.from,
                    to = %msg.to,
                    method = msg.method,
                    %reason,
                    "fatal error applying message"
                );
                return Err(VmError::Fatal(reason));
            }
        };

        let gas_used = self.machine.gas.used();
        let gas_outputs = GasOutputs::compute(
            gas_used,
            msg.gas_limit,
            &self.machine.base_fee,
            &msg.gas_fee_cap,
            &msg.gas_premium,
        );
        self.machine
            .credit(BURNT_FUNDS_ACTOR_ID, &gas_outputs.base_fee_burn)?;
        self.machine.credit(miner, &gas_outputs.miner_tip)?;
        self.machine.credit(sender, &gas_outputs.refund)?;

        debug!(
            from = %msg.from,
            to = %msg.to,
            method = msg.method,
            nonce = msg.nonce,
            exit_code = %exit_code,
            gas_used,
            "applied message"
        );
        Ok(ApplyRet {
            receipt: MessageReceipt {
                exit_code,
                return_data,
                gas_used,
            },
            gas_outputs,
            failure,
        })
    }

    fn reject(exit_code: ExitCode, reason: String) -> ApplyRet {
        debug!(exit_code = %exit_code, %reason, "message rejected");
        ApplyRet::rejected(exit_code, reason)
    }

    /// Applies the messages of `blocks` in block order at `epoch`.
    ///
    /// A message byte-identical to one already applied in this tipset is
    /// skipped. Tips go to the miner of the block that carried the message.
    pub fn apply_tipset(
        &mut self,
        epoch: i64,
        base_fee: BigInt,
        blocks: &[TipsetBlock],
    ) -> VmResult<TipsetRet> {
        let mut miners = Vec::with_capacity(blocks.len());
        for block in blocks {
            let id = self
                .machine
                .resolve(&block.miner)?
                .ok_or(VmError::ActorNotFound(block.miner))?;
            miners.push(id);
        }

        self.set_epoch(epoch);
        self.set_base_fee(base_fee);

        let mut seen = std::collections::BTreeSet::new();
        let mut applied = Vec::new();
        for (block, miner) in blocks.iter().zip(miners) {
            for msg in &block.messages {
                if !seen.insert(msg.cid()?) {
                    debug!(from = %msg.from, nonce = msg.nonce, "skipping duplicate message");
                    continue;
                }
                applied.push(self.apply_message_with_miner(msg, miner)?);
            }
        }

        let receipts: Vec<MessageReceipt> = applied.iter().map(|r| r.receipt.clone()).collect();
        let receipts_root = receipts_root(&receipts)?;
        debug!(
            epoch,
            blocks = blocks.len(),
            messages = applied.len(),
            %receipts_root,
            "applied tipset"
        );
        Ok(TipsetRet {
            applied,
            receipts_root,
        })
    }
}
