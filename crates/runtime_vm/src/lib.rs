//! # tvx-runtime-vm: Reference Actor VM
//!
//! Deterministic, in-memory actor VM used to observe state transitions while
//! generating conformance vectors, and to replay them when checking.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────── Vm ─────────────────────────────────────────────┐
//! │                                                                 │
//! │  apply_message(msg) / apply_tipset(epoch, base_fee, blocks)     │
//! │       │                                                         │
//! │       ▼                                                         │
//! │  ┌──────────── Machine ────────────┐    ┌──────────────────┐    │
//! │  │ StateTree ── MemoryBlockstore   │    │ Registry         │    │
//! │  │ GasTracker                      │◄──►│  MethodTable per │    │
//! │  │ Box<dyn Rand> (ReplayingRand)   │    │  built-in actor  │    │
//! │  └───────────────┬─────────────────┘    └──────────────────┘    │
//! │                  │ send(from, to, method, params, value)        │
//! │                  ▼                                              │
//! │            Runtime<'_>  ──►  actor method handler               │
//! │                                                                 │
//! │  flush() ──► state root Cid      export_car(roots) ──► snapshot │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`vm`] | `Vm`, genesis, message and tipset application |
//! | [`runtime`] | Send, rollback and the per-invocation `Runtime` |
//! | [`actors`] | Built-in actors and their dispatch tables |
//! | [`state_tree`] | Actor table, flushing and address resolution |
//! | [`blockstore`] / [`car`] | Content-addressed blocks and snapshots |
//! | [`gas`] | Price list, tracker, settlement |
//! | [`apply_ret`] | Receipts and receipts roots |
//! | [`merkle`] | Binary SHA3 Merkle root |
//! | [`domain`] | Domain-separated derivations |
//! | [`encoding`] | Canonical binary encoding |
//! | [`exit_code`] | `ExitCode` |
//! | [`message`] | `Message` |
//! | [`rand`] | Randomness oracles |
//!
//! ## Determinism
//!
//! Nothing in this crate reads the clock, the environment or real entropy.
//! Maps are ordered; every encoding is fixed-width. The same snapshot,
//! randomness rules and messages always yield the same receipts and roots.

use num_bigint::BigInt;
use tvx_schema::{Address, Cid, RandomnessKind};

pub mod actors;
pub mod apply_ret;
pub mod blockstore;
pub mod car;
pub mod domain;
pub mod encoding;
pub mod error;
pub mod exit_code;
pub mod gas;
pub mod merkle;
pub mod message;
pub mod rand;
pub mod runtime;
pub mod state_tree;
pub mod vm;

pub use actors::{ActorKind, MethodTable, Registry};
pub use apply_ret::{receipts_root, ApplyRet, MessageReceipt};
pub use blockstore::MemoryBlockstore;
pub use car::{export_car, import_car};
pub use error::{ActorError, ActorResult, VmError, VmResult};
pub use exit_code::ExitCode;
pub use gas::{GasOutputs, GasTracker};
pub use message::{Message, METHOD_CONSTRUCTOR, METHOD_SEND};
pub use rand::{Rand, ReplayingRand};
pub use runtime::Runtime;
pub use state_tree::{ActorState, StateTree};
pub use vm::{ActorSeed, TipsetBlock, TipsetRet, Vm, VmConfig};

// ════════════════════════════════════════════════════════════════════════════════
// COLLABORATOR INTERFACE
// ════════════════════════════════════════════════════════════════════════════════

/// What a vector builder needs from a VM.
///
/// | Capability | Method |
/// |------------|--------|
/// | instantiate actor with balance | [`install_actor`](ReferenceVm::install_actor) |
/// | snapshot state tree → root | [`flush`](ReferenceVm::flush) |
/// | apply one message → receipt | [`apply_message`](ReferenceVm::apply_message) |
/// | answer randomness | [`randomness`](ReferenceVm::randomness) |
/// | look up an actor | [`actor`](ReferenceVm::actor) |
pub trait ReferenceVm {
    fn install_actor(&mut self, seed: ActorSeed, balance: BigInt) -> VmResult<Address>;

    fn flush(&mut self) -> VmResult<Cid>;

    fn apply_message(&mut self, msg: &Message) -> VmResult<ApplyRet>;

    fn randomness(&self, kind: RandomnessKind, tag: i64, epoch: i64, entropy: &[u8]) -> Vec<u8>;

    fn actor(&self, addr: &Address) -> VmResult<Option<ActorState>>;
}

impl ReferenceVm for Vm {
    fn install_actor(&mut self, seed: ActorSeed, balance: BigInt) -> VmResult<Address> {
        Vm::install_actor(self, seed, balance)
    }

    fn flush(&mut self) -> VmResult<Cid> {
        Vm::flush(self)
    }

    fn apply_message(&mut self, msg: &Message) -> VmResult<ApplyRet> {
        Vm::apply_message(self, msg)
    }

    fn randomness(&self, kind: RandomnessKind, tag: i64, epoch: i64, entropy: &[u8]) -> Vec<u8> {
        Vm::randomness(self, kind, tag, epoch, entropy)
    }

    fn actor(&self, addr: &Address) -> VmResult<Option<ActorState>> {
        Vm::actor(self, addr)
    }
}
