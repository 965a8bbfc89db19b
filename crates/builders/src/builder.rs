//! # Phased Builder
//!
//! Drives a reference [`Vm`] through one transition and records it as a
//! [`TestVector`].
//!
//! ## Stages
//!
//! ```text
//!  Declaring ──commit_preconditions()──► PreconditionsCommitted
//!                                              │
//!                                        commit_applies()
//!                                              ▼
//!            Asserted ◄────finish()──── ApplyCommitted ◄── assert()
//! ```
//!
//! | Stage | Allowed |
//! |-------|---------|
//! | Declaring | `set_defaults`, `account(s)`, `enable_chaos`, `randomness_rule`, `set_epoch`, `set_base_fee`, `set_circ_supply` |
//! | PreconditionsCommitted | `set_defaults`, `randomness_rule`, message construction, `message_mut`, `stage_tipset`, `stage_block` |
//! | ApplyCommitted | `assert`, `finish` |
//! | Asserted | nothing; the vector has been emitted |
//!
//! Any call outside its stage returns [`BuilderError::StageViolation`].
//!
//! ## Nonces
//!
//! Each sender gets nonces in order unless a message sets `MsgOpt::Nonce`.
//! A nonce used twice by the same sender is rejected. Messages rewritten
//! through `message_mut` are not tracked.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use num_bigint::BigInt;
use tracing::{debug, info, warn};
use tvx_runtime_vm::actors::chaos::{
    CreateActorArgs, GetRandomnessArgs, METHOD_CALLER_VALIDATION, METHOD_CREATE_ACTOR,
    METHOD_GET_RANDOMNESS,
};
use tvx_runtime_vm::actors::init::{ExecParams, METHOD_EXEC};
use tvx_runtime_vm::actors::paych::PaychConstructorParams;
use tvx_runtime_vm::actors::{CHAOS_ACTOR_ADDR, INIT_ACTOR_ADDR};
use tvx_runtime_vm::message::MESSAGE_VERSION;
use tvx_runtime_vm::{
    encoding, ActorKind, ActorSeed, ActorState, Message, ReferenceVm, ReplayingRand, TipsetBlock,
    Vm, VmConfig, VmError, METHOD_SEND,
};
use tvx_schema::{
    Address, ApplyMessage, Base64Bytes, Block, Cid, Class, Metadata, Postconditions,
    Preconditions, Protocol, Randomness, RandomnessRule, Receipt, Selector, TestVector, Tipset,
    DEFAULT_BASE_FEE,
};

use crate::asserter::{Asserter, AssertionMode};
use crate::error::{BuilderError, BuilderResult};
use crate::messages::{ApplicableMessage, MessageHandle, MsgDefaults, MsgOpt, ResolvedOpts};

/// Selector key carried by vectors that need the chaos actor deployed.
pub const SELECTOR_CHAOS_ACTOR: &str = "chaos_actor";

// ════════════════════════════════════════════════════════════════════════════════
// TYPES
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Declaring,
    PreconditionsCommitted,
    ApplyCommitted,
    Asserted,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Declaring => "Declaring",
            Stage::PreconditionsCommitted => "PreconditionsCommitted",
            Stage::ApplyCommitted => "ApplyCommitted",
            Stage::Asserted => "Asserted",
        };
        f.write_str(name)
    }
}

/// Record-level settings supplied by whoever schedules the vector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VectorOptions {
    pub selector: Selector,
    pub hints: Vec<String>,
    pub mode: AssertionMode,
}

/// Both addresses of a declared account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AddressHandle {
    pub id: Address,
    pub robust: Address,
}

#[derive(Debug, Clone)]
struct StagedBlock {
    miner: Address,
    win_count: i64,
    messages: Vec<usize>,
}

#[derive(Debug, Clone)]
struct StagedTipset {
    epoch: i64,
    base_fee: BigInt,
    blocks: Vec<StagedBlock>,
}

#[derive(Debug, Clone)]
struct CommittedPre {
    root: Cid,
    epoch: i64,
    base_fee: BigInt,
    circ_supply: Option<BigInt>,
}

#[derive(Debug, Clone)]
struct CommittedPost {
    root: Cid,
    receipts: Vec<Option<Receipt>>,
    failures: Vec<usize>,
    receipts_roots: Vec<Cid>,
}

// ════════════════════════════════════════════════════════════════════════════════
// BUILDER
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub struct Builder {
    class: Class,
    stage: Stage,
    vm: Vm,
    meta: Metadata,
    options: VectorOptions,
    defaults: MsgDefaults,
    randomness: Randomness,
    actors: Vec<AddressHandle>,
    chaos: bool,
    epoch: i64,
    base_fee: BigInt,
    circ_supply: Option<BigInt>,
    pre: Option<CommittedPre>,
    car: Vec<u8>,
    messages: Vec<ApplicableMessage>,
    nonces: BTreeMap<Address, BTreeSet<u64>>,
    tipsets: Vec<StagedTipset>,
    post: Option<CommittedPost>,
}

impl Builder {
    pub fn new(class: Class, meta: Metadata, options: VectorOptions) -> BuilderResult<Self> {
        if class == Class::Blockseq {
            return Err(BuilderError::ClassMismatch { op: "new", class });
        }
        debug!(id = %meta.id, class = class.as_str(), "builder created");
        Ok(Self {
            class,
            stage: Stage::Declaring,
            vm: Vm::new(VmConfig::default())?,
            meta,
            options,
            defaults: MsgDefaults::default(),
            randomness: Randomness::default(),
            actors: Vec::new(),
            chaos: false,
            epoch: 0,
            base_fee: BigInt::from(DEFAULT_BASE_FEE),
            circ_supply: None,
            pre: None,
            car: Vec::new(),
            messages: Vec::new(),
            nonces: BTreeMap::new(),
            tipsets: Vec::new(),
            post: None,
        })
    }

    /// Builder for a message-class vector with default options.
    pub fn message(meta: Metadata) -> BuilderResult<Self> {
        Self::new(Class::Message, meta, VectorOptions::default())
    }

    /// Builder for a tipset-class vector with default options.
    pub fn tipset(meta: Metadata) -> BuilderResult<Self> {
        Self::new(Class::Tipset, meta, VectorOptions::default())
    }

    pub fn class(&self) -> Class {
        self.class
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn id(&self) -> &str {
        &self.meta.id
    }

    pub fn vm(&self) -> &Vm {
        &self.vm
    }

    pub fn mode(&self) -> AssertionMode {
        self.options.mode
    }

    fn require(&self, op: &'static str, allowed: &[Stage]) -> BuilderResult<()> {
        if allowed.contains(&self.stage) {
            Ok(())
        } else {
            Err(BuilderError::StageViolation {
                op,
                stage: self.stage,
            })
        }
    }

    fn require_class(&self, op: &'static str, class: Class) -> BuilderResult<()> {
        if self.class == class {
            Ok(())
        } else {
            Err(BuilderError::ClassMismatch {
                op,
                class: self.class,
            })
        }
    }

    // ────────────────────────────────────────────────────────────────────────────
    // Declaring
    // ────────────────────────────────────────────────────────────────────────────

    /// Sets gas defaults for messages created afterwards.
    pub fn set_defaults(&mut self, opts: &[MsgOpt]) -> BuilderResult<()> {
        self.require(
            "set_defaults",
            &[Stage::Declaring, Stage::PreconditionsCommitted],
        )?;
        self.defaults.apply(opts)
    }

    /// Declares an account keyed by a fresh `protocol` address.
    pub fn account(&mut self, protocol: Protocol, balance: BigInt) -> BuilderResult<AddressHandle> {
        self.require("account", &[Stage::Declaring])?;
        let seq = self.actors.len() as u64;
        let robust = match protocol {
            Protocol::Secp256k1 => Address::new_secp256k1(format!("tvx-account-{seq}").as_bytes()),
            Protocol::Bls => {
                let mut key = [0u8; 48];
                key[..8].copy_from_slice(&seq.to_be_bytes());
                key[8..16].copy_from_slice(b"tvx-bls!");
                Address::new_bls(&key)?
            }
            other => return Err(BuilderError::UnsupportedProtocol(other)),
        };
        let id = ReferenceVm::install_actor(&mut self.vm, ActorSeed::Account(robust), balance)?;
        let handle = AddressHandle { id, robust };
        self.actors.push(handle);
        Ok(handle)
    }

    /// Declares `n` accounts with the same protocol and balance.
    pub fn accounts(
        &mut self,
        protocol: Protocol,
        balance: BigInt,
        n: usize,
    ) -> BuilderResult<Vec<AddressHandle>> {
        (0..n)
            .map(|_| self.account(protocol, balance.clone()))
            .collect()
    }

    /// Installs the chaos actor at its singleton address and marks the
    /// vector with the `chaos_actor` selector.
    pub fn enable_chaos(&mut self) -> BuilderResult<Address> {
        self.require("enable_chaos", &[Stage::Declaring])?;
        let addr = ReferenceVm::install_actor(&mut self.vm, ActorSeed::Chaos, BigInt::default())?;
        self.chaos = true;
        self.options
            .selector
            .insert(SELECTOR_CHAOS_ACTOR.to_string(), "true".to_string());
        Ok(addr)
    }

    /// Declares the answer to one randomness request. Each request can be
    /// answered once.
    pub fn randomness_rule(&mut self, on: RandomnessRule, ret: Vec<u8>) -> BuilderResult<()> {
        self.require(
            "randomness_rule",
            &[Stage::Declaring, Stage::PreconditionsCommitted],
        )?;
        if self.randomness.contains(&on) {
            return Err(BuilderError::DuplicateRandomnessRule);
        }
        self.randomness.push(on, ret);
        Ok(())
    }

    pub fn set_epoch(&mut self, epoch: i64) -> BuilderResult<()> {
        self.require("set_epoch", &[Stage::Declaring])?;
        self.epoch = epoch;
        Ok(())
    }

    pub fn set_base_fee(&mut self, base_fee: BigInt) -> BuilderResult<()> {
        self.require("set_base_fee", &[Stage::Declaring])?;
        self.base_fee = base_fee;
        Ok(())
    }

    pub fn set_circ_supply(&mut self, circ_supply: BigInt) -> BuilderResult<()> {
        self.require("set_circ_supply", &[Stage::Declaring])?;
        self.circ_supply = Some(circ_supply);
        Ok(())
    }

    /// Current balance of the actor behind `addr`; zero if it does not exist.
    pub fn balance(&self, addr: &Address) -> BuilderResult<BigInt> {
        Ok(self
            .vm
            .actor(addr)?
            .map(|a| a.balance)
            .unwrap_or_default())
    }

    pub fn actor(&self, addr: &Address) -> BuilderResult<Option<ActorState>> {
        Ok(ReferenceVm::actor(&self.vm, addr)?)
    }

    /// Freezes the declared state and records it as the preconditions.
    pub fn commit_preconditions(&mut self) -> BuilderResult<Cid> {
        if self.stage != Stage::Declaring {
            return Err(BuilderError::PreconditionsAlreadyCommitted);
        }
        if self.actors.is_empty() && !self.chaos {
            return Err(BuilderError::EmptyPreconditions);
        }

        self.vm.set_epoch(self.epoch);
        self.vm.set_base_fee(self.base_fee.clone());
        if let Some(supply) = &self.circ_supply {
            self.vm.set_circ_supply(supply.clone());
        }
        let root = ReferenceVm::flush(&mut self.vm)?;
        self.car = self.vm.export_car(&[root])?;
        self.pre = Some(CommittedPre {
            root,
            epoch: self.epoch,
            base_fee: self.base_fee.clone(),
            circ_supply: self.circ_supply.clone(),
        });
        self.stage = Stage::PreconditionsCommitted;
        info!(id = %self.meta.id, %root, actors = self.actors.len(), "preconditions committed");
        Ok(root)
    }

    // ────────────────────────────────────────────────────────────────────────────
    // Applies
    // ────────────────────────────────────────────────────────────────────────────

    /// Sender key for nonce bookkeeping: the ID when resolvable.
    fn sender_key(&self, from: &Address) -> BuilderResult<Address> {
        Ok(self.vm.resolve(from)?.map(Address::new_id).unwrap_or(*from))
    }

    /// Stages an arbitrary message.
    pub fn raw_message(
        &mut self,
        from: Address,
        to: Address,
        method: u64,
        params: Vec<u8>,
        opts: &[MsgOpt],
    ) -> BuilderResult<MessageHandle> {
        self.require("raw_message", &[Stage::PreconditionsCommitted])?;
        let opts = ResolvedOpts::resolve(&self.defaults, opts);
        if opts.epoch.is_some() && self.class != Class::Message {
            return Err(BuilderError::ClassMismatch {
                op: "MsgOpt::Epoch",
                class: self.class,
            });
        }
        if self.class == Class::Tipset && self.current_block().is_none() {
            return Err(BuilderError::NoBlockStaged);
        }

        let key = self.sender_key(&from)?;
        let used = self.nonces.entry(key).or_default();
        let nonce = match opts.nonce {
            Some(n) if used.contains(&n) => {
                return Err(BuilderError::NonceReuse {
                    sender: from,
                    nonce: n,
                })
            }
            Some(n) => n,
            None => used.last().map_or(0, |n| n + 1),
        };
        used.insert(nonce);

        let message = Message {
            version: MESSAGE_VERSION,
            to,
            from,
            nonce,
            value: opts.value,
            gas_limit: opts.gas_limit,
            gas_fee_cap: opts.gas_fee_cap,
            gas_premium: opts.gas_premium,
            method,
            params,
        };
        debug!(id = %self.meta.id, %from, %to, method, nonce, "message staged");

        let index = self.messages.len();
        self.messages.push(ApplicableMessage {
            message,
            epoch: opts.epoch,
            base_fee: BigInt::default(),
            result: None,
        });
        if let Some(block) = self.current_block() {
            block.messages.push(index);
        }
        Ok(MessageHandle(index))
    }

    /// Value transfer; set the amount with `MsgOpt::Value`.
    pub fn transfer(
        &mut self,
        from: Address,
        to: Address,
        opts: &[MsgOpt],
    ) -> BuilderResult<MessageHandle> {
        self.raw_message(from, to, METHOD_SEND, Vec::new(), opts)
    }

    /// Exec of a payment channel from `from` to `to` through the init actor.
    pub fn create_paych_actor(
        &mut self,
        from: Address,
        to: Address,
        opts: &[MsgOpt],
    ) -> BuilderResult<MessageHandle> {
        let params = encoding::to_vec(&ExecParams {
            code_cid: ActorKind::PaymentChannel.code_cid(),
            constructor_params: encoding::to_vec(&PaychConstructorParams { from, to })?,
        })?;
        self.raw_message(from, INIT_ACTOR_ADDR, METHOD_EXEC, params, opts)
    }

    pub fn chaos_caller_validation(
        &mut self,
        from: Address,
        branch: u64,
        opts: &[MsgOpt],
    ) -> BuilderResult<MessageHandle> {
        let params = encoding::to_vec(&branch)?;
        self.raw_message(from, CHAOS_ACTOR_ADDR, METHOD_CALLER_VALIDATION, params, opts)
    }

    pub fn chaos_create_actor(
        &mut self,
        from: Address,
        args: &CreateActorArgs,
        opts: &[MsgOpt],
    ) -> BuilderResult<MessageHandle> {
        let params = encoding::to_vec(args)?;
        self.raw_message(from, CHAOS_ACTOR_ADDR, METHOD_CREATE_ACTOR, params, opts)
    }

    pub fn chaos_get_randomness(
        &mut self,
        from: Address,
        args: &GetRandomnessArgs,
        opts: &[MsgOpt],
    ) -> BuilderResult<MessageHandle> {
        let params = encoding::to_vec(args)?;
        self.raw_message(from, CHAOS_ACTOR_ADDR, METHOD_GET_RANDOMNESS, params, opts)
    }

    /// Mutable access to a staged message, for deliberately malformed
    /// inputs.
    ///
    /// Edits bypass the per-sender nonce bookkeeping: a nonce rewritten here
    /// is never checked for [`BuilderError::NonceReuse`] and does not move the
    /// next automatic nonce. Duplicates and gaps produced this way are the
    /// caller's to intend.
    pub fn message_mut(&mut self, handle: MessageHandle) -> BuilderResult<&mut Message> {
        self.require("message_mut", &[Stage::PreconditionsCommitted])?;
        self.messages
            .get_mut(handle.0)
            .map(|am| &mut am.message)
            .ok_or(BuilderError::UnknownMessage(handle.0))
    }

    pub fn applicable(&self, handle: MessageHandle) -> BuilderResult<&ApplicableMessage> {
        self.messages
            .get(handle.0)
            .ok_or(BuilderError::UnknownMessage(handle.0))
    }

    /// Staged messages in application order.
    pub fn messages(&self) -> &[ApplicableMessage] {
        &self.messages
    }

    /// Opens a new tipset; following blocks belong to it.
    pub fn stage_tipset(&mut self, epoch: i64, base_fee: BigInt) -> BuilderResult<()> {
        self.require("stage_tipset", &[Stage::PreconditionsCommitted])?;
        self.require_class("stage_tipset", Class::Tipset)?;
        self.tipsets.push(StagedTipset {
            epoch,
            base_fee,
            blocks: Vec::new(),
        });
        Ok(())
    }

    /// Opens a block mined by `miner` in the current tipset; following
    /// messages belong to it.
    pub fn stage_block(&mut self, miner: Address, win_count: i64) -> BuilderResult<()> {
        self.require("stage_block", &[Stage::PreconditionsCommitted])?;
        self.require_class("stage_block", Class::Tipset)?;
        let tipset = self.tipsets.last_mut().ok_or(BuilderError::NoBlockStaged)?;
        tipset.blocks.push(StagedBlock {
            miner,
            win_count,
            messages: Vec::new(),
        });
        Ok(())
    }

    fn current_block(&mut self) -> Option<&mut StagedBlock> {
        self.tipsets.last_mut().and_then(|t| t.blocks.last_mut())
    }

    /// Runs every staged message through the VM and records the outcome.
    pub fn commit_applies(&mut self) -> BuilderResult<Cid> {
        self.require("commit_applies", &[Stage::PreconditionsCommitted])?;
        let pre_epoch = self.pre.as_ref().map_or(self.epoch, |p| p.epoch);
        self.vm
            .set_rand(Box::new(ReplayingRand::new(self.randomness.clone())));

        let mut receipts = Vec::with_capacity(self.messages.len());
        let mut failures = Vec::new();
        let mut receipts_roots = Vec::new();

        match self.class {
            Class::Tipset => {
                for ts in &self.tipsets {
                    let blocks: Vec<TipsetBlock> = ts
                        .blocks
                        .iter()
                        .map(|b| TipsetBlock {
                            miner: b.miner,
                            win_count: b.win_count,
                            messages: b
                                .messages
                                .iter()
                                .map(|i| self.messages[*i].message.clone())
                                .collect(),
                        })
                        .collect();
                    let ret = self.vm.apply_tipset(ts.epoch, ts.base_fee.clone(), &blocks)?;

                    // Pair results with staged messages, skipping duplicates
                    // the same way the VM does.
                    let mut seen = BTreeSet::new();
                    let mut results = ret.applied.into_iter();
                    for index in ts.blocks.iter().flat_map(|b| b.messages.iter()) {
                        let am = &mut self.messages[*index];
                        if !seen.insert(am.message.cid()?) {
                            continue;
                        }
                        am.base_fee = ts.base_fee.clone();
                        if let Some(result) = results.next() {
                            receipts.push(Some(result.receipt.to_schema()));
                            am.result = Some(result);
                        }
                    }
                    receipts_roots.push(ret.receipts_root);
                }
            }
            _ => {
                for (index, am) in self.messages.iter_mut().enumerate() {
                    self.vm.set_epoch(am.epoch.unwrap_or(pre_epoch));
                    am.base_fee = self.vm.base_fee().clone();
                    match ReferenceVm::apply_message(&mut self.vm, &am.message) {
                        Ok(ret) => {
                            receipts.push(Some(ret.receipt.to_schema()));
                            am.result = Some(ret);
                        }
                        Err(VmError::Fatal(reason)) => {
                            warn!(id = %self.meta.id, index, %reason, "message failed to apply");
                            failures.push(index);
                            receipts.push(None);
                        }
                        Err(other) => return Err(other.into()),
                    }
                }
            }
        }

        let root = ReferenceVm::flush(&mut self.vm)?;
        self.post = Some(CommittedPost {
            root,
            receipts,
            failures,
            receipts_roots,
        });
        self.stage = Stage::ApplyCommitted;
        info!(id = %self.meta.id, %root, messages = self.messages.len(), "applies committed");
        Ok(root)
    }

    // ────────────────────────────────────────────────────────────────────────────
    // Assertions and emission
    // ────────────────────────────────────────────────────────────────────────────

    /// Assertion engine over the committed outcome.
    pub fn assert(&self) -> BuilderResult<Asserter<'_>> {
        self.require("assert", &[Stage::ApplyCommitted])?;
        Ok(Asserter::new(self))
    }

    pub fn pre_root(&self) -> Option<Cid> {
        self.pre.as_ref().map(|p| p.root)
    }

    pub fn post_root(&self) -> Option<Cid> {
        self.post.as_ref().map(|p| p.root)
    }

    /// Seals the builder and returns the finished record.
    pub fn finish(&mut self) -> BuilderResult<TestVector> {
        self.require("finish", &[Stage::ApplyCommitted])?;
        let (Some(pre), Some(post)) = (&self.pre, &self.post) else {
            return Err(BuilderError::StageViolation {
                op: "finish",
                stage: self.stage,
            });
        };

        let encode =
            |am: &ApplicableMessage| -> BuilderResult<Vec<u8>> { Ok(am.message.encode()?) };
        let mut apply_messages = Vec::new();
        let mut apply_tipsets = Vec::new();
        match self.class {
            Class::Tipset => {
                for ts in &self.tipsets {
                    let mut blocks = Vec::with_capacity(ts.blocks.len());
                    for b in &ts.blocks {
                        let messages = b
                            .messages
                            .iter()
                            .map(|i| encode(&self.messages[*i]).map(Base64Bytes::from))
                            .collect::<BuilderResult<Vec<Base64Bytes>>>()?;
                        blocks.push(Block {
                            miner_addr: b.miner,
                            win_count: b.win_count,
                            messages,
                        });
                    }
                    apply_tipsets.push(Tipset {
                        epoch: ts.epoch,
                        base_fee: ts.base_fee.clone(),
                        blocks,
                    });
                }
            }
            _ => {
                for am in &self.messages {
                    apply_messages.push(ApplyMessage {
                        bytes: encode(am)?.into(),
                        epoch: am.epoch,
                    });
                }
            }
        }

        let vector = TestVector {
            class: self.class,
            selector: self.options.selector.clone(),
            hints: self.options.hints.clone(),
            meta: Some(self.meta.clone()),
            car: self.car.clone().into(),
            randomness: self.randomness.clone(),
            pre: Preconditions {
                epoch: pre.epoch,
                state_tree: Some(tvx_schema::StateTree { root_cid: pre.root }),
                base_fee: Some(pre.base_fee.clone()),
                circ_supply: pre.circ_supply.clone(),
            },
            apply_messages,
            apply_tipsets,
            post: Postconditions {
                apply_message_failures: post.failures.clone(),
                state_tree: tvx_schema::StateTree { root_cid: post.root },
                receipts: post.receipts.clone(),
                receipts_roots: post.receipts_roots.clone(),
            },
            diagnostics: None,
        };
        vector.validate()?;

        self.stage = Stage::Asserted;
        info!(id = %self.meta.id, "vector finished");
        Ok(vector)
    }
}
