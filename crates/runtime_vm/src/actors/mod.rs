//! # Built-in Actors
//!
//! | Actor | Address | Singleton | Methods |
//! |-------|---------|-----------|---------|
//! | system | `t00` | yes | Constructor |
//! | init | `t01` | yes | Constructor, Exec |
//! | reward | `t02` | yes | Constructor |
//! | chaos | `t098` | yes | Constructor (fatal), CallerValidation, CreateActor, GetRandomness |
//! | burnt funds | `t099` | account code | as account |
//! | account | allocated | no | Constructor, PubkeyAddress |
//! | payment channel | allocated | no | Constructor |
//!
//! Each actor exposes a [`MethodTable`] keyed by method number. Tables are
//! assembled once in [`Registry::builtin`]; registering a method number
//! twice fails there, and dispatching an unknown number aborts with
//! `SysErrInvalidMethod`.

use std::collections::BTreeMap;
use std::fmt;

use tvx_schema::{Address, Cid};

use crate::domain::actor_code_cid;
use crate::error::{ActorError, ActorResult, VmError, VmResult};
use crate::exit_code::ExitCode;
use crate::runtime::Runtime;

pub mod account;
pub mod chaos;
pub mod init;
pub mod paych;
pub mod reward;
pub mod system;

pub const SYSTEM_ACTOR_ID: u64 = 0;
pub const INIT_ACTOR_ID: u64 = 1;
pub const REWARD_ACTOR_ID: u64 = 2;
pub const CHAOS_ACTOR_ID: u64 = 98;
pub const BURNT_FUNDS_ACTOR_ID: u64 = 99;

/// First ID the init actor hands out.
pub const FIRST_NON_SINGLETON_ID: u64 = 100;

pub const SYSTEM_ACTOR_ADDR: Address = Address::new_id(SYSTEM_ACTOR_ID);
pub const INIT_ACTOR_ADDR: Address = Address::new_id(INIT_ACTOR_ID);
pub const REWARD_ACTOR_ADDR: Address = Address::new_id(REWARD_ACTOR_ID);
pub const CHAOS_ACTOR_ADDR: Address = Address::new_id(CHAOS_ACTOR_ID);
pub const BURNT_FUNDS_ACTOR_ADDR: Address = Address::new_id(BURNT_FUNDS_ACTOR_ID);

// ════════════════════════════════════════════════════════════════════════════════
// ACTOR KINDS
// ════════════════════════════════════════════════════════════════════════════════

/// Implementation selected by an actor's code CID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActorKind {
    System,
    Init,
    Reward,
    Account,
    PaymentChannel,
    Chaos,
}

impl ActorKind {
    pub const ALL: [ActorKind; 6] = [
        ActorKind::System,
        ActorKind::Init,
        ActorKind::Reward,
        ActorKind::Account,
        ActorKind::PaymentChannel,
        ActorKind::Chaos,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ActorKind::System => "system",
            ActorKind::Init => "init",
            ActorKind::Reward => "reward",
            ActorKind::Account => "account",
            ActorKind::PaymentChannel => "paymentchannel",
            ActorKind::Chaos => "chaos",
        }
    }

    pub fn code_cid(self) -> Cid {
        actor_code_cid(self.name())
    }

    /// Built-in kind for `code`, `None` for anything else.
    pub fn from_code(code: &Cid) -> Option<ActorKind> {
        ActorKind::ALL.into_iter().find(|k| k.code_cid() == *code)
    }

    /// At most one instance may exist, at a fixed address.
    pub fn is_singleton(self) -> bool {
        matches!(
            self,
            ActorKind::System | ActorKind::Init | ActorKind::Reward | ActorKind::Chaos
        )
    }

    /// Whether messages may originate from actors of this kind.
    pub fn is_principal(self) -> bool {
        self == ActorKind::Account
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// DISPATCH
// ════════════════════════════════════════════════════════════════════════════════

/// Handler of one exported method. Receives the raw params.
pub type MethodFn = fn(&mut Runtime<'_>, &[u8]) -> ActorResult<Vec<u8>>;

/// Method number → handler for one actor.
#[derive(Clone)]
pub struct MethodTable {
    actor: &'static str,
    methods: BTreeMap<u64, (&'static str, MethodFn)>,
}

impl MethodTable {
    pub fn new(actor: &'static str) -> Self {
        Self {
            actor,
            methods: BTreeMap::new(),
        }
    }

    /// Adds a method, rejecting a number that is already taken.
    pub fn register(
        mut self,
        method: u64,
        name: &'static str,
        handler: MethodFn,
    ) -> VmResult<Self> {
        if self.methods.contains_key(&method) {
            return Err(VmError::DuplicateMethod {
                actor: self.actor,
                method,
            });
        }
        self.methods.insert(method, (name, handler));
        Ok(self)
    }

    pub fn lookup(&self, method: u64) -> Option<MethodFn> {
        self.methods.get(&method).map(|(_, handler)| *handler)
    }

    pub fn method_name(&self, method: u64) -> Option<&'static str> {
        self.methods.get(&method).map(|(name, _)| *name)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

impl fmt::Debug for MethodTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.methods.iter().map(|(num, (name, _))| (num, name)))
            .finish()
    }
}

/// Dispatch tables of every built-in actor.
#[derive(Debug, Clone)]
pub struct Registry {
    tables: BTreeMap<ActorKind, MethodTable>,
}

impl Registry {
    pub fn builtin() -> VmResult<Self> {
        let mut tables = BTreeMap::new();
        tables.insert(ActorKind::System, system::methods()?);
        tables.insert(ActorKind::Init, init::methods()?);
        tables.insert(ActorKind::Reward, reward::methods()?);
        tables.insert(ActorKind::Account, account::methods()?);
        tables.insert(ActorKind::PaymentChannel, paych::methods()?);
        tables.insert(ActorKind::Chaos, chaos::methods()?);
        Ok(Self { tables })
    }

    pub fn table(&self, kind: ActorKind) -> Option<&MethodTable> {
        self.tables.get(&kind)
    }

    /// Handler for `method` on `kind`, or a `SysErrInvalidMethod` abort.
    pub fn dispatch(&self, kind: ActorKind, method: u64) -> ActorResult<MethodFn> {
        self.tables
            .get(&kind)
            .and_then(|t| t.lookup(method))
            .ok_or_else(|| {
                ActorError::abort(
                    ExitCode::SYS_ERR_INVALID_METHOD,
                    format!("method {method} not found on {} actor", kind.name()),
                )
            })
    }
}
