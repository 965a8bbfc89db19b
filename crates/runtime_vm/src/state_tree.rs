//! # State Tree
//!
//! Maps actor IDs to [`ActorState`]. Non-ID addresses resolve through the
//! init actor's address map.
//!
//! ## Root Block
//!
//! ```text
//! StateRoot {
//!     version: u32,                    // STATE_TREE_VERSION
//!     actors:  Vec<(u64, ActorState)>, // ascending actor id
//! }
//! ```
//!
//! The root CID is the CID of that block. Actor state heads are separate
//! blocks in the same store. Identical trees always flush to the same root.

use std::collections::BTreeMap;

use num_bigint::BigInt;
use serde::{Deserialize, Serialize};
use tvx_schema::{Address, Cid};

use crate::actors::init::InitState;
use crate::actors::INIT_ACTOR_ID;
use crate::blockstore::MemoryBlockstore;
use crate::error::{VmError, VmResult};

pub const STATE_TREE_VERSION: u32 = 1;

/// On-chain record of one actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorState {
    /// Code CID selecting the actor implementation.
    pub code: Cid,
    /// CID of the actor's state block.
    pub head: Cid,
    /// Next expected message nonce (accounts only).
    pub nonce: u64,
    pub balance: BigInt,
}

#[derive(Debug, Serialize, Deserialize)]
struct StateRoot {
    version: u32,
    actors: Vec<(u64, ActorState)>,
}

/// In-memory actor table. Cloning is the rollback mechanism.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateTree {
    actors: BTreeMap<u64, ActorState>,
}

impl StateTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the tree flushed at `root`.
    pub fn load(store: &MemoryBlockstore, root: &Cid) -> VmResult<Self> {
        let decoded: StateRoot = store.get_obj(root)?;
        if decoded.version != STATE_TREE_VERSION {
            return Err(VmError::InvalidCar(format!(
                "unsupported state tree version {}",
                decoded.version
            )));
        }
        Ok(Self {
            actors: decoded.actors.into_iter().collect(),
        })
    }

    /// Writes the root block and returns its CID.
    pub fn flush(&self, store: &mut MemoryBlockstore) -> VmResult<Cid> {
        let root = StateRoot {
            version: STATE_TREE_VERSION,
            actors: self.actors.iter().map(|(id, a)| (*id, a.clone())).collect(),
        };
        store.put_obj(&root)
    }

    pub fn get_actor(&self, id: u64) -> Option<&ActorState> {
        self.actors.get(&id)
    }

    pub fn get_actor_mut(&mut self, id: u64) -> Option<&mut ActorState> {
        self.actors.get_mut(&id)
    }

    pub fn set_actor(&mut self, id: u64, actor: ActorState) {
        self.actors.insert(id, actor);
    }

    pub fn contains(&self, id: u64) -> bool {
        self.actors.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&u64, &ActorState)> {
        self.actors.iter()
    }

    /// Decoded state of the init actor.
    pub fn init_state(&self, store: &MemoryBlockstore) -> VmResult<InitState> {
        let init = self
            .get_actor(INIT_ACTOR_ID)
            .ok_or(VmError::ActorNotFound(Address::new_id(INIT_ACTOR_ID)))?;
        store.get_obj(&init.head)
    }

    /// ID of the existing actor behind `addr`, if any.
    pub fn lookup_id(&self, store: &MemoryBlockstore, addr: &Address) -> VmResult<Option<u64>> {
        if let Some(id) = addr.id() {
            return Ok(self.contains(id).then_some(id));
        }
        if !self.contains(INIT_ACTOR_ID) {
            return Ok(None);
        }
        let init = self.init_state(store)?;
        Ok(init
            .resolve(addr)
            .filter(|id| self.contains(*id)))
    }
}
