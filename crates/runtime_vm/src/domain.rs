//! # Domain-Separated SHA3-256 Derivations
//!
//! Every identifier the VM derives from other data is hashed under its own
//! prefix, so equal inputs in different roles never collide.
//!
//! | Function | Prefix | Produces |
//! |----------|--------|----------|
//! | [`actor_code_cid`] | `tvx:actor_code:v1:` | code CID of a built-in actor |
//! | [`actor_address_seed`] | `tvx:actor_addr:v1:` | seed of a `t2` address for a created actor |
//!
//! Prefixes are part of the recorded outcome: changing one changes the code
//! CIDs in every snapshot.

use sha3::{Digest, Sha3_256};
use tvx_schema::{Address, Cid};

const ACTOR_CODE_PREFIX: &[u8] = b"tvx:actor_code:v1:";

const ACTOR_ADDR_PREFIX: &[u8] = b"tvx:actor_addr:v1:";

fn domain_hash(prefix: &[u8], parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha3_256::new();
    hasher.update(prefix);
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Code CID of the built-in actor called `name`.
#[must_use]
pub fn actor_code_cid(name: &str) -> Cid {
    Cid::from_digest(domain_hash(ACTOR_CODE_PREFIX, &[name.as_bytes()]))
}

/// Seed for the robust address of the `created`-th actor created by the
/// message `origin` sent with `nonce`.
#[must_use]
pub fn actor_address_seed(origin: &Address, nonce: u64, created: u64) -> [u8; 32] {
    domain_hash(
        ACTOR_ADDR_PREFIX,
        &[&origin.to_bytes()[..], &nonce.to_be_bytes()[..], &created.to_be_bytes()[..]],
    )
}
