//! # State Snapshot Archive
//!
//! The `car` field of a vector carries every block the preconditions
//! reference. Layout (bincode, fixed-width integers):
//!
//! ```text
//! CarFile {
//!     version: u64,              // CAR_VERSION
//!     roots:   Vec<Cid>,         // state roots the snapshot was taken for
//!     blocks:  Vec<(Cid, bytes)>,// ascending CID order
//! }
//! ```
//!
//! Import rejects an unknown version, a block whose bytes do not hash to its
//! CID, and a root that is not among the blocks.

use serde::{Deserialize, Serialize};
use tvx_schema::Cid;

use crate::blockstore::MemoryBlockstore;
use crate::encoding;
use crate::error::{VmError, VmResult};

pub const CAR_VERSION: u64 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct CarFile {
    version: u64,
    roots: Vec<Cid>,
    blocks: Vec<(Cid, Vec<u8>)>,
}

/// Serializes `roots` and every block of `store`.
pub fn export_car(store: &MemoryBlockstore, roots: &[Cid]) -> VmResult<Vec<u8>> {
    let car = CarFile {
        version: CAR_VERSION,
        roots: roots.to_vec(),
        blocks: store.iter().map(|(cid, b)| (*cid, b.clone())).collect(),
    };
    encoding::to_vec(&car)
}

/// Loads a snapshot into a fresh blockstore; returns the store and roots.
pub fn import_car(bytes: &[u8]) -> VmResult<(MemoryBlockstore, Vec<Cid>)> {
    let car: CarFile =
        encoding::from_slice(bytes).map_err(|e| VmError::InvalidCar(e.to_string()))?;
    if car.version != CAR_VERSION {
        return Err(VmError::InvalidCar(format!(
            "unsupported version {}",
            car.version
        )));
    }
    let mut store = MemoryBlockstore::new();
    for (cid, block) in car.blocks {
        store.put_verified(cid, block)?;
    }
    for root in &car.roots {
        if !store.has(root) {
            return Err(VmError::InvalidCar(format!("root {root} not in snapshot")));
        }
    }
    Ok((store, car.roots))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_import() {
        let mut store = MemoryBlockstore::new();
        let a = store.put(b"a".to_vec());
        store.put(b"b".to_vec());
        let bytes = export_car(&store, &[a]).expect("export");
        let (back, roots) = import_car(&bytes).expect("import");
        assert_eq!(roots, vec![a]);
        assert_eq!(back.len(), 2);
        assert_eq!(export_car(&back, &roots).expect("re-export"), bytes);
    }

    #[test]
    fn test_tampered_block_rejected() {
        let car = CarFile {
            version: CAR_VERSION,
            roots: vec![],
            blocks: vec![(Cid::of(b"a"), b"not a".to_vec())],
        };
        let bytes = encoding::to_vec(&car).expect("encode");
        assert!(matches!(import_car(&bytes), Err(VmError::InvalidCar(_))));
    }

    #[test]
    fn test_missing_root_rejected() {
        let store = MemoryBlockstore::new();
        let bytes = export_car(&store, &[Cid::of(b"ghost")]).expect("export");
        assert!(import_car(&bytes).is_err());
        assert!(import_car(b"").is_err());
    }
}
