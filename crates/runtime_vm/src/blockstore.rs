//! Content-addressed block storage.
//!
//! Blocks are keyed by their [`Cid`] and kept in a `BTreeMap`, so iteration
//! order (and every export) is deterministic. The store is append-only: a
//! rolled back state transition leaves its blocks behind unreferenced.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tvx_schema::Cid;

use crate::encoding;
use crate::error::{VmError, VmResult};

#[derive(Debug, Clone, Default)]
pub struct MemoryBlockstore {
    blocks: BTreeMap<Cid, Vec<u8>>,
}

impl MemoryBlockstore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `block` and returns its CID.
    pub fn put(&mut self, block: Vec<u8>) -> Cid {
        let cid = Cid::of(&block);
        self.blocks.entry(cid).or_insert(block);
        cid
    }

    /// Stores a block under a caller-provided CID after verifying it.
    pub fn put_verified(&mut self, cid: Cid, block: Vec<u8>) -> VmResult<()> {
        if Cid::of(&block) != cid {
            return Err(VmError::InvalidCar(format!("block does not hash to {cid}")));
        }
        self.blocks.insert(cid, block);
        Ok(())
    }

    pub fn get(&self, cid: &Cid) -> Option<&[u8]> {
        self.blocks.get(cid).map(Vec::as_slice)
    }

    pub fn has(&self, cid: &Cid) -> bool {
        self.blocks.contains_key(cid)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Encodes `value` and stores it.
    pub fn put_obj<T: Serialize>(&mut self, value: &T) -> VmResult<Cid> {
        Ok(self.put(encoding::to_vec(value)?))
    }

    /// Loads and decodes the block at `cid`.
    pub fn get_obj<T: DeserializeOwned>(&self, cid: &Cid) -> VmResult<T> {
        let block = self.get(cid).ok_or(VmError::MissingBlock(*cid))?;
        encoding::from_slice(block)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Cid, &Vec<u8>)> {
        self.blocks.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_roundtrip() {
        let mut bs = MemoryBlockstore::new();
        let cid = bs.put(b"hello".to_vec());
        assert_eq!(bs.get(&cid), Some(&b"hello"[..]));
        assert_eq!(bs.put(b"hello".to_vec()), cid);
        assert_eq!(bs.len(), 1);
    }

    #[test]
    fn test_put_verified_rejects_wrong_cid() {
        let mut bs = MemoryBlockstore::new();
        let err = bs.put_verified(Cid::of(b"a"), b"b".to_vec());
        assert!(matches!(err, Err(VmError::InvalidCar(_))));
    }

    #[test]
    fn test_missing_object() {
        let bs = MemoryBlockstore::new();
        let res: VmResult<u64> = bs.get_obj(&Cid::of(b"nothing"));
        assert!(matches!(res, Err(VmError::MissingBlock(_))));
    }
}
