//! # Deterministic Binary Merkle Tree
//!
//! Commits to the ordered receipts of a tipset.
//!
//! ## Algorithm
//!
//! - No leaves → `[0u8; 32]`
//! - Leaf: `SHA3-256(leaf_bytes)`
//! - Parent: `SHA3-256(left || right)`
//! - Odd node count: duplicate last node
//!
//! Leaf order is significant: the same receipts in a different order
//! produce a different root.

use sha3::{Digest, Sha3_256};

fn sha3(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha3_256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Computes the binary Merkle root over `leaves`.
#[must_use]
pub fn compute_merkle_root(leaves: &[Vec<u8>]) -> [u8; 32] {
    if leaves.is_empty() {
        return [0u8; 32];
    }

    let mut nodes: Vec<[u8; 32]> = leaves.iter().map(|leaf| sha3(&[leaf.as_slice()])).collect();

    while nodes.len() > 1 {
        if nodes.len() % 2 != 0 {
            let last = nodes[nodes.len() - 1];
            nodes.push(last);
        }
        nodes = nodes
            .chunks_exact(2)
            .map(|pair| sha3(&[&pair[0][..], &pair[1][..]]))
            .collect();
    }

    nodes[0]
}

// ════════════════════════════════════════════════════════════════════════════════
// TESTS
// ════════════════════════════════════════════════════════════════════════════════
