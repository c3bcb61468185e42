//! In-memory full sparse Merkle tree
//!
//! Holds every occupied leaf, so it can hand out witnesses and recompute the
//! root from scratch. The harness uses it to play the chain's side of the
//! protocol; tests use it as an exhaustive stand-in for `SparsePathStore`.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::commitment::{Commitment, EMPTY_SLOT};
use crate::store::{empty_subtree_roots, AuthenticatedStore, SlotKey, SlotWitness, TREE_DEPTH};
use crate::Result;

#[derive(Clone, Debug)]
pub struct MerkleMap {
    /// Occupied slots only; an absent key is `EMPTY_SLOT`
    leaves: BTreeMap<SlotKey, Commitment>,
    /// Empty subtree root per height
    empty: Vec<Commitment>,
}

impl Default for MerkleMap {
    fn default() -> Self {
        Self::new()
    }
}

impl MerkleMap {
    pub fn new() -> Self {
        MerkleMap {
            leaves: BTreeMap::new(),
            empty: empty_subtree_roots(),
        }
    }

    /// Value in a slot (`EMPTY_SLOT` if unoccupied)
    pub fn get(&self, key: &SlotKey) -> Commitment {
        self.leaves.get(key).copied().unwrap_or(EMPTY_SLOT)
    }

    /// Write a slot; writing `EMPTY_SLOT` frees it
    pub fn set(&mut self, key: SlotKey, value: Commitment) {
        if value.is_empty_slot() {
            self.leaves.remove(&key);
        } else {
            self.leaves.insert(key, value);
        }
    }

    /// Number of occupied slots
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Root over all leaves, computed from scratch
    pub fn root(&self) -> Commitment {
        let entries = self.entries();
        self.subtree_root(&entries, 0)
    }

    /// Sibling path for `key` against the current root
    pub fn witness(&self, key: &SlotKey) -> SlotWitness {
        let entries = self.entries();
        let mut remaining: &[(SlotKey, Commitment)] = &entries;
        let mut siblings = Vec::with_capacity(TREE_DEPTH);

        for depth in 0..TREE_DEPTH {
            let split = remaining.partition_point(|(k, _)| !k.bit(depth));
            let (left, right) = remaining.split_at(split);
            if key.bit(depth) {
                siblings.push(self.subtree_root(left, depth + 1));
                remaining = right;
            } else {
                siblings.push(self.subtree_root(right, depth + 1));
                remaining = left;
            }
        }

        // Collected root-down; witnesses are leaf-first
        siblings.reverse();
        SlotWitness::new(*key, siblings)
    }

    fn entries(&self) -> Vec<(SlotKey, Commitment)> {
        self.leaves.iter().map(|(k, v)| (*k, *v)).collect()
    }

    /// Root of the subtree at `depth` bits below the root containing `entries`
    ///
    /// `entries` must be sorted and share their first `depth` key bits.
    fn subtree_root(&self, entries: &[(SlotKey, Commitment)], depth: usize) -> Commitment {
        if entries.is_empty() {
            return self.empty[TREE_DEPTH - depth];
        }
        if depth == TREE_DEPTH {
            return entries[0].1;
        }
        let split = entries.partition_point(|(k, _)| !k.bit(depth));
        let left = self.subtree_root(&entries[..split], depth + 1);
        let right = self.subtree_root(&entries[split..], depth + 1);
        Commitment::combine(&left, &right)
    }
}

/// Full-tree verification: the witness is just the key, and every root is
/// rebuilt from the complete leaf set.
impl AuthenticatedStore for MerkleMap {
    type Witness = SlotKey;

    fn root_for(&self, key: &SlotKey, value: &Commitment) -> Result<Commitment> {
        let mut scratch = self.clone();
        scratch.set(*key, *value);
        Ok(scratch.root())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{empty_root, SparsePathStore};

    fn key(first: u8, last: u8) -> SlotKey {
        let mut bytes = [0u8; 32];
        bytes[0] = first;
        bytes[31] = last;
        SlotKey(bytes)
    }

    #[test]
    fn test_empty_map_root() {
        assert_eq!(MerkleMap::new().root(), empty_root());
    }

    #[test]
    fn test_witness_matches_root_for_every_leaf() {
        let mut map = MerkleMap::new();
        let keys = [key(0x00, 1), key(0x00, 2), key(0x80, 0), key(0xff, 0xff)];
        for (i, k) in keys.iter().enumerate() {
            map.set(*k, Commitment([i as u8 + 1; 32]));
        }

        let root = map.root();
        for k in keys.iter() {
            let w = map.witness(k);
            assert_eq!(w.root_for(&map.get(k)).unwrap(), root);
        }

        // Non-member slots prove emptiness too
        let absent = key(0x40, 0);
        assert_eq!(map.witness(&absent).root_for(&EMPTY_SLOT).unwrap(), root);
    }

    #[test]
    fn test_set_empty_frees_slot() {
        let mut map = MerkleMap::new();
        let k = key(0x12, 0x34);
        map.set(k, Commitment([5u8; 32]));
        assert_eq!(map.len(), 1);
        map.set(k, EMPTY_SLOT);
        assert!(map.is_empty());
        assert_eq!(map.root(), empty_root());
    }

    #[test]
    fn test_full_tree_agrees_with_sparse_path() {
        let mut map = MerkleMap::new();
        map.set(key(0x01, 0), Commitment([1u8; 32]));
        map.set(key(0xf0, 9), Commitment([2u8; 32]));

        let target = key(0x70, 3);
        let value = Commitment([3u8; 32]);
        let root = map.root();

        let via_path = SparsePathStore
            .verify_and_recompute(&root, &map.witness(&target), &EMPTY_SLOT, &value)
            .unwrap();
        let via_full = map
            .verify_and_recompute(&root, &target, &EMPTY_SLOT, &value)
            .unwrap();
        assert_eq!(via_path, via_full);
    }
}
