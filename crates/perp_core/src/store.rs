//! Authenticated position store
//!
//! The full position set lives only as a root. A caller proves a one-slot
//! update with a witness: the slot key plus the sibling hash at every level
//! of a fixed-depth sparse Merkle tree.
//!
//! # Protocol
//! `verify_and_recompute(root, w, old, new)`:
//! 1. `root_for(w, old)` must equal `root`, else `InconsistentWitness`
//! 2. returns `root_for(w, new)`
//!
//! Using one witness for both steps is what pins `old` and `new` to the same
//! slot. The store never checks which slot that is: key choice belongs to the
//! caller (see `slot`).

use alloc::vec::Vec;
use log::warn;

use crate::commitment::{Commitment, EMPTY_SLOT};
use crate::{PerpError, Result};

/// Number of key bits, and of siblings in a witness
pub const TREE_DEPTH: usize = 256;

/// Leaf address in the tree (most significant bit picks the root's child)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SlotKey(pub [u8; 32]);

impl SlotKey {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        SlotKey(bytes)
    }

    /// Bit `i` counted from the root (0) down to the leaf (TREE_DEPTH - 1)
    ///
    /// 0 = left child, 1 = right child.
    #[inline]
    pub fn bit(&self, i: usize) -> bool {
        (self.0[i / 8] >> (7 - (i % 8))) & 1 == 1
    }
}

/// Path from one slot to the root
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotWitness {
    /// Slot this witness addresses
    pub key: SlotKey,
    /// Sibling hashes, leaf level first
    pub siblings: Vec<Commitment>,
}

impl SlotWitness {
    pub fn new(key: SlotKey, siblings: Vec<Commitment>) -> Self {
        SlotWitness { key, siblings }
    }

    /// Root of the tree in which this slot holds `value`
    ///
    /// A witness with the wrong number of siblings cannot describe any root
    /// and is rejected as `InconsistentWitness`.
    pub fn root_for(&self, value: &Commitment) -> Result<Commitment> {
        if self.siblings.len() != TREE_DEPTH {
            return Err(PerpError::InconsistentWitness);
        }
        let mut node = *value;
        for (height, sibling) in self.siblings.iter().enumerate() {
            node = if self.key.bit(TREE_DEPTH - 1 - height) {
                Commitment::combine(sibling, &node)
            } else {
                Commitment::combine(&node, sibling)
            };
        }
        Ok(node)
    }
}

/// Root/verify/recompute protocol over a committed set
///
/// Implemented by the stateless production store and by the in-memory full
/// tree, so transitions can run against either.
pub trait AuthenticatedStore {
    /// Caller-supplied proof binding one slot
    type Witness;

    /// Root of the committed set with the witnessed slot holding `value`
    fn root_for(&self, witness: &Self::Witness, value: &Commitment) -> Result<Commitment>;

    /// Check that the witnessed slot holds `value` under `root`
    fn verify_inclusion(&self, root: &Commitment, witness: &Self::Witness, value: &Commitment) -> Result<()> {
        let computed = self.root_for(witness, value)?;
        if computed != *root {
            warn!("witness mismatch: expected root {}, witness gives {}", root, computed);
            return Err(PerpError::InconsistentWitness);
        }
        Ok(())
    }

    /// Prove `old` occupies the slot under `root` and return the root with `new` there
    fn verify_and_recompute(
        &self,
        root: &Commitment,
        witness: &Self::Witness,
        old: &Commitment,
        new: &Commitment,
    ) -> Result<Commitment> {
        self.verify_inclusion(root, witness, old)?;
        self.root_for(witness, new)
    }
}

/// Production store: holds nothing, trusts only the witness path
#[derive(Clone, Copy, Debug, Default)]
pub struct SparsePathStore;

impl AuthenticatedStore for SparsePathStore {
    type Witness = SlotWitness;

    fn root_for(&self, witness: &SlotWitness, value: &Commitment) -> Result<Commitment> {
        witness.root_for(value)
    }
}

/// Roots of all-empty subtrees, indexed by height (0 = a single empty leaf)
pub fn empty_subtree_roots() -> Vec<Commitment> {
    let mut roots = Vec::with_capacity(TREE_DEPTH + 1);
    roots.push(EMPTY_SLOT);
    for height in 0..TREE_DEPTH {
        let below = roots[height];
        roots.push(Commitment::combine(&below, &below));
    }
    roots
}

/// Root of a tree with every slot empty
pub fn empty_root() -> Commitment {
    empty_subtree_roots()[TREE_DEPTH]
}

/// Witness for any slot of an all-empty tree
pub fn empty_witness(key: SlotKey) -> SlotWitness {
    let mut siblings = empty_subtree_roots();
    siblings.truncate(TREE_DEPTH);
    SlotWitness::new(key, siblings)
}
