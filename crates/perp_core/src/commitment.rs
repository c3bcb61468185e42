//! Commitments and identities
//!
//! A `Commitment` is an opaque 32-byte digest. The only things the protocol
//! does with one are compare it and feed it into another hash.

use core::fmt;
use sha2::{Digest, Sha256};

/// Domain separation for record commitments
const RECORD_TAG: u8 = 0x00;
/// Domain separation for interior tree nodes
const NODE_TAG: u8 = 0x01;

/// Opaque hash value used for leaves, interior nodes and roots
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Commitment(pub [u8; 32]);

/// Value of an unoccupied slot
pub const EMPTY_SLOT: Commitment = Commitment([0u8; 32]);

impl Commitment {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Commitment(bytes)
    }

    pub fn is_empty_slot(&self) -> bool {
        *self == EMPTY_SLOT
    }

    /// One-way combine of two children into their parent node
    pub fn combine(left: &Commitment, right: &Commitment) -> Commitment {
        let mut hasher = Sha256::new();
        hasher.update([NODE_TAG]);
        hasher.update(left.0);
        hasher.update(right.0);
        Commitment(hasher.finalize().into())
    }

    /// One-way combine of a record's encoded fields, in caller order
    pub(crate) fn of_fields(fields: &[&[u8]]) -> Commitment {
        let mut hasher = Sha256::new();
        hasher.update([RECORD_TAG]);
        for field in fields {
            hasher.update(*field);
        }
        Commitment(hasher.finalize().into())
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0.iter() {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Commitment({})", self)
    }
}

/// Authenticated principal (public key or equivalent)
///
/// Supplied by the harness after signature checks; never derived here.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Owner(pub [u8; 32]);

impl Owner {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Owner(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}
