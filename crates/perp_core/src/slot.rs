//! Slot key derivation strategies
//!
//! Transitions never look at which slot a witness addresses. Whoever builds
//! witnesses has to pick keys so that distinct positions never share one,
//! and that policy is injected here instead of being fixed by the core.

use sha2::{Digest, Sha256};

use crate::commitment::Owner;
use crate::store::SlotKey;

/// Domain separation for derived slot keys
const SLOT_TAG: &[u8] = b"perp-slot-v1";

/// Maps (owner, per-owner nonce) to a tree slot
pub trait SlotDerivation {
    fn derive(&self, owner: &Owner, nonce: u64) -> SlotKey;
}

/// `sha256(tag || owner || nonce_be)`
///
/// Keys are deterministic and collision-resistant as long as each owner
/// never reuses a nonce.
#[derive(Clone, Copy, Debug, Default)]
pub struct OwnerNonceSlots;

impl SlotDerivation for OwnerNonceSlots {
    fn derive(&self, owner: &Owner, nonce: u64) -> SlotKey {
        let mut hasher = Sha256::new();
        hasher.update(SLOT_TAG);
        hasher.update(owner.as_bytes());
        hasher.update(nonce.to_be_bytes());
        SlotKey(hasher.finalize().into())
    }
}

/// Slot fixed by the caller, ignoring owner and nonce
///
/// Reproduces a harness that lets every caller name its own slot.
#[derive(Clone, Copy, Debug, Default)]
pub struct CallerChosenSlots(pub SlotKey);

impl SlotDerivation for CallerChosenSlots {
    fn derive(&self, _owner: &Owner, _nonce: u64) -> SlotKey {
        self.0
    }
}
