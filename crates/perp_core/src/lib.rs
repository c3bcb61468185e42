//! Perpetual State Core - pure transition logic for a leveraged perp pool
//!
//! The whole protocol state is the pair `(positions_root, liquidity)`:
//! - `positions_root` commits to every open position as one sparse Merkle root
//! - `liquidity` is the collateral pool backing trader PnL
//!
//! Callers prove one-slot updates to the root with a witness sized to the
//! tree depth, never to the number of positions. Nothing here touches the
//! network, a wallet or a clock: every operation is a total function from
//! the current state to the next state or a `PerpError`.
//!
//! This crate is no_std compatible (needs `alloc` for witness paths).

#![no_std]
#![forbid(unsafe_code)]

#[cfg(kani)]
extern crate kani;

extern crate alloc;

use core::fmt;

pub mod commitment;
pub mod math;
pub mod merkle_map;
pub mod pool;
pub mod position;
pub mod slot;
pub mod store;
pub mod transitions;

// Re-export commonly used types
pub use commitment::{Commitment, Owner, EMPTY_SLOT};
pub use merkle_map::MerkleMap;
pub use pool::LiquidityPool;
pub use position::PositionRecord;
pub use slot::{CallerChosenSlots, OwnerNonceSlots, SlotDerivation};
pub use store::{AuthenticatedStore, SlotKey, SlotWitness, SparsePathStore, TREE_DEPTH};
pub use transitions::{CloseOutcome, OpenOrder, OpenOutcome, PerpState, Perpetual};

/// Economic quantity (collateral, size, price, liquidity)
pub type Amount = u64;

/// Maximum notional-to-collateral ratio accepted at open
pub const MAX_LEVERAGE: Amount = 100;

/// Error types for state transitions
///
/// Every variant is a deterministic precondition failure: the state passed
/// in is left untouched and nothing is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerpError {
    /// Requested size exceeds `MAX_LEVERAGE` times the collateral
    LeverageExceeded,
    /// Witness does not reproduce the committed root for the claimed value
    InconsistentWitness,
    /// Caller is not the position owner
    NotOwner,
    /// Position record is already marked closed
    PositionAlreadyClosed,
    /// Amount arithmetic exceeded u64
    Overflow,
    /// PnL division by a zero entry price
    DivisionByZero,
}

impl fmt::Display for PerpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            PerpError::LeverageExceeded => "position size exceeds maximum leverage",
            PerpError::InconsistentWitness => "witness is inconsistent with the committed root",
            PerpError::NotOwner => "caller does not own the position",
            PerpError::PositionAlreadyClosed => "position is already closed",
            PerpError::Overflow => "amount arithmetic overflow",
            PerpError::DivisionByZero => "entry price is zero",
        };
        f.write_str(msg)
    }
}

/// Result type for state transitions
pub type Result<T> = core::result::Result<T, PerpError>;
