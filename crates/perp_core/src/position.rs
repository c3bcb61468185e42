//! Position record and its commitment

use crate::commitment::{Commitment, Owner};
use crate::Amount;

/// One trade, open or closed
///
/// Only `commitment()` is ever stored in the tree. The harness keeps the
/// record itself and presents it again at close.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PositionRecord {
    /// Principal that opened the position
    pub owner: Owner,
    /// Collateral pledged at open
    pub collateral: Amount,
    /// Notional exposure
    pub size: Amount,
    /// Price at open
    pub entry_price: Amount,
    /// true = long, false = short
    pub is_long: bool,
    /// true from creation until closed
    pub is_open: bool,
}

impl PositionRecord {
    /// Fresh open position
    pub fn open(owner: Owner, collateral: Amount, size: Amount, entry_price: Amount, is_long: bool) -> Self {
        PositionRecord {
            owner,
            collateral,
            size,
            entry_price,
            is_long,
            is_open: true,
        }
    }

    /// Hash of all six fields in declaration order
    ///
    /// Amounts are encoded big-endian, flags as a single 0/1 byte.
    pub fn commitment(&self) -> Commitment {
        Commitment::of_fields(&[
            self.owner.as_bytes(),
            &self.collateral.to_be_bytes(),
            &self.size.to_be_bytes(),
            &self.entry_price.to_be_bytes(),
            &[self.is_long as u8],
            &[self.is_open as u8],
        ])
    }
}
