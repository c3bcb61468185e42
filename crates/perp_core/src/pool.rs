//! Liquidity pool backing trader PnL

use crate::math;
use crate::{Amount, Result};

/// Collateral held by the protocol
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct LiquidityPool {
    pub liquidity: Amount,
}

impl LiquidityPool {
    /// Pool at system initialization
    pub const fn empty() -> Self {
        LiquidityPool { liquidity: 0 }
    }

    pub const fn new(liquidity: Amount) -> Self {
        LiquidityPool { liquidity }
    }

    /// `liquidity + amount`, `Overflow` past u64
    pub fn add(self, amount: Amount) -> Result<Self> {
        Ok(LiquidityPool {
            liquidity: math::add(self.liquidity, amount)?,
        })
    }
}
