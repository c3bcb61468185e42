//! Checked Amount arithmetic for leverage and PnL settlement
//!
//! All helpers are total: overflow is reported as `PerpError::Overflow`,
//! never wrapped and never trapped.

use crate::{Amount, PerpError, Result, MAX_LEVERAGE};

/// Checked addition
#[inline]
pub fn add(a: Amount, b: Amount) -> Result<Amount> {
    a.checked_add(b).ok_or(PerpError::Overflow)
}

/// Checked multiplication
#[inline]
pub fn mul(a: Amount, b: Amount) -> Result<Amount> {
    a.checked_mul(b).ok_or(PerpError::Overflow)
}

/// Largest size a position with this collateral may carry
///
/// `collateral * MAX_LEVERAGE`, checked.
#[inline]
pub fn max_size(collateral: Amount) -> Result<Amount> {
    mul(collateral, MAX_LEVERAGE)
}

/// Absolute price difference as `max - min`
///
/// Never subtracts in the direction that could underflow.
#[inline]
pub fn price_diff(a: Amount, b: Amount) -> Amount {
    let (hi, lo) = if a > b { (a, b) } else { (b, a) };
    hi - lo
}

/// Whether closing at `close_price` is a gain for the position side
///
/// Equal prices are a gain for neither side.
#[inline]
pub fn is_profit(is_long: bool, entry_price: Amount, close_price: Amount) -> bool {
    if is_long {
        close_price > entry_price
    } else {
        entry_price > close_price
    }
}

/// PnL magnitude: `price_diff * size / entry_price`, truncating
///
/// # Errors
/// * `DivisionByZero` if `entry_price == 0` (checked before anything else)
/// * `Overflow` if `price_diff * size` does not fit an Amount
pub fn pnl_amount(price_diff: Amount, size: Amount, entry_price: Amount) -> Result<Amount> {
    if entry_price == 0 {
        return Err(PerpError::DivisionByZero);
    }
    let notional_move = mul(price_diff, size)?;
    Ok(notional_move / entry_price)
}

/// Amount returned to the trader at close
///
/// - Profit: `collateral + pnl` (checked)
/// - Loss: `collateral - pnl`, floored at zero
pub fn settle_payout(collateral: Amount, pnl: Amount, profit: bool) -> Result<Amount> {
    if profit {
        add(collateral, pnl)
    } else if pnl > collateral {
        Ok(0)
    } else {
        Ok(collateral - pnl)
    }
}
