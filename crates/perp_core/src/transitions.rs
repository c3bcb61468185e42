//! State transitions
//!
//! The protocol state is the explicit pair `PerpState { positions_root, pool }`.
//! Every operation takes the current pair by value and returns the next one;
//! on error the caller still holds the old pair, so there is never a partial
//! update.
//!
//! # Operations
//! - `init_state`: point the root at a caller-supplied commitment
//! - `deposit`: add to the pool
//! - `open_position`: leverage check, insert record into an empty slot, add collateral to the pool
//! - `close_position`: ownership/status/inclusion checks, settle payout, free the slot
//!
//! `close_position` computes the trader payout but leaves the pool untouched.
//! `CloseOutcome` carries the payout and the pool before/after separately so
//! a settlement layer can reconcile them.

use log::{debug, warn};

use crate::commitment::{Commitment, Owner, EMPTY_SLOT};
use crate::math;
use crate::pool::LiquidityPool;
use crate::position::PositionRecord;
use crate::store::AuthenticatedStore;
use crate::{Amount, PerpError, Result};

/// Committed protocol state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PerpState {
    /// Root over all open position commitments
    pub positions_root: Commitment,
    /// Collateral pool
    pub pool: LiquidityPool,
}

impl PerpState {
    /// State at system initialization: zero root, empty pool
    pub const fn genesis() -> Self {
        PerpState {
            positions_root: EMPTY_SLOT,
            pool: LiquidityPool::empty(),
        }
    }

    pub const fn new(positions_root: Commitment, liquidity: Amount) -> Self {
        PerpState {
            positions_root,
            pool: LiquidityPool::new(liquidity),
        }
    }

    pub fn liquidity(&self) -> Amount {
        self.pool.liquidity
    }
}

impl Default for PerpState {
    fn default() -> Self {
        Self::genesis()
    }
}

/// Arguments of `open_position`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpenOrder {
    /// Collateral pledged
    pub amount: Amount,
    /// Notional size
    pub size: Amount,
    /// Entry price
    pub price: Amount,
    pub is_long: bool,
}

/// Result of a successful `open_position`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpenOutcome {
    pub state: PerpState,
    /// Record now committed in the witnessed slot; the caller must keep it
    pub position: PositionRecord,
}

/// Result of a successful `close_position`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CloseOutcome {
    /// Next state (root with the slot freed, pool unchanged)
    pub state: PerpState,
    /// Amount owed to the trader
    pub payout: Amount,
    /// PnL magnitude before the loss floor
    pub pnl: Amount,
    /// Whether the close was on the profit side
    pub is_profit: bool,
    /// Pool before the call
    pub liquidity_before: Amount,
    /// Pool after the call (equal to `liquidity_before`)
    pub liquidity_after: Amount,
}

/// Perpetual state machine over an authenticated store
#[derive(Clone, Copy, Debug, Default)]
pub struct Perpetual<S> {
    store: S,
}

impl<S: AuthenticatedStore> Perpetual<S> {
    pub fn new(store: S) -> Self {
        Perpetual { store }
    }

    /// Set the positions root unconditionally
    ///
    /// Re-initialization is allowed; the pool is untouched.
    pub fn init_state(&self, state: PerpState, initial_root: Commitment) -> PerpState {
        debug!("init_state: root {} -> {}", state.positions_root, initial_root);
        PerpState {
            positions_root: initial_root,
            pool: state.pool,
        }
    }

    /// Add `amount` to the pool
    ///
    /// # Errors
    /// * `Overflow` if the pool would exceed u64
    pub fn deposit(&self, state: PerpState, amount: Amount) -> Result<PerpState> {
        let pool = state.pool.add(amount).map_err(|e| {
            warn!("deposit rejected: {} (liquidity {}, amount {})", e, state.liquidity(), amount);
            e
        })?;
        debug!("deposit: liquidity {} -> {}", state.liquidity(), pool.liquidity);
        Ok(PerpState {
            positions_root: state.positions_root,
            pool,
        })
    }

    /// Open a position in the empty slot addressed by `witness`
    ///
    /// # Preconditions
    /// 1. `size <= amount * MAX_LEVERAGE`
    /// 2. The witnessed slot is empty under `state.positions_root`
    ///
    /// # Errors
    /// * `LeverageExceeded` if the size is over the cap
    /// * `Overflow` if `amount * MAX_LEVERAGE` or the new pool overflows
    /// * `InconsistentWitness` if the slot is occupied or the witness is stale
    pub fn open_position(
        &self,
        state: PerpState,
        caller: Owner,
        order: OpenOrder,
        witness: &S::Witness,
    ) -> Result<OpenOutcome> {
        self.try_open(state, caller, order, witness).map_err(|e| {
            warn!("open_position rejected: {} ({:?})", e, order);
            e
        })
    }

    fn try_open(
        &self,
        state: PerpState,
        caller: Owner,
        order: OpenOrder,
        witness: &S::Witness,
    ) -> Result<OpenOutcome> {
        // 1. Leverage
        if order.size > math::max_size(order.amount)? {
            return Err(PerpError::LeverageExceeded);
        }

        // 2. Record
        let position = PositionRecord::open(caller, order.amount, order.size, order.price, order.is_long);

        // 3. Insert into an empty slot
        let positions_root = self.store.verify_and_recompute(
            &state.positions_root,
            witness,
            &EMPTY_SLOT,
            &position.commitment(),
        )?;

        // 4. Collateral joins the pool
        let pool = state.pool.add(order.amount)?;

        debug!(
            "open_position: root {} -> {}, liquidity {} -> {}",
            state.positions_root, positions_root, state.liquidity(), pool.liquidity
        );

        Ok(OpenOutcome {
            state: PerpState { positions_root, pool },
            position,
        })
    }

    /// Close `position`, freeing its slot and computing the payout
    ///
    /// # Settlement
    /// - `diff = |close_price - entry_price|`
    /// - `pnl = diff * size / entry_price` (truncating)
    /// - profit: `collateral + pnl`; loss: `max(collateral - pnl, 0)`
    /// - equal prices settle on the loss side with `pnl = 0`
    ///
    /// # Errors
    /// * `NotOwner` if `caller` did not open the position
    /// * `PositionAlreadyClosed` if the record is marked closed
    /// * `InconsistentWitness` if the record is not in the witnessed slot
    /// * `DivisionByZero` if the entry price is zero
    /// * `Overflow` on `diff * size` or on the profit payout
    pub fn close_position(
        &self,
        state: PerpState,
        caller: Owner,
        position: &PositionRecord,
        close_price: Amount,
        witness: &S::Witness,
    ) -> Result<CloseOutcome> {
        self.try_close(state, caller, position, close_price, witness).map_err(|e| {
            warn!("close_position rejected: {} (close price {})", e, close_price);
            e
        })
    }

    fn try_close(
        &self,
        state: PerpState,
        caller: Owner,
        position: &PositionRecord,
        close_price: Amount,
        witness: &S::Witness,
    ) -> Result<CloseOutcome> {
        // 1. Ownership
        if position.owner != caller {
            return Err(PerpError::NotOwner);
        }

        // 2. Status
        if !position.is_open {
            return Err(PerpError::PositionAlreadyClosed);
        }

        // 3. Inclusion
        let leaf = position.commitment();
        self.store.verify_inclusion(&state.positions_root, witness, &leaf)?;

        // 4-7. Settlement
        let diff = math::price_diff(close_price, position.entry_price);
        let is_profit = math::is_profit(position.is_long, position.entry_price, close_price);
        let pnl = math::pnl_amount(diff, position.size, position.entry_price)?;
        let payout = math::settle_payout(position.collateral, pnl, is_profit)?;

        // 8. Free the slot
        let positions_root = self.store.verify_and_recompute(&state.positions_root, witness, &leaf, &EMPTY_SLOT)?;

        debug!(
            "close_position: root {} -> {}, pnl {} ({}), payout {}",
            state.positions_root,
            positions_root,
            pnl,
            if is_profit { "profit" } else { "loss" },
            payout
        );

        // 9. Pool is carried over as-is
        Ok(CloseOutcome {
            state: PerpState {
                positions_root,
                pool: state.pool,
            },
            payout,
            pnl,
            is_profit,
            liquidity_before: state.liquidity(),
            liquidity_after: state.liquidity(),
        })
    }
}
