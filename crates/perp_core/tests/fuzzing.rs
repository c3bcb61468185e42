//! Property tests for the perpetual state machine
//!
//! Run with: cargo test --test fuzzing
//! Increase cases: PROPTEST_CASES=1000 cargo test --test fuzzing
//!
//! Covers:
//! - Leverage boundary and pool accounting at open
//! - "No mutation on error" for every rejected call
//! - Open/close round trip restoring the root
//! - Payout monotonicity in close price, per side
//! - Loss floor at zero
//! - Sparse-path and full-tree stores agreeing on every root

use perp_core::store::{empty_root, empty_witness};
use perp_core::{
    Amount, AuthenticatedStore, CloseOutcome, Commitment, MerkleMap, OpenOrder, Owner, PerpError, PerpState,
    Perpetual, SlotKey, SparsePathStore, EMPTY_SLOT, MAX_LEVERAGE,
};
use proptest::prelude::*;

const ALICE: Owner = Owner([0xa1; 32]);

fn machine() -> Perpetual<SparsePathStore> {
    Perpetual::new(SparsePathStore)
}

fn started(liquidity: Amount) -> PerpState {
    PerpState::new(empty_root(), liquidity)
}

/// Open one position alone in the tree and close it at `close_price`
fn settle(collateral: Amount, size: Amount, entry: Amount, is_long: bool, close_price: Amount) -> perp_core::Result<CloseOutcome> {
    let m = machine();
    let key = SlotKey([0x5a; 32]);
    let order = OpenOrder { amount: collateral, size, price: entry, is_long };
    let opened = m.open_position(started(0), ALICE, order, &empty_witness(key))?;
    m.close_position(opened.state, ALICE, &opened.position, close_price, &empty_witness(key))
}

fn side() -> impl Strategy<Value = bool> {
    any::<bool>()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn fuzz_leverage_boundary(
        liquidity in 0u64..1_000_000_000,
        amount in 0u64..1_000_000_000,
        size in 0u64..200_000_000_000,
        price in 1u64..1_000_000,
        is_long in side(),
    ) {
        let m = machine();
        let state = started(liquidity);
        let order = OpenOrder { amount, size, price, is_long };
        let result = m.open_position(state, ALICE, order, &empty_witness(SlotKey::default()));

        if size <= amount * MAX_LEVERAGE {
            let out = result.unwrap();
            prop_assert_eq!(out.state.liquidity(), liquidity + amount);
            prop_assert_ne!(out.state.positions_root, state.positions_root);
        } else {
            prop_assert_eq!(result, Err(PerpError::LeverageExceeded));
        }
    }

    #[test]
    fn fuzz_round_trip_at_entry(
        collateral in 0u64..1_000_000,
        leverage in 0u64..=MAX_LEVERAGE,
        entry in 1u64..1_000_000,
        is_long in side(),
        key in any::<[u8; 32]>(),
    ) {
        let m = machine();
        let key = SlotKey(key);
        let before = started(0);
        let order = OpenOrder { amount: collateral, size: collateral * leverage, price: entry, is_long };

        let opened = m.open_position(before, ALICE, order, &empty_witness(key)).unwrap();
        let closed = m
            .close_position(opened.state, ALICE, &opened.position, entry, &empty_witness(key))
            .unwrap();

        prop_assert_eq!(closed.payout, collateral);
        prop_assert_eq!(closed.state.positions_root, before.positions_root);
        prop_assert_eq!(closed.liquidity_after, collateral);
    }

    #[test]
    fn fuzz_payout_monotone_in_close_price(
        collateral in 1u64..1_000_000,
        leverage in 1u64..=MAX_LEVERAGE,
        entry in 1u64..100_000,
        p1 in 0u64..200_000,
        p2 in 0u64..200_000,
        is_long in side(),
    ) {
        let (lo, hi) = if p1 <= p2 { (p1, p2) } else { (p2, p1) };
        let size = collateral * leverage;
        let at_lo = settle(collateral, size, entry, is_long, lo).unwrap().payout;
        let at_hi = settle(collateral, size, entry, is_long, hi).unwrap().payout;

        if is_long {
            prop_assert!(at_lo <= at_hi, "long payout fell: {} -> {}", at_lo, at_hi);
        } else {
            prop_assert!(at_lo >= at_hi, "short payout rose: {} -> {}", at_lo, at_hi);
        }
    }

    #[test]
    fn fuzz_loss_floor(
        collateral in 1u64..1_000_000,
        leverage in 1u64..=MAX_LEVERAGE,
        entry in 1u64..100_000,
        close in 0u64..200_000,
        is_long in side(),
    ) {
        let size = collateral * leverage;
        let out = settle(collateral, size, entry, is_long, close).unwrap();

        if !out.is_profit {
            prop_assert!(out.payout <= collateral);
            if out.pnl > collateral {
                prop_assert_eq!(out.payout, 0);
            } else {
                prop_assert_eq!(out.payout, collateral - out.pnl);
            }
        } else {
            prop_assert_eq!(out.payout, collateral + out.pnl);
        }
    }

    #[test]
    fn fuzz_rejections_do_not_mutate(
        liquidity in 0u64..1_000_000,
        amount in 1u64..1_000,
        excess in 1u64..1_000,
        entry in 1u64..1_000,
    ) {
        let m = machine();
        let state = started(liquidity);
        let key = SlotKey([7u8; 32]);
        let good = OpenOrder { amount, size: amount, price: entry, is_long: true };
        let baseline = m.open_position(state, ALICE, good, &empty_witness(key)).unwrap();

        // Over-leveraged open, then the valid open from the same state
        let bad = OpenOrder { size: amount * MAX_LEVERAGE + excess, ..good };
        prop_assert_eq!(
            m.open_position(state, ALICE, bad, &empty_witness(key)),
            Err(PerpError::LeverageExceeded)
        );
        let opened = m.open_position(state, ALICE, good, &empty_witness(key)).unwrap();
        prop_assert_eq!(opened, baseline);

        // Close by a stranger, then the owner's close from the same state
        let honest = m
            .close_position(opened.state, ALICE, &opened.position, entry, &empty_witness(key))
            .unwrap();
        let stranger = Owner([0xee; 32]);
        prop_assert_eq!(
            m.close_position(opened.state, stranger, &opened.position, entry, &empty_witness(key)),
            Err(PerpError::NotOwner)
        );
        let closed = m
            .close_position(opened.state, ALICE, &opened.position, entry, &empty_witness(key))
            .unwrap();
        prop_assert_eq!(closed, honest);
        prop_assert_eq!(closed.state.positions_root, state.positions_root);
    }

    #[test]
    fn fuzz_sparse_and_full_store_agree(
        keys in proptest::collection::btree_set(any::<[u8; 32]>(), 1..6),
        value_seed in any::<u8>(),
    ) {
        let mut tree = MerkleMap::new();
        for (i, k) in keys.iter().enumerate() {
            let value = Commitment([value_seed.wrapping_add(i as u8) | 1; 32]);
            let root = tree.root();
            let key = SlotKey(*k);

            let via_path = SparsePathStore
                .verify_and_recompute(&root, &tree.witness(&key), &EMPTY_SLOT, &value)
                .unwrap();
            let via_full = tree
                .verify_and_recompute(&root, &key, &EMPTY_SLOT, &value)
                .unwrap();
            prop_assert_eq!(via_path, via_full);

            tree.set(key, value);
            prop_assert_eq!(tree.root(), via_path);
        }
    }
}

// ============================================================================
// Deterministic spot checks on the documented examples
// ============================================================================

#[test]
fn fuzz_deterministic_examples() {
    let profit = settle(100, 1000, 50, true, 55).unwrap();
    assert_eq!((profit.pnl, profit.payout), (100, 200));

    let loss = settle(100, 1000, 50, true, 45).unwrap();
    assert_eq!((loss.pnl, loss.payout), (100, 0));

    let tie_long = settle(100, 1000, 50, true, 50).unwrap();
    let tie_short = settle(100, 1000, 50, false, 50).unwrap();
    assert_eq!(tie_long.payout, 100);
    assert_eq!(tie_short.payout, 100);
}
