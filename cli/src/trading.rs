//! Position open/close operations

use anyhow::{Context, Result};
use colored::Colorize;
use perp_core::{Amount, CallerChosenSlots, OpenOrder, OwnerNonceSlots, SlotDerivation, MAX_LEVERAGE};

use crate::config::{HarnessConfig, SlotPolicy};
use crate::exchange::open_ledger;
use crate::ledger::{format_slot, parse_slot, side_label};

/// Parse `long`/`short` (also `buy`/`sell`)
pub fn parse_side(side: &str) -> Result<bool> {
    match side.to_ascii_lowercase().as_str() {
        "long" | "buy" => Ok(true),
        "short" | "sell" => Ok(false),
        other => anyhow::bail!("Unknown side: {} (use long or short)", other),
    }
}

/// Notional size from either an explicit size or a leverage multiplier
pub fn resolve_size(amount: Amount, size: Option<Amount>, leverage: Option<Amount>) -> Result<Amount> {
    match (size, leverage) {
        (Some(size), None) => Ok(size),
        (None, Some(leverage)) => amount
            .checked_mul(leverage)
            .with_context(|| format!("Size overflows: {} x {}", amount, leverage)),
        (Some(_), Some(_)) => anyhow::bail!("Pass either --size or --leverage, not both"),
        (None, None) => anyhow::bail!("One of --size or --leverage is required"),
    }
}

pub fn open_position(
    config: &HarnessConfig,
    amount: Amount,
    size: Option<Amount>,
    leverage: Option<Amount>,
    price: Amount,
    side: String,
    slot: Option<String>,
) -> Result<()> {
    let is_long = parse_side(&side)?;
    let size = resolve_size(amount, size, leverage)?;

    println!("{}", "=== Open Position ===".bright_green().bold());
    println!("{} {}", "Side:".bright_cyan(), side_label(is_long).to_uppercase());
    println!("{} {}", "Collateral:".bright_cyan(), amount);
    println!("{} {}", "Size:".bright_cyan(), size);
    println!("{} {}", "Entry Price:".bright_cyan(), price);
    if amount > 0 {
        println!("{} {}x (max {}x)", "Leverage:".bright_cyan(), size / amount, MAX_LEVERAGE);
    }

    let slots: Box<dyn SlotDerivation> = match (config.slot_policy, slot) {
        (SlotPolicy::OwnerNonce, None) => Box::new(OwnerNonceSlots),
        (SlotPolicy::OwnerNonce, Some(_)) => {
            anyhow::bail!("--slot is only accepted with slot_derivation = \"caller\"")
        }
        (SlotPolicy::Caller, Some(s)) => Box::new(CallerChosenSlots(parse_slot(&s)?)),
        (SlotPolicy::Caller, None) => anyhow::bail!("--slot is required with slot_derivation = \"caller\""),
    };

    let caller = config.identity()?;
    let mut ledger = open_ledger(config)?;
    let order = OpenOrder {
        amount,
        size,
        price,
        is_long,
    };

    let result = ledger.open(caller, order, slots.as_ref());
    ledger.save()?;
    let receipt = result?;

    println!("\n{} {}", "Slot:".bright_cyan(), format_slot(&receipt.slot));
    println!("{} {}", "Nonce:".bright_cyan(), receipt.nonce);
    println!("{} {}", "Commitment:".bright_cyan(), receipt.position.commitment());
    println!("{} {}", "Positions Root:".bright_cyan(), receipt.state.positions_root);
    println!("{} {}", "Liquidity:".bright_cyan(), receipt.state.liquidity());
    println!("\n{} Position opened", "✓".bright_green());
    Ok(())
}

pub fn close_position(config: &HarnessConfig, slot: String, price: Amount) -> Result<()> {
    let slot = parse_slot(&slot)?;

    println!("{}", "=== Close Position ===".bright_green().bold());
    println!("{} {}", "Slot:".bright_cyan(), format_slot(&slot));
    println!("{} {}", "Close Price:".bright_cyan(), price);

    let caller = config.identity()?;
    let mut ledger = open_ledger(config)?;
    if let Some(stored) = ledger.position(&slot) {
        println!(
            "{} {} {} @ {}",
            "Position:".bright_cyan(),
            side_label(stored.is_long).to_uppercase(),
            stored.size,
            stored.entry_price
        );
    }

    let result = ledger.close(caller, slot, price);
    ledger.save()?;
    let outcome = result?;

    let pnl = if outcome.is_profit {
        format!("+{}", outcome.pnl).bright_green()
    } else {
        format!("-{}", outcome.pnl).bright_red()
    };
    println!("\n{} {}", "PnL:".bright_cyan(), pnl);
    println!("{} {}", "Payout:".bright_cyan(), outcome.payout);
    println!(
        "{} {} -> {}",
        "Liquidity:".bright_cyan(),
        outcome.liquidity_before,
        outcome.liquidity_after
    );
    println!("{} {}", "Positions Root:".bright_cyan(), outcome.state.positions_root);
    println!(
        "\n{}",
        "Payout is not settled against the pool; the settlement layer applies it".dimmed()
    );
    println!("{} Position closed", "✓".bright_green());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_side() {
        assert!(parse_side("LONG").unwrap());
        assert!(!parse_side("short").unwrap());
        assert!(parse_side("buy").unwrap());
        assert!(parse_side("sideways").is_err());
    }

    #[test]
    fn test_resolve_size() {
        assert_eq!(resolve_size(100, Some(500), None).unwrap(), 500);
        assert_eq!(resolve_size(100, None, Some(10)).unwrap(), 1000);
        assert!(resolve_size(100, Some(1), Some(1)).is_err());
        assert!(resolve_size(100, None, None).is_err());
        assert!(resolve_size(Amount::MAX, None, Some(2)).is_err());
    }
}
