//! Liquidity pool operations

use anyhow::Result;
use colored::Colorize;
use perp_core::Amount;

use crate::config::HarnessConfig;
use crate::exchange::open_ledger;

pub fn deposit(config: &HarnessConfig, amount: Amount) -> Result<()> {
    println!("{}", "=== Deposit Liquidity ===".bright_green().bold());
    println!("{} {}", "Amount:".bright_cyan(), amount);

    let caller = config.optional_identity()?;
    let mut ledger = open_ledger(config)?;
    let before = ledger.state().liquidity();

    // Rejections are transcribed, so persist either way
    let result = ledger.deposit(caller, amount);
    ledger.save()?;
    let state = result?;

    println!("{} {} -> {}", "Liquidity:".bright_cyan(), before, state.liquidity());
    println!("\n{} Deposit accepted", "✓".bright_green());
    Ok(())
}
