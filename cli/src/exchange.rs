//! Ledger initialization, status and audit commands

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;

use crate::config::{self, HarnessConfig};
use crate::ledger::{parse_commitment, Ledger};

pub fn open_ledger(config: &HarnessConfig) -> Result<Ledger> {
    Ledger::load(&config.ledger_path, config.max_transcript_entries)
        .with_context(|| format!("Failed to load ledger: {}", config.ledger_path.display()))
}

pub fn keygen(config: &HarnessConfig, out: Option<PathBuf>, force: bool) -> Result<()> {
    let path = out.unwrap_or_else(|| config.identity_path.clone());
    let owner = config::generate_identity(&path, force)?;

    println!("{}", "=== New Identity ===".bright_green().bold());
    println!("{} {}", "File:".bright_cyan(), path.display());
    println!("{} {}", "Identity:".bright_cyan(), config::format_owner(&owner));
    Ok(())
}

pub fn initialize(config: &HarnessConfig, root: Option<String>, force: bool) -> Result<()> {
    println!("{}", "=== Initialize Perpetual ===".bright_green().bold());
    println!("{} {}", "Ledger:".bright_cyan(), config.ledger_path.display());

    let initial_root = root.as_deref().map(parse_commitment).transpose()?;
    let mut ledger = open_ledger(config)?;
    let state = ledger.init(initial_root, force)?;
    ledger.save()?;

    println!("{} {}", "Positions Root:".bright_cyan(), state.positions_root);
    println!("{} {}", "Liquidity:".bright_cyan(), state.liquidity());
    if initial_root.is_some() {
        println!(
            "\n{}",
            "Custom root: the local tree cannot produce witnesses against it".yellow()
        );
    }
    println!("\n{} Ledger initialized", "✓".bright_green());
    Ok(())
}

pub fn show_status(config: &HarnessConfig) -> Result<()> {
    let ledger = open_ledger(config)?;
    let state = ledger.state();

    println!("{}", "=== Perpetual Status ===".bright_green().bold());
    println!("{} {}", "Ledger:".bright_cyan(), config.ledger_path.display());
    println!("{} {}", "Version:".bright_cyan(), ledger.version());
    println!(
        "{} {}",
        "Initialized:".bright_cyan(),
        if ledger.is_initialized() { "Yes" } else { "No" }
    );
    println!("{} {}", "Positions Root:".bright_cyan(), state.positions_root);
    println!("{} {}", "Liquidity:".bright_cyan(), state.liquidity());
    println!("{} {}", "Open Positions:".bright_cyan(), ledger.open_positions());

    match config.identity() {
        Ok(owner) => {
            println!("{} {}", "Identity:".bright_cyan(), config::format_owner(&owner));
            println!("{} {}", "Next Nonce:".bright_cyan(), ledger.next_nonce(&owner));
        }
        Err(_) => println!("{} {}", "Identity:".bright_cyan(), "(none)".dimmed()),
    }
    Ok(())
}

pub fn verify(config: &HarnessConfig) -> Result<()> {
    let ledger = open_ledger(config)?;
    let report = ledger.verify()?;

    println!("{}", "=== Verify Ledger ===".bright_green().bold());
    println!("{} {}", "Stored Root:".bright_cyan(), report.stored_root);
    println!("{} {}", "Rebuilt Root:".bright_cyan(), report.rebuilt_root);
    println!("{} {}", "Positions:".bright_cyan(), report.positions);

    if report.is_consistent() {
        println!("\n{} Stored root matches position records", "✓".bright_green());
        Ok(())
    } else {
        println!("\n{} Stored root does not match position records", "✗".bright_red());
        anyhow::bail!("ledger root mismatch")
    }
}

pub fn show_history(config: &HarnessConfig, limit: usize) -> Result<()> {
    let ledger = open_ledger(config)?;
    let transcript = ledger.transcript();

    println!("{}", "=== Transcript ===".bright_green().bold());
    if transcript.is_empty() {
        println!("{}", "No invocations recorded".dimmed());
        return Ok(());
    }

    let start = transcript.len().saturating_sub(limit);
    for entry in &transcript[start..] {
        let mark = if entry.accepted {
            "✓".bright_green()
        } else {
            "✗".bright_red()
        };
        println!(
            "{} {} {} {}",
            mark,
            entry.at.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
            entry.method.bright_yellow(),
            entry.detail
        );
    }
    Ok(())
}
