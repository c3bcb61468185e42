//! Perp CLI - local harness for the perpetual state core
//!
//! Plays the roles the core leaves outside: it stores the committed
//! `(positions_root, liquidity)` pair between invocations, keeps the position
//! records and full tree used to build witnesses, supplies the caller
//! identity, and records a transcript of accepted and rejected calls.

use clap::{Parser, Subcommand};
use colored::Colorize;
use perp_core::Amount;
use std::path::PathBuf;

mod config;
mod exchange;
mod ledger;
mod liquidity;
mod trading;

use config::HarnessConfig;

#[derive(Parser)]
#[command(name = "perp")]
#[command(about = "Perpetual state core harness - deposit, open and close against a local ledger", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./perp.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Ledger file (overrides config)
    #[arg(short, long)]
    ledger: Option<PathBuf>,

    /// Identity file (overrides config)
    #[arg(short, long)]
    identity: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a local identity file
    Keygen {
        /// Output path (defaults to the configured identity path)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Initialize the ledger (empty pool, positions root)
    Init {
        /// Initial positions root as hex (defaults to the empty-tree root)
        #[arg(long)]
        root: Option<String>,

        /// Re-initialize an existing ledger
        #[arg(long)]
        force: bool,
    },

    /// Deposit liquidity into the pool
    Deposit {
        /// Amount to deposit
        amount: Amount,
    },

    /// Open a leveraged position
    Open {
        /// Collateral
        #[arg(long)]
        amount: Amount,

        /// Notional size
        #[arg(long)]
        size: Option<Amount>,

        /// Leverage multiplier (size = amount * leverage)
        #[arg(long)]
        leverage: Option<Amount>,

        /// Entry price
        #[arg(long)]
        price: Amount,

        /// Side (long or short)
        #[arg(long, default_value = "long")]
        side: String,

        /// Slot as hex (only with slot_derivation = "caller")
        #[arg(long)]
        slot: Option<String>,
    },

    /// Close a position by slot
    Close {
        /// Slot as hex
        slot: String,

        /// Close price
        #[arg(long)]
        price: Amount,
    },

    /// Show committed state
    Status,

    /// Check the stored root against the stored position records
    Verify,

    /// Show the invocation transcript
    History {
        /// Number of most recent entries
        #[arg(long, default_value = "20")]
        limit: usize,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let config = HarnessConfig::new(cli.config.clone(), cli.ledger.clone(), cli.identity.clone())?;

    if cli.verbose {
        println!("{} {}", "Ledger:".bright_cyan(), config.ledger_path.display());
        println!("{} {}", "Identity:".bright_cyan(), config.identity_path.display());
        println!("{} {:?}", "Slot Derivation:".bright_cyan(), config.slot_policy);
    }

    match cli.command {
        Commands::Keygen { out, force } => {
            exchange::keygen(&config, out, force)?;
        }
        Commands::Init { root, force } => {
            exchange::initialize(&config, root, force)?;
        }
        Commands::Deposit { amount } => {
            liquidity::deposit(&config, amount)?;
        }
        Commands::Open { amount, size, leverage, price, side, slot } => {
            trading::open_position(&config, amount, size, leverage, price, side, slot)?;
        }
        Commands::Close { slot, price } => {
            trading::close_position(&config, slot, price)?;
        }
        Commands::Status => {
            exchange::show_status(&config)?;
        }
        Commands::Verify => {
            exchange::verify(&config)?;
        }
        Commands::History { limit } => {
            exchange::show_history(&config, limit)?;
        }
    }

    Ok(())
}
