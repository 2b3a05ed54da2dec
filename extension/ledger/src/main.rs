use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use bth_extension_ledger::{commands, config, telemetry};

#[derive(Parser)]
#[command(name = "bth-extension")]
#[command(about = "Confidential extension block ledger", long_about = None)]
struct Cli {
    /// Path to config file (default: ~/.botho/extension/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Show the ledger tip, output counts and bridge totals
    Status,

    /// Peg in, wait for maturity, then peg out
    Simulate {
        /// Amount to peg in
        #[arg(long, default_value_t = 50)]
        pegin: u64,

        /// Amount to peg out once matured
        #[arg(long, default_value_t = 2)]
        pegout: u64,

        /// Fee paid by the peg-out
        #[arg(long, default_value_t = 0)]
        fee: u64,

        /// Write to the configured data directory instead of memory
        #[arg(long)]
        persist: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    telemetry::init_tracing(cli.verbose)?;

    let config_path = match cli.config {
        Some(path) => path,
        None => config::default_config_path()
            .ok_or_else(|| anyhow!("Could not determine home directory"))?,
    };

    match cli.command {
        Commands::Init { force } => commands::init::run(&config_path, force),
        Commands::Status => commands::status::run(&config_path),
        Commands::Simulate {
            pegin,
            pegout,
            fee,
            persist,
        } => {
            let config = if config_path.exists() {
                config::LedgerConfig::load(&config_path)?
            } else {
                config::LedgerConfig::default()
            };
            commands::simulate::run(config, pegin, pegout, fee, persist)
        }
    }
}
