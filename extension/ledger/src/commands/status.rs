use anyhow::{Context, Result};
use std::path::Path;

use crate::{config::LedgerConfig, ExtensionLedger};

/// Run the status command
pub fn run(config_path: &Path) -> Result<()> {
    let config = LedgerConfig::load(config_path)?;
    let ledger = ExtensionLedger::open_configured(config).context("Failed to open ledger")?;
    let snapshot = ledger.snapshot();
    let supply = snapshot.supply();

    println!("Height:      {}", snapshot.height());
    println!("Live:        {}", snapshot.outputs().len());
    println!("Pending:     {}", snapshot.maturity().len());
    println!("Pegged in:   {}", supply.pegged_in);
    println!("Pegged out:  {}", supply.pegged_out);
    println!("Fees:        {}", supply.fees);
    match ledger.validate_state() {
        Ok(()) => println!("State:       consistent"),
        Err(e) => println!("State:       INCONSISTENT ({e})"),
    }

    Ok(())
}
