use anyhow::{bail, Result};
use std::path::Path;
use tracing::info;

use crate::config::{default_data_dir, LedgerConfig};

/// Run the init command
pub fn run(config_path: &Path, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        bail!(
            "Config already exists at {}\nUse --force to overwrite it.",
            config_path.display()
        );
    }

    let data_dir = config_path
        .parent()
        .map(|dir| dir.join("ledger"))
        .or_else(|| default_data_dir().map(|dir| dir.join("ledger")));
    let config = LedgerConfig {
        data_dir,
        ..Default::default()
    };
    config.save(config_path)?;

    info!("Extension ledger initialized at {}", config_path.display());
    println!("Config saved to: {}", config_path.display());
    println!("  pegin_maturity:   {}", config.pegin_maturity);
    println!("  retained_blocks:  {}", config.retained_blocks);
    println!("  max_block_weight: {}", config.max_block_weight);
    println!("  map_size:         {}", config.map_size);
    if let Some(dir) = &config.data_dir {
        println!("  data_dir:         {}", dir.display());
    }

    Ok(())
}
