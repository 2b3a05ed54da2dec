//! Ledger configuration, loaded from and saved to TOML.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::LedgerError;

/// Number of blocks a pegged-in output waits before it becomes spendable.
pub const DEFAULT_PEGIN_MATURITY: u64 = 20;

/// Number of recent blocks whose undo records are kept for reorgs.
pub const DEFAULT_RETAINED_BLOCKS: u64 = 100;

/// Maximum weight of one extension block delta.
pub const DEFAULT_MAX_BLOCK_WEIGHT: usize = 21_000;

/// LMDB map size: 1GB.
pub const DEFAULT_MAP_SIZE: usize = 1024 * 1024 * 1024;

/// Configuration of an [`ExtensionLedger`](crate::ExtensionLedger).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Blocks between a peg-in's inclusion and its spendability.
    #[serde(default = "default_pegin_maturity")]
    pub pegin_maturity: u64,

    /// Reorg depth supported without a resync.
    #[serde(default = "default_retained_blocks")]
    pub retained_blocks: u64,

    /// Maximum delta weight (kernels weigh 2, outputs 18).
    #[serde(default = "default_max_block_weight")]
    pub max_block_weight: usize,

    /// Base-ledger height the extension ledger starts from; the first delta
    /// is applied at the following height.
    #[serde(default)]
    pub activation_height: u64,

    /// Directory holding the LMDB state, if persistence is wanted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    /// Upper bound on the LMDB file size, in bytes.
    #[serde(default = "default_map_size")]
    pub map_size: usize,
}

fn default_pegin_maturity() -> u64 {
    DEFAULT_PEGIN_MATURITY
}

fn default_retained_blocks() -> u64 {
    DEFAULT_RETAINED_BLOCKS
}

fn default_max_block_weight() -> usize {
    DEFAULT_MAX_BLOCK_WEIGHT
}

fn default_map_size() -> usize {
    DEFAULT_MAP_SIZE
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            pegin_maturity: DEFAULT_PEGIN_MATURITY,
            retained_blocks: DEFAULT_RETAINED_BLOCKS,
            max_block_weight: DEFAULT_MAX_BLOCK_WEIGHT,
            activation_height: 0,
            data_dir: None,
            map_size: DEFAULT_MAP_SIZE,
        }
    }
}

impl LedgerConfig {
    /// Reject settings the ledger cannot operate with.
    ///
    /// A zero maturity window would let a peg-in mature in its own block,
    /// which undo records do not model.
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.pegin_maturity == 0 {
            return Err(LedgerError::InvalidConfig(
                "pegin_maturity must be at least 1".to_string(),
            ));
        }
        if self.retained_blocks == 0 {
            return Err(LedgerError::InvalidConfig(
                "retained_blocks must be at least 1".to_string(),
            ));
        }
        if self.max_block_weight == 0 {
            return Err(LedgerError::InvalidConfig(
                "max_block_weight must be positive".to_string(),
            ));
        }
        if self.map_size == 0 {
            return Err(LedgerError::InvalidConfig(
                "map_size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Load config from a file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;

        Ok(())
    }
}

/// Get the default data directory path
pub fn default_data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".botho").join("extension"))
}

/// Get the default config file path
pub fn default_config_path() -> Option<PathBuf> {
    default_data_dir().map(|dir| dir.join("config.toml"))
}
