//! Destinations funds can be sent to.

use bth_crypto_commitment::ViewPublic;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::LedgerError;

/// Minimum length of a peg-out destination script.
pub const MIN_PEGOUT_SCRIPT_LEN: usize = 4;

/// Maximum length of a peg-out destination script.
pub const MAX_PEGOUT_SCRIPT_LEN: usize = 42;

/// A base-ledger locking script.
#[derive(Clone, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Script(Vec<u8>);

impl Script {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether this script may receive a peg-out.
    pub fn is_valid_pegout_destination(&self) -> bool {
        (MIN_PEGOUT_SCRIPT_LEN..=MAX_PEGOUT_SCRIPT_LEN).contains(&self.len())
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Script({})", hex::encode(&self.0))
    }
}

/// Where value is sent.
///
/// Confidential addresses own extension outputs. Transparent addresses are
/// base-ledger scripts and can only be reached through a peg-out.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub enum Address {
    Transparent(Script),
    Confidential(ViewPublic),
}

impl Address {
    pub fn is_confidential(&self) -> bool {
        matches!(self, Address::Confidential(_))
    }

    /// The owner tag, for confidential addresses.
    pub fn view_public(&self) -> Option<&ViewPublic> {
        match self {
            Address::Confidential(view) => Some(view),
            Address::Transparent(_) => None,
        }
    }

    /// The owner tag, or `InvalidAddress` for a transparent address.
    pub fn require_confidential(&self) -> Result<&ViewPublic, LedgerError> {
        match self {
            Address::Confidential(view) if view.is_valid() => Ok(view),
            Address::Confidential(view) => Err(LedgerError::InvalidAddress(format!(
                "{view} is not a valid view key"
            ))),
            Address::Transparent(script) => Err(LedgerError::InvalidAddress(format!(
                "transparent script {script} cannot own extension outputs"
            ))),
        }
    }

    /// The base-ledger script, or `InvalidAddress` for a confidential address.
    pub fn require_transparent(&self) -> Result<&Script, LedgerError> {
        match self {
            Address::Transparent(script) => Ok(script),
            Address::Confidential(view) => Err(LedgerError::InvalidAddress(format!(
                "confidential address {view} is not a base-ledger destination"
            ))),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Transparent(script) => write!(f, "tbth:{script}"),
            Address::Confidential(view) => write!(f, "xbth:{view}"),
        }
    }
}

impl From<ViewPublic> for Address {
    fn from(view: ViewPublic) -> Self {
        Address::Confidential(view)
    }
}

impl From<Script> for Address {
    fn from(script: Script) -> Self {
        Address::Transparent(script)
    }
}
