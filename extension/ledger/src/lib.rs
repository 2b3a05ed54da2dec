//! Confidential extension block ledger for Botho.
//!
//! Value moves into the extension block through peg-ins, changes hands in
//! confidential transactions whose kernels prove balance over Pedersen
//! commitments, and leaves through peg-outs that the base ledger pays out.
//! Pegged-in outputs wait out a maturity window before they can be spent.
//!
//! [`ExtensionLedger`] applies and reverts one block delta at a time and
//! publishes immutable [`LedgerSnapshot`]s to any number of
//! [`LedgerReader`]s.

#![deny(clippy::print_stdout)]

pub mod address;
pub mod applier;
pub mod builder;
pub mod config;
pub mod context;
pub mod delta;
pub mod kernel;
pub mod maturity;
pub mod output;
pub mod output_set;
pub mod pegin;
pub mod pegout;
pub mod snapshot;
pub mod store;
pub mod telemetry;
pub mod transaction;
pub mod verifier;

mod error;
mod ledger;

// Re-export commands module for CLI binary
pub mod commands;

pub use address::{Address, Script};
pub use applier::{AppliedBlock, ApplyState, BlockUndo, ExtensionBlockApplier, RevertedBlock};
pub use builder::{build_peg_in, build_transfer, BuiltTransaction, PegIn, TransactionBuilder};
pub use config::LedgerConfig;
pub use context::ChainContext;
pub use delta::{ExtensionBlockDelta, PegInRecord};
pub use error::LedgerError;
pub use kernel::{Kernel, PegOutCoin};
pub use ledger::{ExtensionLedger, LedgerReader};
pub use output::{Output, OutputKind, TxOutput};
pub use pegout::{build_peg_out, BaseLedgerOutput, PegOut};
pub use snapshot::{LedgerSnapshot, SpendableOutputs, SupplyStats};
pub use store::{LedgerStore, LmdbStore, MemoryStore};
pub use transaction::Transaction;
