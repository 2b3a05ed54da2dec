// Copyright (c) 2024 Botho Foundation
//
//! Common test utilities for extension ledger integration tests.
//!
//! [`TestChain`] drives an [`ExtensionLedger`] one base-ledger block at a
//! time with deterministic randomness, so scenarios read as a sequence of
//! peg-ins, transfers, peg-outs and empty blocks.
//!
//! # Example
//!
//! ```ignore
//! use common::{wallet, TestChain};
//!
//! let mut chain = TestChain::new(7);
//! let alice = wallet("alice");
//! chain.peg_in(&alice, 50);
//! chain.mine_empty(20);
//! assert_eq!(chain.balance(&alice), 50);
//! ```

#![allow(dead_code)]

use bth_crypto_commitment::{ViewKey, ViewPublic};
use bth_extension_ledger::{
    build_peg_in, Address, AppliedBlock, ChainContext, ExtensionBlockDelta, ExtensionLedger,
    LedgerConfig, LedgerError, Script, Transaction,
};
use rand_chacha::ChaCha20Rng;
use rand_core::SeedableRng;

// ============================================================================
// Constants
// ============================================================================

/// Peg-in maturity window used by every scenario.
pub const PEGIN_MATURITY: u64 = 20;

/// A 22-byte witness-program-shaped destination script.
pub const PEGOUT_SCRIPT: [u8; 22] = [
    0x00, 0x14, 0x0e, 0x6b, 0x4c, 0x3d, 0x91, 0x22, 0x7a, 0x5f, 0x18, 0xc4, 0x09, 0x33, 0xe2,
    0x71, 0x5d, 0xa0, 0x6c, 0x8b, 0x44, 0x2f,
];

// ============================================================================
// Helper Functions
// ============================================================================

/// A deterministic wallet key.
pub fn wallet(seed: &str) -> ViewKey {
    ViewKey::from_seed(seed.as_bytes())
}

pub fn pegout_destination() -> Address {
    Address::Transparent(Script::new(PEGOUT_SCRIPT.to_vec()))
}

pub fn test_config() -> LedgerConfig {
    LedgerConfig {
        pegin_maturity: PEGIN_MATURITY,
        ..Default::default()
    }
}

// ============================================================================
// Test Chain
// ============================================================================

pub struct TestChain {
    pub ledger: ExtensionLedger,
    pub rng: ChaCha20Rng,
}

impl TestChain {
    /// An in-memory chain with the test configuration.
    pub fn new(seed: u64) -> Self {
        Self::with_config(test_config(), seed)
    }

    pub fn with_config(config: LedgerConfig, seed: u64) -> Self {
        let ledger = ExtensionLedger::new(config).expect("test config is valid");
        Self::from_ledger(ledger, seed)
    }

    pub fn from_ledger(ledger: ExtensionLedger, seed: u64) -> Self {
        Self {
            ledger,
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }

    pub fn height(&self) -> u64 {
        self.ledger.height()
    }

    pub fn next_context(&self) -> ChainContext {
        self.ledger.next_context()
    }

    pub fn try_mine(&mut self, delta: &ExtensionBlockDelta) -> Result<AppliedBlock, LedgerError> {
        let ctx = self.next_context();
        self.ledger.apply_block(delta, &ctx)
    }

    pub fn mine(&mut self, delta: &ExtensionBlockDelta) -> AppliedBlock {
        self.try_mine(delta).expect("block applies")
    }

    pub fn mine_transactions(&mut self, transactions: Vec<Transaction>) -> AppliedBlock {
        self.mine(&ExtensionBlockDelta::new(transactions, Vec::new()))
    }

    pub fn mine_empty(&mut self, count: u64) {
        for _ in 0..count {
            self.mine(&ExtensionBlockDelta::empty());
        }
    }

    /// Mine empty blocks until the tip is at `height`.
    pub fn advance_to(&mut self, height: u64) {
        assert!(height >= self.height(), "cannot advance backwards");
        self.mine_empty(height - self.height());
    }

    /// Peg `amount` in to `owner` in the next block.
    pub fn peg_in(&mut self, owner: &ViewKey, amount: u64) -> AppliedBlock {
        let delta = self.peg_in_delta(&owner.public(), amount);
        self.mine(&delta)
    }

    pub fn peg_in_delta(&mut self, owner: &ViewPublic, amount: u64) -> ExtensionBlockDelta {
        let pegin = build_peg_in(owner, amount, &mut self.rng).expect("peg-in builds");
        ExtensionBlockDelta::new(vec![pegin.transaction], vec![pegin.record])
    }

    pub fn transfer_tx(&mut self, from: &ViewKey, to: &ViewKey, amount: u64, fee: u64) -> Transaction {
        self.ledger
            .build_transfer(from, &Address::Confidential(to.public()), amount, fee, &mut self.rng)
            .expect("transfer builds")
            .transaction
    }

    pub fn transfer(&mut self, from: &ViewKey, to: &ViewKey, amount: u64, fee: u64) -> AppliedBlock {
        let tx = self.transfer_tx(from, to, amount, fee);
        self.mine_transactions(vec![tx])
    }

    pub fn peg_out(&mut self, from: &ViewKey, amount: u64, fee: u64) -> AppliedBlock {
        let pegout = self
            .ledger
            .build_peg_out(from, &[], &pegout_destination(), amount, fee, &mut self.rng)
            .expect("peg-out builds");
        self.mine_transactions(vec![pegout.transaction().clone()])
    }

    /// Spendable value `owner` can open at the tip.
    pub fn balance(&self, owner: &ViewKey) -> u64 {
        self.ledger
            .spendable_outputs(Some(&owner.public()))
            .balance(owner)
    }

    /// Values of the spendable outputs `owner` can open at the tip.
    pub fn spendable_values(&self, owner: &ViewKey) -> Vec<u64> {
        let spendable = self.ledger.spendable_outputs(Some(&owner.public()));
        let mut values: Vec<u64> = spendable
            .iter()
            .filter_map(|output| output.rewind(owner).ok())
            .map(|opening| opening.value)
            .collect();
        values.sort_unstable();
        values
    }

    /// Value `owner` holds in outputs still waiting to mature.
    pub fn pending_balance(&self, owner: &ViewKey) -> u64 {
        let snapshot = self.ledger.snapshot();
        snapshot
            .pending_outputs(Some(&owner.public()))
            .into_iter()
            .filter_map(|output| output.rewind(owner).ok())
            .map(|opening| opening.value)
            .sum()
    }
}
