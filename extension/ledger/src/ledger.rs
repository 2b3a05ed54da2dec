//! The extension ledger: one writer applying and reverting blocks, many
//! readers working from published snapshots.

use bth_crypto_commitment::{
    BoundReferenceVerifier, Commitment, RangeProofVerifier, ViewKey, ViewPublic,
};
use parking_lot::RwLock;
use rand_core::{CryptoRng, RngCore};
use std::{collections::VecDeque, sync::Arc};
use tracing::info;

use crate::{
    address::Address,
    applier::{AppliedBlock, BlockUndo, ExtensionBlockApplier, RevertedBlock},
    builder::{self, BuiltTransaction},
    config::LedgerConfig,
    context::ChainContext,
    delta::ExtensionBlockDelta,
    pegout::{self, PegOut},
    snapshot::{LedgerSnapshot, SpendableOutputs},
    store::{LedgerStore, LmdbStore, MemoryStore, StoreBatch},
    LedgerError,
};

/// Owns the ledger state and applies base-ledger block events to it.
///
/// `apply_block` and `revert_block` take `&mut self`, so there is exactly one
/// writer. Each successful call publishes a new immutable snapshot that
/// [`LedgerReader`]s pick up; readers never observe a partially applied
/// block.
pub struct ExtensionLedger {
    config: LedgerConfig,
    range_proofs: Arc<dyn RangeProofVerifier>,
    current: Arc<LedgerSnapshot>,
    published: Arc<RwLock<Arc<LedgerSnapshot>>>,
    undo: VecDeque<BlockUndo>,
    store: Box<dyn LedgerStore>,
}

impl ExtensionLedger {
    /// An in-memory ledger starting at `config.activation_height`.
    pub fn new(config: LedgerConfig) -> Result<Self, LedgerError> {
        Self::open(config, Box::new(MemoryStore::new()))
    }

    /// Open the store named by `config.data_dir`, or an in-memory one.
    pub fn open_configured(config: LedgerConfig) -> Result<Self, LedgerError> {
        match config.data_dir.clone() {
            Some(dir) => {
                let store = LmdbStore::open(&dir, config.map_size)?;
                Self::open(config, Box::new(store))
            }
            None => Self::new(config),
        }
    }

    /// Resume from `store`, or start empty if it holds nothing.
    pub fn open(config: LedgerConfig, store: Box<dyn LedgerStore>) -> Result<Self, LedgerError> {
        config.validate()?;

        let snapshot = match store.load()? {
            Some(state) => {
                let snapshot = state.into_snapshot()?;
                snapshot.validate_state()?;
                info!(
                    height = snapshot.height(),
                    outputs = snapshot.outputs().len(),
                    pending = snapshot.maturity().len(),
                    "Resumed extension ledger"
                );
                snapshot
            }
            None => LedgerSnapshot::genesis(config.activation_height),
        };

        let current = Arc::new(snapshot);
        Ok(Self {
            config,
            range_proofs: Arc::new(BoundReferenceVerifier),
            published: Arc::new(RwLock::new(current.clone())),
            current,
            undo: VecDeque::new(),
            store,
        })
    }

    /// Use `verifier` for output range proofs.
    pub fn with_range_proof_verifier(mut self, verifier: Arc<dyn RangeProofVerifier>) -> Self {
        self.range_proofs = verifier;
        self
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn height(&self) -> u64 {
        self.current.height()
    }

    pub fn snapshot(&self) -> Arc<LedgerSnapshot> {
        self.current.clone()
    }

    /// Where the next base-ledger block has to be applied.
    pub fn next_context(&self) -> ChainContext {
        ChainContext::at(self.height()).next()
    }

    /// A handle for concurrent readers.
    pub fn reader(&self) -> LedgerReader {
        LedgerReader {
            published: self.published.clone(),
        }
    }

    /// Lowest height `revert_block` can bring the ledger back to.
    pub fn oldest_reachable_height(&self) -> u64 {
        self.height().saturating_sub(self.undo.len() as u64)
    }

    /// Validate and apply the delta of the base-ledger block at `ctx`.
    ///
    /// On error nothing changes: not the published snapshot, not the store.
    pub fn apply_block(
        &mut self,
        delta: &ExtensionBlockDelta,
        ctx: &ChainContext,
    ) -> Result<AppliedBlock, LedgerError> {
        let mut applier = ExtensionBlockApplier::new(&self.config, self.range_proofs.as_ref());
        let (next, applied, undo) = applier.apply(&self.current, delta, ctx)?;

        self.store.commit(&StoreBatch::for_applied(&applied, &next))?;
        self.publish(next);

        self.undo.push_back(undo);
        while self.undo.len() as u64 > self.config.retained_blocks {
            self.undo.pop_front();
        }

        info!(
            height = ctx.height,
            created = applied.created.len(),
            scheduled = applied.scheduled.len(),
            spent = applied.spent.len(),
            matured = applied.matured.len(),
            pegouts = applied.pegouts.len(),
            "Applied extension block"
        );
        Ok(applied)
    }

    /// Revert the tip block, which must be at `height`.
    pub fn revert_block(&mut self, height: u64) -> Result<RevertedBlock, LedgerError> {
        let tip = self.height();
        if height != tip {
            return Err(LedgerError::HeightMismatch {
                expected: tip,
                got: height,
            });
        }
        let undo = self.undo.back().ok_or(LedgerError::ReorgTooDeep {
            requested: height.saturating_sub(1),
            oldest: tip,
        })?;

        let mut applier = ExtensionBlockApplier::new(&self.config, self.range_proofs.as_ref());
        let (next, reverted) = applier.revert(&self.current, undo)?;

        self.store.commit(&StoreBatch::for_reverted(&reverted, &next))?;
        self.publish(next);
        self.undo.pop_back();

        info!(
            height,
            restored = reverted.restored.len(),
            removed = reverted.removed.len(),
            unmatured = reverted.unmatured.len(),
            "Reverted extension block"
        );
        Ok(reverted)
    }

    /// Revert to `fork_height`, then apply the blocks of the new branch.
    ///
    /// Fails with `ReorgTooDeep` before touching anything when the fork is
    /// older than the retained undo history.
    pub fn reorganize(
        &mut self,
        fork_height: u64,
        blocks: &[(ExtensionBlockDelta, ChainContext)],
    ) -> Result<Vec<AppliedBlock>, LedgerError> {
        let tip = self.height();
        if fork_height > tip {
            return Err(LedgerError::HeightMismatch {
                expected: tip,
                got: fork_height,
            });
        }
        let oldest = self.oldest_reachable_height();
        if fork_height < oldest {
            return Err(LedgerError::ReorgTooDeep {
                requested: fork_height,
                oldest,
            });
        }

        info!(
            fork_height,
            reverted = tip - fork_height,
            applied = blocks.len(),
            "Reorganizing extension ledger"
        );
        while self.height() > fork_height {
            self.revert_block(self.height())?;
        }
        blocks
            .iter()
            .map(|(delta, ctx)| self.apply_block(delta, ctx))
            .collect()
    }

    /// Matured unspent outputs at the current tip.
    pub fn spendable_outputs(&self, owner: Option<&ViewPublic>) -> SpendableOutputs {
        SpendableOutputs::new(self.current.clone(), owner.copied())
    }

    /// Build a peg-out against the current tip.
    pub fn build_peg_out<R: RngCore + CryptoRng>(
        &self,
        view_key: &ViewKey,
        outputs_to_spend: &[Commitment],
        destination: &Address,
        amount: u64,
        fee: u64,
        rng: &mut R,
    ) -> Result<PegOut, LedgerError> {
        pegout::build_peg_out(
            &self.current,
            view_key,
            outputs_to_spend,
            destination,
            amount,
            fee,
            rng,
        )
    }

    /// Build a confidential transfer against the current tip.
    pub fn build_transfer<R: RngCore + CryptoRng>(
        &self,
        view_key: &ViewKey,
        recipient: &Address,
        amount: u64,
        fee: u64,
        rng: &mut R,
    ) -> Result<BuiltTransaction, LedgerError> {
        builder::build_transfer(&self.current, view_key, recipient, amount, fee, rng)
    }

    /// Audit the full state at the current tip.
    pub fn validate_state(&self) -> Result<(), LedgerError> {
        self.current.validate_state()
    }

    fn publish(&mut self, next: LedgerSnapshot) {
        let next = Arc::new(next);
        *self.published.write() = next.clone();
        self.current = next;
    }
}

/// A cloneable, thread-safe view of the latest published snapshot.
#[derive(Clone)]
pub struct LedgerReader {
    published: Arc<RwLock<Arc<LedgerSnapshot>>>,
}

impl LedgerReader {
    /// The latest published snapshot; stays valid while the writer moves on.
    pub fn snapshot(&self) -> Arc<LedgerSnapshot> {
        self.published.read().clone()
    }

    pub fn height(&self) -> u64 {
        self.published.read().height()
    }

    pub fn spendable_outputs(&self, owner: Option<&ViewPublic>) -> SpendableOutputs {
        SpendableOutputs::new(self.snapshot(), owner.copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        store::StoredState,
        test_utils::{pegin_tx, TestWallet},
    };
    use assert_matches::assert_matches;
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    struct FailingStore;

    impl LedgerStore for FailingStore {
        fn load(&self) -> Result<Option<StoredState>, LedgerError> {
            Ok(None)
        }

        fn commit(&mut self, _batch: &StoreBatch) -> Result<(), LedgerError> {
            Err(LedgerError::Storage("disk full".to_string()))
        }
    }

    fn config() -> LedgerConfig {
        LedgerConfig {
            pegin_maturity: 2,
            retained_blocks: 3,
            activation_height: 100,
            ..Default::default()
        }
    }

    #[test]
    fn test_failed_commit_publishes_nothing() {
        let mut ledger = ExtensionLedger::open(config(), Box::new(FailingStore)).unwrap();
        let reader = ledger.reader();

        assert_matches!(
            ledger.apply_block(&ExtensionBlockDelta::empty(), &ChainContext::at(101)),
            Err(LedgerError::Storage(_))
        );
        assert_eq!(ledger.height(), 100);
        assert_eq!(reader.height(), 100);
    }

    #[test]
    fn test_reader_keeps_old_snapshot() {
        let mut rng = ChaCha20Rng::seed_from_u64(110);
        let alice = TestWallet::new("alice");
        let mut ledger = ExtensionLedger::new(config()).unwrap();
        let reader = ledger.reader();
        let before = reader.snapshot();

        let (tx, record, _) = pegin_tx(&alice, 50, &mut rng);
        ledger
            .apply_block(
                &ExtensionBlockDelta::new(vec![tx], vec![record]),
                &ChainContext::at(101),
            )
            .unwrap();

        assert_eq!(before.height(), 100);
        assert_eq!(reader.height(), 101);
        assert_eq!(reader.snapshot().pending_outputs(None).len(), 1);
    }

    #[test]
    fn test_revert_must_target_tip() {
        let mut ledger = ExtensionLedger::new(config()).unwrap();
        for height in 101..=102 {
            ledger
                .apply_block(&ExtensionBlockDelta::empty(), &ChainContext::at(height))
                .unwrap();
        }

        assert_matches!(
            ledger.revert_block(101),
            Err(LedgerError::HeightMismatch {
                expected: 102,
                got: 101
            })
        );
        ledger.revert_block(102).unwrap();
        assert_eq!(ledger.height(), 101);
    }

    #[test]
    fn test_reorg_depth_limited_by_retention() {
        let mut ledger = ExtensionLedger::new(config()).unwrap();
        for height in 101..=106 {
            ledger
                .apply_block(&ExtensionBlockDelta::empty(), &ChainContext::at(height))
                .unwrap();
        }
        assert_eq!(ledger.oldest_reachable_height(), 103);

        assert_matches!(
            ledger.reorganize(102, &[]),
            Err(LedgerError::ReorgTooDeep {
                requested: 102,
                oldest: 103
            })
        );
        assert_eq!(ledger.height(), 106);

        let replacement = vec![
            (ExtensionBlockDelta::empty(), ChainContext::at(104)),
            (ExtensionBlockDelta::empty(), ChainContext::at(105)),
        ];
        let applied = ledger.reorganize(103, &replacement).unwrap();
        assert_eq!(applied.len(), 2);
        assert_eq!(ledger.height(), 105);
    }

    #[test]
    fn test_zero_maturity_rejected() {
        let config = LedgerConfig {
            pegin_maturity: 0,
            ..Default::default()
        };
        assert_matches!(
            ExtensionLedger::new(config).err(),
            Some(LedgerError::InvalidConfig(_))
        );
    }
}
