//! The set of live confidential outputs.

use bth_crypto_commitment::{Commitment, ViewPublic};
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use crate::{output::Output, LedgerError};

/// What the set knows about a commitment.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OutputStatus {
    Live,
    /// Spent at `height`, and not yet pruned.
    Spent { height: u64 },
    Unknown,
}

/// Live outputs keyed by commitment, with an owner index and tombstones
/// for recently spent outputs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OutputSet {
    live: BTreeMap<Commitment, Output>,
    by_owner: BTreeMap<ViewPublic, BTreeSet<Commitment>>,
    spent: BTreeMap<Commitment, u64>,
}

impl OutputSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a live output, returning the spend height of any tombstone the
    /// commitment had.
    pub fn insert(&mut self, mut output: Output) -> Result<Option<u64>, LedgerError> {
        if self.live.contains_key(&output.commitment) {
            return Err(LedgerError::DuplicateCommitment(output.commitment));
        }
        output.spent = false;
        let cleared = self.spent.remove(&output.commitment);
        self.by_owner
            .entry(output.owner)
            .or_default()
            .insert(output.commitment);
        self.live.insert(output.commitment, output);
        Ok(cleared)
    }

    /// Mark a live output spent at `height`, returning its spent record.
    pub fn spend(&mut self, commitment: &Commitment, height: u64) -> Result<Output, LedgerError> {
        let mut output = self.take(commitment)?;
        output.spent = true;
        self.spent.insert(*commitment, height);
        Ok(output)
    }

    /// Drop a live output without leaving a tombstone (undo of `insert`).
    pub fn remove(&mut self, commitment: &Commitment) -> Result<Output, LedgerError> {
        self.take(commitment)
    }

    /// Bring back a spent output (undo of `spend`).
    pub fn restore(&mut self, output: Output) -> Result<(), LedgerError> {
        self.insert(output)?;
        Ok(())
    }

    /// Put back tombstones dropped by `insert` or `prune_spent`.
    pub fn restore_tombstones(&mut self, tombstones: impl IntoIterator<Item = (Commitment, u64)>) {
        self.spent.extend(tombstones);
    }

    fn take(&mut self, commitment: &Commitment) -> Result<Output, LedgerError> {
        let output = self
            .live
            .remove(commitment)
            .ok_or(LedgerError::NotFound(*commitment))?;
        if let Some(owned) = self.by_owner.get_mut(&output.owner) {
            owned.remove(commitment);
            if owned.is_empty() {
                self.by_owner.remove(&output.owner);
            }
        }
        Ok(output)
    }

    pub fn get(&self, commitment: &Commitment) -> Option<&Output> {
        self.live.get(commitment)
    }

    pub fn is_live(&self, commitment: &Commitment) -> bool {
        self.live.contains_key(commitment)
    }

    pub fn status(&self, commitment: &Commitment) -> OutputStatus {
        if self.live.contains_key(commitment) {
            OutputStatus::Live
        } else if let Some(&height) = self.spent.get(commitment) {
            OutputStatus::Spent { height }
        } else {
            OutputStatus::Unknown
        }
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Live outputs in commitment order.
    pub fn iter(&self) -> impl Iterator<Item = &Output> + '_ {
        self.live.values()
    }

    /// Live outputs carrying the owner tag `owner`.
    pub fn owned_by<'a>(&'a self, owner: &ViewPublic) -> impl Iterator<Item = &'a Output> + 'a {
        self.by_owner
            .get(owner)
            .into_iter()
            .flat_map(|owned| owned.iter())
            .filter_map(|commitment| self.live.get(commitment))
    }

    /// Forget tombstones for outputs spent at or below `height`, returning
    /// the ones dropped.
    pub fn prune_spent(&mut self, height: u64) -> Vec<(Commitment, u64)> {
        let pruned: Vec<(Commitment, u64)> = self
            .spent
            .iter()
            .filter(|(_, spent_at)| **spent_at <= height)
            .map(|(commitment, spent_at)| (*commitment, *spent_at))
            .collect();
        for (commitment, _) in &pruned {
            self.spent.remove(commitment);
        }
        pruned
    }

    /// A frozen copy for readers.
    pub fn snapshot(&self) -> Arc<OutputSet> {
        Arc::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ledger_output, TestWallet};
    use assert_matches::assert_matches;
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    #[test]
    fn test_insert_spend_restore() {
        let mut rng = ChaCha20Rng::seed_from_u64(30);
        let alice = TestWallet::new("alice");
        let output = ledger_output(&alice, 10, 5, &mut rng);
        let commitment = output.commitment;

        let mut set = OutputSet::new();
        set.insert(output.clone()).unwrap();
        assert_eq!(set.status(&commitment), OutputStatus::Live);
        assert_matches!(
            set.insert(output.clone()),
            Err(LedgerError::DuplicateCommitment(c)) if c == commitment
        );

        let spent = set.spend(&commitment, 6).unwrap();
        assert!(spent.spent);
        assert!(!spent.is_spendable_at(7));
        assert_eq!(spent.commitment, output.commitment);
        assert_eq!(set.status(&commitment), OutputStatus::Spent { height: 6 });
        assert_matches!(set.spend(&commitment, 7), Err(LedgerError::NotFound(_)));

        set.restore(spent).unwrap();
        assert_eq!(set.status(&commitment), OutputStatus::Live);
        assert_eq!(set.get(&commitment), Some(&output));
        assert_eq!(set.owned_by(&alice.public()).count(), 1);
    }

    #[test]
    fn test_owner_index() {
        let mut rng = ChaCha20Rng::seed_from_u64(31);
        let alice = TestWallet::new("alice");
        let bob = TestWallet::new("bob");

        let mut set = OutputSet::new();
        for value in [1, 2, 3] {
            set.insert(ledger_output(&alice, value, 1, &mut rng)).unwrap();
        }
        let bobs = ledger_output(&bob, 4, 1, &mut rng);
        set.insert(bobs.clone()).unwrap();

        assert_eq!(set.len(), 4);
        assert_eq!(set.owned_by(&alice.public()).count(), 3);
        assert_eq!(set.owned_by(&bob.public()).count(), 1);

        set.remove(&bobs.commitment).unwrap();
        assert_eq!(set.owned_by(&bob.public()).count(), 0);
        assert_eq!(set.status(&bobs.commitment), OutputStatus::Unknown);
    }

    #[test]
    fn test_prune_spent() {
        let mut rng = ChaCha20Rng::seed_from_u64(32);
        let alice = TestWallet::new("alice");
        let mut set = OutputSet::new();
        let a = ledger_output(&alice, 1, 1, &mut rng);
        let b = ledger_output(&alice, 2, 1, &mut rng);
        set.insert(a.clone()).unwrap();
        set.insert(b.clone()).unwrap();
        set.spend(&a.commitment, 10).unwrap();
        set.spend(&b.commitment, 20).unwrap();

        let before = set.clone();
        let pruned = set.prune_spent(10);
        assert_eq!(pruned, vec![(a.commitment, 10)]);
        assert_eq!(set.status(&a.commitment), OutputStatus::Unknown);
        assert_eq!(set.status(&b.commitment), OutputStatus::Spent { height: 20 });

        set.restore_tombstones(pruned);
        assert_eq!(set, before);
    }

    #[test]
    fn test_reinserting_spent_commitment_reports_tombstone() {
        let mut rng = ChaCha20Rng::seed_from_u64(34);
        let alice = TestWallet::new("alice");
        let output = ledger_output(&alice, 3, 1, &mut rng);
        let mut set = OutputSet::new();
        assert_eq!(set.insert(output.clone()).unwrap(), None);
        set.spend(&output.commitment, 4).unwrap();

        assert_eq!(set.insert(output.clone()).unwrap(), Some(4));
        assert_eq!(set.status(&output.commitment), OutputStatus::Live);
    }

    #[test]
    fn test_snapshot_is_frozen() {
        let mut rng = ChaCha20Rng::seed_from_u64(33);
        let alice = TestWallet::new("alice");
        let mut set = OutputSet::new();
        set.insert(ledger_output(&alice, 1, 1, &mut rng)).unwrap();

        let frozen = set.snapshot();
        set.insert(ledger_output(&alice, 2, 1, &mut rng)).unwrap();
        assert_eq!(frozen.len(), 1);
        assert_eq!(set.len(), 2);
    }
}
