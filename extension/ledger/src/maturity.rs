//! Maturity scheduling for pegged-in outputs.
//!
//! Outputs wait here until the chain reaches their maturity height. Advancing
//! promotes every output whose maturity height has been reached, ascending by
//! maturity height and then by scheduling order. Promotions are remembered by
//! the height that caused them so that a rollback can return them to pending.

use bth_crypto_commitment::{Commitment, ViewPublic};
use std::collections::BTreeMap;
use tracing::debug;

use crate::{context::ChainContext, output::Output, LedgerError};

/// Promotion history dropped by [`MaturityScheduler::prune_history`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PrunedHistory {
    previous_through: u64,
    promoted: BTreeMap<u64, Vec<Output>>,
}

/// Outputs waiting on maturity, keyed by maturity height.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MaturityScheduler {
    pending: BTreeMap<u64, Vec<Output>>,
    index: BTreeMap<Commitment, u64>,
    promoted: BTreeMap<u64, Vec<Output>>,
    height: u64,
    pruned_through: u64,
}

impl MaturityScheduler {
    /// An empty scheduler at chain height `height`.
    pub fn new(height: u64) -> Self {
        Self {
            height,
            pruned_through: height,
            ..Default::default()
        }
    }

    /// Rebuild from persisted pending outputs; promotion history is not
    /// persisted, so no rollback below `height` is possible.
    pub fn restore(height: u64, pending: impl IntoIterator<Item = Output>) -> Result<Self, LedgerError> {
        let mut scheduler = Self::new(height);
        for output in pending {
            let maturity_height = output.maturity_height;
            scheduler.schedule(output, maturity_height)?;
        }
        Ok(scheduler)
    }

    /// Height the scheduler has been advanced to.
    pub fn height(&self) -> u64 {
        self.height
    }

    /// Hold `output` until `maturity_height`.
    pub fn schedule(&mut self, mut output: Output, maturity_height: u64) -> Result<(), LedgerError> {
        if self.index.contains_key(&output.commitment) {
            return Err(LedgerError::DuplicateCommitment(output.commitment));
        }
        output.maturity_height = maturity_height;
        self.index.insert(output.commitment, maturity_height);
        self.pending.entry(maturity_height).or_default().push(output);
        Ok(())
    }

    /// Cancel a scheduled output (undo of `schedule`).
    pub fn unschedule(&mut self, commitment: &Commitment) -> Result<Output, LedgerError> {
        let maturity_height = self
            .index
            .remove(commitment)
            .ok_or(LedgerError::NotFound(*commitment))?;
        let bucket = self.pending.get_mut(&maturity_height).ok_or_else(|| {
            LedgerError::InconsistentState(format!("no pending bucket at {maturity_height}"))
        })?;
        let position = bucket
            .iter()
            .position(|output| &output.commitment == commitment)
            .ok_or_else(|| {
                LedgerError::InconsistentState(format!("{commitment} missing from its bucket"))
            })?;
        let output = bucket.remove(position);
        if bucket.is_empty() {
            self.pending.remove(&maturity_height);
        }
        Ok(output)
    }

    /// Promote every output with maturity height at or below `ctx.height`.
    pub fn advance_to(&mut self, ctx: &ChainContext) -> Result<Vec<Output>, LedgerError> {
        if ctx.height < self.height {
            return Err(LedgerError::HeightMismatch {
                expected: self.height,
                got: ctx.height,
            });
        }

        let later = self.pending.split_off(&(ctx.height + 1));
        let due = std::mem::replace(&mut self.pending, later);
        let matured: Vec<Output> = due.into_values().flatten().collect();
        for output in &matured {
            self.index.remove(&output.commitment);
        }
        if !matured.is_empty() {
            debug!(height = ctx.height, count = matured.len(), "Promoted matured outputs");
            self.promoted.insert(ctx.height, matured.clone());
        }
        self.height = ctx.height;
        Ok(matured)
    }

    /// Undo every promotion made above `ctx.height`, returning the outputs
    /// put back into pending, most recent first.
    pub fn rollback_to(&mut self, ctx: &ChainContext) -> Result<Vec<Output>, LedgerError> {
        if ctx.height > self.height {
            return Err(LedgerError::HeightMismatch {
                expected: self.height,
                got: ctx.height,
            });
        }
        if ctx.height < self.pruned_through {
            return Err(LedgerError::ReorgTooDeep {
                requested: ctx.height,
                oldest: self.pruned_through,
            });
        }

        let undone = self.promoted.split_off(&(ctx.height + 1));
        let mut returned = Vec::new();
        for (_, outputs) in undone.into_iter().rev() {
            for output in outputs.into_iter().rev() {
                returned.push(output);
            }
        }
        // Re-insert in promotion order so ties keep their scheduling order.
        for output in returned.iter().rev() {
            let maturity_height = output.maturity_height;
            self.schedule(output.clone(), maturity_height)?;
        }
        self.height = ctx.height;
        Ok(returned)
    }

    /// Forget promotion history at or below `height`, returning what was
    /// dropped so the caller can put it back on revert.
    pub fn prune_history(&mut self, height: u64) -> Option<PrunedHistory> {
        if height <= self.pruned_through {
            return None;
        }
        let kept = self.promoted.split_off(&(height + 1));
        let promoted = std::mem::replace(&mut self.promoted, kept);
        let previous_through = std::mem::replace(&mut self.pruned_through, height);
        Some(PrunedHistory {
            previous_through,
            promoted,
        })
    }

    /// Undo a `prune_history`.
    pub fn restore_history(&mut self, pruned: PrunedHistory) {
        self.promoted.extend(pruned.promoted);
        self.pruned_through = pruned.previous_through;
    }

    pub fn is_pending(&self, commitment: &Commitment) -> bool {
        self.index.contains_key(commitment)
    }

    pub fn maturity_of(&self, commitment: &Commitment) -> Option<u64> {
        self.index.get(commitment).copied()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Pending outputs in promotion order.
    pub fn pending(&self) -> impl Iterator<Item = &Output> + '_ {
        self.pending.values().flatten()
    }

    pub fn pending_for<'a>(&'a self, owner: &'a ViewPublic) -> impl Iterator<Item = &'a Output> + 'a {
        self.pending().filter(move |output| output.is_owned_by(owner))
    }
}
