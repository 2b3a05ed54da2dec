//! Atomic application and reversal of extension block deltas.
//!
//! A delta moves through `Pending -> Validating -> Applied | Rejected`.
//! Validation reads only the parent snapshot. Mutation happens on a private
//! copy that becomes the successor snapshot only when every step succeeds,
//! so a rejected delta leaves no trace.

use bth_crypto_commitment::{Commitment, RangeProofVerifier};
use std::fmt;
use tracing::{debug, warn};

use crate::{
    config::LedgerConfig,
    context::ChainContext,
    delta::{CutThrough, DeltaGraph, ExtensionBlockDelta},
    maturity::PrunedHistory,
    output::{Output, OutputKind},
    output_set::OutputStatus,
    pegin::PegInProcessor,
    pegout::{BaseLedgerOutput, PegOutProcessor},
    snapshot::{LedgerSnapshot, SupplyStats},
    verifier::BalanceVerifier,
    LedgerError,
};

/// Where a delta is in its lifecycle.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ApplyState {
    Pending,
    Validating,
    Applied,
    Rejected,
}

impl fmt::Display for ApplyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplyState::Pending => write!(f, "pending"),
            ApplyState::Validating => write!(f, "validating"),
            ApplyState::Applied => write!(f, "applied"),
            ApplyState::Rejected => write!(f, "rejected"),
        }
    }
}

/// Everything needed to revert one applied block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockUndo {
    pub height: u64,
    /// Spent records of the outputs the block consumed.
    pub spent: Vec<Output>,
    /// Transfer outputs inserted by the block.
    pub created: Vec<Commitment>,
    /// Peg-in outputs scheduled by the block.
    pub scheduled: Vec<Commitment>,
    /// Bridge totals contributed by the block.
    pub supply: SupplyStats,
    /// Sum of the block's kernel excesses.
    pub excess: Commitment,
    /// Spent-output tombstones the block cleared or pruned.
    pub tombstones: Vec<(Commitment, u64)>,
    /// Promotion history the block pruned.
    pub pruned_history: Option<PrunedHistory>,
}

/// What applying a block did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppliedBlock {
    pub height: u64,
    /// Transfer outputs now live.
    pub created: Vec<Output>,
    /// Peg-in outputs now pending.
    pub scheduled: Vec<Output>,
    /// Commitments removed from the live set.
    pub spent: Vec<Commitment>,
    /// Pending outputs promoted to live.
    pub matured: Vec<Output>,
    /// Outputs created and spent within the block.
    pub cut_through: Vec<Commitment>,
    /// Outputs the base ledger must create for peg-outs.
    pub pegouts: Vec<BaseLedgerOutput>,
}

/// What reverting a block did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevertedBlock {
    pub height: u64,
    /// Spent outputs made live again.
    pub restored: Vec<Output>,
    /// Transfer outputs dropped.
    pub removed: Vec<Commitment>,
    /// Peg-in outputs dropped from pending.
    pub unscheduled: Vec<Output>,
    /// Outputs moved from live back to pending.
    pub unmatured: Vec<Output>,
}

struct ValidatedDelta<'d> {
    cut: CutThrough<'d>,
    block_supply: SupplyStats,
    supply: SupplyStats,
    block_excess: Commitment,
    pegouts: Vec<BaseLedgerOutput>,
}

/// Applies or reverts one delta against a snapshot.
pub struct ExtensionBlockApplier<'a> {
    config: &'a LedgerConfig,
    range_proofs: &'a dyn RangeProofVerifier,
    state: ApplyState,
}

impl<'a> ExtensionBlockApplier<'a> {
    pub fn new(config: &'a LedgerConfig, range_proofs: &'a dyn RangeProofVerifier) -> Self {
        Self {
            config,
            range_proofs,
            state: ApplyState::Pending,
        }
    }

    pub fn state(&self) -> ApplyState {
        self.state
    }

    /// Validate `delta` against `snapshot` and build the successor snapshot.
    pub fn apply(
        &mut self,
        snapshot: &LedgerSnapshot,
        delta: &ExtensionBlockDelta,
        ctx: &ChainContext,
    ) -> Result<(LedgerSnapshot, AppliedBlock, BlockUndo), LedgerError> {
        self.state = ApplyState::Validating;
        let result = self
            .validate(snapshot, delta, ctx)
            .and_then(|validated| self.commit(snapshot, validated, ctx));

        match &result {
            Ok(_) => self.state = ApplyState::Applied,
            Err(err) => {
                self.state = ApplyState::Rejected;
                warn!(height = ctx.height, error = %err, "Rejected extension block delta");
            }
        }
        result
    }

    fn validate<'d>(
        &self,
        snapshot: &LedgerSnapshot,
        delta: &'d ExtensionBlockDelta,
        ctx: &ChainContext,
    ) -> Result<ValidatedDelta<'d>, LedgerError> {
        let expected = snapshot.height + 1;
        if ctx.height != expected {
            return Err(LedgerError::HeightMismatch {
                expected,
                got: ctx.height,
            });
        }

        let weight = delta.weight();
        if weight > self.config.max_block_weight {
            return Err(LedgerError::BlockWeight {
                weight,
                max: self.config.max_block_weight,
            });
        }

        let graph = DeltaGraph::build(delta)?;
        let pegins = PegInProcessor::new(self.config.pegin_maturity);
        pegins.reconcile(delta)?;

        let verifier = BalanceVerifier::new(self.range_proofs);
        let mut block_supply = SupplyStats::default();
        let mut excesses = Vec::with_capacity(delta.transactions.len());
        let mut pegouts = Vec::new();
        for tx in &delta.transactions {
            if let Some(lock_height) = tx.kernel.lock_height {
                if lock_height > ctx.height {
                    return Err(LedgerError::KernelLocked {
                        lock_height,
                        height: ctx.height,
                    });
                }
            }

            if tx.is_pegin() {
                pegins.verify(tx, &verifier)?;
            } else {
                verifier
                    .verify_transaction(tx)
                    .map_err(|err| err.into_ledger_error(tx.kernel.excess))?;
            }
            if let Some(base_output) = PegOutProcessor::process(tx)? {
                pegouts.push(base_output);
            }

            let contribution = SupplyStats {
                pegged_in: tx.kernel.pegin_amount(),
                pegged_out: tx.kernel.pegout_amount(),
                fees: tx.kernel.fee,
            };
            block_supply = block_supply.checked_add(&contribution).ok_or_else(|| {
                LedgerError::InconsistentState("block supply totals overflow".to_string())
            })?;
            excesses.push(tx.kernel.excess);
        }

        let cut = graph.cut_through();
        for input in &cut.inputs {
            match snapshot.outputs.status(input) {
                OutputStatus::Live => {
                    let spendable = snapshot
                        .outputs
                        .get(input)
                        .is_some_and(|output| output.is_spendable_at(ctx.height));
                    if !spendable {
                        return Err(LedgerError::ImmatureSpend { commitment: *input });
                    }
                }
                OutputStatus::Spent { .. } => return Err(LedgerError::AlreadySpent(*input)),
                OutputStatus::Unknown if snapshot.maturity.is_pending(input) => {
                    return Err(LedgerError::ImmatureSpend { commitment: *input })
                }
                OutputStatus::Unknown => return Err(LedgerError::NotFound(*input)),
            }
        }
        for surviving in &cut.outputs {
            let commitment = surviving.output.commitment;
            if snapshot.outputs.is_live(&commitment) || snapshot.maturity.is_pending(&commitment) {
                return Err(LedgerError::DuplicateCommitment(commitment));
            }
        }

        let supply = snapshot.supply.checked_add(&block_supply).ok_or_else(|| {
            LedgerError::InconsistentState("ledger supply totals overflow".to_string())
        })?;
        if supply.supply().is_none() {
            return Err(LedgerError::SupplyUnderflow);
        }
        let block_excess = Commitment::sum(&excesses, &[])?;

        debug!(
            height = ctx.height,
            transactions = delta.transactions.len(),
            inputs = cut.inputs.len(),
            outputs = cut.outputs.len(),
            cut_through = cut.removed.len(),
            "Validated extension block delta"
        );

        Ok(ValidatedDelta {
            cut,
            block_supply,
            supply,
            block_excess,
            pegouts,
        })
    }

    fn commit(
        &self,
        snapshot: &LedgerSnapshot,
        validated: ValidatedDelta<'_>,
        ctx: &ChainContext,
    ) -> Result<(LedgerSnapshot, AppliedBlock, BlockUndo), LedgerError> {
        let height = ctx.height;
        let ValidatedDelta {
            cut,
            block_supply,
            supply,
            block_excess,
            pegouts,
        } = validated;

        let mut next = snapshot.clone();
        let mut undo = BlockUndo {
            height,
            spent: Vec::with_capacity(cut.inputs.len()),
            created: Vec::new(),
            scheduled: Vec::new(),
            supply: block_supply,
            excess: block_excess,
            tombstones: Vec::new(),
            pruned_history: None,
        };

        for input in &cut.inputs {
            undo.spent.push(next.outputs.spend(input, height)?);
        }

        let pegins = PegInProcessor::new(self.config.pegin_maturity);
        let mut created = Vec::new();
        let mut scheduled = Vec::new();
        for surviving in &cut.outputs {
            if surviving.pegged_in {
                let output = pegins.process(surviving.output, ctx);
                next.maturity
                    .schedule(output.clone(), output.maturity_height)?;
                undo.scheduled.push(output.commitment);
                scheduled.push(output);
            } else {
                let output =
                    Output::from_tx_output(surviving.output, OutputKind::Transfer, height, height);
                if let Some(spent_at) = next.outputs.insert(output.clone())? {
                    undo.tombstones.push((output.commitment, spent_at));
                }
                undo.created.push(output.commitment);
                created.push(output);
            }
        }

        let matured = next.maturity.advance_to(ctx)?;
        for output in &matured {
            if let Some(spent_at) = next.outputs.insert(output.clone())? {
                undo.tombstones.push((output.commitment, spent_at));
            }
        }

        next.supply = supply;
        next.total_excess = Commitment::sum(&[next.total_excess, block_excess], &[])?;
        next.height = height;

        let horizon = height.saturating_sub(self.config.retained_blocks);
        undo.tombstones.extend(next.outputs.prune_spent(horizon));
        undo.pruned_history = next.maturity.prune_history(horizon);

        let applied = AppliedBlock {
            height,
            created,
            scheduled,
            spent: undo.spent.iter().map(|output| output.commitment).collect(),
            matured,
            cut_through: cut.removed,
            pegouts,
        };
        Ok((next, applied, undo))
    }

    /// Undo the block recorded in `undo`, which must be `snapshot`'s tip.
    pub fn revert(
        &mut self,
        snapshot: &LedgerSnapshot,
        undo: &BlockUndo,
    ) -> Result<(LedgerSnapshot, RevertedBlock), LedgerError> {
        if snapshot.height != undo.height {
            return Err(LedgerError::HeightMismatch {
                expected: snapshot.height,
                got: undo.height,
            });
        }
        let parent = undo
            .height
            .checked_sub(1)
            .map(ChainContext::at)
            .ok_or_else(|| LedgerError::InconsistentState("cannot revert below height 0".into()))?;

        let mut next = snapshot.clone();

        let mut removed = Vec::with_capacity(undo.created.len());
        for commitment in undo.created.iter().rev() {
            next.outputs.remove(commitment)?;
            removed.push(*commitment);
        }
        let mut unscheduled = Vec::with_capacity(undo.scheduled.len());
        for commitment in undo.scheduled.iter().rev() {
            unscheduled.push(next.maturity.unschedule(commitment)?);
        }
        let mut restored = Vec::with_capacity(undo.spent.len());
        for output in undo.spent.iter().rev() {
            next.outputs.restore(output.clone())?;
            restored.push(next.outputs.get(&output.commitment).cloned().ok_or_else(|| {
                LedgerError::InconsistentState(format!("{} not restored", output.commitment))
            })?);
        }
        restored.reverse();

        let unmatured = next.maturity.rollback_to(&parent)?;
        for output in &unmatured {
            next.outputs.remove(&output.commitment)?;
        }
        next.outputs.restore_tombstones(undo.tombstones.iter().copied());
        if let Some(pruned) = &undo.pruned_history {
            next.maturity.restore_history(pruned.clone());
        }

        next.supply = next.supply.checked_sub(&undo.supply).ok_or_else(|| {
            LedgerError::InconsistentState("undo record exceeds ledger supply".to_string())
        })?;
        next.total_excess = Commitment::sum(&[next.total_excess], &[undo.excess])?;
        next.height = parent.height;

        debug!(
            height = undo.height,
            restored = undo.spent.len(),
            removed = removed.len(),
            unmatured = unmatured.len(),
            "Reverted extension block"
        );

        Ok((
            next,
            RevertedBlock {
                height: undo.height,
                restored,
                removed,
                unscheduled,
                unmatured,
            },
        ))
    }
}
