//! Immutable ledger state as published to readers.

use blake2::{Blake2b512, Digest};
use bth_crypto_commitment::{
    domain_separators::STATE_DIGEST_DOMAIN_TAG, Commitment, ViewKey, ViewPublic,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    maturity::MaturityScheduler,
    output::{Output, OutputKind},
    output_set::OutputSet,
    LedgerError,
};

/// Running totals of value crossing the bridge.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct SupplyStats {
    pub pegged_in: u64,
    pub pegged_out: u64,
    pub fees: u64,
}

impl SupplyStats {
    /// Value currently held in the extension block, `None` if negative.
    pub fn supply(&self) -> Option<u64> {
        self.pegged_in
            .checked_sub(self.pegged_out)?
            .checked_sub(self.fees)
    }

    pub fn checked_add(&self, other: &SupplyStats) -> Option<SupplyStats> {
        Some(SupplyStats {
            pegged_in: self.pegged_in.checked_add(other.pegged_in)?,
            pegged_out: self.pegged_out.checked_add(other.pegged_out)?,
            fees: self.fees.checked_add(other.fees)?,
        })
    }

    pub fn checked_sub(&self, other: &SupplyStats) -> Option<SupplyStats> {
        Some(SupplyStats {
            pegged_in: self.pegged_in.checked_sub(other.pegged_in)?,
            pegged_out: self.pegged_out.checked_sub(other.pegged_out)?,
            fees: self.fees.checked_sub(other.fees)?,
        })
    }
}

/// The ledger at one height: live outputs, pending outputs, bridge totals
/// and the sum of every kernel excess applied so far.
#[derive(Clone, Debug)]
pub struct LedgerSnapshot {
    pub(crate) height: u64,
    pub(crate) outputs: OutputSet,
    pub(crate) maturity: MaturityScheduler,
    pub(crate) supply: SupplyStats,
    pub(crate) total_excess: Commitment,
}

impl LedgerSnapshot {
    /// An empty ledger whose tip is `height`.
    pub fn genesis(height: u64) -> Self {
        Self {
            height,
            outputs: OutputSet::new(),
            maturity: MaturityScheduler::new(height),
            supply: SupplyStats::default(),
            total_excess: Commitment::transparent(0),
        }
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn outputs(&self) -> &OutputSet {
        &self.outputs
    }

    pub fn maturity(&self) -> &MaturityScheduler {
        &self.maturity
    }

    pub fn supply(&self) -> SupplyStats {
        self.supply
    }

    pub fn total_excess(&self) -> Commitment {
        self.total_excess
    }

    /// Outputs still waiting on maturity, optionally for one owner.
    pub fn pending_outputs(&self, owner: Option<&ViewPublic>) -> Vec<&Output> {
        self.maturity
            .pending()
            .filter(|output| owner.map_or(true, |owner| output.is_owned_by(owner)))
            .collect()
    }

    /// Digest over height, live outputs, pending outputs, supply totals and
    /// accumulated excess. Equal digests mean equal observable state.
    pub fn state_digest(&self) -> [u8; 32] {
        let mut hasher = Blake2b512::new();
        hasher.update(STATE_DIGEST_DOMAIN_TAG);
        hasher.update(self.height.to_le_bytes());

        hasher.update((self.outputs.len() as u64).to_le_bytes());
        for output in self.outputs.iter() {
            hash_output(&mut hasher, output);
        }
        let mut pending: Vec<&Output> = self.maturity.pending().collect();
        pending.sort_by_key(|output| (output.maturity_height, output.commitment));
        hasher.update((pending.len() as u64).to_le_bytes());
        for output in pending {
            hash_output(&mut hasher, output);
        }

        hasher.update(self.supply.pegged_in.to_le_bytes());
        hasher.update(self.supply.pegged_out.to_le_bytes());
        hasher.update(self.supply.fees.to_le_bytes());
        hasher.update(self.total_excess.as_bytes());

        let hash = hasher.finalize();
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&hash[..32]);
        digest
    }

    /// Audit the whole state.
    ///
    /// Every commitment ever created and not spent, plus every kernel excess,
    /// must sum to the supply committed with a zero blinding factor. Live and
    /// pending sets must not overlap.
    pub fn validate_state(&self) -> Result<(), LedgerError> {
        let supply = self.supply.supply().ok_or(LedgerError::SupplyUnderflow)?;

        let mut positive: Vec<Commitment> = self
            .outputs
            .iter()
            .map(|output| output.commitment)
            .chain(self.maturity.pending().map(|output| output.commitment))
            .collect();
        positive.push(self.total_excess);

        if let Some(output) = self
            .maturity
            .pending()
            .find(|output| self.outputs.is_live(&output.commitment))
        {
            return Err(LedgerError::InconsistentState(format!(
                "{} is both live and pending",
                output.commitment
            )));
        }
        if let Some(output) = self
            .outputs
            .iter()
            .find(|output| !output.is_mature_at(self.height))
        {
            return Err(LedgerError::InconsistentState(format!(
                "{} is live before its maturity height {}",
                output.commitment, output.maturity_height
            )));
        }

        let total = Commitment::sum(&positive, &[])?;
        if total != Commitment::transparent(supply) {
            return Err(LedgerError::InconsistentState(format!(
                "outputs and kernel excesses do not sum to supply {supply}"
            )));
        }
        Ok(())
    }
}

fn hash_output(hasher: &mut Blake2b512, output: &Output) {
    hasher.update(output.commitment.as_bytes());
    hasher.update(output.owner.as_bytes());
    hasher.update(output.ephemeral_key.as_bytes());
    hasher.update(output.masked_value.to_le_bytes());
    hasher.update([match output.kind {
        OutputKind::Transfer => 0u8,
        OutputKind::PeggedIn => 1u8,
    }]);
    hasher.update(output.creation_height.to_le_bytes());
    hasher.update(output.maturity_height.to_le_bytes());
}

/// The matured, unspent outputs of one snapshot, optionally restricted to
/// one owner. Iterating again starts over from the same snapshot.
#[derive(Clone, Debug)]
pub struct SpendableOutputs {
    snapshot: Arc<LedgerSnapshot>,
    owner: Option<ViewPublic>,
}

impl SpendableOutputs {
    pub fn new(snapshot: Arc<LedgerSnapshot>, owner: Option<ViewPublic>) -> Self {
        Self { snapshot, owner }
    }

    /// Tip height of the underlying snapshot.
    pub fn height(&self) -> u64 {
        self.snapshot.height
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = &Output> + '_> {
        let height = self.snapshot.height;
        match &self.owner {
            Some(owner) => Box::new(
                self.snapshot
                    .outputs
                    .owned_by(owner)
                    .filter(move |output| output.is_mature_at(height)),
            ),
            None => Box::new(
                self.snapshot
                    .outputs
                    .iter()
                    .filter(move |output| output.is_mature_at(height)),
            ),
        }
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    pub fn commitments(&self) -> Vec<Commitment> {
        self.iter().map(|output| output.commitment).collect()
    }

    /// Total value of the outputs `view_key` can open.
    pub fn balance(&self, view_key: &ViewKey) -> u64 {
        self.iter()
            .filter_map(|output| output.rewind(view_key).ok())
            .fold(0u64, |sum, opening| sum.saturating_add(opening.value))
    }
}

impl<'a> IntoIterator for &'a SpendableOutputs {
    type Item = &'a Output;
    type IntoIter = Box<dyn Iterator<Item = &'a Output> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
