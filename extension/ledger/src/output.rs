//! Confidential outputs, as carried in transactions and as tracked by the
//! ledger.

use blake2::{Blake2b512, Digest};
use bth_crypto_commitment::{
    domain_separators::RANGE_PROOF_DIGEST_DOMAIN_TAG, BlindingFactor, Commitment, EphemeralKey,
    Error as CryptoError, OutputOpening, RangeProofRef, SharedSecret, ViewKey, ViewPublic,
};
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

/// An output as it appears inside a transaction.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TxOutput {
    pub commitment: Commitment,
    pub range_proof: RangeProofRef,
    /// Owner tag: the recipient's view public key.
    pub owner: ViewPublic,
    /// Sender's ephemeral key `R`, from which the owner recovers the opening.
    pub ephemeral_key: EphemeralKey,
    /// Value XOR a mask derived from the shared secret.
    pub masked_value: u64,
}

impl TxOutput {
    /// Create an output of `value` for `recipient` from an explicit
    /// ephemeral secret.
    pub fn create(
        recipient: &ViewPublic,
        value: u64,
        ephemeral_secret: &BlindingFactor,
    ) -> Result<(Self, OutputOpening), CryptoError> {
        let (ephemeral_key, shared) = SharedSecret::for_recipient(ephemeral_secret, recipient)?;
        let opening = OutputOpening::from_shared_secret(value, &shared);
        let commitment = opening.commitment();
        let output = Self {
            commitment,
            range_proof: RangeProofRef::bind(&commitment, proof_digest(&commitment, &opening)),
            owner: *recipient,
            ephemeral_key,
            masked_value: value ^ shared.value_mask(),
        };
        Ok((output, opening))
    }

    /// Create an output of `value` for `recipient` with a fresh ephemeral secret.
    pub fn new<R: RngCore + CryptoRng>(
        recipient: &ViewPublic,
        value: u64,
        rng: &mut R,
    ) -> Result<(Self, OutputOpening), CryptoError> {
        Self::create(recipient, value, &BlindingFactor::random(rng))
    }

    /// Recover the opening with the owner's view key.
    pub fn rewind(&self, view_key: &ViewKey) -> Result<OutputOpening, CryptoError> {
        OutputOpening::rewind(
            view_key,
            &self.ephemeral_key,
            self.masked_value,
            &self.commitment,
        )
    }
}

// Stands in for the digest an external range prover returns for the proof
// it produced over `opening`.
fn proof_digest(commitment: &Commitment, opening: &OutputOpening) -> [u8; 32] {
    let hash = Blake2b512::new()
        .chain_update(RANGE_PROOF_DIGEST_DOMAIN_TAG)
        .chain_update(commitment.as_bytes())
        .chain_update(opening.value.to_le_bytes())
        .chain_update(opening.blinding.to_bytes())
        .finalize();
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&hash[..32]);
    digest
}

/// How an output entered the extension block.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum OutputKind {
    /// Created by a confidential transaction; spendable in the next block.
    Transfer,
    /// Created by a peg-in; waits out the maturity window.
    PeggedIn,
}

/// A confidential UTXO as tracked by the ledger.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Output {
    pub commitment: Commitment,
    pub range_proof: RangeProofRef,
    pub owner: ViewPublic,
    pub ephemeral_key: EphemeralKey,
    pub masked_value: u64,
    pub kind: OutputKind,
    pub creation_height: u64,
    pub maturity_height: u64,
    pub spent: bool,
}

impl Output {
    pub fn from_tx_output(
        output: &TxOutput,
        kind: OutputKind,
        creation_height: u64,
        maturity_height: u64,
    ) -> Self {
        Self {
            commitment: output.commitment,
            range_proof: output.range_proof,
            owner: output.owner,
            ephemeral_key: output.ephemeral_key,
            masked_value: output.masked_value,
            kind,
            creation_height,
            maturity_height,
            spent: false,
        }
    }

    /// Whether a transaction in a block at `height` may spend this output.
    pub fn is_spendable_at(&self, height: u64) -> bool {
        !self.spent && height > self.maturity_height
    }

    /// Whether the output has matured once the tip is at `height`.
    pub fn is_mature_at(&self, height: u64) -> bool {
        height >= self.maturity_height
    }

    pub fn is_owned_by(&self, owner: &ViewPublic) -> bool {
        &self.owner == owner
    }

    /// Recover the opening with the owner's view key.
    pub fn rewind(&self, view_key: &ViewKey) -> Result<OutputOpening, CryptoError> {
        OutputOpening::rewind(
            view_key,
            &self.ephemeral_key,
            self.masked_value,
            &self.commitment,
        )
    }
}
