// Copyright (c) 2018-2025 The Botho Foundation

//! Range-proof references.
//!
//! The extension block stores a 32-byte reference per output rather than the
//! proof itself. Proof construction and checking belong to an external
//! prover, reached through [`RangeProofVerifier`].

use blake2::{Blake2b512, Digest};
use serde::{Deserialize, Serialize};

use crate::{domain_separators::RANGE_PROOF_REF_DOMAIN_TAG, Commitment, Error};

/// A reference to a range proof for one output commitment.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct RangeProofRef {
    /// Digest of the proof bytes held by the prover.
    pub proof_digest: [u8; 32],
    /// Binds `proof_digest` to the commitment it proves.
    pub binding: [u8; 32],
}

impl RangeProofRef {
    /// Reference `proof_digest` as a proof for `commitment`.
    pub fn bind(commitment: &Commitment, proof_digest: [u8; 32]) -> Self {
        Self {
            proof_digest,
            binding: binding(commitment, &proof_digest),
        }
    }

    /// Whether this reference was bound to `commitment`.
    pub fn is_bound_to(&self, commitment: &Commitment) -> bool {
        self.binding == binding(commitment, &self.proof_digest)
    }
}

fn binding(commitment: &Commitment, proof_digest: &[u8; 32]) -> [u8; 32] {
    let hash = Blake2b512::new()
        .chain_update(RANGE_PROOF_REF_DOMAIN_TAG)
        .chain_update(commitment.as_bytes())
        .chain_update(proof_digest)
        .finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&hash[..32]);
    out
}

/// Checks that a range proof shows a commitment hides a non-negative value.
pub trait RangeProofVerifier: Send + Sync {
    /// Verify `proof` for `commitment`.
    fn verify(&self, commitment: &Commitment, proof: &RangeProofRef) -> Result<(), Error>;
}

/// Accepts any reference bound to the commitment it accompanies.
#[derive(Clone, Copy, Debug, Default)]
pub struct BoundReferenceVerifier;

impl RangeProofVerifier for BoundReferenceVerifier {
    fn verify(&self, commitment: &Commitment, proof: &RangeProofRef) -> Result<(), Error> {
        if proof.is_bound_to(commitment) {
            Ok(())
        } else {
            Err(Error::InvalidRangeProof)
        }
    }
}
