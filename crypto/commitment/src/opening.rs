// Copyright (c) 2018-2025 The Botho Foundation

//! Output openings derived from an ECDH shared secret.
//!
//! A sender picks an ephemeral secret `r`, publishes `R = r*G` alongside the
//! output, and computes the shared secret `r*A` for the recipient's view
//! public key `A = a*G`. The output blinding factor and a value mask are both
//! derived from that secret, so the recipient can recompute the opening from
//! `a*R` and check it against the commitment.

use core::fmt;

use blake2::{Blake2b512, Digest};
use curve25519_dalek::{
    ristretto::{CompressedRistretto, RistrettoPoint},
    scalar::Scalar,
};
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::{
    domain_separators::{OUTPUT_BLINDING_DOMAIN_TAG, OUTPUT_VALUE_MASK_DOMAIN_TAG},
    pedersen::blinding_generator,
    BlindingFactor, Commitment, Error,
};

/// The secret half of a confidential address.
#[derive(Clone)]
pub struct ViewKey(Scalar);

impl ViewKey {
    /// A random view key.
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self(Scalar::random(rng))
    }

    /// Derive a view key from seed bytes.
    pub fn from_seed(seed: &[u8]) -> Self {
        Self(Scalar::from_hash(Blake2b512::new().chain_update(seed)))
    }

    /// `A = a*G`.
    pub fn public(&self) -> ViewPublic {
        ViewPublic((self.0 * blinding_generator()).compress().to_bytes())
    }

    /// `a*R`.
    pub fn shared_secret(&self, ephemeral: &EphemeralKey) -> Result<SharedSecret, Error> {
        let r_point = decompress(&ephemeral.0)?;
        Ok(SharedSecret::from_point(&(self.0 * r_point)))
    }
}

impl Drop for ViewKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for ViewKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ViewKey({})", self.public())
    }
}

/// The public half of a confidential address.
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct ViewPublic([u8; 32]);

impl ViewPublic {
    /// Wrap encoded bytes; checked when used.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The compressed encoding.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Whether the bytes decode to a group element.
    pub fn is_valid(&self) -> bool {
        decompress(&self.0).is_ok()
    }
}

impl fmt::Display for ViewPublic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for ViewPublic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ViewPublic({})", hex::encode(&self.0[..8]))
    }
}

/// The ephemeral public key `R` published with an output.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct EphemeralKey([u8; 32]);

impl EphemeralKey {
    /// Wrap encoded bytes; checked when used.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The compressed encoding.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// The ECDH secret shared between an output's sender and its owner.
pub struct SharedSecret([u8; 32]);

impl SharedSecret {
    /// Sender side: derive `(R, r*A)` from the ephemeral secret `r`.
    pub fn for_recipient(
        ephemeral_secret: &BlindingFactor,
        recipient: &ViewPublic,
    ) -> Result<(EphemeralKey, Self), Error> {
        let a_point = decompress(&recipient.0)?;
        let ephemeral = EphemeralKey(ephemeral_secret.public_point().compress().to_bytes());
        Ok((ephemeral, Self::from_point(&(ephemeral_secret.0 * a_point))))
    }

    /// Sender side with a fresh random ephemeral secret.
    pub fn random_for_recipient<R: RngCore + CryptoRng>(
        recipient: &ViewPublic,
        rng: &mut R,
    ) -> Result<(EphemeralKey, Self), Error> {
        Self::for_recipient(&BlindingFactor::random(rng), recipient)
    }

    fn from_point(point: &RistrettoPoint) -> Self {
        Self(point.compress().to_bytes())
    }

    /// The output blinding factor this secret determines.
    pub fn blinding(&self) -> BlindingFactor {
        BlindingFactor::derive(OUTPUT_BLINDING_DOMAIN_TAG, &[&self.0])
    }

    /// The mask XORed over the output value.
    pub fn value_mask(&self) -> u64 {
        let hash = Blake2b512::new()
            .chain_update(OUTPUT_VALUE_MASK_DOMAIN_TAG)
            .chain_update(self.0)
            .finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash[..8]);
        u64::from_le_bytes(bytes)
    }
}

impl Drop for SharedSecret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// The opening `(v, r)` of an output commitment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputOpening {
    /// Committed value.
    pub value: u64,
    /// Blinding factor.
    pub blinding: BlindingFactor,
}

impl OutputOpening {
    /// The opening of a `value` output built from `shared`.
    pub fn from_shared_secret(value: u64, shared: &SharedSecret) -> Self {
        Self {
            value,
            blinding: shared.blinding(),
        }
    }

    /// `v*H + r*G`.
    pub fn commitment(&self) -> Commitment {
        Commitment::new(self.value, &self.blinding)
    }

    /// Recover the opening of an output owned by `view_key`.
    ///
    /// Fails with [`Error::OpeningMismatch`] when the output does not belong
    /// to this key (or was built inconsistently).
    pub fn rewind(
        view_key: &ViewKey,
        ephemeral: &EphemeralKey,
        masked_value: u64,
        commitment: &Commitment,
    ) -> Result<Self, Error> {
        let shared = view_key.shared_secret(ephemeral)?;
        let opening = Self::from_shared_secret(masked_value ^ shared.value_mask(), &shared);
        if bool::from(opening.commitment().ct_eq(commitment)) {
            Ok(opening)
        } else {
            Err(Error::OpeningMismatch)
        }
    }
}

fn decompress(bytes: &[u8; 32]) -> Result<RistrettoPoint, Error> {
    CompressedRistretto(*bytes)
        .decompress()
        .ok_or(Error::InvalidCurvePoint)
}
