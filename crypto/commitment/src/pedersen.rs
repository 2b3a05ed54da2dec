// Copyright (c) 2018-2025 The Botho Foundation

//! Pedersen commitments `v*H + r*G` over Ristretto.

use core::fmt;

use blake2::{Blake2b512, Digest};
use curve25519_dalek::{
    constants::RISTRETTO_BASEPOINT_POINT,
    ristretto::{CompressedRistretto, RistrettoPoint},
    scalar::Scalar,
    traits::Identity,
};
use serde::{Deserialize, Serialize};
use subtle::{Choice, ConstantTimeEq};

use crate::{domain_separators::VALUE_GENERATOR_DOMAIN_TAG, BlindingFactor, Error};

lazy_static::lazy_static! {
    static ref VALUE_GENERATOR: RistrettoPoint =
        RistrettoPoint::from_hash(Blake2b512::new().chain_update(VALUE_GENERATOR_DOMAIN_TAG));
}

/// The value generator `H`. Nobody knows its discrete log with respect to
/// `G`.
pub fn value_generator() -> RistrettoPoint {
    *VALUE_GENERATOR
}

/// The blinding generator `G` (the Ristretto basepoint).
pub fn blinding_generator() -> RistrettoPoint {
    RISTRETTO_BASEPOINT_POINT
}

/// A compressed Pedersen commitment.
///
/// Output commitments double as output identifiers, so this type is ordered
/// and hashable by its compressed encoding.
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Commitment([u8; 32]);

impl Commitment {
    /// Commit to `value` under `blinding`.
    pub fn new(value: u64, blinding: &BlindingFactor) -> Self {
        Self::from_point(&(Scalar::from(value) * value_generator() + blinding.public_point()))
    }

    /// A commitment to a public value with zero blinding: `v*H`.
    pub fn transparent(value: u64) -> Self {
        Self::from_point(&(Scalar::from(value) * value_generator()))
    }

    /// A commitment to zero: `r*G`. Kernel excesses have this form.
    pub fn blinded(blinding: &BlindingFactor) -> Self {
        Self::from_point(&blinding.public_point())
    }

    /// Compress a point.
    pub fn from_point(point: &RistrettoPoint) -> Self {
        Self(point.compress().to_bytes())
    }

    /// Wrap an encoded commitment. The bytes are not checked until
    /// [`Commitment::to_point`] is called.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The compressed encoding.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Decompress.
    pub fn to_point(&self) -> Result<RistrettoPoint, Error> {
        CompressedRistretto(self.0)
            .decompress()
            .ok_or(Error::InvalidCurvePoint)
    }

    /// Whether this encodes the identity point.
    pub fn is_identity(&self) -> bool {
        self.0 == RistrettoPoint::identity().compress().to_bytes()
    }

    /// `Σpositive − Σnegative`, failing on any undecodable commitment.
    pub fn sum(positive: &[Commitment], negative: &[Commitment]) -> Result<Self, Error> {
        let pos = sum_points(positive)?;
        let neg = sum_points(negative)?;
        Ok(Self::from_point(&(pos - neg)))
    }
}

fn sum_points(commitments: &[Commitment]) -> Result<RistrettoPoint, Error> {
    commitments.iter().map(Commitment::to_point).sum()
}

impl ConstantTimeEq for Commitment {
    fn ct_eq(&self, other: &Self) -> Choice {
        self.0[..].ct_eq(&other.0[..])
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Commitment({})", hex::encode(&self.0[..8]))
    }
}
