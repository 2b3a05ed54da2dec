// Copyright (c) 2018-2025 The Botho Foundation

//! Blinding factors: the secret scalar `r` of a commitment `v*H + r*G`.

use core::{
    fmt,
    ops::{Add, Neg, Sub},
};

use blake2::{Blake2b512, Digest};
use curve25519_dalek::{ristretto::RistrettoPoint, scalar::Scalar};
use rand_core::{CryptoRng, RngCore};
use subtle::{Choice, ConstantTimeEq};
use zeroize::Zeroize;

use crate::{pedersen::blinding_generator, Error};

/// A secret blinding factor. Zeroized when dropped.
#[derive(Clone)]
pub struct BlindingFactor(pub(crate) Scalar);

impl BlindingFactor {
    /// The zero blinding factor.
    pub fn zero() -> Self {
        Self(Scalar::ZERO)
    }

    /// A uniformly random blinding factor.
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self(Scalar::random(rng))
    }

    /// Hash `domain || parts...` to a blinding factor.
    pub fn derive(domain: &[u8], parts: &[&[u8]]) -> Self {
        let mut hasher = Blake2b512::new();
        hasher.update(domain);
        for part in parts {
            hasher.update(part);
        }
        Self(Scalar::from_hash(hasher))
    }

    /// Decode a canonical little-endian scalar.
    pub fn from_canonical_bytes(bytes: [u8; 32]) -> Result<Self, Error> {
        Option::<Scalar>::from(Scalar::from_canonical_bytes(bytes))
            .map(Self)
            .ok_or(Error::InvalidScalar)
    }

    /// Encode as little-endian bytes.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// Whether this is the zero scalar (constant time).
    pub fn is_zero(&self) -> bool {
        self.0.ct_eq(&Scalar::ZERO).into()
    }

    /// `Σpositive − Σnegative`.
    pub fn sum<'a, P, N>(positive: P, negative: N) -> Self
    where
        P: IntoIterator<Item = &'a BlindingFactor>,
        N: IntoIterator<Item = &'a BlindingFactor>,
    {
        let pos: Scalar = positive.into_iter().map(|b| b.0).sum();
        let neg: Scalar = negative.into_iter().map(|b| b.0).sum();
        Self(pos - neg)
    }

    /// The public point `r*G`.
    pub(crate) fn public_point(&self) -> RistrettoPoint {
        self.0 * blinding_generator()
    }
}

impl Drop for BlindingFactor {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for BlindingFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BlindingFactor(..)")
    }
}

impl ConstantTimeEq for BlindingFactor {
    fn ct_eq(&self, other: &Self) -> Choice {
        self.0.ct_eq(&other.0)
    }
}

impl PartialEq for BlindingFactor {
    fn eq(&self, other: &Self) -> bool {
        self.ct_eq(other).into()
    }
}

impl Eq for BlindingFactor {}

impl Add for &BlindingFactor {
    type Output = BlindingFactor;

    fn add(self, rhs: &BlindingFactor) -> BlindingFactor {
        BlindingFactor(self.0 + rhs.0)
    }
}

impl Sub for &BlindingFactor {
    type Output = BlindingFactor;

    fn sub(self, rhs: &BlindingFactor) -> BlindingFactor {
        BlindingFactor(self.0 - rhs.0)
    }
}

impl Neg for &BlindingFactor {
    type Output = BlindingFactor;

    fn neg(self) -> BlindingFactor {
        BlindingFactor(-self.0)
    }
}
