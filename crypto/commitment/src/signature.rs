// Copyright (c) 2018-2025 The Botho Foundation

//! Schnorr signatures over Ristretto, keyed by a kernel excess.
//!
//! A valid signature under the excess `E = x*G` proves the signer knows `x`,
//! and therefore that `E` carries no value component `v*H`.

use blake2::{Blake2b512, Digest};
use curve25519_dalek::{ristretto::CompressedRistretto, scalar::Scalar};
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::{
    domain_separators::KERNEL_SIGNATURE_DOMAIN_TAG, pedersen::blinding_generator, BlindingFactor,
    Commitment, Error,
};

/// A Schnorr signature `(R, s)` with `s*G = R + e*P`.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    r: [u8; 32],
    s: [u8; 32],
}

impl Signature {
    /// Sign `message` with the secret key `key`.
    pub fn sign<R: RngCore + CryptoRng>(
        key: &BlindingFactor,
        message: &[u8; 32],
        rng: &mut R,
    ) -> Self {
        let mut nonce = Scalar::random(rng);
        let r = (nonce * blinding_generator()).compress().to_bytes();
        let public = Commitment::blinded(key);
        let e = challenge(&r, &public, message);
        let s = nonce + e * key.0;
        nonce.zeroize();

        Self { r, s: s.to_bytes() }
    }

    /// Verify against the public key `public` (a kernel excess).
    pub fn verify(&self, public: &Commitment, message: &[u8; 32]) -> Result<(), Error> {
        let public_point = public.to_point()?;
        let r_point = CompressedRistretto(self.r)
            .decompress()
            .ok_or(Error::InvalidCurvePoint)?;
        let s = Option::<Scalar>::from(Scalar::from_canonical_bytes(self.s))
            .ok_or(Error::InvalidScalar)?;

        let e = challenge(&self.r, public, message);
        if s * blinding_generator() == r_point + e * public_point {
            Ok(())
        } else {
            Err(Error::InvalidSignature)
        }
    }

    /// `R || s`.
    pub fn to_bytes(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(&self.r);
        out[32..].copy_from_slice(&self.s);
        out
    }

    /// Inverse of [`Signature::to_bytes`]. Validity is checked on verify.
    pub fn from_bytes(bytes: &[u8; 64]) -> Self {
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..]);
        Self { r, s }
    }
}

fn challenge(r: &[u8; 32], public: &Commitment, message: &[u8; 32]) -> Scalar {
    let hasher = Blake2b512::new()
        .chain_update(KERNEL_SIGNATURE_DOMAIN_TAG)
        .chain_update(r)
        .chain_update(public.as_bytes())
        .chain_update(message);
    Scalar::from_hash(hasher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    #[test]
    fn test_sign_and_verify() {
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        let key = BlindingFactor::random(&mut rng);
        let message = [3u8; 32];

        let sig = Signature::sign(&key, &message, &mut rng);
        assert_eq!(sig.verify(&Commitment::blinded(&key), &message), Ok(()));
    }

    #[test]
    fn test_wrong_message_or_key_fails() {
        let mut rng = ChaCha20Rng::seed_from_u64(12);
        let key = BlindingFactor::random(&mut rng);
        let other = BlindingFactor::random(&mut rng);
        let sig = Signature::sign(&key, &[1u8; 32], &mut rng);

        assert_matches!(
            sig.verify(&Commitment::blinded(&key), &[2u8; 32]),
            Err(Error::InvalidSignature)
        );
        assert_matches!(
            sig.verify(&Commitment::blinded(&other), &[1u8; 32]),
            Err(Error::InvalidSignature)
        );
    }

    #[test]
    fn test_value_bearing_excess_cannot_be_signed_for() {
        // An excess with an H component has no known discrete log, so a
        // signature made with the blinding part alone does not verify.
        let mut rng = ChaCha20Rng::seed_from_u64(13);
        let key = BlindingFactor::random(&mut rng);
        let excess = Commitment::new(5, &key);

        let sig = Signature::sign(&key, &[9u8; 32], &mut rng);
        assert_matches!(sig.verify(&excess, &[9u8; 32]), Err(Error::InvalidSignature));
    }

    #[test]
    fn test_malformed_signature() {
        let mut rng = ChaCha20Rng::seed_from_u64(14);
        let key = BlindingFactor::random(&mut rng);
        let mut bytes = Signature::sign(&key, &[0u8; 32], &mut rng).to_bytes();
        bytes[32..].copy_from_slice(&[0xFF; 32]);

        let sig = Signature::from_bytes(&bytes);
        assert_matches!(
            sig.verify(&Commitment::blinded(&key), &[0u8; 32]),
            Err(Error::InvalidScalar)
        );
    }
}
