//! Transaction kernels.
//!
//! A kernel carries the public, non-confidential parts of a transaction: its
//! fee, any peg-in or peg-out amount, an optional lock height, and the excess
//! commitment with a signature proving the excess has no value component.

use blake2::{Blake2b512, Digest};
use bth_crypto_commitment::{
    domain_separators::{KERNEL_HASH_DOMAIN_TAG, KERNEL_MESSAGE_DOMAIN_TAG},
    BlindingFactor, Commitment, Error as CryptoError, Signature,
};
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::address::Script;

/// Feature bits mixed into the kernel message.
pub mod features {
    pub const FEE: u8 = 0x01;
    pub const PEGIN: u8 = 0x02;
    pub const PEGOUT: u8 = 0x04;
    pub const HEIGHT_LOCK: u8 = 0x08;
}

/// Value leaving the extension block for a base-ledger script.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct PegOutCoin {
    pub amount: u64,
    pub script: Script,
}

/// The public terms of a transaction.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Kernel {
    pub fee: u64,
    pub pegin: Option<u64>,
    pub pegout: Option<PegOutCoin>,
    pub lock_height: Option<u64>,
    pub excess: Commitment,
    pub signature: Signature,
}

impl Kernel {
    /// Build and sign a kernel with the excess secret `excess_key`.
    pub fn sign<R: RngCore + CryptoRng>(
        fee: u64,
        pegin: Option<u64>,
        pegout: Option<PegOutCoin>,
        lock_height: Option<u64>,
        excess_key: &BlindingFactor,
        rng: &mut R,
    ) -> Self {
        let excess = Commitment::blinded(excess_key);
        let message = message_hash(fee, pegin, pegout.as_ref(), lock_height, &excess);
        Self {
            fee,
            pegin,
            pegout,
            lock_height,
            excess,
            signature: Signature::sign(excess_key, &message, rng),
        }
    }

    pub fn features(&self) -> u8 {
        feature_bits(self.pegin, self.pegout.as_ref(), self.lock_height)
    }

    /// The bytes the kernel signature signs.
    pub fn message(&self) -> [u8; 32] {
        message_hash(
            self.fee,
            self.pegin,
            self.pegout.as_ref(),
            self.lock_height,
            &self.excess,
        )
    }

    /// Kernel identifier over the message and signature.
    pub fn hash(&self) -> [u8; 32] {
        let hash = Blake2b512::new()
            .chain_update(KERNEL_HASH_DOMAIN_TAG)
            .chain_update(self.message())
            .chain_update(self.signature.to_bytes())
            .finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&hash[..32]);
        out
    }

    pub fn verify_signature(&self) -> Result<(), CryptoError> {
        self.signature.verify(&self.excess, &self.message())
    }

    pub fn is_pegin(&self) -> bool {
        self.pegin.is_some()
    }

    pub fn pegin_amount(&self) -> u64 {
        self.pegin.unwrap_or(0)
    }

    pub fn pegout_amount(&self) -> u64 {
        self.pegout.as_ref().map_or(0, |coin| coin.amount)
    }

    /// Net change in extension supply: `pegin - fee - pegout`.
    pub fn supply_change(&self) -> i128 {
        i128::from(self.pegin_amount()) - i128::from(self.fee) - i128::from(self.pegout_amount())
    }
}

fn feature_bits(pegin: Option<u64>, pegout: Option<&PegOutCoin>, lock_height: Option<u64>) -> u8 {
    let mut bits = features::FEE;
    if pegin.is_some() {
        bits |= features::PEGIN;
    }
    if pegout.is_some() {
        bits |= features::PEGOUT;
    }
    if lock_height.is_some() {
        bits |= features::HEIGHT_LOCK;
    }
    bits
}

fn message_hash(
    fee: u64,
    pegin: Option<u64>,
    pegout: Option<&PegOutCoin>,
    lock_height: Option<u64>,
    excess: &Commitment,
) -> [u8; 32] {
    let mut hasher = Blake2b512::new();
    hasher.update(KERNEL_MESSAGE_DOMAIN_TAG);
    hasher.update([feature_bits(pegin, pegout, lock_height)]);
    hasher.update(fee.to_le_bytes());
    if let Some(amount) = pegin {
        hasher.update(amount.to_le_bytes());
    }
    if let Some(coin) = pegout {
        hasher.update(coin.amount.to_le_bytes());
        hasher.update((coin.script.len() as u64).to_le_bytes());
        hasher.update(coin.script.as_bytes());
    }
    if let Some(height) = lock_height {
        hasher.update(height.to_le_bytes());
    }
    hasher.update(excess.as_bytes());

    let hash = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&hash[..32]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    #[test]
    fn test_signed_kernel_verifies() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let key = BlindingFactor::random(&mut rng);
        let kernel = Kernel::sign(3, None, None, Some(500), &key, &mut rng);

        assert!(kernel.verify_signature().is_ok());
        assert_eq!(kernel.features(), features::FEE | features::HEIGHT_LOCK);
        assert_eq!(kernel.supply_change(), -3);
    }

    #[test]
    fn test_tampered_terms_break_signature() {
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let key = BlindingFactor::random(&mut rng);
        let coin = PegOutCoin {
            amount: 2,
            script: Script::new(vec![0x00, 0x14, 0xab, 0xcd]),
        };
        let mut kernel = Kernel::sign(1, None, Some(coin), None, &key, &mut rng);
        assert!(kernel.verify_signature().is_ok());
        assert_eq!(kernel.supply_change(), -3);

        kernel.pegout.as_mut().unwrap().amount = 20;
        assert_eq!(
            kernel.verify_signature(),
            Err(CryptoError::InvalidSignature)
        );
    }

    #[test]
    fn test_hash_covers_signature() {
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let key = BlindingFactor::random(&mut rng);
        let a = Kernel::sign(0, Some(50), None, None, &key, &mut rng);
        let b = Kernel::sign(0, Some(50), None, None, &key, &mut rng);

        assert_eq!(a.message(), b.message());
        assert_ne!(a.hash(), b.hash());
        assert_eq!(a.supply_change(), 50);
    }
}
