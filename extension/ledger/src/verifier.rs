//! Per-kernel balance verification.

use bth_crypto_commitment::{Commitment, Error as CryptoError, RangeProofVerifier};
use thiserror::Error;

use crate::{kernel::Kernel, output::TxOutput, transaction::Transaction, LedgerError};

/// Why a kernel failed verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BalanceError {
    #[error("commitments do not sum to the kernel excess")]
    Imbalance,

    #[error("malformed proof: {0}")]
    MalformedProof(CryptoError),
}

impl BalanceError {
    /// Lift into a ledger error for the kernel with excess `excess`.
    pub fn into_ledger_error(self, excess: Commitment) -> LedgerError {
        match self {
            BalanceError::Imbalance => LedgerError::ImbalancedKernel(excess),
            BalanceError::MalformedProof(err) => LedgerError::MalformedProof(err),
        }
    }
}

/// Checks that a kernel's inputs, outputs and public amounts balance.
///
/// Holds no state; verification of one kernel never depends on another.
#[derive(Clone, Copy)]
pub struct BalanceVerifier<'a> {
    range_proofs: &'a dyn RangeProofVerifier,
}

impl<'a> BalanceVerifier<'a> {
    pub fn new(range_proofs: &'a dyn RangeProofVerifier) -> Self {
        Self { range_proofs }
    }

    /// Verify `Σinputs + pegin·H − Σoutputs − fee·H − pegout·H == excess`,
    /// every output range proof, and the excess signature.
    pub fn verify_kernel(
        &self,
        kernel: &Kernel,
        inputs: &[Commitment],
        outputs: &[TxOutput],
    ) -> Result<(), BalanceError> {
        for output in outputs {
            self.range_proofs
                .verify(&output.commitment, &output.range_proof)
                .map_err(BalanceError::MalformedProof)?;
        }
        kernel
            .excess
            .to_point()
            .map_err(BalanceError::MalformedProof)?;

        let mut positive = inputs.to_vec();
        if let Some(amount) = kernel.pegin {
            positive.push(Commitment::transparent(amount));
        }
        let mut negative: Vec<Commitment> = outputs.iter().map(|o| o.commitment).collect();
        negative.push(Commitment::transparent(kernel.fee));
        negative.push(Commitment::transparent(kernel.pegout_amount()));

        let computed =
            Commitment::sum(&positive, &negative).map_err(BalanceError::MalformedProof)?;
        if computed != kernel.excess {
            return Err(BalanceError::Imbalance);
        }

        kernel
            .verify_signature()
            .map_err(BalanceError::MalformedProof)
    }

    pub fn verify_transaction(&self, tx: &Transaction) -> Result<(), BalanceError> {
        self.verify_kernel(&tx.kernel, &tx.inputs, &tx.outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{pegin_tx, transfer_tx, TestWallet};
    use bth_crypto_commitment::{BoundReferenceVerifier, RangeProofRef};
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    #[test]
    fn test_balanced_transfer() {
        let mut rng = ChaCha20Rng::seed_from_u64(20);
        let alice = TestWallet::new("alice");
        let bob = TestWallet::new("bob");

        let (_, _, coin) = pegin_tx(&alice, 10, &mut rng);
        let (tx, _) = transfer_tx(&[coin], &[(&bob, 7), (&alice, 2)], 1, &mut rng);

        let verifier = BalanceVerifier::new(&BoundReferenceVerifier);
        assert_eq!(verifier.verify_transaction(&tx), Ok(()));
    }

    #[test]
    fn test_pegin_balances() {
        let mut rng = ChaCha20Rng::seed_from_u64(21);
        let alice = TestWallet::new("alice");
        let (tx, _, _) = pegin_tx(&alice, 50, &mut rng);

        let verifier = BalanceVerifier::new(&BoundReferenceVerifier);
        assert_eq!(verifier.verify_transaction(&tx), Ok(()));
    }

    #[test]
    fn test_inflation_is_imbalanced() {
        let mut rng = ChaCha20Rng::seed_from_u64(22);
        let alice = TestWallet::new("alice");

        let (_, _, coin) = pegin_tx(&alice, 10, &mut rng);
        let (tx, _) = transfer_tx(&[coin], &[(&alice, 11)], 0, &mut rng);

        let verifier = BalanceVerifier::new(&BoundReferenceVerifier);
        assert_eq!(verifier.verify_transaction(&tx), Err(BalanceError::Imbalance));
        assert_eq!(
            BalanceError::Imbalance.into_ledger_error(tx.kernel.excess),
            LedgerError::ImbalancedKernel(tx.kernel.excess)
        );
    }

    #[test]
    fn test_unbound_range_proof_is_malformed() {
        let mut rng = ChaCha20Rng::seed_from_u64(23);
        let alice = TestWallet::new("alice");

        let (mut tx, _, _) = pegin_tx(&alice, 10, &mut rng);
        tx.outputs[0].range_proof = RangeProofRef::default();

        let verifier = BalanceVerifier::new(&BoundReferenceVerifier);
        assert_eq!(
            verifier.verify_transaction(&tx),
            Err(BalanceError::MalformedProof(CryptoError::InvalidRangeProof))
        );
    }

    #[test]
    fn test_bad_signature_is_malformed() {
        let mut rng = ChaCha20Rng::seed_from_u64(24);
        let alice = TestWallet::new("alice");

        let (mut tx, _, _) = pegin_tx(&alice, 10, &mut rng);
        let (other, _, _) = pegin_tx(&alice, 10, &mut rng);
        tx.kernel.signature = other.kernel.signature;

        let verifier = BalanceVerifier::new(&BoundReferenceVerifier);
        assert_eq!(
            verifier.verify_transaction(&tx),
            Err(BalanceError::MalformedProof(CryptoError::InvalidSignature))
        );
    }
}
