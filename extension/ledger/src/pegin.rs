//! Peg-in processing.
//!
//! A peg-in is claimed by a kernel carrying the pegged amount, with no inputs,
//! no fee and a single output owned by the destination named on the base
//! ledger. Every peg-in kernel in a delta must match exactly one base-ledger
//! peg-in record by excess and amount, and every record must be claimed.

use bth_crypto_commitment::Commitment;
use std::collections::HashMap;

use crate::{
    context::ChainContext,
    delta::{ExtensionBlockDelta, PegInRecord},
    output::{Output, OutputKind, TxOutput},
    transaction::Transaction,
    verifier::{BalanceError, BalanceVerifier},
    LedgerError,
};

/// Validates peg-in kernels and turns their outputs into pending outputs.
#[derive(Clone, Copy, Debug)]
pub struct PegInProcessor {
    maturity_window: u64,
}

impl PegInProcessor {
    pub fn new(maturity_window: u64) -> Self {
        Self { maturity_window }
    }

    /// Height at which a peg-in included at `inclusion_height` matures.
    pub fn maturity_height(&self, inclusion_height: u64) -> u64 {
        inclusion_height.saturating_add(self.maturity_window)
    }

    /// Match every peg-in kernel against the base-ledger records.
    pub fn reconcile(&self, delta: &ExtensionBlockDelta) -> Result<(), LedgerError> {
        let mut records: HashMap<Commitment, &PegInRecord> = HashMap::new();
        for record in &delta.pegins {
            if record.amount == 0 {
                return Err(LedgerError::MalformedPegIn(
                    "peg-in record with zero amount".to_string(),
                ));
            }
            if records.insert(record.kernel_excess, record).is_some() {
                return Err(LedgerError::MalformedPegIn(format!(
                    "two peg-in records name kernel {}",
                    record.kernel_excess
                )));
            }
        }

        let mut claimed = 0;
        for tx in delta.transactions.iter().filter(|tx| tx.is_pegin()) {
            let record = records.get(&tx.kernel.excess).ok_or_else(|| {
                LedgerError::MalformedPegIn(format!(
                    "kernel {} has no matching peg-in record",
                    tx.kernel.excess
                ))
            })?;
            check_claim(tx, record)?;
            claimed += 1;
        }

        if claimed != records.len() {
            return Err(LedgerError::MalformedPegIn(format!(
                "{} peg-in record(s) not claimed by any kernel",
                records.len() - claimed
            )));
        }
        Ok(())
    }

    /// Verify a peg-in transaction's balance: the output must commit to
    /// exactly the pegged amount.
    pub fn verify(&self, tx: &Transaction, verifier: &BalanceVerifier) -> Result<(), LedgerError> {
        verifier.verify_transaction(tx).map_err(|err| match err {
            BalanceError::Imbalance => LedgerError::MalformedPegIn(format!(
                "amount {} does not reconcile with the output commitment",
                tx.kernel.pegin_amount()
            )),
            BalanceError::MalformedProof(err) => LedgerError::MalformedProof(err),
        })
    }

    /// The pending ledger output for a peg-in output included at `ctx`.
    pub fn process(&self, output: &TxOutput, ctx: &ChainContext) -> Output {
        Output::from_tx_output(
            output,
            OutputKind::PeggedIn,
            ctx.height,
            self.maturity_height(ctx.height),
        )
    }
}

fn check_claim(tx: &Transaction, record: &PegInRecord) -> Result<(), LedgerError> {
    let kernel = &tx.kernel;
    if kernel.pegin != Some(record.amount) {
        return Err(LedgerError::MalformedPegIn(format!(
            "kernel amount {} does not match base-ledger amount {}",
            kernel.pegin_amount(),
            record.amount
        )));
    }
    if !tx.inputs.is_empty() {
        return Err(LedgerError::MalformedPegIn(
            "peg-in transaction spends inputs".to_string(),
        ));
    }
    if kernel.fee != 0 || kernel.pegout.is_some() {
        return Err(LedgerError::MalformedPegIn(
            "peg-in kernel carries a fee or peg-out".to_string(),
        ));
    }
    let [output] = tx.outputs.as_slice() else {
        return Err(LedgerError::MalformedPegIn(format!(
            "peg-in must create exactly one output, found {}",
            tx.outputs.len()
        )));
    };
    let destination = record
        .destination
        .require_confidential()
        .map_err(|err| LedgerError::MalformedPegIn(err.to_string()))?;
    if &output.owner != destination {
        return Err(LedgerError::MalformedPegIn(format!(
            "output is not owned by destination {destination}"
        )));
    }
    Ok(())
}
