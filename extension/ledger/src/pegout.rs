//! Peg-out processing and construction.

use bth_crypto_commitment::{Commitment, ViewKey};
use rand_core::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::{
    address::{Address, Script, MAX_PEGOUT_SCRIPT_LEN, MIN_PEGOUT_SCRIPT_LEN},
    builder::{owned_inputs, resolve_inputs, select_inputs, BuiltTransaction, TransactionBuilder},
    kernel::PegOutCoin,
    snapshot::LedgerSnapshot,
    transaction::Transaction,
    LedgerError,
};

/// A plain output the base ledger must create for a peg-out.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct BaseLedgerOutput {
    pub script: Script,
    pub amount: u64,
}

/// Validates peg-out kernels and derives their base-ledger outputs.
pub struct PegOutProcessor;

impl PegOutProcessor {
    /// Reject peg-outs of zero or to an unusable script.
    pub fn check(coin: &PegOutCoin) -> Result<(), LedgerError> {
        if coin.amount == 0 {
            return Err(LedgerError::MalformedPegOut(
                "peg-out amount must be positive".to_string(),
            ));
        }
        if !coin.script.is_valid_pegout_destination() {
            return Err(LedgerError::MalformedPegOut(format!(
                "script length {} outside {MIN_PEGOUT_SCRIPT_LEN}..={MAX_PEGOUT_SCRIPT_LEN}",
                coin.script.len()
            )));
        }
        Ok(())
    }

    /// The base-ledger output owed for `tx`, if it pegs out.
    pub fn process(tx: &Transaction) -> Result<Option<BaseLedgerOutput>, LedgerError> {
        let Some(coin) = tx.kernel.pegout.as_ref() else {
            return Ok(None);
        };
        Self::check(coin)?;
        Ok(Some(BaseLedgerOutput {
            script: coin.script.clone(),
            amount: coin.amount,
        }))
    }
}

/// A constructed peg-out: the extension transaction and the base-ledger
/// output it pays.
#[derive(Clone, Debug)]
pub struct PegOut {
    pub built: BuiltTransaction,
    pub base_output: BaseLedgerOutput,
    /// Commitments spent by the transaction.
    pub spent: Vec<Commitment>,
}

impl PegOut {
    pub fn transaction(&self) -> &Transaction {
        &self.built.transaction
    }
}

/// Build a peg-out of `amount` to the transparent `destination`.
///
/// Spends `outputs_to_spend`, or selects owned spendable outputs when none
/// are named. Anything above `amount + fee` returns to the owner as change.
pub fn build_peg_out<R: RngCore + CryptoRng>(
    snapshot: &LedgerSnapshot,
    view_key: &ViewKey,
    outputs_to_spend: &[Commitment],
    destination: &Address,
    amount: u64,
    fee: u64,
    rng: &mut R,
) -> Result<PegOut, LedgerError> {
    let script = destination.require_transparent()?.clone();
    let coin = PegOutCoin { amount, script };
    PegOutProcessor::check(&coin)?;

    let required = amount
        .checked_add(fee)
        .ok_or(LedgerError::InsufficientFunds {
            available: 0,
            required: u64::MAX,
        })?;
    let inputs = if outputs_to_spend.is_empty() {
        select_inputs(owned_inputs(snapshot, view_key), required)?
    } else {
        let inputs = resolve_inputs(snapshot, view_key, outputs_to_spend)?;
        let available = inputs
            .iter()
            .fold(0u64, |sum, input| sum.saturating_add(input.opening.value));
        if available < required {
            return Err(LedgerError::InsufficientFunds {
                available,
                required,
            });
        }
        inputs
    };

    let available = inputs
        .iter()
        .fold(0u64, |sum, input| sum.saturating_add(input.opening.value));
    let change = available.saturating_sub(required);
    let spent = inputs.iter().map(|input| input.commitment).collect();

    let mut builder = TransactionBuilder::new()
        .inputs(inputs)
        .fee(fee)
        .pegout(coin.clone());
    if change > 0 {
        builder = builder.output(view_key.public(), change);
    }
    let built = builder.build(rng)?;

    Ok(PegOut {
        built,
        base_output: BaseLedgerOutput {
            script: coin.script,
            amount,
        },
        spent,
    })
}
