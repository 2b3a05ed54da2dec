//! Wallet-side construction of extension transactions.
//!
//! Every builder signs its kernel with `Σr_inputs − Σr_outputs`, the blinding
//! sum left over once values cancel, so the resulting excess carries no value
//! component.

use bth_crypto_commitment::{BlindingFactor, Commitment, OutputOpening, ViewKey, ViewPublic};
use rand_core::{CryptoRng, RngCore};
use std::collections::HashSet;
use tracing::debug;

use crate::{
    address::Address,
    delta::PegInRecord,
    kernel::{Kernel, PegOutCoin},
    output::TxOutput,
    output_set::OutputStatus,
    snapshot::LedgerSnapshot,
    transaction::Transaction,
    LedgerError,
};

/// An output the wallet can spend, with its recovered opening.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpendableInput {
    pub commitment: Commitment,
    pub opening: OutputOpening,
}

/// A transaction plus the openings of the outputs it creates, in output order.
#[derive(Clone, Debug)]
pub struct BuiltTransaction {
    pub transaction: Transaction,
    pub openings: Vec<OutputOpening>,
}

/// Assembles a balanced transaction from explicit inputs and outputs.
#[derive(Clone, Debug, Default)]
pub struct TransactionBuilder {
    inputs: Vec<SpendableInput>,
    outputs: Vec<(ViewPublic, u64)>,
    fee: u64,
    pegout: Option<PegOutCoin>,
    lock_height: Option<u64>,
}

impl TransactionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(mut self, input: SpendableInput) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn inputs(mut self, inputs: impl IntoIterator<Item = SpendableInput>) -> Self {
        self.inputs.extend(inputs);
        self
    }

    pub fn output(mut self, recipient: ViewPublic, value: u64) -> Self {
        self.outputs.push((recipient, value));
        self
    }

    pub fn fee(mut self, fee: u64) -> Self {
        self.fee = fee;
        self
    }

    pub fn pegout(mut self, coin: PegOutCoin) -> Self {
        self.pegout = Some(coin);
        self
    }

    pub fn lock_height(mut self, height: u64) -> Self {
        self.lock_height = Some(height);
        self
    }

    /// Create the outputs and sign the kernel.
    ///
    /// Inputs must cover outputs, fee and peg-out exactly.
    pub fn build<R: RngCore + CryptoRng>(self, rng: &mut R) -> Result<BuiltTransaction, LedgerError> {
        let inputs_total: u128 = self
            .inputs
            .iter()
            .map(|input| u128::from(input.opening.value))
            .sum();
        let pegout_total = self.pegout.as_ref().map_or(0, |coin| coin.amount);
        let outputs_total: u128 = self
            .outputs
            .iter()
            .map(|(_, value)| u128::from(*value))
            .sum::<u128>()
            + u128::from(self.fee)
            + u128::from(pegout_total);

        if inputs_total < outputs_total {
            return Err(LedgerError::InsufficientFunds {
                available: saturate(inputs_total),
                required: saturate(outputs_total),
            });
        }
        if inputs_total > outputs_total {
            return Err(LedgerError::UnbalancedTransaction {
                inputs: saturate(inputs_total),
                outputs: saturate(outputs_total),
            });
        }

        let mut tx_outputs = Vec::with_capacity(self.outputs.len());
        let mut openings = Vec::with_capacity(self.outputs.len());
        for (recipient, value) in &self.outputs {
            let (output, opening) = TxOutput::new(recipient, *value, rng).map_err(|_| {
                LedgerError::InvalidAddress(format!("{recipient} is not a valid view key"))
            })?;
            tx_outputs.push(output);
            openings.push(opening);
        }

        let excess_key = BlindingFactor::sum(
            self.inputs.iter().map(|input| &input.opening.blinding),
            openings.iter().map(|opening| &opening.blinding),
        );
        let kernel = Kernel::sign(
            self.fee,
            None,
            self.pegout,
            self.lock_height,
            &excess_key,
            rng,
        );

        debug!(
            inputs = self.inputs.len(),
            outputs = tx_outputs.len(),
            fee = self.fee,
            "Built transaction"
        );

        Ok(BuiltTransaction {
            transaction: Transaction {
                kernel,
                inputs: self.inputs.iter().map(|input| input.commitment).collect(),
                outputs: tx_outputs,
            },
            openings,
        })
    }
}

fn saturate(value: u128) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

/// A constructed peg-in: the extension transaction and the base-ledger
/// record that must accompany it.
#[derive(Clone, Debug)]
pub struct PegIn {
    pub transaction: Transaction,
    pub record: PegInRecord,
    pub opening: OutputOpening,
}

/// Build the extension side of a peg-in of `amount` to `destination`.
pub fn build_peg_in<R: RngCore + CryptoRng>(
    destination: &ViewPublic,
    amount: u64,
    rng: &mut R,
) -> Result<PegIn, LedgerError> {
    if amount == 0 {
        return Err(LedgerError::MalformedPegIn(
            "peg-in amount must be positive".to_string(),
        ));
    }
    let (output, opening) = TxOutput::new(destination, amount, rng).map_err(|_| {
        LedgerError::InvalidAddress(format!("{destination} is not a valid view key"))
    })?;

    // pegin·H − (amount·H + r·G) = −r·G
    let excess_key = -&opening.blinding;
    let kernel = Kernel::sign(0, Some(amount), None, None, &excess_key, rng);
    let record = PegInRecord {
        amount,
        destination: Address::Confidential(*destination),
        kernel_excess: kernel.excess,
    };

    Ok(PegIn {
        transaction: Transaction {
            kernel,
            inputs: Vec::new(),
            outputs: vec![output],
        },
        record,
        opening,
    })
}

/// Every output `view_key` can open and spend in the block after `snapshot`.
pub fn owned_inputs(snapshot: &LedgerSnapshot, view_key: &ViewKey) -> Vec<SpendableInput> {
    let owner = view_key.public();
    snapshot
        .outputs()
        .owned_by(&owner)
        .filter(|output| output.is_spendable_at(snapshot.height() + 1))
        .filter_map(|output| match output.rewind(view_key) {
            Ok(opening) => Some(SpendableInput {
                commitment: output.commitment,
                opening,
            }),
            Err(err) => {
                debug!(commitment = %output.commitment, error = %err, "Skipping output that does not rewind");
                None
            }
        })
        .collect()
}

/// Resolve named commitments into spendable inputs owned by `view_key`.
pub fn resolve_inputs(
    snapshot: &LedgerSnapshot,
    view_key: &ViewKey,
    commitments: &[Commitment],
) -> Result<Vec<SpendableInput>, LedgerError> {
    let owner = view_key.public();
    let mut seen = HashSet::new();
    let mut inputs = Vec::with_capacity(commitments.len());

    for commitment in commitments {
        if !seen.insert(*commitment) {
            return Err(LedgerError::DuplicateCommitment(*commitment));
        }
        match snapshot.outputs().status(commitment) {
            OutputStatus::Live => {
                let output = snapshot
                    .outputs()
                    .get(commitment)
                    .ok_or(LedgerError::NotFound(*commitment))?;
                if !output.is_owned_by(&owner) {
                    return Err(LedgerError::NotOwned(*commitment));
                }
                if !output.is_spendable_at(snapshot.height() + 1) {
                    return Err(LedgerError::ImmatureSpend {
                        commitment: *commitment,
                    });
                }
                let opening = output
                    .rewind(view_key)
                    .map_err(|_| LedgerError::NotOwned(*commitment))?;
                inputs.push(SpendableInput {
                    commitment: *commitment,
                    opening,
                });
            }
            OutputStatus::Spent { .. } => return Err(LedgerError::AlreadySpent(*commitment)),
            OutputStatus::Unknown if snapshot.maturity().is_pending(commitment) => {
                return Err(LedgerError::ImmatureSpend {
                    commitment: *commitment,
                })
            }
            OutputStatus::Unknown => return Err(LedgerError::NotFound(*commitment)),
        }
    }
    Ok(inputs)
}

/// Pick inputs covering `target`, largest first.
pub fn select_inputs(
    mut available: Vec<SpendableInput>,
    target: u64,
) -> Result<Vec<SpendableInput>, LedgerError> {
    available.sort_by(|a, b| {
        b.opening
            .value
            .cmp(&a.opening.value)
            .then_with(|| a.commitment.cmp(&b.commitment))
    });

    let mut selected = Vec::new();
    let mut total = 0u64;
    for input in available {
        if total >= target {
            break;
        }
        total = total.saturating_add(input.opening.value);
        selected.push(input);
    }

    if total < target {
        return Err(LedgerError::InsufficientFunds {
            available: total,
            required: target,
        });
    }
    Ok(selected)
}

/// Build a confidential transfer of `amount` to `recipient`, paying change
/// back to `view_key`.
pub fn build_transfer<R: RngCore + CryptoRng>(
    snapshot: &LedgerSnapshot,
    view_key: &ViewKey,
    recipient: &Address,
    amount: u64,
    fee: u64,
    rng: &mut R,
) -> Result<BuiltTransaction, LedgerError> {
    let recipient = *recipient.require_confidential()?;
    let required = amount.checked_add(fee).ok_or(LedgerError::InsufficientFunds {
        available: 0,
        required: u64::MAX,
    })?;

    let inputs = select_inputs(owned_inputs(snapshot, view_key), required)?;
    let available = inputs
        .iter()
        .fold(0u64, |sum, input| sum.saturating_add(input.opening.value));
    let change = available.saturating_sub(required);

    let mut builder = TransactionBuilder::new()
        .inputs(inputs)
        .output(recipient, amount)
        .fee(fee);
    if change > 0 {
        builder = builder.output(view_key.public(), change);
    }
    builder.build(rng)
}
