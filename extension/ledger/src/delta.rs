//! Extension block deltas and the in-block spend graph.
//!
//! Outputs created and spent inside one delta never reach the output set.
//! [`DeltaGraph`] indexes every created output in an arena, records each
//! intra-delta spend as an edge from the creating transaction to the
//! spending one, and rejects deltas whose spend edges form a cycle before
//! any cut-through is attempted.

use bth_crypto_commitment::Commitment;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::{
    address::Address,
    kernel::{Kernel, PegOutCoin},
    output::TxOutput,
    transaction::Transaction,
    LedgerError,
};

/// A base-ledger output tagged as a peg-in, as seen by the base ledger.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct PegInRecord {
    pub amount: u64,
    pub destination: Address,
    /// Excess of the extension kernel that claims this peg-in.
    pub kernel_excess: Commitment,
}

/// The extension-block part of one base-ledger block.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ExtensionBlockDelta {
    pub transactions: Vec<Transaction>,
    pub pegins: Vec<PegInRecord>,
}

impl ExtensionBlockDelta {
    pub fn new(transactions: Vec<Transaction>, pegins: Vec<PegInRecord>) -> Self {
        Self {
            transactions,
            pegins,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty() && self.pegins.is_empty()
    }

    pub fn weight(&self) -> usize {
        self.transactions.iter().map(Transaction::weight).sum()
    }

    pub fn kernels(&self) -> impl Iterator<Item = &Kernel> + '_ {
        self.transactions.iter().map(|tx| &tx.kernel)
    }

    pub fn pegout_coins(&self) -> impl Iterator<Item = &PegOutCoin> + '_ {
        self.kernels().filter_map(|kernel| kernel.pegout.as_ref())
    }
}

/// One intra-delta spend: output `output` (arena index) is spent by
/// transaction `spender`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SpendEdge {
    pub output: usize,
    pub spender: usize,
}

#[derive(Clone, Copy, Debug)]
struct OutputNode<'a> {
    output: &'a TxOutput,
    tx: usize,
    pegged_in: bool,
}

/// An output that survives cut-through.
#[derive(Clone, Copy, Debug)]
pub struct SurvivingOutput<'a> {
    pub output: &'a TxOutput,
    /// Index of the creating transaction.
    pub tx: usize,
    pub pegged_in: bool,
}

/// The result of cut-through over a delta.
#[derive(Clone, Debug)]
pub struct CutThrough<'a> {
    /// Outputs to insert (or schedule, for peg-ins).
    pub outputs: Vec<SurvivingOutput<'a>>,
    /// Inputs that must be live in the ledger.
    pub inputs: Vec<Commitment>,
    /// Commitments created and spent within the delta.
    pub removed: Vec<Commitment>,
}

/// Arena of a delta's outputs with spend edges between transactions.
#[derive(Debug)]
pub struct DeltaGraph<'a> {
    delta: &'a ExtensionBlockDelta,
    nodes: Vec<OutputNode<'a>>,
    edges: Vec<SpendEdge>,
    external_inputs: Vec<Commitment>,
}

impl<'a> DeltaGraph<'a> {
    /// Index `delta`, rejecting duplicate commitments and cyclic spends.
    ///
    /// An input that names a peg-in output created in the same delta fails
    /// with `ImmatureSpend`.
    pub fn build(delta: &'a ExtensionBlockDelta) -> Result<Self, LedgerError> {
        let mut nodes = Vec::new();
        let mut by_commitment: HashMap<Commitment, usize> = HashMap::new();
        let mut excesses = HashSet::new();

        for (tx_index, tx) in delta.transactions.iter().enumerate() {
            if !excesses.insert(tx.kernel.excess) {
                return Err(LedgerError::DuplicateCommitment(tx.kernel.excess));
            }
            for output in &tx.outputs {
                if by_commitment
                    .insert(output.commitment, nodes.len())
                    .is_some()
                {
                    return Err(LedgerError::DuplicateCommitment(output.commitment));
                }
                nodes.push(OutputNode {
                    output,
                    tx: tx_index,
                    pegged_in: tx.is_pegin(),
                });
            }
        }

        let mut seen_inputs = HashSet::new();
        let mut edges = Vec::new();
        let mut external_inputs = Vec::new();
        for (tx_index, tx) in delta.transactions.iter().enumerate() {
            for input in &tx.inputs {
                if !seen_inputs.insert(*input) {
                    return Err(LedgerError::DuplicateCommitment(*input));
                }
                match by_commitment.get(input) {
                    Some(&node) if nodes[node].pegged_in => {
                        return Err(LedgerError::ImmatureSpend { commitment: *input });
                    }
                    Some(&node) if nodes[node].tx == tx_index => {
                        return Err(LedgerError::CyclicSpend);
                    }
                    Some(&node) => edges.push(SpendEdge {
                        output: node,
                        spender: tx_index,
                    }),
                    None => external_inputs.push(*input),
                }
            }
        }

        let graph = Self {
            delta,
            nodes,
            edges,
            external_inputs,
        };
        graph.check_acyclic()?;
        Ok(graph)
    }

    // Kahn's algorithm over the transaction dependency graph.
    fn check_acyclic(&self) -> Result<(), LedgerError> {
        let tx_count = self.delta.transactions.len();
        let mut indegree = vec![0usize; tx_count];
        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); tx_count];
        for edge in &self.edges {
            successors[self.nodes[edge.output].tx].push(edge.spender);
            indegree[edge.spender] += 1;
        }

        let mut ready: Vec<usize> = (0..tx_count).filter(|&tx| indegree[tx] == 0).collect();
        let mut visited = 0;
        while let Some(tx) = ready.pop() {
            visited += 1;
            for &next in &successors[tx] {
                indegree[next] -= 1;
                if indegree[next] == 0 {
                    ready.push(next);
                }
            }
        }

        if visited == tx_count {
            Ok(())
        } else {
            Err(LedgerError::CyclicSpend)
        }
    }

    pub fn edges(&self) -> &[SpendEdge] {
        &self.edges
    }

    /// Inputs not satisfied by an output of the same delta.
    pub fn external_inputs(&self) -> &[Commitment] {
        &self.external_inputs
    }

    /// Drop every output created and spent within the delta.
    pub fn cut_through(&self) -> CutThrough<'a> {
        let spent: HashSet<usize> = self.edges.iter().map(|edge| edge.output).collect();
        let outputs = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(index, _)| !spent.contains(index))
            .map(|(_, node)| SurvivingOutput {
                output: node.output,
                tx: node.tx,
                pegged_in: node.pegged_in,
            })
            .collect();
        let removed = self
            .edges
            .iter()
            .map(|edge| self.nodes[edge.output].output.commitment)
            .collect();

        CutThrough {
            outputs,
            inputs: self.external_inputs.clone(),
            removed,
        }
    }
}
