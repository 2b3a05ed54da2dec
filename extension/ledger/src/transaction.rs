use bth_crypto_commitment::Commitment;
use serde::{Deserialize, Serialize};

use crate::{kernel::Kernel, output::TxOutput};

/// Weight of one kernel.
pub const KERNEL_WEIGHT: usize = 2;

/// Weight of one output.
pub const OUTPUT_WEIGHT: usize = 18;

/// A confidential transaction: one kernel, the outputs it spends and the
/// outputs it creates.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub kernel: Kernel,
    pub inputs: Vec<Commitment>,
    pub outputs: Vec<TxOutput>,
}

impl Transaction {
    pub fn weight(&self) -> usize {
        KERNEL_WEIGHT + OUTPUT_WEIGHT * self.outputs.len()
    }

    pub fn is_pegin(&self) -> bool {
        self.kernel.is_pegin()
    }

    pub fn is_pegout(&self) -> bool {
        self.kernel.pegout.is_some()
    }
}
