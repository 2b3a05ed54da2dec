use bth_crypto_commitment::{Commitment, Error as CryptoError};
use thiserror::Error;

/// Errors produced by the extension ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Malformed peg-in: {0}")]
    MalformedPegIn(String),

    #[error("Kernel {0} does not balance")]
    ImbalancedKernel(Commitment),

    #[error("Malformed proof: {0}")]
    MalformedProof(CryptoError),

    #[error("Malformed peg-out: {0}")]
    MalformedPegOut(String),

    #[error("Output not found: {0}")]
    NotFound(Commitment),

    #[error("Output already spent: {0}")]
    AlreadySpent(Commitment),

    #[error("Output {0} is not owned by this key")]
    NotOwned(Commitment),

    #[error("Output {commitment} has not reached maturity")]
    ImmatureSpend { commitment: Commitment },

    #[error("Insufficient funds: available {available}, required {required}")]
    InsufficientFunds { available: u64, required: u64 },

    #[error("Unbalanced transaction: inputs {inputs}, outputs {outputs}")]
    UnbalancedTransaction { inputs: u64, outputs: u64 },

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Duplicate commitment: {0}")]
    DuplicateCommitment(Commitment),

    #[error("Cyclic spend inside block delta")]
    CyclicSpend,

    #[error("Block weight {weight} exceeds maximum {max}")]
    BlockWeight { weight: usize, max: usize },

    #[error("Kernel locked until height {lock_height}, block height is {height}")]
    KernelLocked { lock_height: u64, height: u64 },

    #[error("Block would drive the extension supply negative")]
    SupplyUnderflow,

    #[error("Height mismatch: expected {expected}, got {got}")]
    HeightMismatch { expected: u64, got: u64 },

    #[error("Cannot revert to height {requested}: oldest reachable height is {oldest}")]
    ReorgTooDeep { requested: u64, oldest: u64 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Inconsistent ledger state: {0}")]
    InconsistentState(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl LedgerError {
    /// Whether this error means a block delta is invalid by consensus rules.
    pub fn is_consensus_failure(&self) -> bool {
        matches!(
            self,
            LedgerError::MalformedPegIn(_)
                | LedgerError::ImbalancedKernel(_)
                | LedgerError::MalformedProof(_)
                | LedgerError::MalformedPegOut(_)
                | LedgerError::NotFound(_)
                | LedgerError::AlreadySpent(_)
                | LedgerError::ImmatureSpend { .. }
                | LedgerError::DuplicateCommitment(_)
                | LedgerError::CyclicSpend
                | LedgerError::BlockWeight { .. }
                | LedgerError::KernelLocked { .. }
                | LedgerError::SupplyUnderflow
                | LedgerError::HeightMismatch { .. }
        )
    }

    /// Whether a wallet user can fix this by changing their request.
    pub fn is_user_correctable(&self) -> bool {
        matches!(
            self,
            LedgerError::InsufficientFunds { .. }
                | LedgerError::InvalidAddress(_)
                | LedgerError::NotOwned(_)
                | LedgerError::AlreadySpent(_)
                | LedgerError::ImmatureSpend { .. }
                | LedgerError::NotFound(_)
                | LedgerError::MalformedPegOut(_)
        )
    }
}

impl From<CryptoError> for LedgerError {
    fn from(err: CryptoError) -> Self {
        LedgerError::MalformedProof(err)
    }
}

impl From<bincode::Error> for LedgerError {
    fn from(err: bincode::Error) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

impl From<lmdb::Error> for LedgerError {
    fn from(err: lmdb::Error) -> Self {
        LedgerError::Storage(err.to_string())
    }
}
