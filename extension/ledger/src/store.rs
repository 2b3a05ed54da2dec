//! Persistence of ledger state.
//!
//! Three tables:
//! - `outputs`: commitment (32 bytes) -> live `Output`
//! - `pending`: maturity height (8 bytes, big-endian) || commitment -> pending `Output`
//! - `meta`: `tip` -> `StoredTip`
//!
//! Values are bincode encoded. Promotion history and undo records live only
//! in memory, so a reopened ledger cannot revert blocks applied before it
//! was opened.

use bth_crypto_commitment::Commitment;
use lmdb::{
    Cursor, Database, DatabaseFlags, Environment, EnvironmentFlags, Transaction, WriteFlags,
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::Path};
use tracing::{debug, info};

use crate::{
    applier::{AppliedBlock, RevertedBlock},
    maturity::MaturityScheduler,
    output::Output,
    output_set::OutputSet,
    snapshot::{LedgerSnapshot, SupplyStats},
    LedgerError,
};

const META_TIP: &[u8; 3] = b"tip";

/// Length of a `pending` table key.
pub const PENDING_KEY_LEN: usize = 40;

/// The `pending` table key for an output.
pub fn pending_key(maturity_height: u64, commitment: &Commitment) -> [u8; PENDING_KEY_LEN] {
    let mut key = [0u8; PENDING_KEY_LEN];
    key[..8].copy_from_slice(&maturity_height.to_be_bytes());
    key[8..].copy_from_slice(commitment.as_bytes());
    key
}

/// Tip-level totals persisted alongside the output tables.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct StoredTip {
    pub height: u64,
    pub supply: SupplyStats,
    pub total_excess: Commitment,
}

impl StoredTip {
    pub fn of(snapshot: &LedgerSnapshot) -> Self {
        Self {
            height: snapshot.height,
            supply: snapshot.supply,
            total_excess: snapshot.total_excess,
        }
    }
}

/// Everything a store holds.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct StoredState {
    pub tip: StoredTip,
    pub outputs: Vec<Output>,
    /// Pending outputs in key order.
    pub pending: Vec<Output>,
}

impl StoredState {
    /// Rebuild a snapshot from persisted state.
    pub fn into_snapshot(self) -> Result<LedgerSnapshot, LedgerError> {
        let mut outputs = OutputSet::new();
        for output in self.outputs {
            outputs.insert(output)?;
        }
        Ok(LedgerSnapshot {
            height: self.tip.height,
            outputs,
            maturity: MaturityScheduler::restore(self.tip.height, self.pending)?,
            supply: self.tip.supply,
            total_excess: self.tip.total_excess,
        })
    }
}

/// Writes for one block, committed atomically.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct StoreBatch {
    pub tip: StoredTip,
    pub put_outputs: Vec<Output>,
    pub delete_outputs: Vec<Commitment>,
    pub put_pending: Vec<Output>,
    pub delete_pending: Vec<(u64, Commitment)>,
}

impl StoreBatch {
    /// Writes that take a store from the parent of `snapshot` to `snapshot`.
    pub fn for_applied(applied: &AppliedBlock, snapshot: &LedgerSnapshot) -> Self {
        Self {
            tip: StoredTip::of(snapshot),
            put_outputs: applied
                .created
                .iter()
                .chain(&applied.matured)
                .cloned()
                .collect(),
            delete_outputs: applied.spent.clone(),
            put_pending: applied.scheduled.clone(),
            delete_pending: applied
                .matured
                .iter()
                .map(|output| (output.maturity_height, output.commitment))
                .collect(),
        }
    }

    /// Writes that take a store back to `snapshot` after a revert.
    pub fn for_reverted(reverted: &RevertedBlock, snapshot: &LedgerSnapshot) -> Self {
        Self {
            tip: StoredTip::of(snapshot),
            put_outputs: reverted.restored.clone(),
            delete_outputs: reverted
                .removed
                .iter()
                .copied()
                .chain(reverted.unmatured.iter().map(|output| output.commitment))
                .collect(),
            put_pending: reverted.unmatured.clone(),
            delete_pending: reverted
                .unscheduled
                .iter()
                .map(|output| (output.maturity_height, output.commitment))
                .collect(),
        }
    }
}

/// Durable backing for an [`ExtensionLedger`](crate::ExtensionLedger).
pub trait LedgerStore: Send {
    /// The stored state, or `None` for a store never committed to.
    fn load(&self) -> Result<Option<StoredState>, LedgerError>;

    /// Apply `batch` atomically: deletes first, then puts, then the tip.
    fn commit(&mut self, batch: &StoreBatch) -> Result<(), LedgerError>;
}

/// A store that keeps everything in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    tip: Option<StoredTip>,
    outputs: BTreeMap<Commitment, Output>,
    pending: BTreeMap<[u8; PENDING_KEY_LEN], Output>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for MemoryStore {
    fn load(&self) -> Result<Option<StoredState>, LedgerError> {
        Ok(self.tip.map(|tip| StoredState {
            tip,
            outputs: self.outputs.values().cloned().collect(),
            pending: self.pending.values().cloned().collect(),
        }))
    }

    fn commit(&mut self, batch: &StoreBatch) -> Result<(), LedgerError> {
        for commitment in &batch.delete_outputs {
            self.outputs.remove(commitment);
        }
        for (height, commitment) in &batch.delete_pending {
            self.pending.remove(&pending_key(*height, commitment));
        }
        for output in &batch.put_outputs {
            self.outputs.insert(output.commitment, output.clone());
        }
        for output in &batch.put_pending {
            self.pending.insert(
                pending_key(output.maturity_height, &output.commitment),
                output.clone(),
            );
        }
        self.tip = Some(batch.tip);
        Ok(())
    }
}

/// LMDB-backed store
pub struct LmdbStore {
    env: Environment,
    /// outputs: commitment (32 bytes) -> Output
    outputs_db: Database,
    /// pending: maturity height BE (8 bytes) || commitment (32 bytes) -> Output
    pending_db: Database,
    /// meta: key -> value
    meta_db: Database,
}

impl LmdbStore {
    /// Open or create a store in directory `path`, growing to at most
    /// `map_size` bytes.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LedgerError> {
        fs::create_dir_all(path).map_err(|e| {
            LedgerError::Storage(format!("Failed to create {}: {e}", path.display()))
        })?;

        let env = Environment::new()
            .set_flags(EnvironmentFlags::NO_SUB_DIR)
            .set_max_dbs(3)
            .set_map_size(map_size)
            .open(&path.join("extension.mdb"))?;

        let outputs_db = env.create_db(Some("outputs"), DatabaseFlags::empty())?;
        let pending_db = env.create_db(Some("pending"), DatabaseFlags::empty())?;
        let meta_db = env.create_db(Some("meta"), DatabaseFlags::empty())?;

        info!(path = %path.display(), map_size, "Opened extension ledger store");
        Ok(Self {
            env,
            outputs_db,
            pending_db,
            meta_db,
        })
    }

    fn read_table<T: Transaction>(txn: &T, db: Database) -> Result<Vec<Output>, LedgerError> {
        let mut outputs = Vec::new();
        let mut cursor = txn.open_ro_cursor(db)?;
        for item in cursor.iter_start() {
            let (_, value) = item?;
            outputs.push(bincode::deserialize(value)?);
        }
        Ok(outputs)
    }
}

impl LedgerStore for LmdbStore {
    fn load(&self) -> Result<Option<StoredState>, LedgerError> {
        let txn = self.env.begin_ro_txn()?;
        let tip: StoredTip = match txn.get(self.meta_db, &META_TIP) {
            Ok(bytes) => bincode::deserialize(bytes)?,
            Err(lmdb::Error::NotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let outputs = Self::read_table(&txn, self.outputs_db)?;
        let pending = Self::read_table(&txn, self.pending_db)?;
        debug!(
            height = tip.height,
            outputs = outputs.len(),
            pending = pending.len(),
            "Loaded stored state"
        );

        Ok(Some(StoredState {
            tip,
            outputs,
            pending,
        }))
    }

    fn commit(&mut self, batch: &StoreBatch) -> Result<(), LedgerError> {
        let mut txn = self.env.begin_rw_txn()?;

        for commitment in &batch.delete_outputs {
            match txn.del(self.outputs_db, commitment.as_bytes(), None) {
                Ok(()) | Err(lmdb::Error::NotFound) => {}
                Err(e) => return Err(e.into()),
            }
        }
        for (height, commitment) in &batch.delete_pending {
            match txn.del(self.pending_db, &pending_key(*height, commitment), None) {
                Ok(()) | Err(lmdb::Error::NotFound) => {}
                Err(e) => return Err(e.into()),
            }
        }

        for output in &batch.put_outputs {
            let bytes = bincode::serialize(output)?;
            txn.put(
                self.outputs_db,
                output.commitment.as_bytes(),
                &bytes,
                WriteFlags::empty(),
            )?;
        }
        for output in &batch.put_pending {
            let bytes = bincode::serialize(output)?;
            txn.put(
                self.pending_db,
                &pending_key(output.maturity_height, &output.commitment),
                &bytes,
                WriteFlags::empty(),
            )?;
        }

        let tip = bincode::serialize(&batch.tip)?;
        txn.put(self.meta_db, META_TIP, &tip, WriteFlags::empty())?;

        txn.commit()?;
        Ok(())
    }
}
