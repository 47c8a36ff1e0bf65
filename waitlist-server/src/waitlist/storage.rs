//! redb-based storage layer for waitlist entries
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `entries` | `entry_id` | `WaitlistEntry` (JSON) | Every entry ever created |
//! | `waiting` | `entry_id` | `()` | Index of entries still in the queue |
//! | `counters` | `"next_id"` / `"revision"` | `u64` | Id allocator and queue revision |
//!
//! # Atomicity
//!
//! redb serializes write transactions. Every mutation of the waiting
//! sequence (`create`, [`EntryStore::mutate_waiting`]) runs inside exactly one
//! write transaction, so concurrent callers observe either the whole batch or
//! none of it. Per-entry lost updates are prevented with a version
//! compare-and-swap.
//!
//! Entries are never deleted. Leaving the queue only removes the id from the
//! `waiting` index.

use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
    WriteTransaction,
};
use shared::util::now_millis;
use shared::waitlist::{GuestIntake, ValidationErrors, WaitlistEntry, WaitlistStatus};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Table for entries: key = entry_id, value = JSON-serialized WaitlistEntry
const ENTRIES_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("entries");

/// Table for the waiting index: key = entry_id, value = empty (existence check)
const WAITING_TABLE: TableDefinition<u64, ()> = TableDefinition::new("waiting");

/// Table for counters: key = "next_id" or "revision", value = u64
const COUNTER_TABLE: TableDefinition<&str, u64> = TableDefinition::new("counters");

const NEXT_ID_KEY: &str = "next_id";
const REVISION_KEY: &str = "revision";

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Entry not found: {0}")]
    EntryNotFound(u64),

    #[error("Version conflict on entry {entry_id}: expected {expected}, actual {actual}")]
    VersionConflict {
        entry_id: u64,
        expected: u64,
        actual: u64,
    },
}

pub type StorageResult<T> = Result<T, StorageError>;

/// A value together with the queue revision its commit produced
#[derive(Debug, Clone)]
pub struct Committed<T> {
    pub value: T,
    pub revision: u64,
}

/// Result of [`EntryStore::mutate_waiting`]
#[derive(Debug, Clone)]
pub struct BatchOutcome<R> {
    /// Whatever the batch closure returned
    pub value: R,
    /// Entries that were rewritten, after the version bump
    pub changed: Vec<WaitlistEntry>,
    /// Revision after the batch; unchanged when nothing was written
    pub revision: u64,
}

/// Entry store backed by redb
#[derive(Clone)]
pub struct EntryStore {
    db: Arc<Database>,
}

impl std::fmt::Debug for EntryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryStore").finish_non_exhaustive()
    }
}

impl EntryStore {
    /// Open or create the database at the given path
    ///
    /// redb commits with `Durability::Immediate` by default: once `commit()`
    /// returns the queue state survives a power loss.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StorageResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(ENTRIES_TABLE)?;
            let _ = write_txn.open_table(WAITING_TABLE)?;

            let mut counters = write_txn.open_table(COUNTER_TABLE)?;
            if counters.get(NEXT_ID_KEY)?.is_none() {
                counters.insert(NEXT_ID_KEY, 0u64)?;
            }
            if counters.get(REVISION_KEY)?.is_none() {
                counters.insert(REVISION_KEY, 0u64)?;
            }
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Handle for other tables kept in the same file
    pub(crate) fn database(&self) -> Arc<Database> {
        Arc::clone(&self.db)
    }

    // ========== Counters ==========

    /// Current queue revision (read-only)
    pub fn current_revision(&self) -> StorageResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(COUNTER_TABLE)?;
        Ok(table
            .get(REVISION_KEY)?
            .map(|guard| guard.value())
            .unwrap_or(0))
    }

    fn increment_counter(txn: &WriteTransaction, key: &str) -> StorageResult<u64> {
        let mut table = txn.open_table(COUNTER_TABLE)?;
        let current = table.get(key)?.map(|guard| guard.value()).unwrap_or(0);
        let next = current + 1;
        table.insert(key, next)?;
        Ok(next)
    }

    fn revision_txn(txn: &WriteTransaction) -> StorageResult<u64> {
        let table = txn.open_table(COUNTER_TABLE)?;
        Ok(table
            .get(REVISION_KEY)?
            .map(|guard| guard.value())
            .unwrap_or(0))
    }

    // ========== Entry Operations ==========

    fn put_entry(txn: &WriteTransaction, entry: &WaitlistEntry) -> StorageResult<()> {
        let mut table = txn.open_table(ENTRIES_TABLE)?;
        let value = serde_json::to_vec(entry)?;
        table.insert(entry.id, value.as_slice())?;
        Ok(())
    }

    fn get_entry_txn(txn: &WriteTransaction, id: u64) -> StorageResult<Option<WaitlistEntry>> {
        let table = txn.open_table(ENTRIES_TABLE)?;
        match table.get(id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Validate the intake and append a new waiting entry at the tail
    ///
    /// Id allocation, position assignment and the revision bump share one
    /// write transaction.
    pub fn create(&self, intake: &GuestIntake) -> StorageResult<Committed<WaitlistEntry>> {
        intake.validate()?;

        let now = now_millis();
        let txn = self.db.begin_write()?;

        let id = Self::increment_counter(&txn, NEXT_ID_KEY)?;
        let waiting_count = txn.open_table(WAITING_TABLE)?.len()?;

        let entry = WaitlistEntry {
            id,
            guest_name: intake.guest_name.trim().to_string(),
            guest_phone: intake.guest_phone.trim().to_string(),
            party_size: intake.party_size as u32,
            status: WaitlistStatus::Waiting,
            position: Some(waiting_count as u32 + 1),
            vip: false,
            source: intake.source,
            created_at: now,
            updated_at: now,
            version: 0,
        };

        Self::put_entry(&txn, &entry)?;
        txn.open_table(WAITING_TABLE)?.insert(id, ())?;
        let revision = Self::increment_counter(&txn, REVISION_KEY)?;
        txn.commit()?;

        Ok(Committed {
            value: entry,
            revision,
        })
    }

    /// Get an entry by id
    pub fn get_by_id(&self, id: u64) -> StorageResult<Option<WaitlistEntry>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ENTRIES_TABLE)?;

        match table.get(id)? {
            Some(value) => {
                let entry: WaitlistEntry = serde_json::from_slice(value.value())?;
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    /// Restartable listing of entries in one status
    ///
    /// Nothing is read until [`StatusScan::iter`] is called, and every call
    /// reads from a fresh snapshot.
    pub fn list_by_status(&self, status: WaitlistStatus) -> StatusScan {
        StatusScan {
            store: self.clone(),
            status,
        }
    }

    fn read_waiting(&self) -> StorageResult<Vec<WaitlistEntry>> {
        Ok(self.waiting_with_revision()?.1)
    }

    /// Waiting entries (by position) and the revision they belong to, read
    /// from one snapshot
    pub fn waiting_with_revision(&self) -> StorageResult<(u64, Vec<WaitlistEntry>)> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(WAITING_TABLE)?;
        let table = read_txn.open_table(ENTRIES_TABLE)?;
        let counters = read_txn.open_table(COUNTER_TABLE)?;

        let mut entries = Vec::new();
        for result in index.iter()? {
            let (key, _) = result?;
            if let Some(value) = table.get(key.value())? {
                let entry: WaitlistEntry = serde_json::from_slice(value.value())?;
                entries.push(entry);
            }
        }
        entries.sort_by_key(|e| e.position);

        let revision = counters
            .get(REVISION_KEY)?
            .map(|guard| guard.value())
            .unwrap_or(0);
        Ok((revision, entries))
    }

    fn read_with_status(&self, status: WaitlistStatus) -> StorageResult<Vec<WaitlistEntry>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ENTRIES_TABLE)?;

        let mut entries = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            let entry: WaitlistEntry = serde_json::from_slice(value.value())?;
            if entry.status == status {
                entries.push(entry);
            }
        }
        entries.sort_by_key(|e| (e.created_at, e.id));
        Ok(entries)
    }

    /// Compare-and-swap update of a single entry
    ///
    /// Fails with `VersionConflict` when `expected_version` is stale. The
    /// mutator may reject the change with its own error; nothing is written
    /// in that case. It must not touch `status` or `position`: those belong
    /// to the waiting sequence and only change through
    /// [`EntryStore::mutate_waiting`].
    pub fn update<F, E>(
        &self,
        id: u64,
        expected_version: u64,
        mutator: F,
    ) -> Result<Committed<WaitlistEntry>, E>
    where
        F: FnOnce(&mut WaitlistEntry) -> Result<(), E>,
        E: From<StorageError>,
    {
        let txn = self.db.begin_write().map_err(StorageError::from)?;

        let mut entry = Self::get_entry_txn(&txn, id)?.ok_or(StorageError::EntryNotFound(id))?;
        if entry.version != expected_version {
            return Err(StorageError::VersionConflict {
                entry_id: id,
                expected: expected_version,
                actual: entry.version,
            }
            .into());
        }

        let before = entry.clone();
        mutator(&mut entry)?;
        assert!(
            entry.status == before.status && entry.position == before.position,
            "single-entry update of {id} must not change status or position"
        );

        if entry == before {
            let revision = Self::revision_txn(&txn)?;
            return Ok(Committed {
                value: entry,
                revision,
            });
        }

        entry.version = before.version + 1;
        entry.updated_at = now_millis();
        Self::put_entry(&txn, &entry)?;
        let revision = Self::increment_counter(&txn, REVISION_KEY)?;
        txn.commit().map_err(StorageError::from)?;

        Ok(Committed {
            value: entry,
            revision,
        })
    }

    /// Run `f` against every waiting entry inside one write transaction
    ///
    /// ```text
    /// begin_write
    ///   ├─ load waiting index + entries (ordered by position)
    ///   ├─ f(&mut WaitingBatch)           ── Err ⇒ abort, nothing written
    ///   ├─ verify positions are 1..=N     ── violation ⇒ panic before commit
    ///   ├─ write entries that differ (version + 1, updated_at)
    ///   ├─ drop departed ids from the waiting index
    ///   ├─ revision + 1 (once, only if something changed)
    ///   └─ commit
    /// ```
    pub fn mutate_waiting<F, R, E>(&self, f: F) -> Result<BatchOutcome<R>, E>
    where
        F: FnOnce(&mut WaitingBatch<'_>) -> Result<R, E>,
        E: From<StorageError>,
    {
        let txn = self.db.begin_write().map_err(StorageError::from)?;

        let mut batch = WaitingBatch::load(&txn)?;
        let value = f(&mut batch)?;
        let (original, entries, departed) = batch.finish();

        verify_dense(&entries, &departed);

        let now = now_millis();
        let mut changed = Vec::new();
        for mut entry in entries.into_iter().chain(departed.iter().cloned()) {
            let Some(before) = original.get(&entry.id) else {
                continue;
            };
            if &entry == before {
                continue;
            }
            entry.version = before.version + 1;
            entry.updated_at = now;
            Self::put_entry(&txn, &entry)?;
            changed.push(entry);
        }

        if changed.is_empty() {
            let revision = Self::revision_txn(&txn)?;
            return Ok(BatchOutcome {
                value,
                changed,
                revision,
            });
        }

        {
            let mut index = txn.open_table(WAITING_TABLE).map_err(StorageError::from)?;
            for entry in &departed {
                index.remove(entry.id).map_err(StorageError::from)?;
            }
        }
        let revision = Self::increment_counter(&txn, REVISION_KEY)?;
        txn.commit().map_err(StorageError::from)?;

        Ok(BatchOutcome {
            value,
            changed,
            revision,
        })
    }

    // ========== Statistics ==========

    /// Get storage statistics
    pub fn get_stats(&self) -> StorageResult<StoreStats> {
        let read_txn = self.db.begin_read()?;

        let entries = read_txn.open_table(ENTRIES_TABLE)?;
        let waiting = read_txn.open_table(WAITING_TABLE)?;
        let counters = read_txn.open_table(COUNTER_TABLE)?;

        Ok(StoreStats {
            entry_count: entries.len()?,
            waiting_count: waiting.len()?,
            revision: counters
                .get(REVISION_KEY)?
                .map(|guard| guard.value())
                .unwrap_or(0),
        })
    }
}

/// Storage statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct StoreStats {
    pub entry_count: u64,
    pub waiting_count: u64,
    pub revision: u64,
}

/// Panics when the waiting sequence is not `1..=N` or a departed entry kept
/// a position. Runs before commit, so a violation writes nothing.
fn verify_dense(entries: &[WaitlistEntry], departed: &[WaitlistEntry]) {
    for (index, entry) in entries.iter().enumerate() {
        assert!(
            entry.status == WaitlistStatus::Waiting && entry.position == Some(index as u32 + 1),
            "waiting sequence invariant violated at index {index}: entry {} has status {} position {:?}",
            entry.id,
            entry.status,
            entry.position
        );
    }
    for entry in departed {
        assert!(
            entry.status != WaitlistStatus::Waiting && entry.position.is_none(),
            "departed entry {} still has status {} position {:?}",
            entry.id,
            entry.status,
            entry.position
        );
    }
}

// ============================================================================
// StatusScan
// ============================================================================

/// Lazy, finite, restartable listing returned by [`EntryStore::list_by_status`]
#[derive(Debug, Clone)]
pub struct StatusScan {
    store: EntryStore,
    status: WaitlistStatus,
}

impl StatusScan {
    /// Read a fresh snapshot and iterate it
    ///
    /// Waiting entries come ordered by position, all others by
    /// `(created_at, id)`.
    pub fn iter(&self) -> StorageResult<std::vec::IntoIter<WaitlistEntry>> {
        let entries = match self.status {
            WaitlistStatus::Waiting => self.store.read_waiting()?,
            other => self.store.read_with_status(other)?,
        };
        Ok(entries.into_iter())
    }

    pub fn status(&self) -> WaitlistStatus {
        self.status
    }
}

// ============================================================================
// WaitingBatch
// ============================================================================

/// Working copy of the waiting sequence inside one write transaction
///
/// Positions are renumbered by the batch itself; callers only decide who
/// leaves and in which order the rest stands.
pub struct WaitingBatch<'a> {
    txn: &'a WriteTransaction,
    original: HashMap<u64, WaitlistEntry>,
    /// Waiting entries in queue order
    entries: Vec<WaitlistEntry>,
    /// Entries that left the queue in this batch
    departed: Vec<WaitlistEntry>,
}

impl<'a> WaitingBatch<'a> {
    fn load(txn: &'a WriteTransaction) -> StorageResult<Self> {
        let mut ids = Vec::new();
        {
            let index = txn.open_table(WAITING_TABLE)?;
            for result in index.iter()? {
                let (key, _) = result?;
                ids.push(key.value());
            }
        }

        let mut entries = Vec::with_capacity(ids.len());
        {
            let table = txn.open_table(ENTRIES_TABLE)?;
            for id in ids {
                if let Some(value) = table.get(id)? {
                    let entry: WaitlistEntry = serde_json::from_slice(value.value())?;
                    entries.push(entry);
                }
            }
        }
        entries.sort_by_key(|e| e.position);

        let original = entries.iter().map(|e| (e.id, e.clone())).collect();
        Ok(Self {
            txn,
            original,
            entries,
            departed: Vec::new(),
        })
    }

    fn finish(
        self,
    ) -> (
        HashMap<u64, WaitlistEntry>,
        Vec<WaitlistEntry>,
        Vec<WaitlistEntry>,
    ) {
        (self.original, self.entries, self.departed)
    }

    /// Waiting entries in queue order
    pub fn entries(&self) -> &[WaitlistEntry] {
        &self.entries
    }

    pub fn ids(&self) -> Vec<u64> {
        self.entries.iter().map(|e| e.id).collect()
    }

    /// Queue revision as of the start of this batch
    pub fn revision(&self) -> StorageResult<u64> {
        EntryStore::revision_txn(self.txn)
    }

    /// A waiting entry by id
    pub fn get(&self, id: u64) -> Option<&WaitlistEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Any entry by id, waiting or not, as seen inside this transaction
    pub fn find(&self, id: u64) -> StorageResult<Option<WaitlistEntry>> {
        if let Some(entry) = self.get(id) {
            return Ok(Some(entry.clone()));
        }
        if let Some(entry) = self.departed.iter().find(|e| e.id == id) {
            return Ok(Some(entry.clone()));
        }
        EntryStore::get_entry_txn(self.txn, id)
    }

    /// Remove a waiting entry with its new terminal status and close the gap
    ///
    /// Every entry behind it moves up by exactly one. Returns `None` when the
    /// id is not waiting.
    pub fn depart(&mut self, id: u64, status: WaitlistStatus) -> Option<WaitlistEntry> {
        let index = self.entries.iter().position(|e| e.id == id)?;
        let mut entry = self.entries.remove(index);
        entry.status = status;
        entry.position = None;
        self.renumber();
        self.departed.push(entry.clone());
        Some(entry)
    }

    /// Rearrange the queue to `order`
    ///
    /// `order` must be a permutation of [`WaitingBatch::ids`]; returns false
    /// and leaves the batch untouched otherwise.
    pub fn arrange(&mut self, order: &[u64]) -> bool {
        if order.len() != self.entries.len() {
            return false;
        }
        let mut by_id: HashMap<u64, WaitlistEntry> =
            self.entries.iter().map(|e| (e.id, e.clone())).collect();
        let mut arranged = Vec::with_capacity(order.len());
        for id in order {
            match by_id.remove(id) {
                Some(entry) => arranged.push(entry),
                None => return false,
            }
        }
        self.entries = arranged;
        self.renumber();
        true
    }

    /// Mutable access to a waiting entry for fields outside the sequence
    pub fn entry_mut(&mut self, id: u64) -> Option<&mut WaitlistEntry> {
        self.entries.iter_mut().find(|e| e.id == id)
    }

    fn renumber(&mut self) {
        for (index, entry) in self.entries.iter_mut().enumerate() {
            entry.position = Some(index as u32 + 1);
        }
    }
}
