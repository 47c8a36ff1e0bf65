//! redb tables for notification history and duplicate markers
//!
//! Lives in the same database file as the queue, so markers survive a
//! restart together with the entries they refer to.
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `notifications` | `notification_id` | `NotificationRecord` (JSON) | Every delivery attempt |
//! | `notification_markers` | `(entry_id, kind)` | `notification_id` | Latest attempt per entry and kind |
//! | `entry_notifications` | `(entry_id, notification_id)` | `()` | History lookup by entry |
//! | `notification_counters` | `"next_id"` | `u64` | Id allocator |
//!
//! The marker points at the latest record; its status is the record's
//! status. A record left `pending` by a crash keeps blocking resends, since
//! the provider may already have delivered it.

use super::{NotificationKind, NotificationRecord, NotificationStatus};
use crate::waitlist::{EntryStore, StorageError};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction};
use std::sync::Arc;

type StorageResult<T> = Result<T, StorageError>;

const NOTIFICATIONS_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("notifications");

const MARKERS_TABLE: TableDefinition<(u64, &str), u64> =
    TableDefinition::new("notification_markers");

const ENTRY_INDEX_TABLE: TableDefinition<(u64, u64), ()> =
    TableDefinition::new("entry_notifications");

const COUNTER_TABLE: TableDefinition<&str, u64> = TableDefinition::new("notification_counters");

const NEXT_ID_KEY: &str = "next_id";

/// Outcome of [`NotificationStore::claim`]
#[derive(Debug, Clone, PartialEq)]
pub enum Claim {
    /// A new pending record was written; the caller owns the send
    Claimed(NotificationRecord),
    /// A pending or sent attempt already exists
    Duplicate(NotificationStatus),
}

/// A message about to be claimed
#[derive(Debug, Clone)]
pub struct Draft {
    pub entry_id: u64,
    pub kind: NotificationKind,
    pub phone: String,
    pub message: String,
    pub created_at: i64,
}

#[derive(Clone)]
pub struct NotificationStore {
    db: Arc<Database>,
}

impl std::fmt::Debug for NotificationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationStore").finish_non_exhaustive()
    }
}

impl NotificationStore {
    /// Open the notification tables inside the queue's database
    pub fn open(entries: &EntryStore) -> StorageResult<Self> {
        let db = entries.database();
        let txn = db.begin_write()?;
        {
            let _ = txn.open_table(NOTIFICATIONS_TABLE)?;
            let _ = txn.open_table(MARKERS_TABLE)?;
            let _ = txn.open_table(ENTRY_INDEX_TABLE)?;
            let mut counters = txn.open_table(COUNTER_TABLE)?;
            if counters.get(NEXT_ID_KEY)?.is_none() {
                counters.insert(NEXT_ID_KEY, 0u64)?;
            }
        }
        txn.commit()?;
        Ok(Self { db })
    }

    fn put_record(txn: &WriteTransaction, record: &NotificationRecord) -> StorageResult<()> {
        let mut table = txn.open_table(NOTIFICATIONS_TABLE)?;
        let value = serde_json::to_vec(record)?;
        table.insert(record.id, value.as_slice())?;
        Ok(())
    }

    fn get_record_txn(
        txn: &WriteTransaction,
        id: u64,
    ) -> StorageResult<Option<NotificationRecord>> {
        let table = txn.open_table(NOTIFICATIONS_TABLE)?;
        match table.get(id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Take the `(entry_id, kind)` slot unless a pending or sent attempt holds it
    ///
    /// The marker check and the pending record share one write transaction;
    /// redb serializes writers, so concurrent claims for the same slot yield
    /// exactly one `Claimed`.
    pub fn claim(&self, draft: Draft) -> StorageResult<Claim> {
        let txn = self.db.begin_write()?;

        let latest = txn
            .open_table(MARKERS_TABLE)?
            .get((draft.entry_id, draft.kind.as_str()))?
            .map(|guard| guard.value());
        if let Some(id) = latest
            && let Some(existing) = Self::get_record_txn(&txn, id)?
            && existing.status.blocks_resend()
        {
            return Ok(Claim::Duplicate(existing.status));
        }

        let id = {
            let mut counters = txn.open_table(COUNTER_TABLE)?;
            let next = counters.get(NEXT_ID_KEY)?.map(|guard| guard.value()).unwrap_or(0) + 1;
            counters.insert(NEXT_ID_KEY, next)?;
            next
        };

        let record = NotificationRecord {
            id,
            entry_id: draft.entry_id,
            kind: draft.kind,
            phone: draft.phone,
            message: draft.message,
            status: NotificationStatus::Pending,
            created_at: draft.created_at,
            sent_at: None,
            error: None,
        };
        Self::put_record(&txn, &record)?;
        txn.open_table(MARKERS_TABLE)?
            .insert((record.entry_id, record.kind.as_str()), id)?;
        txn.open_table(ENTRY_INDEX_TABLE)?
            .insert((record.entry_id, id), ())?;
        txn.commit()?;

        Ok(Claim::Claimed(record))
    }

    /// Store the final state of a claimed record
    pub fn complete(&self, record: &NotificationRecord) -> StorageResult<()> {
        let txn = self.db.begin_write()?;
        Self::put_record(&txn, record)?;
        txn.commit()?;
        Ok(())
    }

    pub fn get(&self, id: u64) -> StorageResult<Option<NotificationRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(NOTIFICATIONS_TABLE)?;
        match table.get(id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Every attempt for an entry, newest first
    pub fn for_entry(&self, entry_id: u64) -> StorageResult<Vec<NotificationRecord>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(ENTRY_INDEX_TABLE)?;
        let table = read_txn.open_table(NOTIFICATIONS_TABLE)?;

        let mut records = Vec::new();
        for result in index.range((entry_id, 0u64)..=(entry_id, u64::MAX))?.rev() {
            let (key, _) = result?;
            let (_, id) = key.value();
            if let Some(value) = table.get(id)? {
                records.push(serde_json::from_slice(value.value())?);
            }
        }
        Ok(records)
    }

    /// Status of the latest attempt for an entry and kind
    pub fn marker(
        &self,
        entry_id: u64,
        kind: NotificationKind,
    ) -> StorageResult<Option<NotificationStatus>> {
        let read_txn = self.db.begin_read()?;
        let markers = read_txn.open_table(MARKERS_TABLE)?;
        let Some(id) = markers
            .get((entry_id, kind.as_str()))?
            .map(|guard| guard.value())
        else {
            return Ok(None);
        };
        let table = read_txn.open_table(NOTIFICATIONS_TABLE)?;
        match table.get(id)? {
            Some(value) => {
                let record: NotificationRecord = serde_json::from_slice(value.value())?;
                Ok(Some(record.status))
            }
            None => Ok(None),
        }
    }
}
