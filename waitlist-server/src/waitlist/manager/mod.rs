//! QueueManager - ordering, status transitions, reordering and VIP flags
//!
//! Every mutation goes through the [`EntryStore`] in a single write
//! transaction and is broadcast as a [`QueueEvent`] only after commit.
//!
//! # Status update flow
//!
//! ```text
//! update_status(id, expected_version, new_status, actor)
//!     ├─ 1. Begin waiting batch (write transaction)
//!     ├─ 2. Load entry (NotFound if absent)
//!     ├─ 3. Check version (Conflict)
//!     ├─ 4. Check transition legality (InvalidTransition)
//!     ├─ 5. Depart entry, compact positions behind it
//!     ├─ 6. Verify dense positions, write changed entries, bump revision
//!     ├─ 7. Commit
//!     └─ 8. Broadcast StatusChanged
//! ```
//!
//! All methods are synchronous; async callers wrap them in
//! `tokio::task::spawn_blocking`.

mod error;
pub use error::*;

#[cfg(test)]
mod tests;

use super::eta::{self, TurnTimeSource};
use super::storage::{EntryStore, StoreStats};
use shared::util::now_millis;
use shared::waitlist::{
    EntryView, GuestIntake, QueueEvent, QueueEventKind, QueueSnapshot, WaitlistEntry,
    WaitlistStatus,
};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Default event broadcast channel capacity
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 4096;

/// Recommended attempt budget for [`retry_on_conflict`]
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Queue engine
///
/// The `epoch` field is a unique identifier generated on each startup.
/// Viewers use it to detect server restarts and trigger a full resync.
pub struct QueueManager {
    store: EntryStore,
    turn_time: Arc<dyn TurnTimeSource>,
    event_tx: broadcast::Sender<QueueEvent>,
    /// Server instance epoch - unique ID generated on startup
    epoch: String,
}

impl std::fmt::Debug for QueueManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueManager")
            .field("store", &"<EntryStore>")
            .field("event_tx", &"<broadcast::Sender>")
            .field("epoch", &self.epoch)
            .finish()
    }
}

impl QueueManager {
    /// Open the store at `db_path` and create a manager on top of it
    pub fn open(
        db_path: impl AsRef<Path>,
        turn_time: Arc<dyn TurnTimeSource>,
        event_capacity: usize,
    ) -> QueueResult<Self> {
        let store = EntryStore::open(db_path)?;
        Ok(Self::new(store, turn_time, event_capacity))
    }

    /// Create a manager over an existing store
    pub fn new(
        store: EntryStore,
        turn_time: Arc<dyn TurnTimeSource>,
        event_capacity: usize,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(event_capacity.max(1));
        let epoch = uuid::Uuid::new_v4().to_string();
        tracing::info!(epoch = %epoch, "QueueManager started with new epoch");
        Self {
            store,
            turn_time,
            event_tx,
            epoch,
        }
    }

    /// Subscribe to committed queue events
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.event_tx.subscribe()
    }

    pub fn epoch(&self) -> &str {
        &self.epoch
    }

    pub fn store(&self) -> &EntryStore {
        &self.store
    }

    pub fn current_revision(&self) -> QueueResult<u64> {
        Ok(self.store.current_revision()?)
    }

    pub fn stats(&self) -> QueueResult<StoreStats> {
        Ok(self.store.get_stats()?)
    }

    /// Validated average turn time for the location
    pub fn turn_minutes(&self) -> QueueResult<f64> {
        let minutes = eta::resolve_turn_minutes(self.turn_time.average_turn_minutes());
        eta::validate_turn_minutes(minutes)?;
        Ok(minutes)
    }

    fn view(&self, entry: WaitlistEntry, turn_minutes: f64) -> QueueResult<EntryView> {
        let eta_minutes = match entry.position {
            Some(position) if entry.is_waiting() => Some(eta::estimate(position, turn_minutes)?),
            _ => None,
        };
        Ok(EntryView { entry, eta_minutes })
    }

    fn emit(&self, revision: u64, entry_id: u64, actor: &str, kind: QueueEventKind) {
        let event = QueueEvent {
            revision,
            entry_id,
            timestamp: now_millis(),
            actor: actor.to_string(),
            kind,
        };
        if self.event_tx.send(event).is_err() {
            tracing::debug!(revision, entry_id, "No queue event subscribers");
        }
    }

    // ========== Commands ==========

    /// Append a guest at the tail of the queue
    pub fn add_guest(&self, intake: &GuestIntake, actor: &str) -> QueueResult<EntryView> {
        let turn_minutes = self.turn_minutes()?;
        let committed = self.store.create(intake)?;
        let entry = committed.value;
        let position = entry.position.unwrap_or_default();

        tracing::info!(
            entry_id = entry.id,
            position,
            party_size = entry.party_size,
            source = ?entry.source,
            revision = committed.revision,
            actor,
            "Guest added to waitlist"
        );
        self.emit(
            committed.revision,
            entry.id,
            actor,
            QueueEventKind::EntryAdded { position },
        );

        self.view(entry, turn_minutes)
    }

    /// Move a waiting entry to a terminal status and close the gap it leaves
    pub fn update_status(
        &self,
        entry_id: u64,
        expected_version: u64,
        new_status: WaitlistStatus,
        actor: &str,
    ) -> QueueResult<WaitlistEntry> {
        let outcome = self.store.mutate_waiting(|batch| {
            let current = batch.find(entry_id)?.ok_or(QueueError::NotFound(entry_id))?;

            // A stale caller must reload before its transition means anything
            if current.version != expected_version {
                return Err(QueueError::Conflict {
                    entry_id,
                    expected: expected_version,
                    actual: current.version,
                });
            }
            if !current.status.can_transition_to(new_status) {
                return Err(QueueError::InvalidTransition {
                    entry_id,
                    from: current.status,
                    to: new_status,
                });
            }

            batch
                .depart(entry_id, new_status)
                .ok_or(QueueError::NotFound(entry_id))?;
            Ok(current.status)
        })?;

        let old_status = outcome.value;
        let updated = outcome
            .changed
            .iter()
            .find(|e| e.id == entry_id)
            .cloned()
            .ok_or(QueueError::NotFound(entry_id))?;

        tracing::info!(
            entry_id,
            from = %old_status,
            to = %new_status,
            compacted = outcome.changed.len().saturating_sub(1),
            revision = outcome.revision,
            actor,
            "Waitlist entry status changed"
        );
        self.emit(
            outcome.revision,
            entry_id,
            actor,
            QueueEventKind::StatusChanged {
                old: old_status,
                new: new_status,
            },
        );

        Ok(updated)
    }

    /// Replace the queue order with `ordered_ids`
    ///
    /// `ordered_ids` must be exactly the current waiting set. When
    /// `expected_revision` is given and the queue has moved on since, nothing
    /// is changed. Entries whose position does not change keep their version.
    pub fn reorder(
        &self,
        ordered_ids: &[u64],
        expected_revision: Option<u64>,
        actor: &str,
    ) -> QueueResult<Vec<EntryView>> {
        let outcome = self.store.mutate_waiting(|batch| {
            if let Some(expected) = expected_revision {
                let actual = batch.revision()?;
                if actual != expected {
                    return Err(QueueError::RevisionConflict { expected, actual });
                }
            }

            check_reorder(&batch.ids(), ordered_ids)?;
            if !batch.arrange(ordered_ids) {
                return Err(QueueError::InvalidReorder {
                    missing: vec![],
                    unexpected: vec![],
                    duplicates: vec![],
                });
            }
            Ok(())
        })?;

        if outcome.changed.is_empty() {
            tracing::debug!(actor, "Reorder matched the current order, nothing changed");
        } else {
            tracing::info!(
                moved = outcome.changed.len(),
                revision = outcome.revision,
                actor,
                "Waitlist reordered"
            );
            self.emit(
                outcome.revision,
                ordered_ids.first().copied().unwrap_or_default(),
                actor,
                QueueEventKind::Reordered {
                    order: ordered_ids.to_vec(),
                },
            );
        }

        self.get_waitlist()
    }

    /// Set the VIP flag. Never changes the position.
    pub fn toggle_vip(
        &self,
        entry_id: u64,
        expected_version: u64,
        vip: bool,
        actor: &str,
    ) -> QueueResult<EntryView> {
        let turn_minutes = self.turn_minutes()?;
        let committed = self
            .store
            .update::<_, QueueError>(entry_id, expected_version, |entry| {
                entry.vip = vip;
                Ok(())
            })?;

        let entry = committed.value;
        if entry.version != expected_version {
            tracing::info!(entry_id, vip, revision = committed.revision, actor, "VIP flag changed");
            self.emit(
                committed.revision,
                entry_id,
                actor,
                QueueEventKind::VipToggled { vip },
            );
        }

        self.view(entry, turn_minutes)
    }

    // ========== Queries ==========

    /// Waiting entries by position, each with its ETA
    pub fn get_waitlist(&self) -> QueueResult<Vec<EntryView>> {
        let turn_minutes = self.turn_minutes()?;
        let (_, entries) = self.store.waiting_with_revision()?;
        entries
            .into_iter()
            .map(|entry| self.view(entry, turn_minutes))
            .collect()
    }

    /// Entries in a given status; waiting by position, others by creation
    pub fn list_by_status(&self, status: WaitlistStatus) -> QueueResult<Vec<EntryView>> {
        let turn_minutes = self.turn_minutes()?;
        self.store
            .list_by_status(status)
            .iter()?
            .map(|entry| self.view(entry, turn_minutes))
            .collect()
    }

    pub fn get_entry(&self, entry_id: u64) -> QueueResult<EntryView> {
        let turn_minutes = self.turn_minutes()?;
        let entry = self
            .store
            .get_by_id(entry_id)?
            .ok_or(QueueError::NotFound(entry_id))?;
        self.view(entry, turn_minutes)
    }

    /// Current ETA in minutes; `None` once the entry has left the queue
    pub fn get_eta(&self, entry_id: u64) -> QueueResult<Option<u32>> {
        Ok(self.get_entry(entry_id)?.eta_minutes)
    }

    /// Revision-stamped copy of the waiting queue read from one snapshot
    pub fn snapshot(&self) -> QueueResult<QueueSnapshot> {
        let turn_minutes = self.turn_minutes()?;
        let (revision, entries) = self.store.waiting_with_revision()?;
        let entries = entries
            .into_iter()
            .map(|entry| self.view(entry, turn_minutes))
            .collect::<QueueResult<Vec<_>>>()?;
        Ok(QueueSnapshot {
            revision,
            published_at: now_millis(),
            average_turn_minutes: turn_minutes,
            entries,
        })
    }
}

/// Compare a requested order against the waiting set
fn check_reorder(waiting: &[u64], requested: &[u64]) -> QueueResult<()> {
    let waiting_set: HashSet<u64> = waiting.iter().copied().collect();

    let mut seen: HashMap<u64, usize> = HashMap::new();
    for id in requested {
        *seen.entry(*id).or_default() += 1;
    }

    let missing: Vec<u64> = waiting
        .iter()
        .copied()
        .filter(|id| !seen.contains_key(id))
        .collect();

    let mut unexpected: Vec<u64> = seen
        .keys()
        .copied()
        .filter(|id| !waiting_set.contains(id))
        .collect();
    unexpected.sort_unstable();

    let mut duplicates: Vec<u64> = seen
        .iter()
        .filter(|(_, count)| **count > 1)
        .map(|(id, _)| *id)
        .collect();
    duplicates.sort_unstable();

    if missing.is_empty() && unexpected.is_empty() && duplicates.is_empty() {
        Ok(())
    } else {
        Err(QueueError::InvalidReorder {
            missing,
            unexpected,
            duplicates,
        })
    }
}

/// Run `op` again while it fails with a retryable error
///
/// The engine never retries on its own; this is the helper for callers that
/// want the recommended policy. `op` must re-read fresh state on every call.
pub fn retry_on_conflict<T, F>(max_attempts: u32, mut op: F) -> QueueResult<T>
where
    F: FnMut() -> QueueResult<T>,
{
    let attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op() {
            Err(e) if e.is_retryable() && attempt < attempts => {
                tracing::debug!(attempt, error = %e, "Retrying after conflict");
                attempt += 1;
            }
            result => return result,
        }
    }
}
