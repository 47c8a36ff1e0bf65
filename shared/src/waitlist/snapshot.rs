//! Revision-stamped view of the waiting queue published to viewers

use super::entry::EntryView;
use serde::{Deserialize, Serialize};

/// Engine-validated copy of the waiting queue
///
/// Entries are ordered by position and their positions are exactly `1..=N`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    pub revision: u64,
    /// Unix millis when the snapshot was read from the store
    pub published_at: i64,
    pub average_turn_minutes: f64,
    pub entries: Vec<EntryView>,
}

impl QueueSnapshot {
    pub fn empty(average_turn_minutes: f64) -> Self {
        Self {
            revision: 0,
            published_at: 0,
            average_turn_minutes,
            entries: Vec::new(),
        }
    }

    /// Positions are `1..=N` in order, and every entry is waiting
    pub fn is_dense(&self) -> bool {
        self.entries.iter().enumerate().all(|(i, view)| {
            view.entry.is_waiting() && view.entry.position == Some(i as u32 + 1)
        })
    }
}

/// Poll response: the snapshot when it is newer than the caller's revision
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotPoll {
    pub changed: bool,
    pub revision: u64,
    /// Gateway instance id; a different epoch means the viewer must resync
    pub epoch: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<QueueSnapshot>,
}
