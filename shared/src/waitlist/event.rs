//! Queue events emitted by the engine after every committed mutation

use super::entry::WaitlistStatus;
use serde::{Deserialize, Serialize};

/// One committed change to the waitlist
///
/// `revision` is the global queue revision the change produced, so viewers
/// can tell whether they already hold a newer snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEvent {
    pub revision: u64,
    /// Entry the change is about (for reorders, the first entry in the new order)
    pub entry_id: u64,
    /// Unix millis
    pub timestamp: i64,
    pub actor: String,
    pub kind: QueueEventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueEventKind {
    EntryAdded {
        position: u32,
    },
    StatusChanged {
        old: WaitlistStatus,
        new: WaitlistStatus,
    },
    Reordered {
        order: Vec<u64>,
    },
    VipToggled {
        vip: bool,
    },
}

impl QueueEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            QueueEventKind::EntryAdded { .. } => "entry_added",
            QueueEventKind::StatusChanged { .. } => "status_changed",
            QueueEventKind::Reordered { .. } => "reordered",
            QueueEventKind::VipToggled { .. } => "vip_toggled",
        }
    }
}
