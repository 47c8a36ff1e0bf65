use serde::{Deserialize, Serialize};
use shared::waitlist::{QueueEvent, QueueEventKind, WaitlistStatus};

/// One status transition, as recorded by the audit sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub actor: String,
    pub entry_id: u64,
    pub old_status: WaitlistStatus,
    pub new_status: WaitlistStatus,
    /// Unix millis of the committed change
    pub timestamp: i64,
    pub revision: u64,
}

impl AuditRecord {
    /// Record for a status change event; `None` for any other event
    pub fn from_event(event: &QueueEvent) -> Option<Self> {
        match event.kind {
            QueueEventKind::StatusChanged { old, new } => Some(Self {
                actor: event.actor.clone(),
                entry_id: event.entry_id,
                old_status: old,
                new_status: new,
                timestamp: event.timestamp,
                revision: event.revision,
            }),
            _ => None,
        }
    }
}
