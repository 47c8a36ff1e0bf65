//! Notification side effects
//!
//! Guest messages are triggered by queue events (per [`NotifyPolicy`]), by the
//! host (table ready) and by the reminder sweep. Delivery never blocks or
//! rolls back a queue mutation; failures are recorded and returned.
//!
//! ```text
//! notify/
//! ├── sender.rs     # NotificationSender trait, log + mock adapters
//! ├── twilio.rs     # Twilio SMS adapter
//! ├── templates.rs  # message texts
//! ├── hook.rs       # duplicate suppression, delivery, event listener
//! ├── store.rs      # redb tables for markers and history
//! └── reminder.rs   # periodic "table soon" reminders
//! ```

pub mod hook;
pub mod reminder;
pub mod sender;
pub mod store;
pub mod templates;
pub mod twilio;

pub use hook::{NotificationHook, NotifyPolicy};
pub use reminder::{PendingReminder, ReminderScheduler, SweepReport};
pub use sender::{LogSender, MockSender, NotificationSender, SendError};
pub use store::NotificationStore;
pub use templates::MessageTemplates;
pub use twilio::{TwilioCredentials, TwilioSender};

use crate::waitlist::{QueueError, StorageError};
use serde::{Deserialize, Serialize};
use shared::error::{AppError, ErrorCode};
use shared::waitlist::ValidationErrors;
use std::fmt;
use thiserror::Error;

/// What a message is about; one marker per entry and kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    TableReady,
    Reminder,
    StatusUpdate,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::TableReady => "table_ready",
            NotificationKind::Reminder => "reminder",
            NotificationKind::StatusUpdate => "status_update",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Failed,
}

impl NotificationStatus {
    /// Pending and sent markers suppress another send of the same kind
    pub fn blocks_resend(self) -> bool {
        !matches!(self, NotificationStatus::Failed)
    }
}

/// One delivery attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRecord {
    pub id: u64,
    pub entry_id: u64,
    pub kind: NotificationKind,
    pub phone: String,
    pub message: String,
    pub status: NotificationStatus,
    /// Unix millis
    pub created_at: i64,
    pub sent_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Entry not found: {0}")]
    NotFound(u64),

    #[error("{kind} notification already pending or sent for entry {entry_id}")]
    Duplicate {
        entry_id: u64,
        kind: NotificationKind,
    },

    #[error("{kind} notification for entry {entry_id} failed: {reason}")]
    Delivery {
        entry_id: u64,
        kind: NotificationKind,
        reason: String,
    },

    #[error("Invalid notification request: {0}")]
    Validation(ValidationErrors),

    #[error(transparent)]
    Queue(QueueError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<QueueError> for NotifyError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::NotFound(id) => NotifyError::NotFound(id),
            other => NotifyError::Queue(other),
        }
    }
}

impl From<StorageError> for NotifyError {
    fn from(err: StorageError) -> Self {
        NotifyError::Queue(QueueError::from(err))
    }
}

impl From<NotifyError> for AppError {
    fn from(err: NotifyError) -> Self {
        match err {
            NotifyError::NotFound(id) => QueueError::NotFound(id).into(),
            NotifyError::Duplicate { entry_id, kind } => AppError::with_message(
                ErrorCode::NotificationDuplicate,
                format!("A {kind} notification was already sent for entry {entry_id}"),
            )
            .with_detail("entryId", entry_id)
            .with_detail("kind", kind.as_str()),
            NotifyError::Delivery {
                entry_id,
                kind,
                reason,
            } => AppError::with_message(
                ErrorCode::NotificationDeliveryFailed,
                format!("Failed to deliver {kind} notification"),
            )
            .with_detail("entryId", entry_id)
            .with_detail("kind", kind.as_str())
            .with_detail("reason", reason),
            NotifyError::Validation(errors) => QueueError::Validation(errors).into(),
            NotifyError::Queue(e) => e.into(),
            NotifyError::Internal(msg) => AppError::internal(msg),
        }
    }
}

pub type NotifyResult<T> = Result<T, NotifyError>;
