use super::super::storage::StorageError;
use shared::error::{AppError, ErrorCode};
use shared::waitlist::{ValidationErrors, WaitlistStatus};
use thiserror::Error;

/// Queue engine errors
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Invalid status transition for entry {entry_id}: {from} -> {to}")]
    InvalidTransition {
        entry_id: u64,
        from: WaitlistStatus,
        to: WaitlistStatus,
    },

    #[error("Version conflict on entry {entry_id}: expected {expected}, actual {actual}")]
    Conflict {
        entry_id: u64,
        expected: u64,
        actual: u64,
    },

    #[error("Queue revision conflict: expected {expected}, actual {actual}")]
    RevisionConflict { expected: u64, actual: u64 },

    #[error(
        "Reorder does not match the waiting set (missing: {missing:?}, unexpected: {unexpected:?}, duplicates: {duplicates:?})"
    )]
    InvalidReorder {
        missing: Vec<u64>,
        unexpected: Vec<u64>,
        duplicates: Vec<u64>,
    },

    #[error("Entry not found: {0}")]
    NotFound(u64),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Storage error: {0}")]
    Storage(StorageError),
}

impl QueueError {
    /// Whether the caller should reload state and try again
    ///
    /// Conflicts and reorder mismatches both mean "your view is stale".
    /// Nothing else improves by retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            QueueError::Conflict { .. }
                | QueueError::RevisionConflict { .. }
                | QueueError::InvalidReorder { .. }
        )
    }
}

impl From<StorageError> for QueueError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Validation(errors) => QueueError::Validation(errors),
            StorageError::EntryNotFound(id) => QueueError::NotFound(id),
            StorageError::VersionConflict {
                entry_id,
                expected,
                actual,
            } => QueueError::Conflict {
                entry_id,
                expected,
                actual,
            },
            other => QueueError::Storage(other),
        }
    }
}

/// Map a storage failure to an error code (clients localize by code)
fn classify_storage_error(e: &StorageError) -> ErrorCode {
    if let StorageError::Serialization(_) = e {
        return ErrorCode::InternalError;
    }

    // redb errors are classified by message
    let err_str = e.to_string().to_lowercase();

    if err_str.contains("no space") || err_str.contains("disk full") || err_str.contains("enospc")
    {
        return ErrorCode::StorageFull;
    }

    if err_str.contains("corrupt") || err_str.contains("invalid database") {
        return ErrorCode::StorageCorrupted;
    }

    // Default: transient Database/Transaction/Table/Storage/Commit failure
    ErrorCode::SystemBusy
}

impl From<QueueError> for AppError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Validation(errors) => {
                let message = errors.to_string();
                let violations = serde_json::to_value(&errors.violations).unwrap_or_default();
                AppError::with_message(ErrorCode::ValidationFailed, message)
                    .with_detail("violations", violations)
            }
            QueueError::InvalidTransition { entry_id, from, to } => AppError::with_message(
                ErrorCode::InvalidStatusTransition,
                format!("Cannot change entry {entry_id} from {from} to {to}"),
            )
            .with_detail("entryId", entry_id)
            .with_detail("from", from.as_str())
            .with_detail("to", to.as_str()),
            QueueError::Conflict {
                entry_id,
                expected,
                actual,
            } => AppError::new(ErrorCode::VersionConflict)
                .with_detail("entryId", entry_id)
                .with_detail("expectedVersion", expected)
                .with_detail("actualVersion", actual),
            QueueError::RevisionConflict { expected, actual } => {
                AppError::new(ErrorCode::RevisionConflict)
                    .with_detail("expectedRevision", expected)
                    .with_detail("actualRevision", actual)
            }
            QueueError::InvalidReorder {
                missing,
                unexpected,
                duplicates,
            } => AppError::new(ErrorCode::InvalidReorder)
                .with_detail("missing", missing)
                .with_detail("unexpected", unexpected)
                .with_detail("duplicates", duplicates),
            QueueError::NotFound(id) => AppError::with_message(
                ErrorCode::EntryNotFound,
                format!("Waitlist entry not found: {id}"),
            )
            .with_detail("entryId", id),
            QueueError::Configuration(msg) => AppError::with_message(ErrorCode::ConfigError, msg),
            QueueError::Storage(e) => {
                let code = classify_storage_error(&e);
                tracing::error!(error = %e, error_code = ?code, "Storage error occurred");
                AppError::with_message(code, e.to_string())
            }
        }
    }
}

pub type QueueResult<T> = Result<T, QueueError>;
