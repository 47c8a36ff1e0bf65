//! HTTP status for each error code

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Success => StatusCode::OK,
            Self::ValidationFailed | Self::InvalidFormat => StatusCode::BAD_REQUEST,
            Self::NotFound | Self::EntryNotFound => StatusCode::NOT_FOUND,
            // Stale view or duplicate trigger: reload and decide again
            Self::VersionConflict
            | Self::RevisionConflict
            | Self::InvalidReorder
            | Self::NotificationDuplicate => StatusCode::CONFLICT,
            Self::InvalidStatusTransition => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotificationDeliveryFailed => StatusCode::BAD_GATEWAY,
            Self::SystemBusy => StatusCode::SERVICE_UNAVAILABLE,
            Self::InternalError
            | Self::ConfigError
            | Self::StorageFull
            | Self::StorageCorrupted => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
