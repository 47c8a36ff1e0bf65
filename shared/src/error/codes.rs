//! Numeric error codes
//!
//! Codes travel as bare `u16` values in the response envelope so clients can
//! localize by number. Ranges:
//! - 0xxx: request-level problems
//! - 4xxx: waitlist queue
//! - 5xxx: guest notifications
//! - 9xxx: server and storage

use serde::{Deserialize, Serialize};
use std::fmt;

/// Declares the code table once; the enum, its default messages and the
/// reverse lookup are generated from it.
macro_rules! error_codes {
    ($($(#[$meta:meta])* $name:ident = $value:literal => $message:literal,)+) => {
        /// Error code carried by every failed response
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(into = "u16", try_from = "u16")]
        #[repr(u16)]
        pub enum ErrorCode {
            $($(#[$meta])* $name = $value,)+
        }

        impl ErrorCode {
            /// Default English message for the code
            pub const fn message(&self) -> &'static str {
                match self {
                    $(ErrorCode::$name => $message,)+
                }
            }
        }

        impl TryFrom<u16> for ErrorCode {
            type Error = UnknownErrorCode;

            fn try_from(value: u16) -> Result<Self, Self::Error> {
                match value {
                    $($value => Ok(ErrorCode::$name),)+
                    other => Err(UnknownErrorCode(other)),
                }
            }
        }
    };
}

error_codes! {
    Success = 0 => "OK",
    /// Request body or query failed field validation
    ValidationFailed = 2 => "Validation failed",
    NotFound = 3 => "Resource not found",
    /// Body is not the JSON shape the endpoint expects
    InvalidFormat = 6 => "Malformed request body",

    EntryNotFound = 4001 => "Waitlist entry not found",
    /// The status machine forbids this change
    InvalidStatusTransition = 4002 => "Status transition is not allowed",
    /// Entry version is stale
    VersionConflict = 4003 => "Entry was modified concurrently, reload and retry",
    /// Reorder list is not a permutation of the waiting set
    InvalidReorder = 4004 => "Reorder does not match the current waiting set",
    /// Queue revision is stale
    RevisionConflict = 4005 => "Queue changed since it was read, reload and retry",

    /// A notification of this kind is already pending or sent
    NotificationDuplicate = 5001 => "Notification already pending or sent",
    NotificationDeliveryFailed = 5002 => "Notification delivery failed",

    InternalError = 9001 => "Internal server error",
    ConfigError = 9005 => "Configuration error",
    StorageFull = 9401 => "Storage full (disk space insufficient)",
    StorageCorrupted = 9403 => "Storage corrupted (data file damaged)",
    /// Transient IO or transaction failure
    SystemBusy = 9404 => "System busy, please retry later",
}

impl ErrorCode {
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Whether a client may retry the same request after reloading state
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::VersionConflict
                | ErrorCode::RevisionConflict
                | ErrorCode::InvalidReorder
                | ErrorCode::SystemBusy
        )
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// A `u16` that names no known error code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownErrorCode(pub u16);

impl fmt::Display for UnknownErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown error code {}", self.0)
    }
}

impl std::error::Error for UnknownErrorCode {}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
