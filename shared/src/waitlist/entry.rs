//! Waitlist entry types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Status
// ============================================================================

/// Lifecycle status of a waitlist entry
///
/// ```text
///              ┌──► Seated
///   Waiting ───┼──► Canceled
///              └──► NoShow
/// ```
///
/// Every target is terminal: there is no edge out of `Seated`, `Canceled`
/// or `NoShow`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitlistStatus {
    Waiting,
    Seated,
    Canceled,
    NoShow,
}

impl WaitlistStatus {
    pub const ALL: [WaitlistStatus; 4] = [
        WaitlistStatus::Waiting,
        WaitlistStatus::Seated,
        WaitlistStatus::Canceled,
        WaitlistStatus::NoShow,
    ];

    /// Whether `self -> next` is an edge of the status state machine
    pub fn can_transition_to(self, next: WaitlistStatus) -> bool {
        matches!(
            (self, next),
            (
                WaitlistStatus::Waiting,
                WaitlistStatus::Seated | WaitlistStatus::Canceled | WaitlistStatus::NoShow
            )
        )
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, WaitlistStatus::Waiting)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WaitlistStatus::Waiting => "waiting",
            WaitlistStatus::Seated => "seated",
            WaitlistStatus::Canceled => "canceled",
            WaitlistStatus::NoShow => "no_show",
        }
    }
}

impl fmt::Display for WaitlistStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown status name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown waitlist status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for WaitlistStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "waiting" => Ok(WaitlistStatus::Waiting),
            "seated" => Ok(WaitlistStatus::Seated),
            "canceled" | "cancelled" => Ok(WaitlistStatus::Canceled),
            "no_show" | "no-show" | "noshow" => Ok(WaitlistStatus::NoShow),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

// ============================================================================
// Source
// ============================================================================

/// Where the entry was created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EntrySource {
    Kiosk,
    /// Host stand / admin console
    #[default]
    Admin,
}

// ============================================================================
// Entry
// ============================================================================

/// One guest party in the waitlist
///
/// `position` is `Some(n)` (1-based) exactly when `status == Waiting`.
/// `version` starts at 0 and increases on every persisted mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitlistEntry {
    pub id: u64,
    pub guest_name: String,
    pub guest_phone: String,
    pub party_size: u32,
    pub status: WaitlistStatus,
    pub position: Option<u32>,
    #[serde(default)]
    pub vip: bool,
    pub source: EntrySource,
    /// Unix millis
    pub created_at: i64,
    /// Unix millis
    pub updated_at: i64,
    pub version: u64,
}

impl WaitlistEntry {
    pub fn is_waiting(&self) -> bool {
        self.status == WaitlistStatus::Waiting
    }
}

/// Entry as returned to callers, with the derived ETA attached
///
/// `eta_minutes` is `None` once the entry has left the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryView {
    #[serde(flatten)]
    pub entry: WaitlistEntry,
    pub eta_minutes: Option<u32>,
}
