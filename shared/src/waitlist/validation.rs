//! Guest intake validation
//!
//! Validation collects every violated field instead of stopping at the first
//! one, so a kiosk form can highlight all problems in a single round trip.

use super::entry::EntrySource;
use serde::{Deserialize, Serialize};
use std::fmt;

// ── Text length limits ──────────────────────────────────────────────

/// Guest display name
pub const MAX_GUEST_NAME_LEN: usize = 255;

/// Contact phone number as typed by the guest
pub const MAX_PHONE_LEN: usize = 20;

/// Custom notification text
pub const MAX_MESSAGE_LEN: usize = 500;

// ── Intake ──────────────────────────────────────────────────────────

/// Boundary input for creating an entry
///
/// Absent JSON fields deserialize to empty/zero so that [`GuestIntake::validate`]
/// reports them together with every other violation. `party_size` is signed
/// for the same reason: a negative count is a validation error, not a parse
/// error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GuestIntake {
    pub guest_name: String,
    pub guest_phone: String,
    pub party_size: i64,
    pub source: EntrySource,
}

/// A single violated field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

/// All violations found in one input
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors {
    pub violations: Vec<FieldViolation>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.violations.push(FieldViolation {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Names of the violated fields, in check order
    pub fn fields(&self) -> Vec<&str> {
        self.violations.iter().map(|v| v.field.as_str()).collect()
    }

    /// `Ok(())` when nothing was recorded
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .violations
            .iter()
            .map(|v| format!("{}: {}", v.field, v.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Record a violation when a required text field is blank or too long
pub fn check_required_text(
    errors: &mut ValidationErrors,
    value: &str,
    field: &str,
    max_len: usize,
) {
    let len = value.trim().chars().count();
    if len == 0 {
        errors.add(field, format!("{field} must not be empty"));
    } else if len > max_len {
        errors.add(
            field,
            format!("{field} is too long ({len} chars, max {max_len})"),
        );
    }
}

impl GuestIntake {
    /// Check every guest field, returning all violations at once
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        check_required_text(&mut errors, &self.guest_name, "guestName", MAX_GUEST_NAME_LEN);
        check_required_text(&mut errors, &self.guest_phone, "guestPhone", MAX_PHONE_LEN);
        if !self.guest_phone.trim().is_empty() && !is_phone_like(&self.guest_phone) {
            errors.add("guestPhone", "guestPhone must contain digits only (+, spaces, dashes allowed)");
        }
        if self.party_size < 1 {
            errors.add("partySize", "partySize must be at least 1");
        } else if self.party_size > u32::MAX as i64 {
            errors.add("partySize", "partySize is out of range");
        }

        errors.into_result()
    }
}

fn is_phone_like(value: &str) -> bool {
    let trimmed = value.trim();
    let body = trimmed.strip_prefix('+').unwrap_or(trimmed);
    body.chars().any(|c| c.is_ascii_digit())
        && body
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '-' | '(' | ')' | '.'))
}
