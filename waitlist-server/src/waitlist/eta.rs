//! Estimated wait time
//!
//! `eta = round(position × average_turn_minutes)`, never negative. The
//! estimate is a pure function of its inputs so every viewer computes the same
//! value for the same snapshot.

use super::manager::QueueError;

/// Turn time used when the location has no configured value
pub const DEFAULT_TURN_MINUTES: f64 = 15.0;

/// Per-location source of the average table turn time
///
/// Read on every estimate, so implementations may change their answer at
/// runtime.
pub trait TurnTimeSource: Send + Sync {
    /// Average minutes a party occupies a table; `None` means "not configured"
    fn average_turn_minutes(&self) -> Option<f64>;
}

/// Turn time fixed at startup
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedTurnTime(pub Option<f64>);

impl TurnTimeSource for FixedTurnTime {
    fn average_turn_minutes(&self) -> Option<f64> {
        self.0
    }
}

/// Estimate minutes until a party at `position` is seated
pub fn estimate(position: u32, average_turn_minutes: f64) -> Result<u32, QueueError> {
    validate_turn_minutes(average_turn_minutes)?;
    let eta = (position as f64 * average_turn_minutes).round();
    Ok(eta.clamp(0.0, u32::MAX as f64) as u32)
}

/// Configured turn time, or [`DEFAULT_TURN_MINUTES`] when unset
pub fn resolve_turn_minutes(configured: Option<f64>) -> f64 {
    configured.unwrap_or(DEFAULT_TURN_MINUTES)
}

/// Reject turn times that cannot produce a meaningful estimate
pub fn validate_turn_minutes(average_turn_minutes: f64) -> Result<(), QueueError> {
    if !average_turn_minutes.is_finite() || average_turn_minutes <= 0.0 {
        return Err(QueueError::Configuration(format!(
            "average turn minutes must be a positive number, got {average_turn_minutes}"
        )));
    }
    Ok(())
}
