//! Validation helpers for DTOs.

use validator::ValidationError;

/// Slot lengths the club sells.
pub const ALLOWED_DURATIONS: [u16; 2] = [60, 90];

/// Validates that a slot lasts one of the [`ALLOWED_DURATIONS`].
///
/// # Examples
///
/// ```ignore
/// validate_duration_minutes(90) // Ok
/// validate_duration_minutes(45) // Err
/// ```
pub fn validate_duration_minutes(minutes: u16) -> Result<(), ValidationError> {
    if ALLOWED_DURATIONS.contains(&minutes) {
        return Ok(());
    }

    let mut err = ValidationError::new("duration_minutes");
    err.message = Some(format!("Duration must be 60 or 90 minutes (got {minutes})").into());
    Err(err)
}
