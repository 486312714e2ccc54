//! Volume level conversion.
//!
//! The platform works in a scalar between 0.0 and 1.0; callers see an
//! integer percentage between 0 and 100.

use super::device::AudioError;

/// Convert a caller percentage to the platform scalar.
///
/// Out-of-range input saturates silently.
pub fn percent_to_scalar(percent: i64) -> f32 {
    percent.clamp(0, 100) as f32 / 100.0
}

/// Convert a platform scalar to a percentage (0-100).
pub fn scalar_to_percent(scalar: f32) -> u8 {
    if scalar.is_nan() {
        return 0;
    }
    (scalar * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Accept a host-supplied number as a volume percentage.
///
/// Fractions are truncated toward zero, as the native addon's `Int32Value`
/// did (its JavaScript wrapper rounded first). NaN and infinities are rejected.
pub fn percent_from_f64(value: f64) -> Result<i64, AudioError> {
    if !value.is_finite() {
        return Err(AudioError::InvalidArgument(
            "Expected volume number".to_string(),
        ));
    }
    // `as` saturates for values beyond the i64 range
    Ok(value.trunc() as i64)
}
