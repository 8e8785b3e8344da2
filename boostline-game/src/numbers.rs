//! Numeric conversion helpers centralizing the f32 config / f64 clock boundary.

use num_traits::cast::cast;

/// Widen configured seconds to clock precision, mapping non-finite or negative
/// values to zero.
#[must_use]
pub fn seconds(value: f32) -> f64 {
    if !value.is_finite() || value <= 0.0 {
        return 0.0;
    }
    f64::from(value)
}

/// Duration in seconds of a lerp advancing at `rate` progress per second.
#[must_use]
pub fn lerp_duration(rate: f32) -> f64 {
    if !rate.is_finite() || rate <= 0.0 {
        return 0.0;
    }
    1.0 / f64::from(rate)
}

/// Narrow a clock-domain progress value to a unit `f32`, returning 0.0 for NaN.
#[must_use]
pub fn unit_progress(value: f64) -> f32 {
    if value.is_nan() {
        return 0.0;
    }
    cast::<f64, f32>(value.clamp(0.0, 1.0)).unwrap_or(0.0)
}

/// Convert a count to f64 while allowing precision loss in a single location.
#[must_use]
pub fn count_to_f64(value: usize) -> f64 {
    cast::<usize, f64>(value).unwrap_or(0.0)
}
