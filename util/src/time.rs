//! General time utility functions

use chrono;

/// Number of nanoseconds in a second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

/// Convert a duration into a number of seconds, or `None` if overflow
pub fn duration_to_seconds(duration: chrono::Duration) -> Option<f64> {
    duration
        .num_nanoseconds()
        .map(|ns| ns as f64 / NANOS_PER_SECOND as f64)
}

/// Convert a period in seconds into a `std::time::Duration`.
///
/// Returns `None` if the period is negative or not finite.
pub fn period_to_duration(period_s: f64) -> Option<std::time::Duration> {
    if period_s.is_finite() && period_s >= 0.0 {
        Some(std::time::Duration::from_secs_f64(period_s))
    }
    else {
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_duration_to_seconds() {
        let d = chrono::Duration::milliseconds(1500);
        assert_eq!(duration_to_seconds(d), Some(1.5));
    }

    #[test]
    fn test_period_to_duration() {
        assert_eq!(
            period_to_duration(0.25),
            Some(std::time::Duration::from_millis(250))
        );
        assert!(period_to_duration(-1.0).is_none());
        assert!(period_to_duration(f64::NAN).is_none());
    }
}
