//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Map a value from one range into another.
pub fn lin_map<T>(source_range: (T, T), target_range: (T, T), value: T) -> T
where
    T: Float
{
    target_range.0
        + ((value - source_range.0)
        * (target_range.1 - target_range.0)
        / (source_range.1 - source_range.0))
}

/// Wrap an angle into the range (-pi, pi].
pub fn wrap_pi<T>(value: T) -> T
where
    T: Float
{
    let pi_t: T = T::from(std::f64::consts::PI).unwrap();
    let tau_t: T = T::from(std::f64::consts::TAU).unwrap();

    let wrapped = pi_t - rem_euclid(pi_t - value, tau_t);

    // rem_euclid can round up to tau, which would put us on -pi
    if wrapped <= -pi_t {
        wrapped + tau_t
    }
    else {
        wrapped
    }
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
///
/// This function is taken from the std library as num is missing it.
///
/// In particular, the return value `r` satisfies `0.0 <= r < rhs.abs()` in
/// most cases. However, due to a floating point round-off error it can
/// result in `r == rhs.abs()`.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float
{
    let r = lhs % rhs;
    if r < T::zero() { r + rhs.abs() } else { r }
}

/// Ratio of the length of a circular arc to the length of its chord, given
/// the change in tangent direction along the arc.
///
/// Equal to 1 for a straight line (zero heading change) and `pi/2` for a
/// half circle.
pub fn arc_chord_ratio<T>(heading_change: T) -> T
where
    T: Float
{
    let half = heading_change.abs() / T::from(2.0).unwrap();

    // Series expansion of x/sin(x) around zero avoids 0/0
    if half < T::from(1e-4).unwrap() {
        T::one() + half * half / T::from(6.0).unwrap()
    }
    else {
        half / half.sin()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const TAU: f64 = std::f64::consts::TAU;
    const PI: f64 = std::f64::consts::PI;

    #[test]
    fn test_wrap_pi() {
        assert!((wrap_pi(0.5f64) - 0.5).abs() < 1e-12);
        assert!((wrap_pi(PI) - PI).abs() < 1e-12);
        assert!((wrap_pi(-PI) - PI).abs() < 1e-12);
        assert!((wrap_pi(3.0 * PI / 2.0) + PI / 2.0).abs() < 1e-12);
        assert!((wrap_pi(-5.0 * PI / 2.0) + PI / 2.0).abs() < 1e-12);
        assert!((wrap_pi(4.0 * TAU + 0.1) - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_arc_chord_ratio() {
        assert_eq!(arc_chord_ratio(0f64), 1.0);
        assert!((arc_chord_ratio(PI) - PI / 2.0).abs() < 1e-12);
        assert!((arc_chord_ratio(-PI) - PI / 2.0).abs() < 1e-12);

        // Quarter circle of radius 1: arc pi/2, chord sqrt(2)
        let ratio = arc_chord_ratio(PI / 2.0);
        assert!((ratio - (PI / 2.0) / 2f64.sqrt()).abs() < 1e-12);

        // Continuity across the series switch-over
        assert!((arc_chord_ratio(2.0e-4f64) - arc_chord_ratio(2.0001e-4f64)).abs() < 1e-9);
    }

    #[test]
    fn test_lin_map() {
        assert_eq!(lin_map((0.0, 10.0), (5.0, 25.0), 5.0), 15.0);
    }
}
