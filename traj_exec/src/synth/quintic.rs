//! # Quintic polynomials
//!
//! Fifth order polynomials matching position, velocity and acceleration at both ends of an
//! interval, the building block of every trajectory piece.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Vector3;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Value, first and second derivative of a scalar or vector at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Boundary<T> {
    pub pos: T,
    pub vel: T,
    pub acc: T,
}

/// A scalar quintic `c0 + c1 t + ... + c5 t^5` with `t` measured from the start of the interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quintic {
    coeffs: [f64; 6],
}

/// Three independent quintics, one per axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quintic3 {
    axes: [Quintic; 3],
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Quintic {
    /// Fit the unique quintic meeting both boundaries over an interval of length `duration_s`.
    ///
    /// `duration_s` must be strictly positive, otherwise the coefficients are not finite.
    pub fn fit(start: Boundary<f64>, end: Boundary<f64>, duration_s: f64) -> Self {
        let t = duration_s;
        let t2 = t * t;
        let t3 = t2 * t;
        let h = end.pos - start.pos;

        let (v0, v1) = (start.vel, end.vel);
        let (a0, a1) = (start.acc, end.acc);

        let c3 = (20.0 * h - (8.0 * v1 + 12.0 * v0) * t - (3.0 * a0 - a1) * t2) / (2.0 * t3);
        let c4 = (-30.0 * h + (14.0 * v1 + 16.0 * v0) * t + (3.0 * a0 - 2.0 * a1) * t2)
            / (2.0 * t3 * t);
        let c5 = (12.0 * h - 6.0 * (v1 + v0) * t + (a1 - a0) * t2) / (2.0 * t3 * t2);

        Self {
            coeffs: [start.pos, v0, 0.5 * a0, c3, c4, c5],
        }
    }

    /// Value, velocity and acceleration at `t` seconds after the start of the interval.
    pub fn eval(&self, t: f64) -> Boundary<f64> {
        let c = &self.coeffs;

        // Horner's scheme for each derivative
        let pos = c[0] + t * (c[1] + t * (c[2] + t * (c[3] + t * (c[4] + t * c[5]))));
        let vel = c[1] + t * (2.0 * c[2] + t * (3.0 * c[3] + t * (4.0 * c[4] + t * 5.0 * c[5])));
        let acc = 2.0 * c[2] + t * (6.0 * c[3] + t * (12.0 * c[4] + t * 20.0 * c[5]));

        Boundary { pos, vel, acc }
    }

    pub fn is_finite(&self) -> bool {
        self.coeffs.iter().all(|c| c.is_finite())
    }
}

impl Quintic3 {
    pub fn fit(start: Boundary<Vector3<f64>>, end: Boundary<Vector3<f64>>, duration_s: f64) -> Self {
        let axis = |i: usize| {
            Quintic::fit(
                Boundary {
                    pos: start.pos[i],
                    vel: start.vel[i],
                    acc: start.acc[i],
                },
                Boundary {
                    pos: end.pos[i],
                    vel: end.vel[i],
                    acc: end.acc[i],
                },
                duration_s,
            )
        };

        Self {
            axes: [axis(0), axis(1), axis(2)],
        }
    }

    pub fn eval(&self, t: f64) -> Boundary<Vector3<f64>> {
        let [x, y, z] = [self.axes[0].eval(t), self.axes[1].eval(t), self.axes[2].eval(t)];

        Boundary {
            pos: Vector3::new(x.pos, y.pos, z.pos),
            vel: Vector3::new(x.vel, y.vel, z.vel),
            acc: Vector3::new(x.acc, y.acc, z.acc),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.axes.iter().all(Quintic::is_finite)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_boundaries_matched() {
        let start = Boundary {
            pos: 1.0,
            vel: -0.5,
            acc: 0.2,
        };
        let end = Boundary {
            pos: 4.0,
            vel: 2.0,
            acc: -1.0,
        };
        let q = Quintic::fit(start, end, 3.0);

        let s = q.eval(0.0);
        let e = q.eval(3.0);

        assert!((s.pos - 1.0).abs() < 1e-12);
        assert!((s.vel + 0.5).abs() < 1e-12);
        assert!((s.acc - 0.2).abs() < 1e-12);
        assert!((e.pos - 4.0).abs() < 1e-9);
        assert!((e.vel - 2.0).abs() < 1e-9);
        assert!((e.acc + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_constant_velocity_is_linear() {
        let start = Boundary {
            pos: 0.0,
            vel: 2.0,
            acc: 0.0,
        };
        let end = Boundary {
            pos: 10.0,
            vel: 2.0,
            acc: 0.0,
        };
        let q = Quintic::fit(start, end, 5.0);

        for i in 0..=10 {
            let t = i as f64 * 0.5;
            let b = q.eval(t);
            assert!((b.pos - 2.0 * t).abs() < 1e-9);
            assert!(b.acc.abs() < 1e-9);
        }
    }

    #[test]
    fn test_zero_duration_not_finite() {
        let b = Boundary {
            pos: 0.0,
            vel: 1.0,
            acc: 0.0,
        };
        assert!(!Quintic::fit(b, b, 0.0).is_finite());
    }
}
