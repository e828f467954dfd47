//! # Rotation helpers
//!
//! Exponential and logarithm maps of SO(3) on unit quaternions, together with the right Jacobian
//! used to move rates between the rotation-vector tangent space and the body frame.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::{Matrix3, Quaternion, UnitQuaternion, Vector3};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Below this angle the Jacobian coefficients are evaluated from their series expansions.
const SMALL_ANGLE_RAD: f64 = 1e-4;

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Skew symmetric matrix such that `hat(a) * b == a.cross(&b)`.
pub fn hat(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(0.0, -v.z, v.y, v.z, 0.0, -v.x, -v.y, v.x, 0.0)
}

/// Rotation for the given rotation vector.
pub fn exp(phi: &Vector3<f64>) -> UnitQuaternion<f64> {
    UnitQuaternion::from_scaled_axis(*phi)
}

/// Rotation vector of the shortest rotation equivalent to `q`, with angle in [0, pi].
pub fn log_shortest(q: &UnitQuaternion<f64>) -> Vector3<f64> {
    // q and -q are the same rotation, pick the hemisphere with w >= 0
    let q: Quaternion<f64> = if q.w < 0.0 {
        -q.into_inner()
    }
    else {
        q.into_inner()
    };

    let v = q.imag();
    let sin_half = v.norm();

    if sin_half < f64::EPSILON {
        // theta / sin(theta / 2) -> 2 as theta -> 0
        v * (2.0 / q.w)
    }
    else {
        let angle = 2.0 * sin_half.atan2(q.w);
        v * (angle / sin_half)
    }
}

/// Right Jacobian of SO(3), `J_r = I - a hat(phi) + b hat(phi)^2`.
pub fn right_jacobian(phi: &Vector3<f64>) -> Matrix3<f64> {
    let (a, b) = jacobian_coeffs(phi.norm());
    let p = hat(phi);

    Matrix3::identity() - a * p + b * p * p
}

/// Inverse of the right Jacobian, `J_r^-1 = I + hat(phi) / 2 + c hat(phi)^2`.
///
/// Singular at angles of `2 pi`, callers are expected to stay well below a half turn.
pub fn right_jacobian_inv(phi: &Vector3<f64>) -> Matrix3<f64> {
    let theta = phi.norm();
    let p = hat(phi);

    let c = if theta < SMALL_ANGLE_RAD {
        1.0 / 12.0 + theta * theta / 720.0
    }
    else {
        1.0 / (theta * theta) - (1.0 + theta.cos()) / (2.0 * theta * theta.sin())
    };

    Matrix3::identity() + 0.5 * p + c * p * p
}

/// Body frame angular velocity and acceleration for a rotation `q0 * Exp(phi)` given the
/// rotation vector and its first two time derivatives.
pub fn body_rates(
    phi: &Vector3<f64>,
    phi_dot: &Vector3<f64>,
    phi_ddot: &Vector3<f64>,
) -> (Vector3<f64>, Vector3<f64>) {
    let omega = right_jacobian(phi) * phi_dot;
    let alpha = right_jacobian(phi) * phi_ddot + jacobian_rate_term(phi, phi_dot);

    (omega, alpha)
}

/// Rotation vector derivatives for the given body frame rates at rotation vector `phi`.
///
/// This is the inverse of [`body_rates`].
pub fn tangent_rates(
    phi: &Vector3<f64>,
    omega_body: &Vector3<f64>,
    alpha_body: &Vector3<f64>,
) -> (Vector3<f64>, Vector3<f64>) {
    let jr_inv = right_jacobian_inv(phi);
    let phi_dot = jr_inv * omega_body;
    let phi_ddot = jr_inv * (alpha_body - jacobian_rate_term(phi, &phi_dot));

    (phi_dot, phi_ddot)
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Coefficients `a = (1 - cos t) / t^2` and `b = (t - sin t) / t^3` of the right Jacobian.
fn jacobian_coeffs(theta: f64) -> (f64, f64) {
    let t2 = theta * theta;

    if theta < SMALL_ANGLE_RAD {
        (0.5 - t2 / 24.0, 1.0 / 6.0 - t2 / 120.0)
    }
    else {
        ((1.0 - theta.cos()) / t2, (theta - theta.sin()) / (t2 * theta))
    }
}

/// Derivatives of the Jacobian coefficients with respect to the angle.
fn jacobian_coeffs_deriv(theta: f64) -> (f64, f64) {
    if theta < SMALL_ANGLE_RAD {
        (-theta / 12.0, -theta / 60.0)
    }
    else {
        let (s, c) = theta.sin_cos();
        let t3 = theta * theta * theta;

        (
            (theta * s - 2.0 * (1.0 - c)) / t3,
            (1.0 - c) / t3 - 3.0 * (theta - s) / (t3 * theta),
        )
    }
}

/// `(d/dt J_r(phi)) * phi_dot`.
fn jacobian_rate_term(phi: &Vector3<f64>, phi_dot: &Vector3<f64>) -> Vector3<f64> {
    let theta = phi.norm();
    let (_, b) = jacobian_coeffs(theta);
    let (a_d, b_d) = jacobian_coeffs_deriv(theta);

    // d(theta)/dt, zero at the origin where the angle is not differentiable
    let theta_dot = if theta > 0.0 {
        phi.dot(phi_dot) / theta
    }
    else {
        0.0
    };

    let cross = phi.cross(phi_dot);

    -a_d * theta_dot * cross + b_d * theta_dot * phi.cross(&cross) + b * phi_dot.cross(&cross)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_log_exp() {
        let phi = Vector3::new(0.3, -1.2, 0.7);
        let back = log_shortest(&exp(&phi));
        assert!((back - phi).norm() < 1e-12);

        // Small angles
        let phi = Vector3::new(1e-7, 0.0, -2e-7);
        assert!((log_shortest(&exp(&phi)) - phi).norm() < 1e-15);

        // Negated quaternion gives the same rotation vector
        let q = exp(&Vector3::new(0.0, 0.0, 0.4));
        let neg = UnitQuaternion::new_unchecked(-q.into_inner());
        assert!((log_shortest(&neg) - Vector3::new(0.0, 0.0, 0.4)).norm() < 1e-12);
    }

    #[test]
    fn test_shortest_arc() {
        // Yaw from 170 to -170 degrees is a 20 degree positive rotation
        let q0 = UnitQuaternion::from_euler_angles(0.0, 0.0, 170f64.to_radians());
        let q1 = UnitQuaternion::from_euler_angles(0.0, 0.0, -170f64.to_radians());
        let delta = log_shortest(&(q0.inverse() * q1));

        assert!((delta - Vector3::new(0.0, 0.0, 20f64.to_radians())).norm() < 1e-12);
    }

    #[test]
    fn test_jacobian_inverse() {
        for phi in [
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1e-6, 2e-6, 0.0),
            Vector3::new(0.4, -0.2, 1.1),
            Vector3::new(0.0, 0.0, PI - 0.1),
        ]
        .iter()
        {
            let prod = right_jacobian(phi) * right_jacobian_inv(phi);
            assert!((prod - Matrix3::identity()).norm() < 1e-9, "phi = {:?}", phi);
        }
    }

    #[test]
    fn test_body_rate_matches_finite_difference() {
        // phi(t) = p0 + p1 t + p2 t^2
        let p0 = Vector3::new(0.2, -0.4, 0.9);
        let p1 = Vector3::new(0.3, 0.1, -0.2);
        let p2 = Vector3::new(-0.1, 0.25, 0.05);
        let phi = |t: f64| p0 + p1 * t + p2 * t * t;
        let phi_dot = |t: f64| p1 + 2.0 * t * p2;

        let t = 0.7;
        let dt = 1e-5;

        // Body rate from the relative rotation over a small step
        let omega_at = |t: f64| {
            let rel = exp(&phi(t - dt)).inverse() * exp(&phi(t + dt));
            log_shortest(&rel) / (2.0 * dt)
        };

        let (omega, alpha) = body_rates(&phi(t), &phi_dot(t), &(2.0 * p2));
        assert!((omega - omega_at(t)).norm() < 1e-6);

        let (omega_a, _) = body_rates(&phi(t - dt), &phi_dot(t - dt), &(2.0 * p2));
        let (omega_b, _) = body_rates(&phi(t + dt), &phi_dot(t + dt), &(2.0 * p2));
        let alpha_fd = (omega_b - omega_a) / (2.0 * dt);
        assert!((alpha - alpha_fd).norm() < 1e-5);

        // And back again
        let (pd, pdd) = tangent_rates(&phi(t), &omega, &alpha);
        assert!((pd - phi_dot(t)).norm() < 1e-9);
        assert!((pdd - 2.0 * p2).norm() < 1e-9);
    }
}
