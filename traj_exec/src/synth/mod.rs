//! # Trajectory synthesiser
//!
//! Fits a continuous trajectory through an ordered sequence of [`Constraint`]s. Each interval
//! between consecutive constraints is a [`Piece`]:
//!
//! - position is a quintic per axis matching position, velocity and acceleration at both ends, so
//!   the trajectory is twice continuously differentiable at interior constraints.
//! - orientation is `q_i * Exp(phi(t))`, where `phi` is a quintic per component in the tangent
//!   space of `q_i`, running from zero to the shortest-arc rotation vector between `q_i` and
//!   `q_{i+1}`. Angular rates are mapped to and from the tangent space with the right Jacobian.
//!
//! The synthesiser validates its input before fitting anything and reports the index of the
//! offending constraint or piece on failure.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod quintic;
pub mod rotation;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::f64::consts::PI;

use comms_if::traj::SetPoint;
use log::{debug, trace};
use nalgebra::{UnitQuaternion, Vector3};

use crate::constraint::Constraint;
use quintic::{Boundary, Quintic3};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Pieces shorter than this cannot be fitted reliably.
pub const MIN_PIECE_DURATION_S: f64 = 1e-6;

/// Margin below a half turn beyond which the relative rotation of a piece is ambiguous.
pub const HALF_TURN_MARGIN_RAD: f64 = 1e-6;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// One fitted interval of the trajectory.
#[derive(Debug, Clone)]
pub struct Piece {
    start_s: f64,
    end_s: f64,
    position: Quintic3,
    base_q: UnitQuaternion<f64>,
    rotation: Quintic3,
}

/// A continuous trajectory defined over `[start_time_s, end_time_s]`.
#[derive(Debug, Clone)]
pub struct Trajectory {
    pieces: Vec<Piece>,
    start_time_s: f64,
    end_time_s: f64,
}

/// The full kinematic state of the trajectory at one instant, in the global frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajState {
    pub time_s: f64,
    pub position_m: Vector3<f64>,
    pub attitude_q: UnitQuaternion<f64>,
    pub lin_vel_ms: Vector3<f64>,
    pub ang_vel_rads: Vector3<f64>,
    pub lin_acc_mss: Vector3<f64>,
    pub ang_acc_radss: Vector3<f64>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Malformed input to the synthesiser.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConstraintError {
    #[error("At least 2 constraints are required, found {count}")]
    TooFew { count: usize },

    #[error(
        "Constraint {index} time ({time_s} s) is not after the previous constraint's time \
        ({prev_time_s} s)"
    )]
    NonIncreasingTime {
        index: usize,
        prev_time_s: f64,
        time_s: f64,
    },

    #[error("Constraint {index} contains a non-finite value")]
    NonFinite { index: usize },
}

/// Numerical failure while fitting a piece.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum FitError {
    #[error("Piece {index} is too short to fit ({duration_s} s)")]
    DegenerateSegment { index: usize, duration_s: f64 },

    #[error(
        "Piece {index} rotates by {angle_rad} rad, too close to a half turn for a unique \
        shortest rotation"
    )]
    OrientationSingular { index: usize, angle_rad: f64 },

    #[error("Piece {index} has non-finite coefficients")]
    NonFinite { index: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum SynthError {
    #[error("Invalid constraints: {0}")]
    Constraint(#[from] ConstraintError),

    #[error("Could not fit trajectory: {0}")]
    Fit(#[from] FitError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Piece {
    fn fit(index: usize, from: &Constraint, to: &Constraint) -> Result<Self, FitError> {
        let duration_s = to.time_s - from.time_s;
        if duration_s < MIN_PIECE_DURATION_S {
            return Err(FitError::DegenerateSegment { index, duration_s });
        }

        let position = Quintic3::fit(
            Boundary {
                pos: from.waypoint.position_m,
                vel: from.lin_vel_ms,
                acc: from.lin_acc_mss,
            },
            Boundary {
                pos: to.waypoint.position_m,
                vel: to.lin_vel_ms,
                acc: to.lin_acc_mss,
            },
            duration_s,
        );

        let q0 = from.attitude_q;
        let q1 = to.attitude_q;

        let delta = rotation::log_shortest(&(q0.inverse() * q1));
        let angle_rad = delta.norm();
        if angle_rad >= PI - HALF_TURN_MARGIN_RAD {
            return Err(FitError::OrientationSingular { index, angle_rad });
        }

        // Rates are constrained in the world frame but fitted in the body frame
        let (phi_dot_0, phi_ddot_0) = rotation::tangent_rates(
            &Vector3::zeros(),
            &(q0.inverse() * from.ang_vel_rads),
            &(q0.inverse() * from.ang_acc_radss),
        );
        let (phi_dot_1, phi_ddot_1) = rotation::tangent_rates(
            &delta,
            &(q1.inverse() * to.ang_vel_rads),
            &(q1.inverse() * to.ang_acc_radss),
        );

        let rotation = Quintic3::fit(
            Boundary {
                pos: Vector3::zeros(),
                vel: phi_dot_0,
                acc: phi_ddot_0,
            },
            Boundary {
                pos: delta,
                vel: phi_dot_1,
                acc: phi_ddot_1,
            },
            duration_s,
        );

        if !position.is_finite() || !rotation.is_finite() {
            return Err(FitError::NonFinite { index });
        }

        trace!(
            "Piece {}: {:.3} s to {:.3} s, rotation {:.4} rad",
            index,
            from.time_s,
            to.time_s,
            angle_rad
        );

        Ok(Self {
            start_s: from.time_s,
            end_s: to.time_s,
            position,
            base_q: q0,
            rotation,
        })
    }

    fn state_at(&self, time_s: f64) -> TrajState {
        let t = (time_s - self.start_s).max(0.0).min(self.end_s - self.start_s);

        let pos = self.position.eval(t);
        let rot = self.rotation.eval(t);

        let attitude_q = self.base_q * rotation::exp(&rot.pos);
        let (omega_body, alpha_body) = rotation::body_rates(&rot.pos, &rot.vel, &rot.acc);

        TrajState {
            time_s,
            position_m: pos.pos,
            attitude_q,
            lin_vel_ms: pos.vel,
            ang_vel_rads: attitude_q * omega_body,
            lin_acc_mss: pos.acc,
            ang_acc_radss: attitude_q * alpha_body,
        }
    }
}

impl Trajectory {
    pub fn start_time_s(&self) -> f64 {
        self.start_time_s
    }

    pub fn end_time_s(&self) -> f64 {
        self.end_time_s
    }

    pub fn duration_s(&self) -> f64 {
        self.end_time_s - self.start_time_s
    }

    pub fn num_pieces(&self) -> usize {
        self.pieces.len()
    }

    /// Evaluate the trajectory at the given time.
    ///
    /// Times outside the trajectory are clamped to its ends.
    pub fn state_at(&self, time_s: f64) -> TrajState {
        let t = time_s.max(self.start_time_s).min(self.end_time_s);

        let index = self
            .pieces
            .partition_point(|p| p.end_s < t)
            .min(self.pieces.len() - 1);

        let mut state = self.pieces[index].state_at(t);
        state.time_s = t;
        state
    }
}

impl TrajState {
    /// Flatten into an exchange table row.
    pub fn to_set_point(&self) -> SetPoint {
        let q = self.attitude_q.quaternion();

        SetPoint {
            time_s: self.time_s,
            x_m: self.position_m.x,
            y_m: self.position_m.y,
            z_m: self.position_m.z,
            qw: q.w,
            qx: q.i,
            qy: q.j,
            qz: q.k,
            vx_ms: self.lin_vel_ms.x,
            vy_ms: self.lin_vel_ms.y,
            vz_ms: self.lin_vel_ms.z,
            wx_rads: self.ang_vel_rads.x,
            wy_rads: self.ang_vel_rads.y,
            wz_rads: self.ang_vel_rads.z,
            ax_mss: self.lin_acc_mss.x,
            ay_mss: self.lin_acc_mss.y,
            az_mss: self.lin_acc_mss.z,
            alpha_x_radss: self.ang_acc_radss.x,
            alpha_y_radss: self.ang_acc_radss.y,
            alpha_z_radss: self.ang_acc_radss.z,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Fit a trajectory through the given constraints.
pub fn synthesize(constraints: &[Constraint]) -> Result<Trajectory, SynthError> {
    validate(constraints)?;

    let pieces = constraints
        .windows(2)
        .enumerate()
        .map(|(i, pair)| Piece::fit(i, &pair[0], &pair[1]))
        .collect::<Result<Vec<_>, _>>()?;

    let start_time_s = constraints[0].time_s;
    let end_time_s = constraints[constraints.len() - 1].time_s;

    debug!(
        "Synthesised trajectory of {} pieces from {:.3} s to {:.3} s",
        pieces.len(),
        start_time_s,
        end_time_s
    );

    Ok(Trajectory {
        pieces,
        start_time_s,
        end_time_s,
    })
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn validate(constraints: &[Constraint]) -> Result<(), ConstraintError> {
    if constraints.len() < 2 {
        return Err(ConstraintError::TooFew {
            count: constraints.len(),
        });
    }

    for (index, c) in constraints.iter().enumerate() {
        let finite = c.time_s.is_finite()
            && c.waypoint.position_m.iter().all(|v| v.is_finite())
            && c.attitude_q.coords.iter().all(|v| v.is_finite())
            && c.lin_vel_ms.iter().all(|v| v.is_finite())
            && c.ang_vel_rads.iter().all(|v| v.is_finite())
            && c.lin_acc_mss.iter().all(|v| v.is_finite())
            && c.ang_acc_radss.iter().all(|v| v.is_finite());

        if !finite {
            return Err(ConstraintError::NonFinite { index });
        }
    }

    for (i, pair) in constraints.windows(2).enumerate() {
        if pair[1].time_s <= pair[0].time_s {
            return Err(ConstraintError::NonIncreasingTime {
                index: i + 1,
                prev_time_s: pair[0].time_s,
                time_s: pair[1].time_s,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::constraint::{
        assemble, test::scenario_a_constraints, AssemblyParams, AttitudeParams,
    };
    use crate::depth::{inject, DepthProfile};
    use crate::pattern::{
        build_pattern, test::scenario_a, Handedness, PathType, PatternParams, SegmentKind,
        TurnDirection, Waypoint,
    };
    use util::maths::wrap_pi;

    /// A constraint moving along x with the given yaw and yaw rate.
    fn cons(time_s: f64, x_m: f64, yaw_rad: f64, yaw_rate: f64) -> Constraint {
        Constraint {
            waypoint: Waypoint {
                position_m: Vector3::new(x_m, 0.0, 0.0),
                heading_rad: 0.0,
                kind: SegmentKind::Straight,
                handedness: Handedness::None,
                curvature_m: 0.0,
            },
            time_s,
            speed_ms: 1.0,
            attitude_q: UnitQuaternion::from_euler_angles(0.0, 0.0, yaw_rad),
            lin_vel_ms: Vector3::new(1.0, 0.0, 0.0),
            ang_vel_rads: Vector3::new(0.0, 0.0, yaw_rate),
            lin_acc_mss: Vector3::zeros(),
            ang_acc_radss: Vector3::zeros(),
        }
    }

    /// Constraint sequences covering both topologies, turning either way, rotated starts, depth
    /// changes, banking and an end point transit.
    fn survey_constraints() -> Vec<(&'static str, Vec<Constraint>)> {
        let build = |pattern: PatternParams, depth: DepthProfile, attitude: AttitudeParams| {
            let wps = build_pattern(&pattern).unwrap();
            let wps = inject(&depth, &wps).unwrap();
            assemble(&wps, &AssemblyParams::new(&pattern, &attitude)).unwrap()
        };
        let level = DepthProfile::Constant { depth_m: 5.0 };
        let ramp = DepthProfile::Ramp {
            start_depth_m: 5.0,
            end_depth_m: 30.0,
        };
        let banked = AttitudeParams {
            turn_roll_gain: 1.5,
            turn_pitch_gain: 0.5,
        };

        vec![
            ("out-n-back", scenario_a_constraints(&scenario_a())),
            (
                "side-to-side rotated",
                build(
                    PatternParams {
                        path_type: PathType::SideToSide,
                        turn_direction: TurnDirection::Right,
                        start_point_m: [12.0, -7.0],
                        start_angle_rad: 2.3,
                        ..scenario_a()
                    },
                    level.clone(),
                    AttitudeParams::default(),
                ),
            ),
            (
                "ramp",
                build(scenario_a(), ramp.clone(), AttitudeParams::default()),
            ),
            ("banked", build(scenario_a(), level.clone(), banked.clone())),
            (
                "return to start",
                build(
                    PatternParams {
                        number_of_lines: 3,
                        end_point_m: Some([0.0, 0.0]),
                        ..scenario_a()
                    },
                    ramp.clone(),
                    banked,
                ),
            ),
            (
                "large survey",
                build(
                    PatternParams {
                        surge_velocity_ms: 1.5,
                        turn_radius_m: 10.0,
                        line_distance_m: 200.0,
                        number_of_lines: 20,
                        turn_velocity_percentage: 0.4,
                        start_angle_rad: 0.3,
                        path_type: PathType::SideToSide,
                        max_turn_step_rad: std::f64::consts::PI / 24.0,
                        ..scenario_a()
                    },
                    ramp,
                    AttitudeParams {
                        turn_roll_gain: 1.0,
                        turn_pitch_gain: 0.0,
                    },
                ),
            ),
        ]
    }

    #[test]
    fn test_velocity_is_position_derivative() {
        let dt = 1e-4;

        for (name, cons) in survey_constraints() {
            let traj = synthesize(&cons).unwrap();

            let mut t = traj.start_time_s() + 0.05;
            while t < traj.end_time_s() - 0.05 {
                let s = traj.state_at(t);
                let fd = (traj.state_at(t + dt).position_m - traj.state_at(t - dt).position_m)
                    / (2.0 * dt);
                let tol = 1e-3 * s.lin_vel_ms.norm().max(1e-3);
                assert!(
                    (s.lin_vel_ms - fd).norm() <= tol,
                    "{}, t = {}: {} vs {}",
                    name,
                    t,
                    s.lin_vel_ms,
                    fd
                );

                let fd_acc = (traj.state_at(t + dt).lin_vel_ms - traj.state_at(t - dt).lin_vel_ms)
                    / (2.0 * dt);
                assert!(
                    (s.lin_acc_mss - fd_acc).norm() <= 1e-3 * s.lin_acc_mss.norm().max(1e-1),
                    "{}, t = {}",
                    name,
                    t
                );

                t += 0.37;
            }
        }
    }

    #[test]
    fn test_angular_velocity_is_attitude_derivative() {
        let dt = 1e-4;

        for (name, cons) in survey_constraints() {
            let traj = synthesize(&cons).unwrap();

            let mut t = traj.start_time_s() + 0.05;
            while t < traj.end_time_s() - 0.05 {
                let s = traj.state_at(t);
                let q_a = traj.state_at(t - dt).attitude_q;
                let q_b = traj.state_at(t + dt).attitude_q;

                // World frame rate from the relative rotation
                let fd = rotation::log_shortest(&(q_b * q_a.inverse())) / (2.0 * dt);
                let tol = 1e-3 * s.ang_vel_rads.norm().max(1e-3);
                assert!((s.ang_vel_rads - fd).norm() <= tol, "{}, t = {}", name, t);

                let fd_acc = (traj.state_at(t + dt).ang_vel_rads
                    - traj.state_at(t - dt).ang_vel_rads)
                    / (2.0 * dt);
                assert!(
                    (s.ang_acc_radss - fd_acc).norm() <= 1e-3 * s.ang_acc_radss.norm().max(1e-1),
                    "{}, t = {}",
                    name,
                    t
                );

                t += 0.41;
            }
        }
    }

    #[test]
    fn test_constraints_are_met() {
        let cons = scenario_a_constraints(&scenario_a());
        let traj = synthesize(&cons).unwrap();

        assert_eq!(traj.num_pieces(), cons.len() - 1);
        assert_eq!(traj.start_time_s(), cons[0].time_s);
        assert_eq!(traj.end_time_s(), cons[cons.len() - 1].time_s);

        for c in cons.iter() {
            let s = traj.state_at(c.time_s);
            assert!((s.position_m - c.position_m()).norm() < 1e-6);
            assert!((s.lin_vel_ms - c.lin_vel_ms).norm() < 1e-6);
            assert!((s.lin_acc_mss - c.lin_acc_mss).norm() < 1e-6);
            assert!(s.attitude_q.angle_to(&c.attitude_q) < 1e-6);
            assert!((s.ang_vel_rads - c.ang_vel_rads).norm() < 1e-6);
        }
    }

    #[test]
    fn test_continuity_at_interior_constraints() {
        let cons = scenario_a_constraints(&scenario_a());
        let traj = synthesize(&cons).unwrap();
        let eps = 1e-7;

        for c in cons[1..cons.len() - 1].iter() {
            let before = traj.state_at(c.time_s - eps);
            let after = traj.state_at(c.time_s + eps);

            assert!((before.position_m - after.position_m).norm() < 1e-5);
            assert!((before.lin_vel_ms - after.lin_vel_ms).norm() < 1e-5);
            assert!((before.lin_acc_mss - after.lin_acc_mss).norm() < 1e-4);
            assert!(before.attitude_q.angle_to(&after.attitude_q) < 1e-5);
            assert!((before.ang_vel_rads - after.ang_vel_rads).norm() < 1e-5);
        }
    }

    #[test]
    fn test_shortest_arc_yaw() {
        let rate = 20f64.to_radians() / 10.0;
        let cons = [
            cons(0.0, 0.0, 170f64.to_radians(), rate),
            cons(10.0, 10.0, -170f64.to_radians(), rate),
        ];
        let traj = synthesize(&cons).unwrap();

        // Yaw passes through 180 degrees rather than sweeping back through 0
        let (_, _, yaw) = traj.state_at(5.0).attitude_q.euler_angles();
        assert!((wrap_pi(yaw).abs() - PI).abs() < 1e-6, "yaw = {}", yaw);

        for i in 0..=20 {
            let s = traj.state_at(i as f64 * 0.5);
            assert!((s.ang_vel_rads.z - rate).abs() < 1e-9);
        }
    }

    #[test]
    fn test_clamped_outside_range() {
        let cons = [cons(1.0, 0.0, 0.0, 0.0), cons(3.0, 2.0, 0.0, 0.0)];
        let traj = synthesize(&cons).unwrap();

        assert_eq!(traj.state_at(-5.0).position_m, Vector3::zeros());
        assert_eq!(traj.state_at(-5.0).time_s, 1.0);
        assert!((traj.state_at(10.0).position_m.x - 2.0).abs() < 1e-12);
        assert_eq!(traj.duration_s(), 2.0);
    }

    #[test]
    fn test_constraint_errors() {
        let res = synthesize(&[cons(0.0, 0.0, 0.0, 0.0)]);
        assert!(matches!(
            res,
            Err(SynthError::Constraint(ConstraintError::TooFew { count: 1 }))
        ));

        let res = synthesize(&[
            cons(0.0, 0.0, 0.0, 0.0),
            cons(1.0, 1.0, 0.0, 0.0),
            cons(1.0, 2.0, 0.0, 0.0),
        ]);
        assert!(matches!(
            res,
            Err(SynthError::Constraint(ConstraintError::NonIncreasingTime { index: 2, .. }))
        ));

        let mut bad = cons(1.0, 1.0, 0.0, 0.0);
        bad.lin_vel_ms.y = f64::NAN;
        let res = synthesize(&[cons(0.0, 0.0, 0.0, 0.0), bad]);
        assert!(matches!(
            res,
            Err(SynthError::Constraint(ConstraintError::NonFinite { index: 1 }))
        ));
    }

    #[test]
    fn test_fit_errors() {
        let res = synthesize(&[
            cons(0.0, 0.0, 0.0, 0.0),
            cons(1.0, 1.0, 0.0, 0.0),
            cons(1.0 + 1e-9, 1.0, 0.0, 0.0),
        ]);
        assert!(matches!(
            res,
            Err(SynthError::Fit(FitError::DegenerateSegment { index: 1, .. }))
        ));

        let res = synthesize(&[cons(0.0, 0.0, 0.0, 0.0), cons(1.0, 1.0, PI, 0.0)]);
        assert!(matches!(
            res,
            Err(SynthError::Fit(FitError::OrientationSingular { index: 0, .. }))
        ));
    }

    #[test]
    fn test_set_point_layout() {
        let cons = [cons(0.0, 0.0, 0.3, 0.0), cons(2.0, 2.0, 0.3, 0.0)];
        let traj = synthesize(&cons).unwrap();
        let sp = traj.state_at(1.0).to_set_point();

        assert_eq!(sp.time_s, 1.0);
        assert!((sp.x_m - 1.0).abs() < 1e-12);
        assert!((sp.qw - (0.15f64).cos()).abs() < 1e-12);
        assert!((sp.qz - (0.15f64).sin()).abs() < 1e-12);
        assert!((sp.vx_ms - 1.0).abs() < 1e-12);
    }
}
