//! # Constraint assembler
//!
//! Augments each waypoint with a target attitude, linear and angular velocity and acceleration,
//! and a time of arrival. Arrival times are derived from the arc length of each segment and the
//! average of the target speeds at either end of it, so they must be strictly increasing; a
//! violation is reported as a [`TimingError`] rather than silently collapsed.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, trace};
use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use util::maths::{arc_chord_ratio, wrap_pi};

use crate::pattern::{PatternParams, SegmentKind, Waypoint};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Attitude shaping parameters.
///
/// During turns the vehicle may bank (roll) into the turn and pitch by an amount proportional to
/// the product of path curvature and horizontal speed. Both gains default to zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttitudeParams {
    #[serde(default)]
    pub turn_roll_gain: f64,

    #[serde(default)]
    pub turn_pitch_gain: f64,
}

/// Everything the assembler needs to know about the survey.
#[derive(Debug, Clone)]
pub struct AssemblyParams {
    pub surge_velocity_ms: f64,
    pub turn_velocity_percentage: f64,
    pub start_time_s: f64,
    pub attitude: AttitudeParams,
}

/// A waypoint with the kinematic targets the trajectory must pass through.
///
/// All vectors are expressed in the global frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub waypoint: Waypoint,

    /// Time of arrival at the waypoint
    pub time_s: f64,

    /// Target speed along the path
    pub speed_ms: f64,

    pub attitude_q: UnitQuaternion<f64>,

    pub lin_vel_ms: Vector3<f64>,

    pub ang_vel_rads: Vector3<f64>,

    pub lin_acc_mss: Vector3<f64>,

    pub ang_acc_radss: Vector3<f64>,
}

/// Geometry of the segment joining two consecutive waypoints.
#[derive(Debug, Clone, Copy)]
struct Segment {
    horiz_m: f64,
    dz_m: f64,
    length_m: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TimingError {
    #[error("Speed parameter {name} must be positive and finite, found {value}")]
    InvalidSpeed { name: &'static str, value: f64 },

    #[error("Start time must be finite, found {0}")]
    InvalidStartTime(f64),

    #[error(
        "Arrival time at waypoint {index} ({time_s} s) is not after the arrival time at the \
        previous waypoint ({prev_time_s} s)"
    )]
    NonIncreasingTime {
        index: usize,
        prev_time_s: f64,
        time_s: f64,
    },

    #[error("Arrival time at waypoint {index} is not finite")]
    NonFiniteTime { index: usize },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl AssemblyParams {
    pub fn new(pattern: &PatternParams, attitude: &AttitudeParams) -> Self {
        Self {
            surge_velocity_ms: pattern.surge_velocity_ms,
            turn_velocity_percentage: pattern.turn_velocity_percentage,
            start_time_s: pattern.start_time_s,
            attitude: attitude.clone(),
        }
    }

    fn validate(&self) -> Result<(), TimingError> {
        if !self.surge_velocity_ms.is_finite() || self.surge_velocity_ms <= 0.0 {
            return Err(TimingError::InvalidSpeed {
                name: "surge_velocity_ms",
                value: self.surge_velocity_ms,
            });
        }

        if !self.turn_velocity_percentage.is_finite()
            || self.turn_velocity_percentage <= 0.0
            || self.turn_velocity_percentage > 1.0
        {
            return Err(TimingError::InvalidSpeed {
                name: "turn_velocity_percentage",
                value: self.turn_velocity_percentage,
            });
        }

        if !self.start_time_s.is_finite() {
            return Err(TimingError::InvalidStartTime(self.start_time_s));
        }

        Ok(())
    }

    /// Target speed at a waypoint of the given kind.
    pub fn target_speed(&self, kind: SegmentKind) -> f64 {
        match kind {
            SegmentKind::Straight => self.surge_velocity_ms,
            SegmentKind::Turn => self.surge_velocity_ms * self.turn_velocity_percentage,
        }
    }
}

impl Constraint {
    pub fn position_m(&self) -> Vector3<f64> {
        self.waypoint.position_m
    }
}

impl Segment {
    fn between(from: &Waypoint, to: &Waypoint) -> Self {
        let chord_m = (to.position2() - from.position2()).norm();

        // Chord to arc length, exact for circular arcs. A run between two straight waypoints is a
        // line whatever their headings.
        let horiz_m = if from.kind == SegmentKind::Straight && to.kind == SegmentKind::Straight {
            chord_m
        }
        else {
            chord_m * arc_chord_ratio(wrap_pi(to.heading_rad - from.heading_rad))
        };
        let dz_m = to.position_m.z - from.position_m.z;

        Self {
            horiz_m,
            dz_m,
            length_m: (horiz_m * horiz_m + dz_m * dz_m).sqrt(),
        }
    }

    /// Fractions of the segment's length in the horizontal and vertical directions.
    fn fractions(&self) -> (f64, f64) {
        if self.length_m > 0.0 {
            (self.horiz_m / self.length_m, self.dz_m / self.length_m)
        }
        else {
            (1.0, 0.0)
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Assemble the constraint sequence for the given waypoints.
///
/// The waypoints must already have their depth populated.
pub fn assemble(
    waypoints: &[Waypoint],
    params: &AssemblyParams,
) -> Result<Vec<Constraint>, TimingError> {
    params.validate()?;

    let n = waypoints.len();
    if n == 0 {
        return Ok(Vec::new());
    }

    let speeds: Vec<f64> = waypoints
        .iter()
        .map(|w| params.target_speed(w.kind))
        .collect();

    let segments: Vec<Segment> = waypoints
        .windows(2)
        .map(|pair| Segment::between(&pair[0], &pair[1]))
        .collect();

    let times = arrival_times(&segments, &speeds, params.start_time_s)?;

    let mut constraints = Vec::with_capacity(n);

    for (i, wp) in waypoints.iter().enumerate() {
        let prev = i.saturating_sub(1);
        let next = (i + 1).min(n - 1);

        // Split the speed between horizontal and vertical using the neighbouring segments
        let adjacent: Vec<(f64, f64)> = segments[prev..next]
            .iter()
            .map(Segment::fractions)
            .collect();
        let (horiz_frac, vert_frac) = if adjacent.is_empty() {
            (1.0, 0.0)
        }
        else {
            let k = adjacent.len() as f64;
            (
                adjacent.iter().map(|f| f.0).sum::<f64>() / k,
                adjacent.iter().map(|f| f.1).sum::<f64>() / k,
            )
        };

        let speed = speeds[i];
        let speed_rate = if next > prev {
            (speeds[next] - speeds[prev]) / (times[next] - times[prev])
        }
        else {
            0.0
        };

        let tangent = Vector3::new(wp.heading_rad.cos(), wp.heading_rad.sin(), 0.0);
        let normal = Vector3::new(-wp.heading_rad.sin(), wp.heading_rad.cos(), 0.0);

        let horiz_speed = speed * horiz_frac;
        let horiz_speed_rate = speed_rate * horiz_frac;

        let lin_vel_ms = horiz_speed * tangent + speed * vert_frac * Vector3::z();
        let lin_acc_mss = horiz_speed_rate * tangent
            + speed_rate * vert_frac * Vector3::z()
            + horiz_speed * horiz_speed * wp.curvature_m * normal;

        let yaw_rate = horiz_speed * wp.curvature_m;
        let ang_vel_rads = Vector3::new(0.0, 0.0, yaw_rate);
        let ang_acc_radss = Vector3::new(0.0, 0.0, horiz_speed_rate * wp.curvature_m);

        // Bank into the turn, a left turn (positive curvature) rolls the vehicle negatively
        let roll = -params.attitude.turn_roll_gain * yaw_rate;
        let pitch = params.attitude.turn_pitch_gain * yaw_rate;
        let attitude_q = UnitQuaternion::from_euler_angles(roll, pitch, wp.heading_rad);

        trace!(
            "Constraint {}: t = {:.3} s, speed = {:.3} m/s, yaw rate = {:.4} rad/s",
            i,
            times[i],
            speed,
            yaw_rate
        );

        constraints.push(Constraint {
            waypoint: *wp,
            time_s: times[i],
            speed_ms: speed,
            attitude_q,
            lin_vel_ms,
            ang_vel_rads,
            lin_acc_mss,
            ang_acc_radss,
        });
    }

    debug!(
        "Assembled {} constraints spanning {:.3} s to {:.3} s",
        constraints.len(),
        times[0],
        times[n - 1]
    );

    Ok(constraints)
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Arrival time at each waypoint from segment lengths and average segment speeds.
fn arrival_times(
    segments: &[Segment],
    speeds: &[f64],
    start_time_s: f64,
) -> Result<Vec<f64>, TimingError> {
    let mut times = Vec::with_capacity(speeds.len());
    times.push(start_time_s);

    for (i, seg) in segments.iter().enumerate() {
        let avg_speed = 0.5 * (speeds[i] + speeds[i + 1]);
        let prev_time_s = times[i];
        let time_s = prev_time_s + seg.length_m / avg_speed;

        if !time_s.is_finite() {
            return Err(TimingError::NonFiniteTime { index: i + 1 });
        }
        if time_s <= prev_time_s {
            return Err(TimingError::NonIncreasingTime {
                index: i + 1,
                prev_time_s,
                time_s,
            });
        }

        times.push(time_s);
    }

    Ok(times)
}
