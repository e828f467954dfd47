//! # Pattern builder
//!
//! Converts [`PatternParams`] into an ordered sequence of [`Waypoint`]s describing the straight legs
//! and turn arcs of a lawnmower survey. Geometry is planned in the horizontal plane only, the depth
//! of each waypoint is left at zero and must be supplied by the [`crate::depth`] module before
//! constraints are assembled.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod params;

pub use params::*;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use log::{debug, trace};
use nalgebra::{Rotation2, Vector2, Vector3};
use serde::{Deserialize, Serialize};
use util::maths::{rem_euclid, wrap_pi};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Transit legs to the end point shorter than this are not added.
const MIN_TRANSIT_LENGTH_M: f64 = 1e-3;

/// Turns are never split into steps larger than this, so consecutive attitudes stay well clear
/// of a half turn apart.
const MAX_STEP_RAD: f64 = FRAC_PI_2;

/// Upper bound on the number of steps in one half-circle turn.
const MAX_STEPS_PER_TURN: usize = 3600;

/// Upper bound on the number of waypoints in one pattern.
const MAX_WAYPOINTS: usize = 1_000_000;

/// Turn sweeps within this of a full circle are treated as no turn at all.
const SWEEP_EPSILON_RAD: f64 = 1e-9;

// ------------------------------------------------------------------------------------------------
// DATA STRUCTURES
// ------------------------------------------------------------------------------------------------

/// A point on the survey path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    /// Position in the global frame. `z` is zero until depth is injected.
    pub position_m: Vector3<f64>,

    /// Path heading at this point, anticlockwise from the global +x axis, in (-pi, pi]
    pub heading_rad: f64,

    /// The type of path segment this point lies on
    pub kind: SegmentKind,

    /// Direction of the turn this point lies on, `None` for straights
    pub handedness: Handedness,

    /// Signed path curvature, positive when turning left
    pub curvature_m: f64,
}

/// The turn joining the last survey leg onto the straight run to the end point.
#[derive(Debug, Clone, Copy)]
struct TransitTurn {
    hand: Handedness,
    centre_m: Vector2<f64>,
    sweep_rad: f64,
    run_m: f64,
}

/// Rigid transform from the pattern's local frame into the global frame.
struct LocalFrame {
    origin_m: Vector2<f64>,
    rotation: Rotation2<f64>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentKind {
    Straight,
    Turn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Handedness {
    Left,
    Right,
    None,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum GeometryError {
    #[error("Pattern parameter {name} is out of range, found {value}")]
    InvalidParameter { name: &'static str, value: f64 },

    #[error("The pattern must contain at least one line")]
    NoLines,

    #[error(
        "Turn radius ({turn_radius_m} m) must be less than half the line distance \
        ({line_distance_m} m) for turns to be completed without overlap"
    )]
    TurnRadiusTooLarge {
        turn_radius_m: f64,
        line_distance_m: f64,
    },

    #[error("Waypoint {index} has a non-finite position")]
    NonFiniteWaypoint { index: usize },

    #[error("No turn of the configured radius reaches the end point {end_point_m:?}")]
    EndPointUnreachable { end_point_m: [f64; 2] },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Waypoint {
    /// Return a copy of this waypoint at the given depth.
    pub fn with_depth(&self, z_m: f64) -> Self {
        let mut wp = *self;
        wp.position_m.z = z_m;
        wp
    }

    /// Horizontal position
    pub fn position2(&self) -> Vector2<f64> {
        self.position_m.xy()
    }
}

impl Handedness {
    /// +1 for left (anticlockwise) turns, -1 for right, 0 otherwise.
    pub fn sign(&self) -> f64 {
        match self {
            Handedness::Left => 1.0,
            Handedness::Right => -1.0,
            Handedness::None => 0.0,
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Handedness::Left => Handedness::Right,
            Handedness::Right => Handedness::Left,
            Handedness::None => Handedness::None,
        }
    }
}

impl From<TurnDirection> for Handedness {
    fn from(dir: TurnDirection) -> Self {
        match dir {
            TurnDirection::Left => Handedness::Left,
            TurnDirection::Right => Handedness::Right,
        }
    }
}

impl PatternParams {
    /// Check that the parameters describe a feasible pattern.
    pub fn validate(&self) -> Result<(), GeometryError> {
        let positive = [
            ("surge_velocity_ms", self.surge_velocity_ms),
            ("turn_radius_m", self.turn_radius_m),
            ("line_distance_m", self.line_distance_m),
            ("turn_velocity_percentage", self.turn_velocity_percentage),
            ("max_turn_step_rad", self.max_turn_step_rad),
        ];
        for &(name, value) in positive.iter() {
            if !value.is_finite() || value <= 0.0 {
                return Err(GeometryError::InvalidParameter { name, value });
            }
        }

        if self.turn_velocity_percentage > 1.0 {
            return Err(GeometryError::InvalidParameter {
                name: "turn_velocity_percentage",
                value: self.turn_velocity_percentage,
            });
        }

        let mut finite = vec![
            ("start_point_m[0]", self.start_point_m[0]),
            ("start_point_m[1]", self.start_point_m[1]),
            ("start_angle_rad", self.start_angle_rad),
            ("start_time_s", self.start_time_s),
        ];
        if let Some(end) = self.end_point_m {
            finite.push(("end_point_m[0]", end[0]));
            finite.push(("end_point_m[1]", end[1]));
        }
        for &(name, value) in finite.iter() {
            if !value.is_finite() {
                return Err(GeometryError::InvalidParameter { name, value });
            }
        }

        if self.number_of_lines < 1 {
            return Err(GeometryError::NoLines);
        }

        if self.turn_radius_m >= self.line_distance_m / 2.0 {
            return Err(GeometryError::TurnRadiusTooLarge {
                turn_radius_m: self.turn_radius_m,
                line_distance_m: self.line_distance_m,
            });
        }

        if (PI / self.step_rad()).ceil() > MAX_STEPS_PER_TURN as f64 {
            return Err(GeometryError::InvalidParameter {
                name: "max_turn_step_rad",
                value: self.max_turn_step_rad,
            });
        }

        match self.max_waypoints() {
            Some(n) if n <= MAX_WAYPOINTS => Ok(()),
            _ => Err(GeometryError::InvalidParameter {
                name: "number_of_lines",
                value: self.number_of_lines as f64,
            }),
        }
    }

    /// Number of equal heading steps each half-circle turn is split into.
    pub fn steps_per_turn(&self) -> usize {
        self.steps_for(PI)
    }

    /// Largest heading change allowed between consecutive turn waypoints.
    fn step_rad(&self) -> f64 {
        self.max_turn_step_rad.min(MAX_STEP_RAD)
    }

    /// Number of equal heading steps a turn through `sweep_rad` is split into, at least 2.
    fn steps_for(&self, sweep_rad: f64) -> usize {
        ((sweep_rad / self.step_rad()).ceil() as usize).max(2)
    }

    /// Largest number of waypoints the pattern can contain: the start point, each leg with the
    /// turn after it, and a transit turn of up to a full circle with its run to the end point.
    fn max_waypoints(&self) -> Option<usize> {
        let steps = self.steps_per_turn();
        self.number_of_lines
            .checked_mul(steps + 1)
            .and_then(|n| n.checked_add(2 * steps + 2))
    }
}

impl TransitTurn {
    fn length_m(&self, turn_radius_m: f64) -> f64 {
        self.sweep_rad * turn_radius_m + self.run_m
    }
}

impl LocalFrame {
    fn new(origin_m: [f64; 2], angle_rad: f64) -> Self {
        Self {
            origin_m: Vector2::new(origin_m[0], origin_m[1]),
            rotation: Rotation2::new(angle_rad),
        }
    }

    fn waypoint(
        &self,
        local_m: Vector2<f64>,
        local_heading_rad: f64,
        kind: SegmentKind,
        handedness: Handedness,
        curvature_m: f64,
    ) -> Waypoint {
        let global = self.origin_m + self.rotation * local_m;

        Waypoint {
            position_m: Vector3::new(global.x, global.y, 0.0),
            heading_rad: wrap_pi(local_heading_rad + self.rotation.angle()),
            kind,
            handedness,
            curvature_m,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Handedness of the `turn_index`th turn (zero-based) of a pattern.
pub fn turn_handedness(
    path_type: PathType,
    turn_direction: TurnDirection,
    turn_index: usize,
) -> Handedness {
    let first = Handedness::from(turn_direction);

    match path_type {
        PathType::OutNBack => first,
        PathType::SideToSide if turn_index % 2 == 0 => first,
        PathType::SideToSide => first.opposite(),
    }
}

/// Build the waypoint sequence for the given pattern.
///
/// The first leg starts at `start_point_m` heading along `start_angle_rad`. Each leg ends with a
/// half-circle turn onto the next leg, except the last one. Turn arcs are split into at least two
/// steps of at most `max_turn_step_rad` (and never more than a quarter turn). Leg end points are
/// `Straight` waypoints, points inside a turn arc are `Turn` waypoints.
///
/// If `end_point_m` is set the last leg is followed by a turn of `turn_radius_m` onto the bearing
/// of the end point and a straight run to it. The shorter of the left and right turns is used.
pub fn build_pattern(params: &PatternParams) -> Result<Vec<Waypoint>, GeometryError> {
    params.validate()?;

    let frame = LocalFrame::new(params.start_point_m, params.start_angle_rad);
    let steps = params.steps_per_turn();
    let r = params.turn_radius_m;

    let mut waypoints = Vec::with_capacity(params.max_waypoints().unwrap_or(0));

    // Planning is done in the local frame, where the first leg runs along +x
    let mut pos = Vector2::zeros();
    let mut head: f64 = 0.0;

    waypoints.push(frame.waypoint(pos, head, SegmentKind::Straight, Handedness::None, 0.0));

    for line in 0..params.number_of_lines {
        pos += params.line_distance_m * direction(head);
        waypoints.push(frame.waypoint(pos, head, SegmentKind::Straight, Handedness::None, 0.0));

        if line + 1 == params.number_of_lines {
            break;
        }

        let hand = turn_handedness(params.path_type, params.turn_direction, line);
        let sign = hand.sign();
        let centre = pos + sign * r * left_normal(head);

        for k in 1..=steps {
            let head_k = head + sign * PI * (k as f64) / (steps as f64);
            let point = centre - sign * r * left_normal(head_k);

            if k < steps {
                waypoints.push(frame.waypoint(point, head_k, SegmentKind::Turn, hand, sign / r));
            }
            else {
                // The end of the turn is the start of the next leg
                pos = point;
                head = wrap_pi(head_k);
                waypoints.push(frame.waypoint(
                    pos,
                    head,
                    SegmentKind::Straight,
                    Handedness::None,
                    0.0,
                ));
            }
        }

        trace!("Turn {} ({:?}) complete, next leg starts at {:?}", line, hand, pos);
    }

    if let Some(end) = params.end_point_m {
        append_transit(&mut waypoints, end, params)?;
    }

    if let Some(index) = waypoints
        .iter()
        .position(|w| !w.position_m.iter().all(|v| v.is_finite()))
    {
        return Err(GeometryError::NonFiniteWaypoint { index });
    }

    debug!(
        "Built {:?} pattern: {} lines, {} turns of {} steps, {} waypoints",
        params.path_type,
        params.number_of_lines,
        params.number_of_lines - 1,
        steps,
        waypoints.len()
    );

    Ok(waypoints)
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Append the turn and straight run from the last waypoint to the end point.
fn append_transit(
    waypoints: &mut Vec<Waypoint>,
    end: [f64; 2],
    params: &PatternParams,
) -> Result<(), GeometryError> {
    let last = match waypoints.last() {
        Some(w) => *w,
        None => return Ok(()),
    };
    let start_m = last.position2();
    let end_m = Vector2::new(end[0], end[1]);
    let diff = end_m - start_m;

    if diff.norm() <= MIN_TRANSIT_LENGTH_M {
        return Ok(());
    }

    let r = params.turn_radius_m;
    let left = transit_turn(start_m, last.heading_rad, end_m, r, Handedness::Left);
    let right = transit_turn(start_m, last.heading_rad, end_m, r, Handedness::Right);

    let turn = match (left, right) {
        (Some(a), Some(b)) if b.length_m(r) < a.length_m(r) => b,
        (Some(a), _) => a,
        (None, Some(b)) => b,
        (None, None) => return Err(GeometryError::EndPointUnreachable { end_point_m: end }),
    };

    // Already pointing at the end point
    if turn.sweep_rad * r <= MIN_TRANSIT_LENGTH_M {
        waypoints.push(Waypoint {
            position_m: Vector3::new(end_m.x, end_m.y, 0.0),
            heading_rad: diff.y.atan2(diff.x),
            kind: SegmentKind::Straight,
            handedness: Handedness::None,
            curvature_m: 0.0,
        });
        return Ok(());
    }

    let sign = turn.hand.sign();
    let steps = params.steps_for(turn.sweep_rad);
    let mut head = last.heading_rad;

    for k in 1..=steps {
        let head_k = last.heading_rad + sign * turn.sweep_rad * (k as f64) / (steps as f64);
        let point = turn.centre_m - sign * r * left_normal(head_k);
        head = wrap_pi(head_k);

        let (kind, hand, curvature_m) = if k < steps {
            (SegmentKind::Turn, turn.hand, sign / r)
        }
        else {
            (SegmentKind::Straight, Handedness::None, 0.0)
        };

        waypoints.push(Waypoint {
            position_m: Vector3::new(point.x, point.y, 0.0),
            heading_rad: head,
            kind,
            handedness: hand,
            curvature_m,
        });
    }

    if turn.run_m > MIN_TRANSIT_LENGTH_M {
        waypoints.push(Waypoint {
            position_m: Vector3::new(end_m.x, end_m.y, 0.0),
            heading_rad: head,
            kind: SegmentKind::Straight,
            handedness: Handedness::None,
            curvature_m: 0.0,
        });
    }

    trace!(
        "Transit to {:?}: {:?} turn of {:.3} rad then {:.3} m straight",
        end,
        turn.hand,
        turn.sweep_rad,
        turn.run_m
    );

    Ok(())
}

/// The turn of radius `r` with the given handedness which leaves `start_m` on `heading_rad` and
/// exits on a tangent through `end_m`, or `None` if `end_m` lies inside the turn circle.
fn transit_turn(
    start_m: Vector2<f64>,
    heading_rad: f64,
    end_m: Vector2<f64>,
    r: f64,
    hand: Handedness,
) -> Option<TransitTurn> {
    let sign = hand.sign();
    let centre_m = start_m + sign * r * left_normal(heading_rad);
    let to_end = end_m - centre_m;
    let dist = to_end.norm();

    if dist < r {
        return None;
    }

    // Angles of the entry and exit points as seen from the centre
    let entry_rad = heading_rad - sign * FRAC_PI_2;
    let exit_rad = to_end.y.atan2(to_end.x) - sign * (r / dist).acos();

    let mut sweep_rad = rem_euclid(sign * (exit_rad - entry_rad), TAU);
    if sweep_rad >= TAU - SWEEP_EPSILON_RAD {
        sweep_rad = 0.0;
    }

    Some(TransitTurn {
        hand,
        centre_m,
        sweep_rad,
        run_m: (dist * dist - r * r).max(0.0).sqrt(),
    })
}

/// Unit vector along the given heading.
fn direction(heading_rad: f64) -> Vector2<f64> {
    Vector2::new(heading_rad.cos(), heading_rad.sin())
}

/// Unit vector pointing to the left of the given heading.
fn left_normal(heading_rad: f64) -> Vector2<f64> {
    Vector2::new(-heading_rad.sin(), heading_rad.cos())
}
