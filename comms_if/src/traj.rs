//! # Trajectory Communications Module
//!
//! Defines the set-point row which makes up the exchange table written by
//! trajectory generation, and the reference message published to the vehicle
//! controller during playback.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{serde::ts_milliseconds, DateTime, Utc};
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A single discrete set-point of the reference trajectory.
///
/// This is one row of the exchange table, so all fields are flat scalars. The
/// attitude quaternion is stored in w-x-y-z order. Velocities and
/// accelerations are given in the world frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SetPoint {
    /// Trajectory time of this set-point
    pub time_s: f64,

    pub x_m: f64,
    pub y_m: f64,
    pub z_m: f64,

    pub qw: f64,
    pub qx: f64,
    pub qy: f64,
    pub qz: f64,

    pub vx_ms: f64,
    pub vy_ms: f64,
    pub vz_ms: f64,

    pub wx_rads: f64,
    pub wy_rads: f64,
    pub wz_rads: f64,

    pub ax_mss: f64,
    pub ay_mss: f64,
    pub az_mss: f64,

    pub alpha_x_radss: f64,
    pub alpha_y_radss: f64,
    pub alpha_z_radss: f64,
}

/// Reference message sent to the vehicle controller for each set-point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceMsg {
    /// Index of this set-point in the table
    pub index: usize,

    /// Total number of set-points in the table
    pub total: usize,

    /// UTC timestamp at which the message was emitted
    #[serde(with = "ts_milliseconds")]
    pub stamp: DateTime<Utc>,

    /// Trajectory time of the set-point
    pub time_s: f64,

    pub position_m: [f64; 3],

    /// Attitude quaternion in w-x-y-z order
    pub attitude_q: [f64; 4],

    pub lin_vel_ms: [f64; 3],

    pub ang_vel_rads: [f64; 3],

    pub lin_acc_mss: [f64; 3],

    pub ang_acc_radss: [f64; 3],
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ReferenceMsgError {
    #[error("Could not serialize the reference message: {0}")]
    SerializationError(serde_json::Error),

    #[error("Could not deserialize the reference message: {0}")]
    DeserializationError(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SetPoint {
    /// Column names of the exchange table, matching the field names.
    pub const COLUMNS: [&'static str; 20] = [
        "time_s",
        "x_m", "y_m", "z_m",
        "qw", "qx", "qy", "qz",
        "vx_ms", "vy_ms", "vz_ms",
        "wx_rads", "wy_rads", "wz_rads",
        "ax_mss", "ay_mss", "az_mss",
        "alpha_x_radss", "alpha_y_radss", "alpha_z_radss",
    ];

    pub fn position_m(&self) -> [f64; 3] {
        [self.x_m, self.y_m, self.z_m]
    }

    /// Attitude quaternion in w-x-y-z order
    pub fn attitude_q(&self) -> [f64; 4] {
        [self.qw, self.qx, self.qy, self.qz]
    }

    pub fn lin_vel_ms(&self) -> [f64; 3] {
        [self.vx_ms, self.vy_ms, self.vz_ms]
    }

    pub fn ang_vel_rads(&self) -> [f64; 3] {
        [self.wx_rads, self.wy_rads, self.wz_rads]
    }

    pub fn lin_acc_mss(&self) -> [f64; 3] {
        [self.ax_mss, self.ay_mss, self.az_mss]
    }

    pub fn ang_acc_radss(&self) -> [f64; 3] {
        [self.alpha_x_radss, self.alpha_y_radss, self.alpha_z_radss]
    }

    /// Index of the first non-finite field, in table column order.
    pub fn first_non_finite(&self) -> Option<usize> {
        let fields = [
            self.time_s,
            self.x_m, self.y_m, self.z_m,
            self.qw, self.qx, self.qy, self.qz,
            self.vx_ms, self.vy_ms, self.vz_ms,
            self.wx_rads, self.wy_rads, self.wz_rads,
            self.ax_mss, self.ay_mss, self.az_mss,
            self.alpha_x_radss, self.alpha_y_radss, self.alpha_z_radss,
        ];

        fields.iter().position(|f| !f.is_finite())
    }
}

impl ReferenceMsg {
    /// Build the message for the `index`th set-point out of `total`.
    pub fn from_set_point(index: usize, total: usize, sp: &SetPoint) -> Self {
        Self {
            index,
            total,
            stamp: Utc::now(),
            time_s: sp.time_s,
            position_m: sp.position_m(),
            attitude_q: sp.attitude_q(),
            lin_vel_ms: sp.lin_vel_ms(),
            ang_vel_rads: sp.ang_vel_rads(),
            lin_acc_mss: sp.lin_acc_mss(),
            ang_acc_radss: sp.ang_acc_radss(),
        }
    }

    pub fn to_json(&self) -> Result<String, ReferenceMsgError> {
        serde_json::to_string(self).map_err(ReferenceMsgError::SerializationError)
    }

    pub fn from_json(json: &str) -> Result<Self, ReferenceMsgError> {
        serde_json::from_str(json).map_err(ReferenceMsgError::DeserializationError)
    }
}
