//! Pattern builder parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters describing one lawnmower survey.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PatternParams {

    /// Forward speed along the straight legs
    pub surge_velocity_ms: f64,

    /// Radius of the turns joining the legs
    pub turn_radius_m: f64,

    /// Length of each straight leg
    pub line_distance_m: f64,

    /// Number of straight legs in the survey
    pub number_of_lines: usize,

    /// Fraction of the surge velocity used during turns, in (0, 1]
    pub turn_velocity_percentage: f64,

    /// Position of the start of the first leg in the global frame
    #[serde(default)]
    pub start_point_m: [f64; 2],

    /// Heading of the first leg, measured anticlockwise from the global +x
    /// axis
    #[serde(default)]
    pub start_angle_rad: f64,

    /// Time of arrival at the first waypoint
    #[serde(default)]
    pub start_time_s: f64,

    /// If set a straight transit leg to this point is appended after the
    /// last survey leg
    #[serde(default)]
    pub end_point_m: Option<[f64; 2]>,

    /// Survey topology
    pub path_type: PathType,

    /// Handedness of the first turn
    pub turn_direction: TurnDirection,

    /// Maximum heading change between consecutive waypoints on a turn
    #[serde(default = "default_max_turn_step_rad")]
    pub max_turn_step_rad: f64
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The lawnmower topologies which can be built.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathType {
    /// Every turn has the same handedness, so the vehicle runs back and forth
    /// between two parallel lines.
    #[serde(rename = "out-n-back")]
    OutNBack,

    /// Turns alternate handedness, so every turn moves the vehicle further
    /// across the survey area.
    #[serde(rename = "side-to-side")]
    SideToSide
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TurnDirection {
    Left,
    Right
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// 15 degrees
fn default_max_turn_step_rad() -> f64 {
    std::f64::consts::PI / 12.0
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_params_from_toml() {
        let p: PatternParams = util::params::from_str(
            r#"
            surge_velocity_ms = 1.0
            turn_radius_m = 5.0
            line_distance_m = 50.0
            number_of_lines = 4
            turn_velocity_percentage = 0.3
            path_type = "out-n-back"
            turn_direction = "left"
            "#
        ).unwrap();

        assert_eq!(p.path_type, PathType::OutNBack);
        assert_eq!(p.turn_direction, TurnDirection::Left);
        assert_eq!(p.start_point_m, [0.0, 0.0]);
        assert!(p.end_point_m.is_none());
        assert_eq!(p.max_turn_step_rad, std::f64::consts::PI / 12.0);
    }
}
