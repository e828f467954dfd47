//! # Depth injection
//!
//! The pattern builder plans in the horizontal plane only. This module supplies the z coordinate of
//! every waypoint before constraints are assembled, either from a simple profile or from a per
//! waypoint file prepared by hand.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use util::{
    archive::{ArchiveError, ArchiveReader},
    maths::lin_map,
};

use crate::pattern::Waypoint;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// One row of a depth file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DepthRow {
    pub depth_m: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// How the depth of each waypoint is chosen.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "profile", rename_all = "lowercase")]
pub enum DepthProfile {
    /// Every waypoint at the same depth
    Constant { depth_m: f64 },

    /// Depth varies linearly with horizontal distance along the path
    Ramp { start_depth_m: f64, end_depth_m: f64 },

    /// One depth per waypoint read from a CSV file with a `depth_m` column
    File { path: PathBuf },
}

#[derive(Debug, thiserror::Error)]
pub enum DepthError {
    #[error("Depth of waypoint {index} is not finite ({value})")]
    NonFinite { index: usize, value: f64 },

    #[error("Expected one depth per waypoint ({waypoints}), found {depths}")]
    LengthMismatch { waypoints: usize, depths: usize },

    #[error("Could not open the depth file {0:?}: {1}")]
    FileError(PathBuf, ArchiveError),

    #[error("Could not read row {row} of the depth file: {source}")]
    RowError { row: usize, source: ArchiveError },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for DepthProfile {
    fn default() -> Self {
        DepthProfile::Constant { depth_m: 0.0 }
    }
}

impl DepthProfile {
    /// Produce one depth for each of the given waypoints.
    pub fn depths_for(&self, waypoints: &[Waypoint]) -> Result<Vec<f64>, DepthError> {
        match self {
            DepthProfile::Constant { depth_m } => Ok(vec![*depth_m; waypoints.len()]),
            DepthProfile::Ramp {
                start_depth_m,
                end_depth_m,
            } => {
                let mut dist_m = Vec::with_capacity(waypoints.len());
                let mut total_m = 0.0;
                for (i, wp) in waypoints.iter().enumerate() {
                    if i > 0 {
                        total_m += (wp.position2() - waypoints[i - 1].position2()).norm();
                    }
                    dist_m.push(total_m);
                }

                if total_m <= 0.0 {
                    return Ok(vec![*start_depth_m; waypoints.len()]);
                }

                Ok(dist_m
                    .into_iter()
                    .map(|d| lin_map((0.0, total_m), (*start_depth_m, *end_depth_m), d))
                    .collect())
            }
            DepthProfile::File { path } => load_depth_file(path),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Return a copy of the waypoints with the given depths applied.
///
/// Depths must be finite and there must be exactly one per waypoint.
pub fn apply_depths(waypoints: &[Waypoint], depths: &[f64]) -> Result<Vec<Waypoint>, DepthError> {
    if waypoints.len() != depths.len() {
        return Err(DepthError::LengthMismatch {
            waypoints: waypoints.len(),
            depths: depths.len(),
        });
    }

    if let Some(index) = depths.iter().position(|d| !d.is_finite()) {
        return Err(DepthError::NonFinite {
            index,
            value: depths[index],
        });
    }

    Ok(waypoints
        .iter()
        .zip(depths.iter())
        .map(|(wp, d)| wp.with_depth(*d))
        .collect())
}

/// Apply a depth profile to the waypoints.
pub fn inject(profile: &DepthProfile, waypoints: &[Waypoint]) -> Result<Vec<Waypoint>, DepthError> {
    let depths = profile.depths_for(waypoints)?;
    debug!("Applying {:?} depth profile to {} waypoints", profile, waypoints.len());
    apply_depths(waypoints, &depths)
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn load_depth_file(path: &Path) -> Result<Vec<f64>, DepthError> {
    let mut reader = ArchiveReader::<DepthRow>::open(path)
        .map_err(|e| DepthError::FileError(path.to_path_buf(), e))?;

    let mut depths = Vec::new();
    for row in reader.rows() {
        match row.result {
            Ok(r) => depths.push(r.depth_m),
            Err(source) => return Err(DepthError::RowError { row: row.row, source }),
        }
    }

    if depths.is_empty() {
        warn!("Depth file {:?} contains no rows", path);
    }

    Ok(depths)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::pattern::{build_pattern, test::scenario_a};

    #[test]
    fn test_constant() {
        let wps = build_pattern(&scenario_a()).unwrap();
        let deep = inject(&DepthProfile::Constant { depth_m: 12.5 }, &wps).unwrap();

        assert_eq!(deep.len(), wps.len());
        assert!(deep.iter().all(|w| w.position_m.z == 12.5));
        // Horizontal geometry untouched
        assert!(deep.iter().zip(wps.iter()).all(|(d, w)| d.position2() == w.position2()));
    }

    #[test]
    fn test_ramp() {
        let wps = build_pattern(&scenario_a()).unwrap();
        let profile = DepthProfile::Ramp {
            start_depth_m: 2.0,
            end_depth_m: 10.0,
        };
        let deep = inject(&profile, &wps).unwrap();

        assert_eq!(deep.first().unwrap().position_m.z, 2.0);
        assert!((deep.last().unwrap().position_m.z - 10.0).abs() < 1e-9);
        for pair in deep.windows(2) {
            assert!(pair[1].position_m.z > pair[0].position_m.z);
        }
    }

    #[test]
    fn test_apply_errors() {
        let wps = build_pattern(&scenario_a()).unwrap();

        let short = vec![0.0; wps.len() - 1];
        assert!(matches!(
            apply_depths(&wps, &short),
            Err(DepthError::LengthMismatch { .. })
        ));

        let mut bad = vec![1.0; wps.len()];
        bad[7] = f64::INFINITY;
        assert!(matches!(
            apply_depths(&wps, &bad),
            Err(DepthError::NonFinite { index: 7, .. })
        ));
    }

    #[test]
    fn test_file() {
        let params = crate::pattern::PatternParams {
            number_of_lines: 1,
            ..scenario_a()
        };
        let wps = build_pattern(&params).unwrap();

        let path = std::env::temp_dir().join("traj_lib_depth_test_file.csv");
        std::fs::write(&path, "depth_m\n3.0\n4.5\n").unwrap();

        let profile = DepthProfile::File { path: path.clone() };
        let deep = inject(&profile, &wps).unwrap();
        assert_eq!(deep[0].position_m.z, 3.0);
        assert_eq!(deep[1].position_m.z, 4.5);

        std::fs::write(&path, "depth_m\n3.0\nabc\n").unwrap();
        assert!(matches!(
            inject(&profile, &wps),
            Err(DepthError::RowError { row: 1, .. })
        ));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_profile_from_toml() {
        #[derive(Deserialize)]
        struct P {
            depth: DepthProfile,
        }

        let p: P = util::params::from_str("[depth]\nprofile = \"ramp\"\nstart_depth_m = 1.0\nend_depth_m = 3.0\n")
            .unwrap();
        assert!(matches!(p.depth, DepthProfile::Ramp { .. }));
    }
}
