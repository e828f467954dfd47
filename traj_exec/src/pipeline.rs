//! # Generation pipeline
//!
//! Runs the generation stages in order, from survey parameters to a sampled set-point table. Any
//! stage failing aborts the whole run, no partial trajectory is ever returned.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::path::PathBuf;

use comms_if::traj::SetPoint;
use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    constraint::{self, AssemblyParams, AttitudeParams, Constraint, TimingError},
    depth::{self, DepthError, DepthProfile},
    pattern::{self, GeometryError, PatternParams, Waypoint},
    sample::{self, RangeError},
    synth::{self, SynthError},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters for trajectory generation, loaded from `traj_gen.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenParams {
    pub pattern: PatternParams,

    #[serde(default)]
    pub attitude: AttitudeParams,

    #[serde(default)]
    pub depth: DepthProfile,

    pub output: OutputParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputParams {
    /// Period between set-points in the table
    pub period_s: f64,

    /// Where the exchange table is written
    pub table_path: PathBuf,
}

/// Everything produced by one generation run.
#[derive(Debug, Clone)]
pub struct Generated {
    pub waypoints: Vec<Waypoint>,
    pub constraints: Vec<Constraint>,
    pub set_points: Vec<SetPoint>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum GenError {
    #[error("Infeasible pattern: {0}")]
    Geometry(#[from] GeometryError),

    #[error("Could not apply depth profile: {0}")]
    Depth(#[from] DepthError),

    #[error("Could not time the waypoints: {0}")]
    Timing(#[from] TimingError),

    #[error(transparent)]
    Synth(#[from] SynthError),

    #[error("Could not sample the trajectory: {0}")]
    Range(#[from] RangeError),
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Generate the set-point table for the given parameters.
pub fn generate(params: &GenParams) -> Result<Generated, GenError> {
    let waypoints = pattern::build_pattern(&params.pattern)?;
    info!("Built {} waypoints", waypoints.len());

    let waypoints = depth::inject(&params.depth, &waypoints)?;

    let constraints = constraint::assemble(
        &waypoints,
        &AssemblyParams::new(&params.pattern, &params.attitude),
    )?;
    info!("Assembled {} constraints", constraints.len());

    let traj = synth::synthesize(&constraints)?;
    info!(
        "Synthesised trajectory of {:.2} s over {} pieces",
        traj.duration_s(),
        traj.num_pieces()
    );

    let set_points = sample::sample(&traj, params.output.period_s)?;
    info!(
        "Sampled {} set-points at {} s",
        set_points.len(),
        params.output.period_s
    );

    Ok(Generated {
        waypoints,
        constraints,
        set_points,
    })
}
