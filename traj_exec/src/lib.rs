//! # Trajectory library.
//!
//! Generates a time-parameterised six degree of freedom reference for a lawnmower survey. Data
//! flows through the modules in order:
//!
//! `pattern` -> `depth` -> `constraint` -> `synth` -> `sample` -> `table`
//!
//! The `pipeline` module strings the stages together.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Pattern builder - turns survey parameters into an ordered list of waypoints
pub mod pattern;

/// Depth injection - supplies the z coordinate of each waypoint
pub mod depth;

/// Constraint assembler - attaches attitude, kinematic targets and arrival times to waypoints
pub mod constraint;

/// Trajectory synthesiser - fits a smooth trajectory through the constraints
pub mod synth;

/// Sample emitter - discretises the trajectory at a fixed period
pub mod sample;

/// Exchange table - persists set-points for playback
pub mod table;

/// Generation pipeline and its parameters
pub mod pipeline;
