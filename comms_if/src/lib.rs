//! # Communications interface crate.
//!
//! Provides the interfaces shared between trajectory generation, reference
//! playback and the vehicle control consumer.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Set-point rows and reference messages
pub mod traj;

/// Network module
pub mod net;
