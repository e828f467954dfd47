//! # Reference playback library.
//!
//! Streams a previously generated exchange table to the vehicle controller at a fixed rate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Player parameters
pub mod params;

/// Reference player and the drift-free playback loop
pub mod player;

/// ZMQ publisher for reference messages
pub mod ref_server;
