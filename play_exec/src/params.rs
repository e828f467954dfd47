//! Parameters structure for the reference player

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;
use std::path::PathBuf;
use traj_lib::table::ParseMode;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the reference player, loaded from `ref_player.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct RefPlayerParams {
    /// Path to the exchange table to play
    pub table_path: PathBuf,

    /// Time between emitted set-points.
    ///
    /// Units: seconds
    pub period_s: f64,

    /// Topic frame prepended to each published message
    #[serde(default = "default_topic")]
    pub topic: String,

    /// Log every emitted pose at info level rather than trace
    #[serde(default)]
    pub verbose: bool,

    /// How malformed table rows are handled
    #[serde(default)]
    pub parse_mode: ParseMode,

    /// Playback progress is logged each time it advances by this much.
    ///
    /// Units: percent
    #[serde(default = "default_progress_step_pct")]
    pub progress_step_pct: f64,
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn default_topic() -> String {
    String::from("ref")
}

fn default_progress_step_pct() -> f64 {
    10.0
}
