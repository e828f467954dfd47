//! Trajectory generation executable entry point.
//!
//! # Architecture
//!
//! A single pass over the generation pipeline:
//!
//!     - Load the generation parameters
//!     - Build the survey pattern and apply the depth profile
//!     - Assemble constraints and synthesise the trajectory
//!     - Sample the trajectory and write the exchange table
//!
//! The waypoints and constraints are saved into the session directory for post-run inspection,
//! along with an archive copy of the table.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Report};
use log::info;
use std::path::PathBuf;
use structopt::StructOpt;

// Internal
use traj_lib::{
    pipeline::{generate, GenParams},
    table::write_table,
};
use util::{
    archive::Archiver,
    host,
    logger::{level_from_str, logger_init},
    session::Session,
};

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Generate a lawnmower survey reference trajectory table.
#[derive(Debug, StructOpt)]
#[structopt(name = "traj_exec")]
struct Args {
    /// Parameter file, relative to `$AUV_TRAJ_SW_ROOT/params`
    #[structopt(long, default_value = "traj_gen.toml")]
    params: String,

    /// Explicit path to the parameter file, overrides `--params`
    #[structopt(long, parse(from_os_str))]
    params_path: Option<PathBuf>,

    /// Write the table here instead of the path given in the parameters
    #[structopt(short, long, parse(from_os_str))]
    output: Option<PathBuf>,

    /// Minimum log level, at least `info`
    #[structopt(long, default_value = "debug")]
    log_level: String,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let args = Args::from_args();

    // ---- EARLY INITIALISATION ----

    let session = Session::new("traj_exec", "sessions")
        .wrap_err("Failed to create the session")?;

    logger_init(level_from_str(&args.log_level), &session)
        .wrap_err("Failed to initialise logging")?;

    info!("AUV Survey Trajectory Generator\n");
    info!("Running on: {}", host::get_hostname());
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let mut params: GenParams = match args.params_path {
        Some(ref p) => util::params::load_path(p),
        None => util::params::load(&args.params),
    }
    .wrap_err("Could not load generation params")?;

    if let Some(output) = args.output {
        params.output.table_path = output;
    }

    info!("Generation parameters loaded");
    session.save("gen_params.json", params.clone());

    // ---- GENERATE ----

    let gen = generate(&params).wrap_err("Trajectory generation failed")?;

    session.save("waypoints.json", gen.waypoints.clone());
    session.save("constraints.json", gen.constraints.clone());

    // ---- WRITE TABLE ----

    let num_rows = write_table(&params.output.table_path, &gen.set_points)
        .wrap_err("Failed to write the reference table")?;
    info!(
        "Wrote {} set-points to {:?}",
        num_rows, params.output.table_path
    );

    Archiver::from_path(&session, "set_points.csv")
        .and_then(|mut a| a.serialise_all(&gen.set_points))
        .wrap_err("Failed to archive the set-points")?;

    // ---- SHUTDOWN ----

    session.exit();

    info!("End of execution");

    Ok(())
}
