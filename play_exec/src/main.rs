//! Reference playback executable entry point.
//!
//! # Architecture
//!
//!     - Load the player and network parameters
//!     - Parse the whole exchange table, aborting before anything is sent if it is malformed
//!     - Bind the reference publisher
//!     - Stream the table at the configured period until it is exhausted or Ctrl-C is pressed
//!
//! The table can optionally be replayed a number of times.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::info;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Instant;
use structopt::StructOpt;

// Internal
use comms_if::net::{zmq, NetParams};
use play_lib::{
    params::RefPlayerParams,
    player::{run_from, PlaybackEnd, RefPlayer},
    ref_server::RefServer,
};
use util::{
    host,
    logger::{level_from_str, logger_init},
    module::State,
    session::Session,
    time::period_to_duration,
};

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Stream a reference trajectory table to the vehicle controller.
#[derive(Debug, StructOpt)]
#[structopt(name = "play_exec")]
struct Args {
    /// Parameter file, relative to `$AUV_TRAJ_SW_ROOT/params`
    #[structopt(long, default_value = "ref_player.toml")]
    params: String,

    /// Explicit path to the parameter file, overrides `--params`
    #[structopt(long, parse(from_os_str))]
    params_path: Option<PathBuf>,

    /// Play this table instead of the one given in the parameters
    #[structopt(short, long, parse(from_os_str))]
    table: Option<PathBuf>,

    /// Number of times to play the table
    #[structopt(long, default_value = "1")]
    loops: usize,

    /// Minimum log level, at least `info`
    #[structopt(long, default_value = "info")]
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

    let session = Session::new("play_exec", "sessions")
        .wrap_err("Failed to create the session")?;

    logger_init(level_from_str(&args.log_level), &session)
        .wrap_err("Failed to initialise logging")?;

    info!("AUV Reference Player\n");
    info!("Running on: {}", host::get_hostname());
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let mut player_params: RefPlayerParams = match args.params_path {
        Some(ref p) => util::params::load_path(p),
        None => util::params::load(&args.params),
    }
    .wrap_err("Could not load player params")?;
    let net_params: NetParams =
        util::params::load("net.toml").wrap_err("Could not load net params")?;

    if let Some(table) = args.table {
        player_params.table_path = table;
    }

    let period = match period_to_duration(player_params.period_s) {
        Some(p) if player_params.period_s > 0.0 => p,
        _ => {
            return Err(eyre!(
                "Playback period must be positive, found {} s",
                player_params.period_s
            ))
        }
    };

    info!("Player parameters loaded");

    // ---- LOAD TABLE ----

    let topic = player_params.topic.clone();

    let mut player = RefPlayer::default();
    player
        .init(player_params)
        .wrap_err("Failed to initialise the RefPlayer")?;

    // ---- INITIALISE NETWORK ----

    let stop = Arc::new(AtomicBool::new(false));
    let stop_handler = stop.clone();
    ctrlc::set_handler(move || stop_handler.store(true, Ordering::SeqCst))
        .wrap_err("Failed to set the Ctrl-C handler")?;

    let zmq_ctx = zmq::Context::new();
    let mut ref_server = RefServer::new(&zmq_ctx, &net_params, &topic)
        .wrap_err("Failed to initialise the RefServer")?;
    info!(
        "RefServer bound to {} (subscriber connected: {})",
        net_params.ref_endpoint,
        ref_server.is_connected()
    );

    // ---- PLAYBACK ----

    // Every loop continues the same schedule, so replays keep one sample per period
    let mut loop_start = Instant::now();

    for loop_num in 0..args.loops {
        info!("Playback loop {}/{}", loop_num + 1, args.loops);

        match run_from(&mut player, &mut ref_server, period, &stop, loop_start)
            .wrap_err("Playback failed")?
        {
            PlaybackEnd::Completed { emitted } => {
                loop_start += period.mul_f64(emitted as f64);
                player.rewind();
            }
            PlaybackEnd::Stopped { .. } => break,
        }
    }

    // ---- SHUTDOWN ----

    // Close the socket before the session
    drop(ref_server);
    session.exit();

    info!("End of execution");

    Ok(())
}
