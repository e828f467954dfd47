//! # Reference player
//!
//! The player hands out the set-points of an exchange table in order, one per call to
//! [`State::proc`]. [`run`] drives a player against a [`RefSink`] at a fixed period.
//!
//! Emission `n` is scheduled for the absolute deadline `start + n * period` on the monotonic
//! clock, so scheduling error never accumulates over long runs. The stop flag is checked before
//! every emission, so a stop request is honoured within one period.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::{Duration, Instant},
};

use comms_if::traj::{ReferenceMsg, SetPoint};
use log::{debug, info, trace, warn};
use serde::Serialize;
use traj_lib::table::{read_table, FormatError};
use util::module::State;

use crate::params::RefPlayerParams;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// The control-facing boundary reference messages are emitted to.
pub trait RefSink {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Emit a single message. Any error is fatal to playback.
    fn emit(&mut self, msg: &ReferenceMsg) -> Result<(), Self::Error>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Reference player state
#[derive(Default)]
pub struct RefPlayer {
    set_points: Vec<SetPoint>,

    next_index: usize,

    verbose: bool,

    progress_step_pct: f64,

    next_progress_pct: f64,
}

/// Status report for one step of the player.
#[derive(Clone, Copy, Default, Serialize, Debug)]
pub struct StatusReport {
    /// Index of the set-point handed out by this step
    pub index: usize,

    pub total: usize,

    pub progress_pct: f64,

    /// True once the final set-point has been handed out
    pub finished: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    #[error("Could not load the reference table: {0}")]
    Format(#[from] FormatError),

    #[error("The player has no set-points, it must be initialised first")]
    NotInitialised,

    #[error("Could not emit set-point {index}: {source}")]
    Sink {
        index: usize,
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

/// How a playback run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEnd {
    /// Every remaining set-point was emitted
    Completed { emitted: usize },

    /// The stop flag was raised before the table was finished
    Stopped { emitted: usize },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl State for RefPlayer {
    type InitData = RefPlayerParams;
    type InitError = PlayerError;

    type InputData = ();
    type OutputData = Option<ReferenceMsg>;
    type StatusReport = StatusReport;
    type ProcError = PlayerError;

    /// Load the exchange table.
    ///
    /// The whole table is parsed here, so a malformed table is reported before anything is
    /// emitted.
    fn init(&mut self, init_data: Self::InitData) -> Result<(), Self::InitError> {
        self.set_points = read_table(&init_data.table_path, init_data.parse_mode)?;
        self.verbose = init_data.verbose;
        self.progress_step_pct = init_data.progress_step_pct;
        self.rewind();

        info!(
            "Loaded {} set-points from {:?}",
            self.set_points.len(),
            init_data.table_path
        );

        Ok(())
    }

    /// Hand out the next set-point, or `None` once the table is exhausted.
    fn proc(
        &mut self,
        _input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        let total = self.set_points.len();
        if total == 0 {
            return Err(PlayerError::NotInitialised);
        }

        let index = self.next_index;
        let sp = match self.set_points.get(index) {
            Some(sp) => sp,
            None => {
                let report = StatusReport {
                    index: total - 1,
                    total,
                    progress_pct: 100.0,
                    finished: true,
                };
                return Ok((None, report));
            }
        };

        let msg = ReferenceMsg::from_set_point(index, total, sp);
        self.next_index += 1;

        let progress_pct = 100.0 * self.next_index as f64 / total as f64;

        if self.verbose {
            info!(
                "[{}/{}] t = {:.3} s, pos = {:?}, att = {:?}",
                index + 1,
                total,
                msg.time_s,
                msg.position_m,
                msg.attitude_q
            );
        }
        else {
            trace!("[{}/{}] t = {:.3} s", index + 1, total, msg.time_s);
        }

        if self.progress_step_pct > 0.0 && progress_pct >= self.next_progress_pct {
            info!("Playback {:.0}% complete ({}/{})", progress_pct, index + 1, total);
            while self.next_progress_pct <= progress_pct {
                self.next_progress_pct += self.progress_step_pct;
            }
        }

        let report = StatusReport {
            index,
            total,
            progress_pct,
            finished: self.next_index == total,
        };

        Ok((Some(msg), report))
    }
}

impl RefPlayer {
    /// Start again from the first set-point.
    pub fn rewind(&mut self) {
        self.next_index = 0;
        self.next_progress_pct = self.progress_step_pct;
    }

    /// Number of set-points in the loaded table.
    pub fn len(&self) -> usize {
        self.set_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set_points.is_empty()
    }

    /// Number of set-points still to be handed out.
    pub fn remaining(&self) -> usize {
        self.set_points.len().saturating_sub(self.next_index)
    }
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Play the remaining set-points into the sink, one every `period`, starting now.
///
/// Returns once the table is exhausted or `stop` is raised. A sink error aborts playback and is
/// reported with the index of the set-point that could not be emitted.
pub fn run<S: RefSink>(
    player: &mut RefPlayer,
    sink: &mut S,
    period: Duration,
    stop: &AtomicBool,
) -> Result<PlaybackEnd, PlayerError> {
    run_from(player, sink, period, stop, Instant::now())
}

/// As [`run`], but emission `n` is scheduled for `start + n * period`.
///
/// Replaying a table continues the same schedule by passing a `start` advanced by the number of
/// set-points already emitted.
pub fn run_from<S: RefSink>(
    player: &mut RefPlayer,
    sink: &mut S,
    period: Duration,
    stop: &AtomicBool,
    start: Instant,
) -> Result<PlaybackEnd, PlayerError> {
    if player.is_empty() {
        return Err(PlayerError::NotInitialised);
    }

    info!(
        "Starting playback of {} set-points at {:.3} s",
        player.remaining(),
        period.as_secs_f64()
    );

    let mut emitted = 0usize;
    let mut num_overruns = 0usize;

    loop {
        // Wait for the absolute deadline of this emission
        let deadline = start + period.mul_f64(emitted as f64);
        let now = Instant::now();
        match deadline.checked_duration_since(now) {
            Some(d) => thread::sleep(d),
            None if emitted > 0 => {
                num_overruns += 1;
                warn!(
                    "Emission {} overran its deadline by {:.06} s",
                    emitted,
                    now.duration_since(deadline).as_secs_f64()
                );
            }
            None => (),
        }

        if stop.load(Ordering::SeqCst) {
            info!("Stop requested, playback halted after {} set-points", emitted);
            return Ok(PlaybackEnd::Stopped { emitted });
        }

        let (msg, report) = player.proc(&())?;
        let msg = match msg {
            Some(m) => m,
            None => break,
        };

        sink.emit(&msg).map_err(|e| PlayerError::Sink {
            index: msg.index,
            source: Box::new(e),
        })?;
        emitted += 1;

        if report.finished {
            break;
        }
    }

    debug!(
        "Playback took {:.3} s with {} overruns",
        start.elapsed().as_secs_f64(),
        num_overruns
    );
    info!("Playback complete, {} set-points emitted", emitted);

    Ok(PlaybackEnd::Completed { emitted })
}

#[cfg(test)]
mod test {
    use super::*;
    use std::{path::PathBuf, sync::Arc};
    use traj_lib::table::{write_table, ParseMode};

    /// Records every message with the instant it was emitted.
    #[derive(Default)]
    struct VecSink {
        msgs: Vec<(Instant, ReferenceMsg)>,
    }

    /// Fails on a particular index.
    struct FailSink {
        fail_at: usize,
        ok: usize,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("Channel closed")]
    struct ChannelClosed;

    impl RefSink for VecSink {
        type Error = ChannelClosed;

        fn emit(&mut self, msg: &ReferenceMsg) -> Result<(), Self::Error> {
            self.msgs.push((Instant::now(), msg.clone()));
            Ok(())
        }
    }

    impl RefSink for FailSink {
        type Error = ChannelClosed;

        fn emit(&mut self, msg: &ReferenceMsg) -> Result<(), Self::Error> {
            if msg.index == self.fail_at {
                return Err(ChannelClosed);
            }
            self.ok += 1;
            Ok(())
        }
    }

    fn table(name: &str, len: usize) -> PathBuf {
        let path = std::env::temp_dir().join(format!("play_lib_player_{}.csv", name));
        let sps: Vec<SetPoint> = (0..len)
            .map(|i| SetPoint {
                time_s: i as f64 * 0.1,
                x_m: i as f64,
                qw: 1.0,
                vx_ms: 10.0,
                ..Default::default()
            })
            .collect();
        write_table(&path, &sps).unwrap();
        path
    }

    fn params(table_path: PathBuf) -> RefPlayerParams {
        RefPlayerParams {
            table_path,
            period_s: 0.01,
            topic: "ref".into(),
            verbose: false,
            parse_mode: ParseMode::Strict,
            progress_step_pct: 25.0,
        }
    }

    fn player(name: &str, len: usize) -> RefPlayer {
        let mut p = RefPlayer::default();
        p.init(params(table(name, len))).unwrap();
        p
    }

    #[test]
    fn test_emits_in_order_on_schedule() {
        let mut p = player("in_order", 6);
        let mut sink = VecSink::default();
        let period = Duration::from_millis(20);
        let stop = AtomicBool::new(false);

        let start = Instant::now();
        let end = run(&mut p, &mut sink, period, &stop).unwrap();
        let elapsed = start.elapsed();

        assert_eq!(end, PlaybackEnd::Completed { emitted: 6 });
        assert_eq!(sink.msgs.len(), 6);

        for (k, (at, msg)) in sink.msgs.iter().enumerate() {
            assert_eq!(msg.index, k);
            assert_eq!(msg.total, 6);
            assert_eq!(msg.position_m[0], k as f64);

            // Never early relative to the absolute schedule
            assert!(*at >= start + period * k as u32);
        }

        // No sleep after the final emission, and no accumulated drift
        assert!(elapsed >= period * 5);
        assert!(elapsed < period * 5 + Duration::from_millis(50));
    }

    #[test]
    fn test_replay_keeps_period() {
        let mut p = player("replay", 3);
        let mut sink = VecSink::default();
        let period = Duration::from_millis(20);
        let stop = AtomicBool::new(false);

        let start = Instant::now();
        let mut loop_start = start;
        for _ in 0..2 {
            let end = run_from(&mut p, &mut sink, period, &stop, loop_start).unwrap();
            assert_eq!(end, PlaybackEnd::Completed { emitted: 3 });
            loop_start += period * 3;
            p.rewind();
        }

        let indices: Vec<usize> = sink.msgs.iter().map(|(_, m)| m.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 0, 1, 2]);

        // One schedule across both loops, so the wrap from the last set-point back to the first
        // still waits a full period
        for (k, (at, _)) in sink.msgs.iter().enumerate() {
            assert!(*at >= start + period * k as u32);
        }
        let wrap_gap = sink.msgs[3].0.duration_since(sink.msgs[2].0);
        assert!(wrap_gap >= period / 2, "gap {:?}", wrap_gap);
    }

    #[test]
    fn test_stop_before_start() {
        let mut p = player("stop_before", 4);
        let mut sink = VecSink::default();
        let stop = AtomicBool::new(true);

        let end = run(&mut p, &mut sink, Duration::from_millis(10), &stop).unwrap();
        assert_eq!(end, PlaybackEnd::Stopped { emitted: 0 });
        assert!(sink.msgs.is_empty());
    }

    #[test]
    fn test_stop_within_one_period() {
        let mut p = player("stop_during", 200);
        let mut sink = VecSink::default();
        let period = Duration::from_millis(10);
        let stop = Arc::new(AtomicBool::new(false));

        let stop_clone = stop.clone();
        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(45));
            stop_clone.store(true, Ordering::SeqCst);
            Instant::now()
        });

        let end = run(&mut p, &mut sink, period, &stop).unwrap();
        let returned = Instant::now();
        let stopped_at = stopper.join().unwrap();

        match end {
            PlaybackEnd::Stopped { emitted } => {
                assert_eq!(emitted, sink.msgs.len());
                assert!(emitted < 200);
            }
            e => panic!("Expected playback to stop, got {:?}", e),
        }

        // Nothing emitted after the stop was observed, and observed within one period
        assert!(returned.saturating_duration_since(stopped_at) <= period + Duration::from_millis(20));
        assert!(sink.msgs.iter().all(|(at, _)| *at <= returned));
    }

    #[test]
    fn test_malformed_table_emits_nothing() {
        // A row missing its velocity field
        let path = std::env::temp_dir().join("play_lib_player_malformed.csv");
        let header = SetPoint::COLUMNS.join(",");
        let good = vec!["0.5"; 20].join(",");
        let bad = vec!["0.5"; 19].join(",");
        std::fs::write(&path, format!("{}\n{}\n{}\n", header, good, bad)).unwrap();

        let mut p = RefPlayer::default();
        let res = p.init(params(path));
        assert!(matches!(res, Err(PlayerError::Format(FormatError::Row { row: 1, .. }))));

        // So the player has nothing to play and refuses to run
        let mut sink = VecSink::default();
        let res = run(&mut p, &mut sink, Duration::from_millis(1), &AtomicBool::new(false));
        assert!(matches!(res, Err(PlayerError::NotInitialised)));
        assert!(sink.msgs.is_empty());
    }

    #[test]
    fn test_sink_error_is_fatal() {
        let mut p = player("sink_error", 5);
        let mut sink = FailSink { fail_at: 2, ok: 0 };

        let res = run(&mut p, &mut sink, Duration::from_millis(1), &AtomicBool::new(false));
        assert!(matches!(res, Err(PlayerError::Sink { index: 2, .. })));
        assert_eq!(sink.ok, 2);
    }

    #[test]
    fn test_progress_and_rewind() {
        let mut p = player("rewind", 4);

        let reports: Vec<StatusReport> = (0..4)
            .map(|k| {
                let (msg, report) = p.proc(&()).unwrap();
                assert_eq!(msg.unwrap().index, k);
                report
            })
            .collect();
        let last = reports[3];
        assert!(!reports[2].finished);
        assert_eq!(reports[1].progress_pct, 50.0);
        assert!(last.finished);
        assert_eq!(last.progress_pct, 100.0);
        assert_eq!(p.remaining(), 0);

        let (msg, report) = p.proc(&()).unwrap();
        assert!(msg.is_none());
        assert!(report.finished);

        p.rewind();
        assert_eq!(p.remaining(), 4);
        let mut sink = VecSink::default();
        let end = run(&mut p, &mut sink, Duration::from_millis(1), &AtomicBool::new(false)).unwrap();
        assert_eq!(end, PlaybackEnd::Completed { emitted: 4 });
        assert_eq!(p.len(), 4);
    }
}
