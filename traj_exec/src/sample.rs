//! # Sample emitter
//!
//! Discretises a [`Trajectory`] into evenly spaced [`SetPoint`]s.
//!
//! The number of samples is `floor((tN - t0) / period) + 1`, sample `k` is taken at
//! `t0 + k * period`, and the last sample is always taken at exactly `tN`. If the duration is not
//! a multiple of the period the final spacing is therefore shorter than the period, but never
//! zero or negative.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::traj::SetPoint;
use log::debug;

use crate::synth::Trajectory;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Tolerance on the sample count so that durations which are an exact multiple of the period in
/// decimal are not truncated one short by rounding.
const COUNT_EPSILON: f64 = 1e-9;

/// Largest table that will be produced, a day of samples at over 100 Hz.
pub const MAX_SAMPLES: usize = 10_000_000;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RangeError {
    #[error("Sample period must be positive and finite, found {0} s")]
    InvalidPeriod(f64),

    #[error("Sampling {duration_s} s at {period_s} s would produce too many samples")]
    TooManySamples { duration_s: f64, period_s: f64 },
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Number of samples produced for the given duration and period.
pub fn sample_count(duration_s: f64, period_s: f64) -> Result<usize, RangeError> {
    if !period_s.is_finite() || period_s <= 0.0 {
        return Err(RangeError::InvalidPeriod(period_s));
    }

    let steps = (duration_s / period_s + COUNT_EPSILON).floor();
    if !steps.is_finite() || steps >= MAX_SAMPLES as f64 {
        return Err(RangeError::TooManySamples {
            duration_s,
            period_s,
        });
    }

    Ok(steps.max(0.0) as usize + 1)
}

/// Sample the trajectory every `period_s` seconds, from its start to its end inclusive.
pub fn sample(traj: &Trajectory, period_s: f64) -> Result<Vec<SetPoint>, RangeError> {
    let count = sample_count(traj.duration_s(), period_s)?;

    let t0 = traj.start_time_s();
    let tn = traj.end_time_s();

    let mut samples: Vec<SetPoint> = Vec::new();
    samples
        .try_reserve_exact(count)
        .map_err(|_| RangeError::TooManySamples {
            duration_s: traj.duration_s(),
            period_s,
        })?;

    samples.extend((0..count).map(|k| {
        let t = if k + 1 == count {
            tn
        }
        else {
            t0 + k as f64 * period_s
        };
        traj.state_at(t).to_set_point()
    }));

    debug!(
        "Sampled {} set-points at {} s from {:.3} s to {:.3} s",
        samples.len(),
        period_s,
        t0,
        tn
    );

    Ok(samples)
}
