//! Elapsed-time estimators
//!
//! The suspend controller asks "how long has this turn been running?" at
//! every yield point. Reading a clock that often is expensive (and on some
//! hosts the clock itself may stall), so besides the exact clock there are
//! two cheaper estimators.

use crate::config::{EstimatorKind, RuntimeConfig};
use std::time::Instant;

pub trait ElapsedTimeEstimator {
    /// Estimated milliseconds since the last reset
    fn elapsed_time(&mut self) -> u64;

    fn reset(&mut self);
}

/* ===================== Exact ===================== */

/// Reads the monotonic clock on every query
#[derive(Debug)]
pub struct ExactEstimator {
    start: Instant,
}

impl ExactEstimator {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for ExactEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl ElapsedTimeEstimator for ExactEstimator {
    fn elapsed_time(&mut self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn reset(&mut self) {
        self.start = Instant::now();
    }
}

/* ===================== Countdown ===================== */

/// Purely logical: reports the interval as exceeded on every
/// `time_per_elapsed`-th query and zero otherwise.
#[derive(Debug)]
pub struct CountdownEstimator {
    time_per_elapsed: u64,
    remaining: u64,
}

impl CountdownEstimator {
    pub fn new(time_per_elapsed: u64) -> Self {
        let time_per_elapsed = time_per_elapsed.max(1);
        Self {
            time_per_elapsed,
            remaining: time_per_elapsed,
        }
    }
}

impl ElapsedTimeEstimator for CountdownEstimator {
    fn elapsed_time(&mut self) -> u64 {
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            u64::MAX
        } else {
            0
        }
    }

    fn reset(&mut self) {
        self.remaining = self.time_per_elapsed;
    }
}

/* ===================== Velocity ===================== */

/// Counts queries and converts them to time using a measured velocity
/// (queries per millisecond). The clock is only read once every
/// `resample_interval` queries.
#[derive(Debug)]
pub struct VelocityEstimator {
    resample_interval: u64,
    /// Queries since the last reset
    distance: u64,
    /// Queries since the last sample
    since_sample: u64,
    last_sample: Instant,
    /// Queries per millisecond
    velocity: f64,
}

impl VelocityEstimator {
    pub fn new(resample_interval: u64) -> Self {
        Self {
            resample_interval: resample_interval.max(1),
            distance: 0,
            since_sample: 0,
            last_sample: Instant::now(),
            velocity: 1.0,
        }
    }

    fn resample(&mut self) {
        let now = Instant::now();
        let ms = now.duration_since(self.last_sample).as_secs_f64() * 1000.0;
        if ms > 0.0 {
            self.velocity = (self.since_sample as f64 / ms).max(f64::MIN_POSITIVE);
        }
        self.since_sample = 0;
        self.last_sample = now;
    }
}

impl ElapsedTimeEstimator for VelocityEstimator {
    fn elapsed_time(&mut self) -> u64 {
        self.distance += 1;
        self.since_sample += 1;
        if self.since_sample >= self.resample_interval {
            self.resample();
        }
        (self.distance as f64 / self.velocity) as u64
    }

    fn reset(&mut self) {
        self.distance = 0;
    }
}

/// Create the estimator selected by `config`
pub fn make_estimator(config: &RuntimeConfig) -> Box<dyn ElapsedTimeEstimator> {
    match config.estimator {
        EstimatorKind::Exact => Box::new(ExactEstimator::new()),
        EstimatorKind::Countdown => Box::new(CountdownEstimator::new(config.time_per_elapsed)),
        EstimatorKind::Velocity => Box::new(VelocityEstimator::new(config.resample_interval)),
    }
}
