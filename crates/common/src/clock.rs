//! Timing utilities for runs and progress reporting.
//!
//! - Wall-clock stamps for metadata (`generated_at`, default run names)
//! - A stopwatch anchored to a monotonic epoch
//! - A rate gate that keeps progress consumers from being flooded

use std::time::Instant;

/// A stopwatch that remembers both the monotonic start and the wall-clock
/// time it was started at.
#[derive(Debug, Clone)]
pub struct Stopwatch {
    epoch: Instant,

    /// Wall-clock time at epoch (RFC 3339 string).
    epoch_wall: String,
}

impl Stopwatch {
    /// Start a stopwatch anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: now_iso(),
        }
    }

    /// Nanoseconds elapsed since start.
    pub fn elapsed_ns(&self) -> u64 {
        self.epoch.elapsed().as_nanos() as u64
    }

    /// Seconds elapsed since start.
    pub fn elapsed_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Wall-clock time the stopwatch was started at.
    pub fn started_at(&self) -> &str {
        &self.epoch_wall
    }
}

/// Current local time as an RFC 3339 string.
pub fn now_iso() -> String {
    chrono::Local::now().to_rfc3339()
}

/// Local timestamp used for default run names (`20240131_235959`).
pub fn run_stamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Decides when a progress update is worth forwarding.
///
/// An update passes when the fraction moved by at least `min_step` since the
/// last forwarded update, when `min_interval_ns` has elapsed, or when it is
/// the first or final (`>= 1.0`) update.
#[derive(Debug)]
pub struct RateGate {
    min_step: f64,
    min_interval_ns: u64,
    last_fraction: Option<f64>,
    last_tick_ns: u64,
}

impl RateGate {
    /// Create a gate forwarding at most every `min_step` of progress or every
    /// `min_interval_ns` nanoseconds, whichever comes first.
    pub fn new(min_step: f64, min_interval_ns: u64) -> Self {
        Self {
            min_step: min_step.max(0.0),
            min_interval_ns,
            last_fraction: None,
            last_tick_ns: 0,
        }
    }

    /// The default gate: 1% progress or one second.
    pub fn per_percent_or_second() -> Self {
        Self::new(0.01, 1_000_000_000)
    }

    /// Check if an update at `fraction`, observed at `current_ns`, should be
    /// forwarded. Returns true and updates internal state if so.
    pub fn should_pass(&mut self, fraction: f64, current_ns: u64) -> bool {
        let pass = match self.last_fraction {
            None => true,
            Some(_) if fraction >= 1.0 => true,
            Some(last) => {
                (fraction - last).abs() >= self.min_step
                    || current_ns >= self.last_tick_ns + self.min_interval_ns
            }
        };
        if pass {
            self.last_fraction = Some(fraction);
            self.last_tick_ns = current_ns;
        }
        pass
    }
}
