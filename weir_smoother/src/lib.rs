//! Exponentially folded counters.
//!
//! This library supports the smoothed throughput accounting done by the rest
//! of the weir project. A [`Smoother`] tracks a scalar level and an
//! exponentially folded estimate of it, exposing the estimate two ways: as a
//! smoothed total and as a smoothed rate of change.

#![deny(clippy::all)]
#![deny(clippy::cargo)]
#![deny(clippy::perf)]
#![deny(clippy::suspicious)]
#![deny(clippy::complexity)]
#![deny(clippy::unnecessary_to_owned)]
#![deny(clippy::float_cmp)]
#![deny(clippy::large_stack_arrays)]
#![deny(clippy::large_futures)]
#![deny(clippy::rc_buffer)]
#![deny(clippy::redundant_allocation)]
#![deny(unused_extern_crates)]
#![deny(unused_allocation)]
#![deny(unused_assignments)]
#![deny(unused_comparisons)]
#![deny(unreachable_pub)]
#![deny(missing_docs)]
#![deny(missing_copy_implementations)]
#![deny(missing_debug_implementations)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::multiple_crate_versions)]

use std::time::Instant;

/// Clock ticks per second. A tick is one microsecond.
pub const TICKS_PER_SECOND: u64 = 1_000_000;

/// Convert clock ticks to seconds.
#[must_use]
pub fn seconds(ticks: u64) -> f64 {
    ticks as f64 / TICKS_PER_SECOND as f64
}

/// The `Clock` used by every consumer of [`Smoother`].
///
/// Smoothers themselves are pure state machines that take time as an
/// argument; this trait is how their owners obtain that time, letting tests
/// substitute a hand-cranked clock.
pub trait Clock {
    /// The number of ticks elapsed since the clock was created.
    fn ticks_elapsed(&self) -> u64;
}

#[derive(Debug, Clone, Copy)]
/// A clock that operates with respect to real-clock time.
pub struct RealClock {
    start: Instant,
}

impl Default for RealClock {
    fn default() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Clock for RealClock {
    /// Return the number of ticks since `Clock` was created.
    ///
    /// # Panics
    ///
    /// Function will panic if the number of ticks elapsed is greater than `u64::MAX`.
    #[allow(clippy::cast_possible_truncation)]
    fn ticks_elapsed(&self) -> u64 {
        let now = Instant::now();
        let ticks_since: u128 = now.duration_since(self.start).as_micros();
        assert!(
            ticks_since <= u128::from(u64::MAX),
            "584,554 years elapsed since last call!"
        );
        ticks_since as u64
    }
}

/// A scalar level with an exponentially folded estimate.
///
/// The estimate relaxes toward the level with time constant `folding_time`:
/// held at a constant level for much longer than the folding time, the
/// smoothed total equals the level to within any tolerance. Two update
/// primitives are provided. [`Smoother::set_total`] tracks an absolute level
/// and is read back through [`Smoother::smooth_total`];
/// [`Smoother::add_delta`] accumulates increments and is read back through
/// [`Smoother::smooth_rate`], which converges on the average increment per
/// second.
///
/// Time is an explicit argument to every operation, expressed in seconds.
/// Callers are responsible for passing a non-decreasing sequence of
/// timestamps; a timestamp earlier than the last one observed folds nothing.
#[derive(Debug, Clone, Copy)]
pub struct Smoother {
    folding_time: f64,
    time: f64,
    total: f64,
    estimate: f64,
}

impl Smoother {
    /// Create a new `Smoother` with the given folding time in seconds.
    ///
    /// # Panics
    ///
    /// Function will panic if `folding_time` is not strictly positive.
    #[must_use]
    pub fn new(folding_time: f64) -> Self {
        assert!(
            folding_time > 0.0,
            "smoother folding time must be strictly positive"
        );
        Self {
            folding_time,
            time: 0.0,
            total: 0.0,
            estimate: 0.0,
        }
    }

    /// Forget all history, snapping both the level and the estimate to
    /// `value`.
    pub fn reset(&mut self, value: f64) {
        self.time = 0.0;
        self.total = value;
        self.estimate = value;
    }

    /// Overwrite the tracked level. The smoothed projections relax toward
    /// `value` with the folding time constant.
    pub fn set_total(&mut self, now: f64, value: f64) {
        self.add_delta(now, value - self.total);
    }

    /// Accumulate `delta` into the tracked level.
    pub fn add_delta(&mut self, now: f64, delta: f64) {
        self.fold(now);
        self.total += delta;
    }

    /// The estimate folded to `now`.
    #[must_use]
    pub fn smooth_total(&self, now: f64) -> f64 {
        self.estimate_at(now)
    }

    /// The rate of change implied by the estimate's distance from the level
    /// at `now`. Under a steady stream of [`Smoother::add_delta`] calls this
    /// converges on the average delta per second.
    #[must_use]
    pub fn smooth_rate(&self, now: f64) -> f64 {
        (self.total - self.estimate_at(now)) / self.folding_time
    }

    /// The unsmoothed level.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.total
    }

    fn fold(&mut self, now: f64) {
        self.estimate = self.estimate_at(now);
        if now > self.time {
            self.time = now;
        }
    }

    fn estimate_at(&self, now: f64) -> f64 {
        let elapsed = now - self.time;
        if elapsed <= 0.0 {
            return self.estimate;
        }
        self.estimate + (self.total - self.estimate) * (1.0 - (-elapsed / self.folding_time).exp())
    }
}
