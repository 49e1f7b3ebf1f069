//! Grain scheduling state machine
//!
//! The scheduler is a pure function of time: each tick is given "now" and
//! the grain interval and answers whether a grain is due and when to wake
//! next. The engine's worker thread supplies wall-clock time; tests supply
//! simulated time.

use std::time::Duration;

/// Shortest delay between two scheduler ticks
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Outcome of one scheduler tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// A grain should be emitted now
    pub emit: bool,
    /// Time of the next tick
    pub next_wake: Duration,
}

/// Tracks the last emission time of a playing session
#[derive(Debug, Clone, Default)]
pub struct GrainScheduler {
    last_emission: Option<Duration>,
}

impl GrainScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance to `now`
    ///
    /// The first tick of a session always emits. Afterwards a grain is due
    /// once at least `interval` has elapsed since the previous one.
    pub fn tick(&mut self, now: Duration, interval: Duration) -> Tick {
        let emit = match self.last_emission {
            None => true,
            Some(last) => now.saturating_sub(last) >= interval,
        };
        if emit {
            self.last_emission = Some(now);
        }

        Tick {
            emit,
            next_wake: now + poll_delay(interval),
        }
    }

    /// Forget the previous session
    pub fn reset(&mut self) {
        self.last_emission = None;
    }
}

/// Convert a grain interval in seconds to a whole number of nanoseconds
pub fn interval_duration(interval_secs: f64) -> Duration {
    if interval_secs.is_finite() && interval_secs > 0.0 {
        Duration::from_nanos((interval_secs * 1e9).round() as u64)
    } else {
        MIN_POLL_INTERVAL
    }
}

/// Delay before the next tick: half the grain interval, at least 1 ms
///
/// Rounded up so two polls always cover a full interval.
pub fn poll_delay(interval: Duration) -> Duration {
    let half = (interval.as_nanos() as u64 + 1) / 2;
    Duration::from_nanos(half).max(MIN_POLL_INTERVAL)
}

/// Move the cursor by `delta` seconds with unconditional looping
///
/// Reaching or passing `duration` wraps to 0; going below 0 wraps to
/// `duration + next`.
pub fn advance_cursor(position: f64, delta: f64, duration: f64) -> f64 {
    if duration.is_nan() || duration <= 0.0 {
        return 0.0;
    }

    let next = position + delta;
    if next >= duration {
        0.0
    } else if next < 0.0 {
        (duration + next).clamp(0.0, duration)
    } else if next.is_nan() {
        position.clamp(0.0, duration)
    } else {
        next
    }
}
