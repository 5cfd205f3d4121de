//! Common timing helpers for focus_core.

use std::time::{Duration, Instant};

/// Inter-edge delay for a step train: half the pulse period at
/// `speed_rps`, never shorter than `floor`.
#[inline]
pub fn edge_delay(steps_per_rev: u32, speed_rps: f64, floor: Duration) -> Duration {
    let secs = 1.0 / (2.0 * f64::from(steps_per_rev.max(1)) * speed_rps);
    Duration::try_from_secs_f64(secs).unwrap_or(floor).max(floor)
}

/// Fires at most once per `interval` of clock time.
#[derive(Debug, Clone, Copy)]
pub struct PollTimer {
    last: Instant,
    interval: Duration,
}

impl PollTimer {
    pub fn new(now: Instant, interval: Duration) -> Self {
        Self {
            last: now,
            interval,
        }
    }

    /// True when at least `interval` has passed since the last firing;
    /// firing rearms the timer.
    pub fn due(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last) >= self.interval {
            self.last = now;
            true
        } else {
            false
        }
    }
}
