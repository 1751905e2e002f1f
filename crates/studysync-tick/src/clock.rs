//! Wall-clock source and the countdown arithmetic built on it.
//!
//! Session state never reads the system time directly. Every transition
//! takes `now` in milliseconds, and the actor that owns the session asks
//! a [`Clock`] for it. Tests swap in a [`ManualClock`] and move time by
//! hand.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Source of "now" as milliseconds since the Unix epoch.
pub trait Clock: Send + Sync + 'static {
    fn now_ms(&self) -> u64;
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        // A clock set before 1970 reads as the epoch.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// A clock that only moves when told to.
///
/// Shared through an `Arc` so a test can keep advancing it after handing
/// it to a registry.
///
/// ```rust
/// use std::time::Duration;
/// use studysync_tick::{Clock, ManualClock};
///
/// let clock = ManualClock::new(1_000);
/// clock.advance(Duration::from_secs(2));
/// assert_eq!(clock.now_ms(), 3_000);
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
        }
    }

    /// Jumps to an absolute time.
    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }

    /// Moves time forward.
    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Countdown arithmetic
// ---------------------------------------------------------------------------

/// Whole seconds the timer has actually been running.
///
/// `paused_ms` is the total time spent paused since `start_ms`. Any
/// negative intermediate (clock skew, pause longer than the wall span)
/// clamps to zero.
pub fn elapsed_secs(now_ms: u64, start_ms: u64, paused_ms: u64) -> u64 {
    now_ms.saturating_sub(start_ms).saturating_sub(paused_ms) / 1_000
}

/// Seconds left on a countdown of `duration_secs`. Never underflows.
pub fn remaining_secs(duration_secs: u64, now_ms: u64, start_ms: u64, paused_ms: u64) -> u64 {
    duration_secs.saturating_sub(elapsed_secs(now_ms, start_ms, paused_ms))
}
