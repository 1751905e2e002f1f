//! Countdown tick scheduler for StudySync.
//!
//! Every running study session re-derives its remaining time once per
//! tick (one second by default). The scheduler only decides *when* a
//! tick fires; the countdown itself is computed from wall-clock
//! timestamps (see [`remaining_secs`]), so a late or skipped tick never
//! makes the timer drift.
//!
//! # Running vs. stopped
//!
//! A new scheduler is stopped. While stopped,
//! [`TickScheduler::wait_for_tick`] pends forever, which is what a
//! waiting, paused or ended session wants: no ticks, no work.
//!
//! # Integration
//!
//! The scheduler sits inside a session actor's `tokio::select!` loop:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* start / pause / join ... */ }
//!         _ = scheduler.wait_for_tick() => {
//!             session.tick(clock.now_ms());
//!         }
//!     }
//! }
//! ```

mod clock;

pub use clock::{Clock, ManualClock, SystemClock, elapsed_secs, remaining_secs};

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

/// Default cadence of a running countdown.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// Tick info (returned to caller each tick)
// ---------------------------------------------------------------------------

/// Information about a fired tick, returned by [`TickScheduler::wait_for_tick`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickInfo {
    /// Monotonically increasing tick number (starts at 1, never reset).
    pub tick: u64,
    /// `true` if this tick fired noticeably late.
    pub overrun: bool,
    /// Whole intervals that passed without a tick because of the overrun.
    pub ticks_skipped: u64,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Fixed-interval tick source for a single session.
///
/// Late ticks are never replayed: after an overrun the next tick is
/// scheduled one interval from *now*. Since the countdown is recomputed
/// from timestamps, skipping is lossless.
pub struct TickScheduler {
    interval: Duration,
    tick_count: u64,
    /// When the next tick should fire. `None` while stopped.
    next_tick: Option<Instant>,
}

impl TickScheduler {
    /// Creates a stopped scheduler.
    ///
    /// A zero interval is bumped to one millisecond so the loop can never
    /// spin.
    pub fn new(interval: Duration) -> Self {
        let interval = if interval.is_zero() {
            warn!("tick interval of zero requested, using 1ms");
            Duration::from_millis(1)
        } else {
            interval
        };
        debug!(interval_ms = interval.as_millis() as u64, "tick scheduler created");
        Self {
            interval,
            tick_count: 0,
            next_tick: None,
        }
    }

    /// Starts ticking. The first tick fires one interval from now.
    ///
    /// Calling `start` on a running scheduler keeps its cadence.
    pub fn start(&mut self) {
        if self.next_tick.is_none() {
            self.next_tick = Some(Instant::now() + self.interval);
            debug!(tick = self.tick_count, "tick scheduler started");
        }
    }

    /// Stops ticking. Idempotent.
    pub fn stop(&mut self) {
        if self.next_tick.take().is_some() {
            debug!(tick = self.tick_count, "tick scheduler stopped");
        }
    }

    /// Whether ticks are currently scheduled.
    pub fn is_running(&self) -> bool {
        self.next_tick.is_some()
    }

    /// Total ticks fired so far.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// The configured interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits until the next tick is due.
    ///
    /// While stopped this future pends forever; `tokio::select!` keeps
    /// serving its other branches. The future is cancel-safe: dropping it
    /// before it resolves leaves the schedule untouched.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let Some(next) = self.next_tick else {
            std::future::pending::<()>().await;
            unreachable!("pending() never resolves");
        };

        time::sleep_until(next).await;

        let now = Instant::now();
        self.tick_count += 1;

        // More than 10% of an interval late counts as an overrun.
        let late_by = now.saturating_duration_since(next);
        let overrun = late_by > self.interval / 10;
        let ticks_skipped = if overrun {
            (late_by.as_nanos() / self.interval.as_nanos()) as u64
        } else {
            0
        };
        if ticks_skipped > 0 {
            warn!(
                tick = self.tick_count,
                skipped = ticks_skipped,
                late_ms = late_by.as_secs_f64() * 1000.0,
                "tick overrun, skipping ahead"
            );
        }

        self.next_tick = Some(now + self.interval);
        trace!(tick = self.tick_count, overrun, "tick fired");

        TickInfo {
            tick: self.tick_count,
            overrun,
            ticks_skipped,
        }
    }
}

impl Default for TickScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_INTERVAL)
    }
}
