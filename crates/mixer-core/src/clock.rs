//! Time sources for the scheduler.
//!
//! [`TickSource`] decides *when* the next tick happens; the simulator only
//! decides *what* a tick does. Production uses [`FixedRateClock`], tests use
//! [`ImmediateTicks`] to run whole fill/mix/drain cycles without sleeping.

use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

pub trait TickSource: Send {
    /// Blocks until the next tick is due. Returns how late the wake-up was.
    fn wait_next(&mut self) -> Duration;
}

/// Wall-clock ticks at a fixed period.
///
/// The first tick fires immediately. Deadlines advance by exactly one period;
/// after an overrun of more than a period the schedule restarts one period
/// after the late wake-up instead of firing a burst of catch-up ticks.
#[derive(Debug, Clone)]
pub struct FixedRateClock {
    period: Duration,
    next_tick: Option<Instant>,
}

impl FixedRateClock {
    pub fn new(period: Duration) -> Self {
        assert!(!period.is_zero(), "tick period must be non-zero");
        Self {
            period,
            next_tick: None,
        }
    }
}

impl TickSource for FixedRateClock {
    fn wait_next(&mut self) -> Duration {
        let now = Instant::now();
        let deadline = *self.next_tick.get_or_insert(now);
        if now < deadline {
            thread::sleep(deadline - now);
        }

        let woke = Instant::now();
        let lateness = woke.saturating_duration_since(deadline);
        let next = deadline + self.period;
        self.next_tick = Some(if next < woke { woke + self.period } else { next });
        lateness
    }
}

/// Ticks as fast as the caller asks for them.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateTicks;

impl TickSource for ImmediateTicks {
    fn wait_next(&mut self) -> Duration {
        Duration::ZERO
    }
}

impl<T: TickSource + ?Sized> TickSource for Box<T> {
    fn wait_next(&mut self) -> Duration {
        (**self).wait_next()
    }
}

/// Process-wide reference point for snapshot timestamps.
#[derive(Debug, Clone, Copy)]
pub struct TimeBase {
    start: Instant,
}

impl TimeBase {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Monotonic microseconds since start.
    pub fn now_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }

    /// Wall-clock microseconds since Unix epoch.
    pub fn unix_us(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_micros() as u64
    }
}

impl Default for TimeBase {
    fn default() -> Self {
        Self::new()
    }
}
