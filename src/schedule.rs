//! Drift-corrected frame pacing.
//!
//! The scheduler keeps an absolute `next_deadline` that advances by exactly
//! one interval per call, so per-call wake-up error does not accumulate. When
//! the loop overruns a deadline the scheduler reports a lag event and returns
//! without sleeping; the loop then runs flat out until it is back on schedule.

use std::time::Duration;

use crate::clock::Clock;

/// Outcome of one [`FrameScheduler::wait_until_next_deadline`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tick {
    /// Deadline was ahead; slept for the remaining time.
    OnTime { slept: Duration },
    /// Deadline had already passed by `overrun`; no sleep.
    Lagged { overrun: Duration },
}

impl Tick {
    pub fn is_lagged(&self) -> bool {
        matches!(self, Tick::Lagged { .. })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub ticks: u64,
    pub lag_events: u64,
    pub worst_overrun: Duration,
    pub total_overrun: Duration,
}

pub struct FrameScheduler<C: Clock> {
    clock: C,
    interval: Duration,
    next_deadline: Duration,
    stats: SchedulerStats,
}

impl<C: Clock> FrameScheduler<C> {
    /// Starts the schedule at the clock's current time: the first call
    /// returns immediately.
    pub fn new(clock: C, interval: Duration) -> Self {
        let next_deadline = clock.now();
        Self {
            clock,
            interval,
            next_deadline,
            stats: SchedulerStats::default(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn next_deadline(&self) -> Duration {
        self.next_deadline
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Block until the current deadline, then advance it by one interval.
    ///
    /// Call once per loop iteration, before acquiring the next frame.
    pub fn wait_until_next_deadline(&mut self) -> Tick {
        let now = self.clock.now();
        let tick = match self.next_deadline.checked_sub(now) {
            Some(remaining) => {
                if !remaining.is_zero() {
                    self.clock.sleep(remaining);
                }
                Tick::OnTime { slept: remaining }
            }
            None => {
                let overrun = now - self.next_deadline;
                self.stats.lag_events += 1;
                self.stats.total_overrun += overrun;
                self.stats.worst_overrun = self.stats.worst_overrun.max(overrun);
                log::warn!(
                    "frame scheduler lagging by {:.1} ms (lag events: {})",
                    overrun.as_secs_f64() * 1000.0,
                    self.stats.lag_events
                );
                Tick::Lagged { overrun }
            }
        };
        self.stats.ticks += 1;
        self.next_deadline += self.interval;
        tick
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }
}
