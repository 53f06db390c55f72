//! Session clocks.
//!
//! Every timestamp in a session is a `Duration` measured from the session
//! origin on a monotonic clock. The wall-clock instant of that origin is kept
//! alongside so position files can be written as seconds since the epoch.
//!
//! - `MonotonicClock`: `Instant`-backed, sleeps the calling thread.
//! - `ManualClock`: virtual time for simulations and tests. `sleep` advances
//!   the clock instead of blocking.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Time source shared by the scheduler and the capture sources.
pub trait Clock: Send + Sync {
    /// Elapsed time since the session origin.
    fn now(&self) -> Duration;

    /// Block (or advance virtual time) for `duration`.
    fn sleep(&self, duration: Duration);

    /// Wall-clock instant corresponding to `now() == 0`.
    fn epoch_origin(&self) -> SystemTime;
}

pub type SharedClock = Arc<dyn Clock>;

/// Monotonic clock anchored at construction.
#[derive(Clone, Debug)]
pub struct MonotonicClock {
    origin: Instant,
    epoch_origin: SystemTime,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            epoch_origin: SystemTime::now(),
        }
    }

    pub fn shared() -> SharedClock {
        Arc::new(Self::new())
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }

    fn epoch_origin(&self) -> SystemTime {
        self.epoch_origin
    }
}

/// Deterministic clock. Time only moves through `advance` and `sleep`.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Duration>,
    epoch_origin: SystemTime,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::with_epoch_origin(UNIX_EPOCH)
    }

    pub fn with_epoch_origin(epoch_origin: SystemTime) -> Self {
        Self {
            now: Mutex::new(Duration::ZERO),
            epoch_origin,
        }
    }

    /// Move virtual time forward, e.g. to simulate processing cost.
    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += duration;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }

    fn epoch_origin(&self) -> SystemTime {
        self.epoch_origin
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Duration {
        (**self).now()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }

    fn epoch_origin(&self) -> SystemTime {
        (**self).epoch_origin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_sleep_advances_virtual_time() {
        let clock = ManualClock::new();
        assert_eq!(clock.now(), Duration::ZERO);

        clock.sleep(Duration::from_millis(250));
        clock.advance(Duration::from_millis(50));

        assert_eq!(clock.now(), Duration::from_millis(300));
    }

    #[test]
    fn monotonic_clock_never_goes_backwards() {
        let clock = MonotonicClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
