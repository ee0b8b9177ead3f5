//! Monotonic time sources for cache expiry and debounce deadlines.
//!
//! Time is expressed as a [`Duration`] since the clock's own origin, so the
//! same code runs on native targets, in the browser (where `Instant` is not
//! available) and under a hand-driven clock in tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

pub trait Clock: Send + Sync {
    /// Time elapsed since this clock's origin. Never decreases.
    fn now(&self) -> Duration;
}

/// Wall-clock time measured from construction.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    micros: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.micros
            .fetch_add(by.as_micros() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, at: Duration) {
        self.micros.store(at.as_micros() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_micros(self.micros.load(Ordering::SeqCst))
    }
}

/// `Date.now()` of the hosting JavaScript runtime.
#[cfg(feature = "wasm")]
#[derive(Debug, Clone, Copy)]
pub struct JsClock {
    origin_ms: f64,
}

#[cfg(feature = "wasm")]
impl JsClock {
    pub fn new() -> Self {
        Self {
            origin_ms: js_sys::Date::now(),
        }
    }
}

#[cfg(feature = "wasm")]
impl Default for JsClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "wasm")]
impl Clock for JsClock {
    fn now(&self) -> Duration {
        let elapsed = (js_sys::Date::now() - self.origin_ms).max(0.0);
        Duration::from_micros((elapsed * 1000.0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_moves_only_when_advanced() {
        let clock = ManualClock::new();
        assert_eq!(clock.now(), Duration::ZERO);
        clock.advance(Duration::from_millis(30));
        clock.advance(Duration::from_millis(20));
        assert_eq!(clock.now(), Duration::from_millis(50));
        clock.set(Duration::from_secs(2));
        assert_eq!(clock.now(), Duration::from_secs(2));
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
