//! Time sources shared by the conductor, analyzer and wave director.
//!
//! Every component reads "now" through a [`TimeSource`] handed to it at
//! construction. Hosts pass [`monotonic_time_source`]; tests and the
//! simulation harness pass a [`ManualClock`] so frames can be stepped
//! deterministically without sleeping.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Zero-argument function returning the current time in milliseconds.
///
/// Must be monotonically non-decreasing within a session.
pub type TimeSource = Arc<dyn Fn() -> f64 + Send + Sync>;

/// Build a time source backed by [`Instant`], starting at 0 ms when called.
pub fn monotonic_time_source() -> TimeSource {
    let start = Instant::now();
    Arc::new(move || start.elapsed().as_secs_f64() * 1000.0)
}

/// Manually stepped clock for deterministic frame simulation.
///
/// Clones share the same underlying time, so a test can keep one handle
/// and hand [`ManualClock::source`] to each component.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_bits: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock reading `start_ms`.
    pub fn new(start_ms: f64) -> Self {
        let start = if start_ms.is_finite() { start_ms } else { 0.0 };
        Self {
            now_bits: Arc::new(AtomicU64::new(start.to_bits())),
        }
    }

    /// Current time in milliseconds.
    pub fn now(&self) -> f64 {
        f64::from_bits(self.now_bits.load(Ordering::Relaxed))
    }

    /// Jump to `ms`. Earlier or non-finite values are ignored.
    pub fn set(&self, ms: f64) {
        if ms.is_finite() && ms >= self.now() {
            self.now_bits.store(ms.to_bits(), Ordering::Relaxed);
        }
    }

    /// Move forward by `delta_ms`. Negative or non-finite deltas are ignored.
    pub fn advance(&self, delta_ms: f64) {
        if delta_ms.is_finite() && delta_ms > 0.0 {
            self.set(self.now() + delta_ms);
        }
    }

    /// Time source reading this clock.
    pub fn source(&self) -> TimeSource {
        let clock = self.clone();
        Arc::new(move || clock.now())
    }
}
