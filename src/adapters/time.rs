//! Time adapters.
//!
//! - [`MonotonicClock`] — on `target_os = "espidf"` wraps
//!   `esp_timer_get_time()` (microsecond, monotonic); elsewhere uses
//!   `std::time::Instant`.
//! - [`ManualClock`] — a clock advanced by hand, for host tests and the
//!   simulator.  Shareable across threads.

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::{AtomicU64, Ordering};

use crate::app::ports::Clock;

/// Boot-relative monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// Seconds since boot.
    pub fn uptime_secs(&self) -> u64 {
        self.now_us() / 1_000_000
    }
}

impl Clock for MonotonicClock {
    #[cfg(target_os = "espidf")]
    fn now_us(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64
    }

    #[cfg(not(target_os = "espidf"))]
    fn now_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}

/// Hand-driven clock.  Host only (the ESP32-S3 has no 64-bit atomics).
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default)]
pub struct ManualClock {
    now_us: AtomicU64,
}

#[cfg(not(target_os = "espidf"))]
impl ManualClock {
    pub const fn new(start_us: u64) -> Self {
        Self {
            now_us: AtomicU64::new(start_us),
        }
    }

    pub fn set_us(&self, us: u64) {
        self.now_us.store(us, Ordering::SeqCst);
    }

    pub fn advance_us(&self, us: u64) {
        self.now_us.fetch_add(us, Ordering::SeqCst);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance_us(ms * 1000);
    }
}

#[cfg(not(target_os = "espidf"))]
impl Clock for ManualClock {
    fn now_us(&self) -> u64 {
        self.now_us.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic_never_goes_backwards() {
        let c = MonotonicClock::new();
        let a = c.now_us();
        let b = c.now_us();
        assert!(b >= a);
    }

    #[test]
    fn manual_clock_advances() {
        let c = ManualClock::new(5);
        c.advance_ms(2);
        assert_eq!(c.now_us(), 2005);
        c.set_us(0);
        assert_eq!(c.now_us(), 0);
    }
}
