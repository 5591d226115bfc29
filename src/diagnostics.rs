//! Runtime diagnostics.
//!
//! [`LoopMetrics`] is updated by the scheduler core on every task run and
//! combined with the worker's counters into a [`RuntimeMetrics`] snapshot
//! on demand (the `SYS:STAT?` console command).
//!
//! A custom panic hook logs the panic reason before the runtime aborts and
//! the chip resets.

use serde::Serialize;

use crate::app::ports::TickInfo;
use crate::state::TachFrequencies;

/// Scheduler-core counters.
#[derive(Debug, Clone, Default)]
pub struct LoopMetrics {
    boot_us: Option<u64>,
    now_us: u64,
    iterations: u64,
    max_loop_us: u64,
    pub sensor_errors: u32,
    pub actuator_errors: u32,
    pub output_writes: u32,
}

impl LoopMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in the scheduler's per-iteration info.
    pub fn observe(&mut self, tick: &TickInfo) {
        if self.boot_us.is_none() {
            self.boot_us = Some(tick.now_us);
        }
        self.now_us = tick.now_us;
        self.iterations = tick.iteration;
        self.max_loop_us = tick.max_loop_us;
    }

    pub fn uptime_secs(&self) -> u64 {
        self.now_us.saturating_sub(self.boot_us.unwrap_or(0)) / 1_000_000
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    pub fn max_loop_us(&self) -> u64 {
        self.max_loop_us
    }

    /// Combine with the worker-side counters.
    pub fn snapshot(&self, freqs: &TachFrequencies, lockouts: u32) -> RuntimeMetrics {
        RuntimeMetrics {
            uptime_secs: self.uptime_secs(),
            core0_iterations: self.iterations,
            core0_max_loop_us: self.max_loop_us,
            core1_iterations: freqs.worker_iterations(),
            core1_max_loop_us: freqs.worker_max_loop_us(),
            tach_samples: freqs.total_published(),
            sensor_errors: self.sensor_errors,
            actuator_errors: self.actuator_errors,
            output_writes: self.output_writes,
            lockouts,
            heap_free: heap_free(),
        }
    }
}

/// Point-in-time diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuntimeMetrics {
    pub uptime_secs: u64,
    pub core0_iterations: u64,
    pub core0_max_loop_us: u64,
    pub core1_iterations: u64,
    pub core1_max_loop_us: u64,
    pub tach_samples: u64,
    pub sensor_errors: u32,
    pub actuator_errors: u32,
    pub output_writes: u32,
    pub lockouts: u32,
    /// Free heap in bytes; `None` where the platform cannot tell.
    pub heap_free: Option<u32>,
}

#[cfg(target_os = "espidf")]
fn heap_free() -> Option<u32> {
    // SAFETY: read-only allocator statistic.
    Some(unsafe { esp_idf_svc::sys::esp_get_free_heap_size() })
}

#[cfg(not(target_os = "espidf"))]
fn heap_free() -> Option<u32> {
    None
}

// ───────────────────────────────────────────────────────────────
// Panic hook
// ───────────────────────────────────────────────────────────────

/// Human-readable reason from a panic payload.
pub fn panic_reason<'a>(payload: &'a (dyn std::any::Any + Send)) -> &'a str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "unknown panic"
    }
}

/// Install a panic hook that logs the reason (and location) before the
/// default abort path resets the chip.
pub fn install_panic_handler() {
    std::panic::set_hook(Box::new(|info| {
        let reason = panic_reason(info.payload());
        match info.location() {
            Some(loc) => log::error!("PANIC: {} at {}:{}", reason, loc.file(), loc.line()),
            None => log::error!("PANIC: {}", reason),
        }
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observe_tracks_uptime_from_first_tick() {
        let mut m = LoopMetrics::new();
        m.observe(&TickInfo {
            now_us: 5_000_000,
            iteration: 1,
            max_loop_us: 0,
        });
        m.observe(&TickInfo {
            now_us: 17_500_000,
            iteration: 40,
            max_loop_us: 900,
        });
        assert_eq!(m.uptime_secs(), 12);
        assert_eq!(m.iterations(), 40);
        assert_eq!(m.max_loop_us(), 900);
    }

    #[test]
    fn snapshot_merges_worker_counters() {
        let freqs = TachFrequencies::new();
        freqs.publish(0, 10.0);
        freqs.publish(3, 11.0);
        let mut m = LoopMetrics::new();
        m.actuator_errors = 2;
        let snap = m.snapshot(&freqs, 1);
        assert_eq!(snap.tach_samples, 2);
        assert_eq!(snap.actuator_errors, 2);
        assert_eq!(snap.lockouts, 1);
    }

    #[test]
    fn panic_reason_from_payloads() {
        let s: Box<dyn std::any::Any + Send> = Box::new("static msg");
        assert_eq!(panic_reason(s.as_ref()), "static msg");
        let s: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_reason(s.as_ref()), "owned");
        let s: Box<dyn std::any::Any + Send> = Box::new(7u8);
        assert_eq!(panic_reason(s.as_ref()), "unknown panic");
    }
}
