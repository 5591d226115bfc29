//! Shared system state.
//!
//! [`SystemState`] is the canonical snapshot of inputs and outputs.  It is
//! owned by the scheduler core and mutated only there.
//!
//! [`TachFrequencies`] is the one piece of state crossing cores: the capture
//! worker is the sole writer of each slot, the scheduler reads.  Each slot is
//! an independent atomic, so a reader may see slot 0 from one capture pass
//! and slot 1 from the next.  That per-field last-write-wins behaviour is
//! accepted; consumers must tolerate a read that is one sample stale.

use core::sync::atomic::{AtomicU32, Ordering};

/// Fan outputs (PWM out + tach in) on this board.
pub const FAN_COUNT: usize = 4;
/// Motherboard fan headers (PWM in + synthesized tach out).
pub const MBFAN_COUNT: usize = 2;
/// Temperature sensor inputs.
pub const SENSOR_COUNT: usize = 2;

/// Canonical snapshot of duty cycles, frequencies and temperatures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SystemState {
    // inputs
    /// Duty cycle (%) the host board requests on each mbfan header.
    pub mbfan_duty: [f32; MBFAN_COUNT],
    /// Measured fan tach frequency (Hz).
    pub fan_freq: [f32; FAN_COUNT],
    /// Temperature (°C).
    pub temp: [f32; SENSOR_COUNT],
    // outputs
    /// Duty cycle (%) driven to each fan.
    pub fan_duty: [f32; FAN_COUNT],
    /// Tach frequency (Hz) synthesized toward each mbfan header.
    pub mbfan_freq: [f32; MBFAN_COUNT],
    /// Set by any gated input change; cleared by the output update.
    pub dirty: bool,
}

impl Default for SystemState {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemState {
    pub const fn new() -> Self {
        Self {
            mbfan_duty: [0.0; MBFAN_COUNT],
            fan_freq: [0.0; FAN_COUNT],
            temp: [0.0; SENSOR_COUNT],
            fan_duty: [0.0; FAN_COUNT],
            mbfan_freq: [0.0; MBFAN_COUNT],
            dirty: false,
        }
    }

    /// Reset every field to zero.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Return the dirty flag and clear it.
    pub fn take_dirty(&mut self) -> bool {
        core::mem::take(&mut self.dirty)
    }
}

// ───────────────────────────────────────────────────────────────
// Cross-core tach slots
// ───────────────────────────────────────────────────────────────

/// Tach frequencies published by the capture worker.
///
/// `f32` values are stored as raw bits in `AtomicU32`s.  Every field has
/// exactly one writer (the worker); Release/Acquire ordering makes a
/// published value visible to the scheduler on its next read.
#[derive(Debug)]
pub struct TachFrequencies {
    hz: [AtomicU32; FAN_COUNT],
    published: [AtomicU32; FAN_COUNT],
    // 32-bit: the ESP32-S3 has no native 64-bit atomics.
    worker_max_loop_us: AtomicU32,
    worker_iterations: AtomicU32,
}

impl Default for TachFrequencies {
    fn default() -> Self {
        Self::new()
    }
}

impl TachFrequencies {
    pub const fn new() -> Self {
        Self {
            hz: [const { AtomicU32::new(0) }; FAN_COUNT],
            published: [const { AtomicU32::new(0) }; FAN_COUNT],
            worker_max_loop_us: AtomicU32::new(0),
            worker_iterations: AtomicU32::new(0),
        }
    }

    /// Publish a new frequency for `channel`.  Worker core only.
    pub fn publish(&self, channel: usize, hz: f32) {
        if let Some(slot) = self.hz.get(channel) {
            slot.store(hz.to_bits(), Ordering::Release);
            self.published[channel].fetch_add(1, Ordering::Release);
        }
    }

    /// Latest frequency for `channel` (0.0 for unknown channels).
    pub fn load(&self, channel: usize) -> f32 {
        self.hz
            .get(channel)
            .map_or(0.0, |slot| f32::from_bits(slot.load(Ordering::Acquire)))
    }

    /// Read every slot.  Not transactionally consistent across channels.
    pub fn snapshot(&self) -> [f32; FAN_COUNT] {
        core::array::from_fn(|i| self.load(i))
    }

    /// Number of samples ever published on `channel` (wraps).
    pub fn published(&self, channel: usize) -> u32 {
        self.published
            .get(channel)
            .map_or(0, |c| c.load(Ordering::Acquire))
    }

    /// Sum of [`published`](Self::published) over all channels.
    pub fn total_published(&self) -> u64 {
        (0..FAN_COUNT).map(|i| u64::from(self.published(i))).sum()
    }

    pub(crate) fn record_worker_loop(&self, iterations: u64, max_loop_us: u64) {
        self.worker_iterations
            .store(iterations as u32, Ordering::Relaxed);
        self.worker_max_loop_us.store(
            u32::try_from(max_loop_us).unwrap_or(u32::MAX),
            Ordering::Relaxed,
        );
    }

    /// Worst worker iteration latency seen so far (µs).
    pub fn worker_max_loop_us(&self) -> u64 {
        u64::from(self.worker_max_loop_us.load(Ordering::Relaxed))
    }

    /// Worker loop iterations (wraps at `u32::MAX`).
    pub fn worker_iterations(&self) -> u64 {
        u64::from(self.worker_iterations.load(Ordering::Relaxed))
    }
}
