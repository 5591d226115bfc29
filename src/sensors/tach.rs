//! Fan tachometer capture.
//!
//! Each fan's open-collector tach line pulses (typically twice per
//! revolution).  A GPIO ISR increments a per-channel atomic counter on every
//! rising edge; the capture worker periodically swaps each counter to zero
//! and converts the count over the elapsed window into a frequency.
//!
//! Channels are visited round-robin, one per [`TachCapture::poll`] call, so
//! a single poll never does more than one channel's worth of work.

use core::sync::atomic::{AtomicU32, Ordering};

use log::debug;

use crate::app::ports::{TachCapture, TachReading};
use crate::state::FAN_COUNT;

/// One pulse counter per fan channel.
#[derive(Debug)]
pub struct PulseCounters([AtomicU32; FAN_COUNT]);

impl Default for PulseCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl PulseCounters {
    pub const fn new() -> Self {
        Self([const { AtomicU32::new(0) }; FAN_COUNT])
    }

    /// Count one edge.  ISR-safe.
    #[inline]
    pub fn record(&self, channel: usize) {
        if let Some(c) = self.0.get(channel) {
            c.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Add `n` edges at once (simulation).
    pub fn record_many(&self, channel: usize, n: u32) {
        if let Some(c) = self.0.get(channel) {
            c.fetch_add(n, Ordering::Relaxed);
        }
    }

    /// Read and reset the counter for `channel`.
    pub fn take(&self, channel: usize) -> u32 {
        self.0.get(channel).map_or(0, |c| c.swap(0, Ordering::Relaxed))
    }
}

/// Counters fed by the tach GPIO ISRs.
/// `static` because ISR callbacks in ESP-IDF cannot capture closures.
pub static TACH_PULSES: PulseCounters = PulseCounters::new();

/// Called from the GPIO ISR on each rising tach edge.
pub fn tach_isr_handler(channel: usize) {
    TACH_PULSES.record(channel);
}

/// Window-based pulse-count frequency meter.
#[derive(Debug)]
pub struct PulseCounterCapture {
    counters: &'static PulseCounters,
    window_us: u64,
    window_start: [Option<u64>; FAN_COUNT],
    cursor: usize,
}

impl PulseCounterCapture {
    /// Capture from the ISR-fed [`TACH_PULSES`].
    pub fn new(window_ms: u32) -> Self {
        Self::with_counters(&TACH_PULSES, window_ms)
    }

    /// Capture from an arbitrary counter bank.
    pub fn with_counters(counters: &'static PulseCounters, window_ms: u32) -> Self {
        debug!("tach: capture window {} ms", window_ms);
        Self {
            counters,
            window_us: u64::from(window_ms.max(1)) * 1000,
            window_start: [None; FAN_COUNT],
            cursor: 0,
        }
    }

    fn poll_channel(&mut self, ch: usize, now_us: u64) -> Option<TachReading> {
        let Some(start) = self.window_start[ch] else {
            // First visit: pulses counted before now have no known window.
            self.counters.take(ch);
            self.window_start[ch] = Some(now_us);
            return None;
        };
        let elapsed = now_us.saturating_sub(start);
        if elapsed < self.window_us {
            return None;
        }
        let pulses = self.counters.take(ch);
        self.window_start[ch] = Some(now_us);
        let hz = pulses as f32 * 1_000_000.0 / elapsed as f32;
        Some(TachReading { channel: ch, hz })
    }
}

impl TachCapture for PulseCounterCapture {
    fn poll(&mut self, now_us: u64) -> Option<TachReading> {
        let ch = self.cursor;
        self.cursor = (self.cursor + 1) % FAN_COUNT;
        self.poll_channel(ch, now_us)
    }

    fn restart(&mut self, now_us: u64) {
        for ch in 0..FAN_COUNT {
            self.counters.take(ch);
            self.window_start[ch] = Some(now_us);
        }
        debug!("tach: windows restarted");
    }
}
