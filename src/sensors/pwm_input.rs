//! Motherboard PWM input duty measurement.
//!
//! The host board drives a 25 kHz PWM on each mbfan header.  An any-edge
//! GPIO ISR timestamps rising and falling edges; the high time over the
//! period gives the requested duty cycle.
//!
//! A line stuck high or low produces no edges at all, so a channel with no
//! edges since the previous sample reports 100 % or 0 % from the level of
//! its last edge.
//!
//! Timestamps are 32-bit microseconds and differences are taken with
//! wrapping arithmetic (the ESP32-S3 has no 64-bit atomics).

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::error::SensorError;
use crate::state::MBFAN_COUNT;

/// Edge timing shared between the ISR and the sampler.
#[derive(Debug)]
pub struct PwmEdgeTimer {
    last_rise: [AtomicU32; MBFAN_COUNT],
    period_us: [AtomicU32; MBFAN_COUNT],
    high_us: [AtomicU32; MBFAN_COUNT],
    level: [AtomicBool; MBFAN_COUNT],
    edges: [AtomicU32; MBFAN_COUNT],
}

impl Default for PwmEdgeTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl PwmEdgeTimer {
    pub const fn new() -> Self {
        Self {
            last_rise: [const { AtomicU32::new(0) }; MBFAN_COUNT],
            period_us: [const { AtomicU32::new(0) }; MBFAN_COUNT],
            high_us: [const { AtomicU32::new(0) }; MBFAN_COUNT],
            level: [const { AtomicBool::new(false) }; MBFAN_COUNT],
            edges: [const { AtomicU32::new(0) }; MBFAN_COUNT],
        }
    }

    /// Record one edge.  ISR-safe.
    pub fn on_edge(&self, ch: usize, rising: bool, now_us: u32) {
        if ch >= MBFAN_COUNT {
            return;
        }
        let last_rise = self.last_rise[ch].load(Ordering::Relaxed);
        if rising {
            if self.edges[ch].load(Ordering::Relaxed) > 0 {
                self.period_us[ch].store(now_us.wrapping_sub(last_rise), Ordering::Relaxed);
            }
            self.last_rise[ch].store(now_us, Ordering::Relaxed);
        } else {
            self.high_us[ch].store(now_us.wrapping_sub(last_rise), Ordering::Relaxed);
        }
        self.level[ch].store(rising, Ordering::Relaxed);
        self.edges[ch].fetch_add(1, Ordering::Release);
    }

    pub fn edge_count(&self, ch: usize) -> u32 {
        self.edges.get(ch).map_or(0, |e| e.load(Ordering::Acquire))
    }

    /// Duty (%) from the last complete period.
    fn timed_duty(&self, ch: usize) -> Option<f32> {
        let period = self.period_us[ch].load(Ordering::Relaxed);
        if period == 0 {
            return None;
        }
        let high = self.high_us[ch].load(Ordering::Relaxed);
        Some((high as f32 * 100.0 / period as f32).clamp(0.0, 100.0))
    }

    /// Simulate one period of a PWM signal at `percent` duty.
    pub fn inject_duty(&self, ch: usize, percent: f32, start_us: u32) {
        const PERIOD_US: u32 = 40;
        let high = (PERIOD_US as f32 * percent.clamp(0.0, 100.0) / 100.0) as u32;
        self.on_edge(ch, true, start_us);
        self.on_edge(ch, false, start_us.wrapping_add(high));
        self.on_edge(ch, true, start_us.wrapping_add(PERIOD_US));
        self.on_edge(ch, false, start_us.wrapping_add(PERIOD_US + high));
    }
}

/// Timer fed by the PWM-input GPIO ISRs.
/// `static` because ISR callbacks in ESP-IDF cannot capture closures.
pub static PWM_EDGES: PwmEdgeTimer = PwmEdgeTimer::new();

/// Called from the any-edge GPIO ISR with the new pin level.
pub fn pwm_edge_isr_handler(ch: usize, level: bool, now_us: u64) {
    PWM_EDGES.on_edge(ch, level, now_us as u32);
}

/// Duty sampler for all mbfan inputs.
#[derive(Debug)]
pub struct PwmInput {
    timer: &'static PwmEdgeTimer,
    seen_edges: [u32; MBFAN_COUNT],
}

impl PwmInput {
    pub fn new() -> Self {
        Self::with_timer(&PWM_EDGES)
    }

    pub fn with_timer(timer: &'static PwmEdgeTimer) -> Self {
        Self {
            timer,
            seen_edges: [0; MBFAN_COUNT],
        }
    }

    /// Duty (%) currently requested on `ch`.
    pub fn read(&mut self, ch: usize) -> Result<f32, SensorError> {
        if ch >= MBFAN_COUNT {
            return Err(SensorError::InvalidChannel);
        }
        let edges = self.timer.edge_count(ch);
        let moving = edges != self.seen_edges[ch];
        self.seen_edges[ch] = edges;

        if !moving {
            // Static line: full on or full off.
            let high = self.timer.level[ch].load(Ordering::Relaxed);
            return Ok(if high { 100.0 } else { 0.0 });
        }
        self.timer.timed_duty(ch).ok_or(SensorError::NoSignal)
    }

    /// Sample every channel.
    pub fn read_all(&mut self) -> [Result<f32, SensorError>; MBFAN_COUNT] {
        core::array::from_fn(|ch| self.read(ch))
    }
}

impl Default for PwmInput {
    fn default() -> Self {
        Self::new()
    }
}
