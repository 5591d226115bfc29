//! System configuration parameters
//!
//! Read once at boot through a [`ConfigPort`](crate::app::ports::ConfigPort)
//! and treated as immutable by the control loop afterwards.  Fan-curve rules
//! are owned by the [`FanCurve`](crate::app::ports::FanCurve) implementation,
//! not by this struct.

use serde::{Deserialize, Serialize};

use crate::gate::ChangeThresholds;

/// Status LED behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum LedMode {
    /// Toggle on every LED task fire (1 s on, 1 s off).
    #[default]
    SlowBlink,
    AlwaysOn,
    AlwaysOff,
}

impl From<u8> for LedMode {
    fn from(raw: u8) -> Self {
        match raw {
            0 => Self::SlowBlink,
            1 => Self::AlwaysOn,
            // Unknown modes fall back to dark rather than failing the load.
            _ => Self::AlwaysOff,
        }
    }
}

impl LedMode {
    /// LED state after one LED period, given the current state.
    pub fn next(self, on: bool) -> bool {
        match self {
            Self::SlowBlink => !on,
            Self::AlwaysOn => true,
            Self::AlwaysOff => false,
        }
    }
}

impl From<LedMode> for u8 {
    fn from(mode: LedMode) -> Self {
        match mode {
            LedMode::SlowBlink => 0,
            LedMode::AlwaysOn => 1,
            LedMode::AlwaysOff => 2,
        }
    }
}

/// Nominal periods (ms) of the scheduler's periodic tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskIntervals {
    pub network_poll_ms: u32,
    pub status_led_ms: u32,
    pub display_ms: u32,
    pub input_duty_ms: u32,
    pub temperature_ms: u32,
    pub input_freq_ms: u32,
    /// Fallback period of the output update when nothing is dirty.
    pub output_update_ms: u32,
}

impl Default for TaskIntervals {
    fn default() -> Self {
        Self {
            network_poll_ms: 1,
            status_led_ms: 1000,
            display_ms: 2000,
            input_duty_ms: 1500,
            temperature_ms: 10_000,
            input_freq_ms: 2000,
            output_update_ms: 3000,
        }
    }
}

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    // --- Console ---
    /// Echo typed characters back to the console.
    pub local_echo: bool,
    /// How long boot waits for a console host to attach (ms).
    pub console_wait_ms: u32,

    // --- Indicators ---
    pub led_mode: LedMode,

    // --- Control ---
    pub thresholds: ChangeThresholds,
    pub intervals: TaskIntervals,

    // --- Capture worker ---
    /// Pulse-counting window per tach channel (ms).
    pub tach_window_ms: u32,
    /// Upper bound on waiting for the worker to park (ms).
    pub lockout_timeout_ms: u32,

    // --- Supervision ---
    /// Hardware watchdog timeout (ms).
    pub watchdog_timeout_ms: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            local_echo: false,
            console_wait_ms: 2500,
            led_mode: LedMode::SlowBlink,
            thresholds: ChangeThresholds::default(),
            intervals: TaskIntervals::default(),
            tach_window_ms: 1000,
            lockout_timeout_ms: 100,
            watchdog_timeout_ms: 8000,
        }
    }
}

impl SystemConfig {
    /// Reject values the control loop cannot run with.
    pub fn validate(&self) -> Result<(), &'static str> {
        if !self.thresholds.is_valid() {
            return Err("thresholds must be finite and non-negative");
        }
        let i = &self.intervals;
        if [
            i.network_poll_ms,
            i.status_led_ms,
            i.display_ms,
            i.input_duty_ms,
            i.temperature_ms,
            i.input_freq_ms,
            i.output_update_ms,
        ]
        .contains(&0)
        {
            return Err("task intervals must be non-zero");
        }
        if self.tach_window_ms == 0 {
            return Err("tach_window_ms must be non-zero");
        }
        // The loop must be able to feed the watchdog between the slowest
        // plausible iterations; anything under a second is a misconfiguration.
        if self.watchdog_timeout_ms < 1000 {
            return Err("watchdog_timeout_ms must be at least 1000");
        }
        // Lockout acquisition spins on the scheduler core.
        if self.lockout_timeout_ms == 0
            || self.lockout_timeout_ms.saturating_mul(2) > self.watchdog_timeout_ms
        {
            return Err("lockout_timeout_ms must be non-zero and at most half the watchdog timeout");
        }
        Ok(())
    }
}
