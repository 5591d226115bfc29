//! Port traits — the boundary between the control core and the hardware.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ FanController (control core)
//! ```
//!
//! Driven adapters (sensors, outputs, console, watchdog, capture) implement
//! these traits.  The [`FanController`](super::controller::FanController)
//! and [`CaptureWorker`](crate::capture::CaptureWorker) consume them via
//! generics, so the control core never touches registers directly.
//!
//! Every method must return in bounded time: the watchdog is only fed
//! between tasks, so a port that blocks is a port that reboots the board.

use std::sync::Arc;

use crate::config::SystemConfig;
use crate::error::{ActuatorError, SensorError};
use crate::state::{MBFAN_COUNT, SystemState};

use super::commands::CommandContext;

// ───────────────────────────────────────────────────────────────
// Time
// ───────────────────────────────────────────────────────────────

/// Monotonic microsecond time source.
pub trait Clock {
    /// Microseconds since boot.
    fn now_us(&self) -> u64;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_us(&self) -> u64 {
        (**self).now_us()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now_us(&self) -> u64 {
        (**self).now_us()
    }
}

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → control core)
// ───────────────────────────────────────────────────────────────

/// Read-side port for the scheduler core's periodic sampling tasks.
pub trait SensorPort {
    /// Temperature of sensor `index` in °C.
    fn read_temperature(&mut self, index: usize) -> Result<f32, SensorError>;

    /// Current duty cycle (%) requested on every mbfan PWM input.  Each
    /// channel fails independently.
    fn sample_duty_cycles(&mut self) -> [Result<f32, SensorError>; MBFAN_COUNT];
}

// ───────────────────────────────────────────────────────────────
// Output port (driven adapter: control core → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port.  Only called after the change gate confirmed a
/// difference, so implementations may assume each call is a real change.
pub trait OutputPort {
    /// Drive fan `channel` at `percent` (0–100).
    fn set_duty_cycle(&mut self, channel: usize, percent: f32) -> Result<(), ActuatorError>;

    /// Synthesize a tach signal of `hz` on mbfan `channel`.
    fn set_output_frequency(&mut self, channel: usize, hz: f32) -> Result<(), ActuatorError>;
}

// ───────────────────────────────────────────────────────────────
// Indicators: status LED, display, network
// ───────────────────────────────────────────────────────────────

/// Opaque, bounded-latency collaborators polled at their own cadence.
pub trait IndicatorPort {
    fn set_status_led(&mut self, on: bool);

    fn refresh_display(&mut self, state: &SystemState, config: &SystemConfig);

    fn poll_network(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Console byte stream
// ───────────────────────────────────────────────────────────────

/// Unframed, non-blocking console transport.
pub trait ConsoleIo {
    /// Next queued byte, or `None` when nothing is waiting.  Never blocks.
    fn read_byte(&mut self) -> Option<u8>;

    /// Queue bytes for output.  Drops on overflow rather than blocking.
    fn write(&mut self, bytes: &[u8]);

    /// Whether a console host is attached (boot waits briefly for this).
    fn connected(&self) -> bool {
        true
    }
}

impl core::fmt::Write for dyn ConsoleIo + '_ {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        self.write(s.as_bytes());
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Watchdog
// ───────────────────────────────────────────────────────────────

pub trait WatchdogPort {
    /// Refresh the hardware watchdog.
    fn feed(&mut self);
}

/// Everything the scheduler core drives, bundled as one adapter.
pub trait Board: SensorPort + OutputPort + IndicatorPort + ConsoleIo + WatchdogPort {}

impl<T> Board for T where T: SensorPort + OutputPort + IndicatorPort + ConsoleIo + WatchdogPort {}

// ───────────────────────────────────────────────────────────────
// Tach capture (worker core)
// ───────────────────────────────────────────────────────────────

/// A completed tach measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TachReading {
    pub channel: usize,
    pub hz: f32,
}

/// Raw tach timing source, owned exclusively by the capture worker.
pub trait TachCapture {
    /// Advance the capture state machine.  Returns a reading whenever a
    /// channel's measurement window completes.
    fn poll(&mut self, now_us: u64) -> Option<TachReading>;

    /// Discard partial measurements and open fresh windows at `now_us`.
    /// Called when the worker comes back from a lockout.
    fn restart(&mut self, _now_us: u64) {}
}

// ───────────────────────────────────────────────────────────────
// Fan curve and command processor
// ───────────────────────────────────────────────────────────────

/// Maps the current state to output targets.
pub trait FanCurve {
    /// Target duty (%) for fan `channel`.
    fn fan_duty(&self, state: &SystemState, channel: usize) -> f32;

    /// Target synthesized tach frequency (Hz) for mbfan `channel`.
    fn mbfan_frequency(&self, state: &SystemState, channel: usize) -> f32;
}

/// Receives one complete console line.  Semantics belong to the processor.
pub trait CommandProcessor {
    fn process(&mut self, ctx: &mut CommandContext<'_>, line: &str);
}

// ───────────────────────────────────────────────────────────────
// Scheduler delegate
// ───────────────────────────────────────────────────────────────

/// Tasks of the control core, in no particular order (the scheduler
/// table defines the order).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskId {
    NetworkPoll,
    StatusLed,
    Display,
    InputDuty,
    Temperature,
    InputFrequency,
    OutputUpdate,
    Console,
    Watchdog,
}

/// Per-iteration information handed to every task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickInfo {
    pub now_us: u64,
    pub iteration: u64,
    pub max_loop_us: u64,
}

/// Callback trait that the [`Scheduler`](crate::scheduler::Scheduler)
/// invokes for each due task.
pub trait TaskRunner {
    /// Execute `task` to completion.  Must not block.
    fn run(&mut self, task: TaskId, tick: &TickInfo);

    /// Whether `task` has event-driven work queued (consulted only for
    /// tasks with a pending-or-periodic cadence).
    fn pending(&self, _task: TaskId) -> bool {
        false
    }
}

// ───────────────────────────────────────────────────────────────
// Configuration port
// ───────────────────────────────────────────────────────────────

/// Loads system configuration once at boot.
pub trait ConfigPort {
    /// Returns [`SystemConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<SystemConfig, ConfigError>;
}

/// Errors from [`ConfigPort`] operations.
#[derive(Debug)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl From<ConfigError> for crate::error::Error {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::Corrupted => Self::Config("corrupted"),
            ConfigError::ValidationFailed(msg) => Self::Config(msg),
            ConfigError::IoError => Self::Config("I/O error"),
        }
    }
}
