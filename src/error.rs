//! Unified error types for the FanBridge firmware.
//!
//! A single `Error` enum that the port errors convert into, keeping the
//! control loop's error handling uniform.  Bootstrap failures
//! (`HwInitError`) stay separate and end at `main`'s `anyhow` boundary.  All variants are `Copy` so they
//! pass through the scheduler tasks without allocation.
//!
//! None of these errors stop the control loop: a failing task logs and
//! skips its update for the current iteration.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Failures the control loop and config loader handle funnel into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A sensor or input could not be sampled.
    Sensor(SensorError),
    /// An output (PWM duty or tach frequency) could not be programmed.
    Actuator(ActuatorError),
    /// The capture worker could not be paused for reconfiguration.
    Lockout(LockoutError),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Lockout(e) => write!(f, "lockout: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// ADC read returned an error or timed out.
    AdcReadFailed,
    /// Requested channel does not exist on this board.
    InvalidChannel,
    /// Reading is outside the physically plausible range.
    OutOfRange,
    /// No complete PWM period has been captured yet.
    NoSignal,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AdcReadFailed => write!(f, "ADC read failed"),
            Self::InvalidChannel => write!(f, "invalid channel"),
            Self::OutOfRange => write!(f, "reading out of range"),
            Self::NoSignal => write!(f, "no input signal"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// PWM duty-cycle write failed.
    PwmWriteFailed,
    /// Tach output frequency could not be set.
    FrequencyWriteFailed,
    /// Requested channel does not exist on this board.
    InvalidChannel,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PwmWriteFailed => write!(f, "PWM write failed"),
            Self::FrequencyWriteFailed => write!(f, "tach frequency write failed"),
            Self::InvalidChannel => write!(f, "invalid channel"),
        }
    }
}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Lockout errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockoutError {
    /// Another caller already holds the lockout.
    Busy,
    /// The worker did not reach its safe point within the allowed time.
    Timeout,
}

impl fmt::Display for LockoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => write!(f, "already held"),
            Self::Timeout => write!(f, "worker did not park in time"),
        }
    }
}

impl From<LockoutError> for Error {
    fn from(e: LockoutError) -> Self {
        Self::Lockout(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
