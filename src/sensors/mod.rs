//! Sensor drivers: temperature (scheduler core), PWM input duty (scheduler
//! core) and fan tach capture (worker core).
//!
//! Fast edge-driven signals are timestamped or counted in GPIO ISRs into
//! lock-free atomics; the drivers here only sample those atomics, so a
//! read never blocks.

pub mod pwm_input;
pub mod tach;
pub mod temperature;
