//! Application core: scheduler-core task bodies and command handling.
//!
//! All interaction with hardware happens through **port traits** defined
//! in [`ports`], keeping this layer testable without real peripherals.

pub mod commands;
pub mod controller;
pub mod ports;
