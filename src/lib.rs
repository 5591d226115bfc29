//! FanBridge firmware library.
//!
//! Exposes the control core and its adapters for the binary, integration
//! tests and fuzzing.  All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module; host builds get
//! simulation fallbacks.

#![deny(unused_must_use)]

pub mod app;
pub mod capture;
pub mod config;
pub mod console;
pub mod diagnostics;
pub mod error;
pub mod gate;
pub mod lockout;
pub mod pins;
pub mod scheduler;
pub mod state;

pub mod adapters;
pub mod drivers;
pub mod sensors;
