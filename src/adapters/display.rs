//! Log-based status display.
//!
//! Stands in for a physical panel: every refresh renders one summary line
//! to the log.  A real OLED/LCD driver would take the same
//! `(state, config)` pair.

use core::fmt::Write as _;

use log::info;

use crate::config::SystemConfig;
use crate::state::SystemState;

#[derive(Debug, Default)]
pub struct LogDisplay {
    refreshes: u32,
    last: String,
}

impl LogDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render and log one status line.
    pub fn refresh(&mut self, state: &SystemState, config: &SystemConfig) {
        self.last = render(state, config);
        self.refreshes += 1;
        info!("{}", self.last);
    }

    pub fn refreshes(&self) -> u32 {
        self.refreshes
    }

    /// Last rendered line.
    pub fn last(&self) -> &str {
        &self.last
    }
}

/// One-line status summary.
pub fn render(state: &SystemState, config: &SystemConfig) -> String {
    let mut out = String::from("STATUS |");
    for (i, (duty, freq)) in state.mbfan_duty.iter().zip(&state.mbfan_freq).enumerate() {
        let _ = write!(out, " mb{}={:.0}%/{:.1}Hz", i + 1, duty, freq);
    }
    out.push_str(" |");
    for (i, (duty, freq)) in state.fan_duty.iter().zip(&state.fan_freq).enumerate() {
        let _ = write!(out, " fan{}={:.0}%/{:.1}Hz", i + 1, duty, freq);
    }
    out.push_str(" |");
    for (i, t) in state.temp.iter().enumerate() {
        let _ = write!(out, " T{}={:.1}\u{00b0}C", i + 1, t);
    }
    let _ = write!(out, " | led={}", u8::from(config.led_mode));
    out
}
