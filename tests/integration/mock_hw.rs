//! Mock board for integration tests.
//!
//! Records every output and indicator call so tests can assert on the full
//! history without touching real GPIO/PWM registers.  Sensor readings and
//! console input are injected by the test.

use std::collections::VecDeque;

use fanbridge::app::ports::{
    ConsoleIo, IndicatorPort, OutputPort, SensorPort, TachCapture, TachReading, WatchdogPort,
};
use fanbridge::config::SystemConfig;
use fanbridge::error::{ActuatorError, SensorError};
use fanbridge::state::{MBFAN_COUNT, SENSOR_COUNT, SystemState};

// ── Output call record ───────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum OutputCall {
    Duty { channel: usize, percent: f32 },
    Frequency { channel: usize, hz: f32 },
}

// ── MockBoard ────────────────────────────────────────────────

pub struct MockBoard {
    pub duty_in: [Result<f32, SensorError>; MBFAN_COUNT],
    pub temps: [Result<f32, SensorError>; SENSOR_COUNT],
    pub fail_outputs: bool,
    pub outputs: Vec<OutputCall>,
    pub led: Vec<bool>,
    pub display_refreshes: u32,
    pub network_polls: u32,
    pub feeds: u32,
    pub rx: VecDeque<u8>,
    pub tx: Vec<u8>,
}

#[allow(dead_code)]
impl MockBoard {
    pub fn new() -> Self {
        Self {
            duty_in: [Ok(0.0); MBFAN_COUNT],
            temps: [Ok(0.0); SENSOR_COUNT],
            fail_outputs: false,
            outputs: Vec::new(),
            led: Vec::new(),
            display_refreshes: 0,
            network_polls: 0,
            feeds: 0,
            rx: VecDeque::new(),
            tx: Vec::new(),
        }
    }

    /// Queue console input.
    pub fn type_in(&mut self, text: &str) {
        self.rx.extend(text.bytes());
    }

    /// Console output so far, as text.
    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.tx).into_owned()
    }

    pub fn duty_writes(&self) -> Vec<(usize, f32)> {
        self.outputs
            .iter()
            .filter_map(|c| match c {
                OutputCall::Duty { channel, percent } => Some((*channel, *percent)),
                OutputCall::Frequency { .. } => None,
            })
            .collect()
    }

    pub fn frequency_writes(&self) -> Vec<(usize, f32)> {
        self.outputs
            .iter()
            .filter_map(|c| match c {
                OutputCall::Frequency { channel, hz } => Some((*channel, *hz)),
                OutputCall::Duty { .. } => None,
            })
            .collect()
    }
}

impl Default for MockBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorPort for MockBoard {
    fn read_temperature(&mut self, index: usize) -> Result<f32, SensorError> {
        self.temps
            .get(index)
            .copied()
            .unwrap_or(Err(SensorError::InvalidChannel))
    }

    fn sample_duty_cycles(&mut self) -> [Result<f32, SensorError>; MBFAN_COUNT] {
        self.duty_in
    }
}

impl OutputPort for MockBoard {
    fn set_duty_cycle(&mut self, channel: usize, percent: f32) -> Result<(), ActuatorError> {
        if self.fail_outputs {
            return Err(ActuatorError::PwmWriteFailed);
        }
        self.outputs.push(OutputCall::Duty { channel, percent });
        Ok(())
    }

    fn set_output_frequency(&mut self, channel: usize, hz: f32) -> Result<(), ActuatorError> {
        if self.fail_outputs {
            return Err(ActuatorError::FrequencyWriteFailed);
        }
        self.outputs.push(OutputCall::Frequency { channel, hz });
        Ok(())
    }
}

impl IndicatorPort for MockBoard {
    fn set_status_led(&mut self, on: bool) {
        self.led.push(on);
    }

    fn refresh_display(&mut self, _state: &SystemState, _config: &SystemConfig) {
        self.display_refreshes += 1;
    }

    fn poll_network(&mut self) {
        self.network_polls += 1;
    }
}

impl ConsoleIo for MockBoard {
    fn read_byte(&mut self) -> Option<u8> {
        self.rx.pop_front()
    }

    fn write(&mut self, bytes: &[u8]) {
        self.tx.extend_from_slice(bytes);
    }
}

impl WatchdogPort for MockBoard {
    fn feed(&mut self) {
        self.feeds += 1;
    }
}

// ── Scripted tach source ─────────────────────────────────────

/// Emits a reading for channel 0 on every poll.
pub struct SteadyTach(pub f32);

impl TachCapture for SteadyTach {
    fn poll(&mut self, _now_us: u64) -> Option<TachReading> {
        Some(TachReading {
            channel: 0,
            hz: self.0,
        })
    }
}
