//! Hardware adapter: bridges board peripherals to the domain port traits.
//!
//! Owns every scheduler-core peripheral (temperature ADC, PWM inputs, fan
//! and tach outputs, status LED, console transport, watchdog, display and
//! network hooks) and exposes them through the [`Board`](crate::app::ports::Board)
//! ports.  Tach *capture* is not here: it belongs to the worker core.
//!
//! On non-espidf targets the outputs are recorded in [`OutputLevels`]
//! instead of reaching LEDC registers.

use embedded_hal::digital::OutputPin;
use log::info;

use crate::adapters::display::LogDisplay;
use crate::adapters::network::OfflineNetwork;
use crate::app::ports::{
    ConsoleIo, IndicatorPort, OutputPort, SensorPort, WatchdogPort,
};
use crate::config::SystemConfig;
use crate::drivers::status_led::StatusLed;
use crate::drivers::watchdog::Watchdog;
use crate::error::{ActuatorError, SensorError};
use crate::sensors::pwm_input::PwmInput;
use crate::sensors::temperature::TemperatureSensors;
use crate::state::{FAN_COUNT, MBFAN_COUNT, SystemState};

/// Last values written to each output.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OutputLevels {
    pub fan_duty: [f32; FAN_COUNT],
    pub mbfan_hz: [f32; MBFAN_COUNT],
    pub writes: u32,
}

/// Concrete adapter combining all scheduler-core hardware.
pub struct HardwareAdapter<P: OutputPin, C: ConsoleIo> {
    temperature: TemperatureSensors,
    pwm_in: PwmInput,
    led: StatusLed<P>,
    console: C,
    watchdog: Watchdog,
    display: LogDisplay,
    network: OfflineNetwork,
    outputs: OutputLevels,
}

impl<P: OutputPin, C: ConsoleIo> HardwareAdapter<P, C> {
    pub fn new(
        temperature: TemperatureSensors,
        pwm_in: PwmInput,
        led: StatusLed<P>,
        console: C,
        watchdog: Watchdog,
    ) -> Self {
        Self {
            temperature,
            pwm_in,
            led,
            console,
            watchdog,
            display: LogDisplay::new(),
            network: OfflineNetwork::new(),
            outputs: OutputLevels::default(),
        }
    }

    /// Drive every fan output to 0 %.
    pub fn zero_outputs(&mut self) -> Result<(), ActuatorError> {
        for ch in 0..FAN_COUNT {
            self.set_duty_cycle(ch, 0.0)?;
        }
        info!("hardware: all fan outputs at 0%");
        Ok(())
    }

    pub fn outputs(&self) -> &OutputLevels {
        &self.outputs
    }

    pub fn led(&self) -> &StatusLed<P> {
        &self.led
    }

    pub fn display(&self) -> &LogDisplay {
        &self.display
    }

    pub fn network(&self) -> &OfflineNetwork {
        &self.network
    }

    pub fn watchdog(&self) -> &Watchdog {
        &self.watchdog
    }

    pub fn console_mut(&mut self) -> &mut C {
        &mut self.console
    }
}

// ── SensorPort ────────────────────────────────────────────────

impl<P: OutputPin, C: ConsoleIo> SensorPort for HardwareAdapter<P, C> {
    fn read_temperature(&mut self, index: usize) -> Result<f32, SensorError> {
        self.temperature.read(index).map(|r| r.celsius)
    }

    fn sample_duty_cycles(&mut self) -> [Result<f32, SensorError>; MBFAN_COUNT] {
        self.pwm_in.read_all()
    }
}

// ── OutputPort ────────────────────────────────────────────────

impl<P: OutputPin, C: ConsoleIo> OutputPort for HardwareAdapter<P, C> {
    fn set_duty_cycle(&mut self, channel: usize, percent: f32) -> Result<(), ActuatorError> {
        if channel >= FAN_COUNT {
            return Err(ActuatorError::InvalidChannel);
        }
        let percent = percent.clamp(0.0, 100.0);
        write_fan_duty(channel, percent)?;
        self.outputs.fan_duty[channel] = percent;
        self.outputs.writes += 1;
        Ok(())
    }

    fn set_output_frequency(&mut self, channel: usize, hz: f32) -> Result<(), ActuatorError> {
        if channel >= MBFAN_COUNT {
            return Err(ActuatorError::InvalidChannel);
        }
        let hz = hz.max(0.0);
        write_tach_frequency(channel, hz)?;
        self.outputs.mbfan_hz[channel] = hz;
        self.outputs.writes += 1;
        Ok(())
    }
}

#[cfg(target_os = "espidf")]
fn write_fan_duty(channel: usize, percent: f32) -> Result<(), ActuatorError> {
    use crate::drivers::hw_init::{FAN_DUTY_MAX, LEDC_CH_FAN0, set_channel_duty};

    let raw = (percent / 100.0 * FAN_DUTY_MAX as f32).round() as u32;
    set_channel_duty(LEDC_CH_FAN0 + channel as u32, raw).map_err(|rc| {
        log::warn!("hardware: fan{} duty write failed (rc={})", channel + 1, rc);
        ActuatorError::PwmWriteFailed
    })
}

#[cfg(not(target_os = "espidf"))]
fn write_fan_duty(_channel: usize, _percent: f32) -> Result<(), ActuatorError> {
    Ok(())
}

/// Square wave at `hz` (50 % duty); below the LEDC floor the line idles low.
#[cfg(target_os = "espidf")]
fn write_tach_frequency(channel: usize, hz: f32) -> Result<(), ActuatorError> {
    use crate::drivers::hw_init::{LEDC_CH_TACH0, LEDC_TIMER_TACH0, set_channel_duty, set_timer_freq};
    use crate::pins::{TACH_OUT_MIN_HZ, TACH_OUT_RESOLUTION_BITS};

    let ch = LEDC_CH_TACH0 + channel as u32;
    let fail = |rc: i32| {
        log::warn!("hardware: mbfan{} tach write failed (rc={})", channel + 1, rc);
        ActuatorError::FrequencyWriteFailed
    };
    if hz < TACH_OUT_MIN_HZ {
        return set_channel_duty(ch, 0).map_err(fail);
    }
    set_timer_freq(LEDC_TIMER_TACH0 + channel as u32, hz.round() as u32).map_err(fail)?;
    set_channel_duty(ch, 1 << (TACH_OUT_RESOLUTION_BITS - 1)).map_err(fail)
}

#[cfg(not(target_os = "espidf"))]
fn write_tach_frequency(_channel: usize, _hz: f32) -> Result<(), ActuatorError> {
    Ok(())
}

// ── IndicatorPort ─────────────────────────────────────────────

impl<P: OutputPin, C: ConsoleIo> IndicatorPort for HardwareAdapter<P, C> {
    fn set_status_led(&mut self, on: bool) {
        self.led.set(on);
    }

    fn refresh_display(&mut self, state: &SystemState, config: &SystemConfig) {
        self.display.refresh(state, config);
    }

    fn poll_network(&mut self) {
        self.network.poll();
    }
}

// ── ConsoleIo / WatchdogPort ──────────────────────────────────

impl<P: OutputPin, C: ConsoleIo> ConsoleIo for HardwareAdapter<P, C> {
    fn read_byte(&mut self) -> Option<u8> {
        self.console.read_byte()
    }

    fn write(&mut self, bytes: &[u8]) {
        self.console.write(bytes);
    }

    fn connected(&self) -> bool {
        self.console.connected()
    }
}

impl<P: OutputPin, C: ConsoleIo> WatchdogPort for HardwareAdapter<P, C> {
    fn feed(&mut self) {
        self.watchdog.feed();
    }
}

#[cfg(all(test, not(target_os = "espidf")))]
mod tests {
    use super::*;
    use crate::app::ports::Board;
    use crate::drivers::status_led::SimPin;
    use crate::sensors::pwm_input::PwmEdgeTimer;
    use crate::sensors::temperature::sim_set_temp_adc;

    struct Silent;

    impl ConsoleIo for Silent {
        fn read_byte(&mut self) -> Option<u8> {
            None
        }

        fn write(&mut self, _bytes: &[u8]) {}
    }

    static EDGES: PwmEdgeTimer = PwmEdgeTimer::new();

    fn adapter() -> HardwareAdapter<SimPin, Silent> {
        HardwareAdapter::new(
            TemperatureSensors::new(),
            PwmInput::with_timer(&EDGES),
            StatusLed::new(SimPin::default()),
            Silent,
            Watchdog::arm(8000),
        )
    }

    fn assert_board<B: Board>(_: &B) {}

    #[test]
    fn implements_every_port() {
        let hw = adapter();
        assert_board(&hw);
    }

    #[test]
    fn outputs_are_clamped_and_recorded() {
        let mut hw = adapter();
        hw.set_duty_cycle(1, 120.0).unwrap();
        hw.set_output_frequency(0, 42.5).unwrap();
        assert_eq!(hw.outputs().fan_duty[1], 100.0);
        assert_eq!(hw.outputs().mbfan_hz[0], 42.5);
        assert_eq!(hw.outputs().writes, 2);
        assert_eq!(
            hw.set_duty_cycle(FAN_COUNT, 1.0),
            Err(ActuatorError::InvalidChannel)
        );
        assert_eq!(
            hw.set_output_frequency(MBFAN_COUNT, 1.0),
            Err(ActuatorError::InvalidChannel)
        );
    }

    #[test]
    fn zero_outputs_touches_every_fan() {
        let mut hw = adapter();
        hw.set_duty_cycle(2, 50.0).unwrap();
        hw.zero_outputs().unwrap();
        assert!(hw.outputs().fan_duty.iter().all(|d| *d == 0.0));
    }

    #[test]
    fn sensors_pass_through() {
        let mut hw = adapter();
        EDGES.inject_duty(0, 25.0, 1_000);
        EDGES.inject_duty(1, 75.0, 1_000);
        let duty = hw.sample_duty_cycles();
        assert!((duty[0].unwrap() - 25.0).abs() < 0.5);
        assert!((duty[1].unwrap() - 75.0).abs() < 0.5);

        sim_set_temp_adc(1, 2048);
        let t = hw.read_temperature(1).unwrap();
        assert!(t > 15.0 && t < 35.0);
        assert_eq!(hw.read_temperature(9), Err(SensorError::InvalidChannel));
    }

    #[test]
    fn indicators_and_watchdog() {
        let mut hw = adapter();
        hw.set_status_led(true);
        assert!(hw.led().is_on());
        hw.poll_network();
        hw.refresh_display(&SystemState::new(), &SystemConfig::default());
        hw.feed();
        assert_eq!(hw.network().polls(), 1);
        assert_eq!(hw.display().refreshes(), 1);
        assert_eq!(hw.watchdog().feeds(), 1);
    }
}
