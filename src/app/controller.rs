//! Scheduler-core task bodies.
//!
//! [`FanController`] owns the canonical [`SystemState`], the configuration
//! and every scheduler-core port.  It implements [`TaskRunner`], so the
//! [`Scheduler`](crate::scheduler::Scheduler) decides *when* each task runs
//! and this module decides *what* it does:
//!
//! | Task             | Body                                                   |
//! |------------------|--------------------------------------------------------|
//! | `NetworkPoll`    | service the network hook                               |
//! | `StatusLed`      | advance the LED mode                                   |
//! | `Display`        | redraw from the current state                          |
//! | `InputDuty`      | sample mbfan PWM inputs, round, gate, mark dirty       |
//! | `Temperature`    | sample every sensor, gate, mark dirty                  |
//! | `InputFrequency` | read the worker's tach slots, gate, mark dirty         |
//! | `OutputUpdate`   | recompute outputs, write only gated changes            |
//! | `Console`        | pump the console, dispatch complete lines              |
//! | `Watchdog`       | feed                                                   |
//!
//! No task body blocks and no error stops the loop: sensor failures keep
//! the previous value, output failures leave the state untouched so the
//! next output pass retries.

use std::sync::Arc;

use log::{debug, info, warn};

use crate::app::commands::CommandContext;
use crate::app::ports::{
    Board, Clock, CommandProcessor, FanCurve, TaskId, TaskRunner, TickInfo,
};
use crate::config::SystemConfig;
use crate::console::CommandConsole;
use crate::diagnostics::LoopMetrics;
use crate::error::{Error, Result};
use crate::gate;
use crate::lockout::Lockout;
use crate::state::{FAN_COUNT, MBFAN_COUNT, SENSOR_COUNT, SystemState, TachFrequencies};

const FAN_NAMES: [&str; FAN_COUNT] = ["fan1", "fan2", "fan3", "fan4"];
const MBFAN_NAMES: [&str; MBFAN_COUNT] = ["mbfan1", "mbfan2"];
const SENSOR_NAMES: [&str; SENSOR_COUNT] = ["sensor1", "sensor2"];

pub struct FanController<B, P, F, K>
where
    B: Board,
    P: CommandProcessor,
    F: FanCurve,
    K: Clock,
{
    board: B,
    processor: P,
    curve: F,
    clock: K,
    config: SystemConfig,
    state: SystemState,
    console: CommandConsole,
    led_on: bool,
    freqs: Arc<TachFrequencies>,
    lockout: Arc<Lockout>,
    metrics: LoopMetrics,
}

impl<B, P, F, K> FanController<B, P, F, K>
where
    B: Board,
    P: CommandProcessor,
    F: FanCurve,
    K: Clock,
{
    pub fn new(
        board: B,
        processor: P,
        curve: F,
        clock: K,
        config: SystemConfig,
        freqs: Arc<TachFrequencies>,
        lockout: Arc<Lockout>,
    ) -> Self {
        let console = CommandConsole::new(config.local_echo);
        Self {
            board,
            processor,
            curve,
            clock,
            config,
            state: SystemState::new(),
            console,
            led_on: false,
            freqs,
            lockout,
            metrics: LoopMetrics::new(),
        }
    }

    pub fn state(&self) -> &SystemState {
        &self.state
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    pub fn board(&self) -> &B {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut B {
        &mut self.board
    }

    pub fn processor(&self) -> &P {
        &self.processor
    }

    pub fn console(&self) -> &CommandConsole {
        &self.console
    }

    pub fn metrics(&self) -> &LoopMetrics {
        &self.metrics
    }

    pub fn led_on(&self) -> bool {
        self.led_on
    }

    // ── Task bodies ───────────────────────────────────────────

    fn update_status_led(&mut self) {
        self.led_on = self.config.led_mode.next(self.led_on);
        self.board.set_status_led(self.led_on);
    }

    fn update_display(&mut self) {
        debug!("Update display");
        self.board.refresh_display(&self.state, &self.config);
    }

    /// Log and count a failed step; the loop carries on.
    fn record_failure(&mut self, source: &str, err: Error) {
        warn!("{}: {}", source, err);
        match err {
            Error::Sensor(_) => self.metrics.sensor_errors += 1,
            Error::Actuator(_) => self.metrics.actuator_errors += 1,
            Error::Lockout(_) | Error::Config(_) => {}
        }
    }

    fn sample_duty_inputs(&mut self) {
        debug!("Read PWM inputs");
        let threshold = self.config.thresholds.input_duty;
        for (i, sample) in self.board.sample_duty_cycles().into_iter().enumerate() {
            let raw = match sample {
                Ok(d) => d,
                Err(e) => {
                    self.record_failure(MBFAN_NAMES[i], e.into());
                    continue;
                }
            };
            // Whole percent only; sub-percent jitter never reaches the gate.
            let duty = raw.round();
            if let Some(prev) = gate::apply(&mut self.state.mbfan_duty[i], duty, threshold) {
                info!("mbfan{}: duty cycle change {:.1} --> {:.1}", i + 1, prev, duty);
                self.state.mark_dirty();
            }
        }
    }

    fn sample_temperatures(&mut self) {
        debug!("Read temperature sensors");
        let threshold = self.config.thresholds.temperature;
        for i in 0..SENSOR_COUNT {
            match self.board.read_temperature(i) {
                Ok(t) => {
                    if let Some(prev) = gate::apply(&mut self.state.temp[i], t, threshold) {
                        info!("sensor{}: Temperature change {:.1}C --> {:.1}C", i + 1, prev, t);
                        self.state.mark_dirty();
                    }
                }
                Err(e) => self.record_failure(SENSOR_NAMES[i], e.into()),
            }
        }
    }

    fn sample_input_frequencies(&mut self) {
        debug!("Updating tacho input signals.");
        let threshold = self.config.thresholds.input_freq;
        for (i, hz) in self.freqs.snapshot().into_iter().enumerate() {
            if let Some(prev) = gate::apply(&mut self.state.fan_freq[i], hz, threshold) {
                info!("fan{}: Input Tacho change {:.2}Hz --> {:.2}Hz", i + 1, prev, hz);
                self.state.mark_dirty();
            }
        }
    }

    fn write_fan_duty(&mut self, ch: usize, target: f32) -> Result<()> {
        let prev = self.state.fan_duty[ch];
        self.board.set_duty_cycle(ch, target)?;
        info!("fan{}: Set output PWM {:.1}% --> {:.1}%", ch + 1, prev, target);
        self.state.fan_duty[ch] = target;
        Ok(())
    }

    fn write_mbfan_tach(&mut self, ch: usize, target: f32) -> Result<()> {
        let prev = self.state.mbfan_freq[ch];
        self.board.set_output_frequency(ch, target)?;
        info!("mbfan{}: Set output Tacho {:.2}Hz --> {:.2}Hz", ch + 1, prev, target);
        self.state.mbfan_freq[ch] = target;
        Ok(())
    }

    fn update_outputs(&mut self) {
        debug!("Updating output signals.");
        self.state.take_dirty();
        let t = self.config.thresholds;

        for ch in 0..FAN_COUNT {
            let target = self.curve.fan_duty(&self.state, ch);
            if !gate::changed(self.state.fan_duty[ch], target, t.output_duty) {
                continue;
            }
            match self.write_fan_duty(ch, target) {
                Ok(()) => self.metrics.output_writes += 1,
                Err(e) => self.record_failure(FAN_NAMES[ch], e),
            }
        }

        for ch in 0..MBFAN_COUNT {
            let target = self.curve.mbfan_frequency(&self.state, ch);
            if !gate::changed(self.state.mbfan_freq[ch], target, t.output_freq) {
                continue;
            }
            match self.write_mbfan_tach(ch, target) {
                Ok(()) => self.metrics.output_writes += 1,
                Err(e) => self.record_failure(MBFAN_NAMES[ch], e),
            }
        }
    }

    fn pump_console(&mut self) {
        let Self {
            board,
            processor,
            clock,
            config,
            state,
            console,
            freqs,
            lockout,
            metrics,
            ..
        } = self;
        console.pump(board, |io, line| {
            let mut ctx = CommandContext {
                state: &mut *state,
                config: &*config,
                freqs: &**freqs,
                lockout: &**lockout,
                clock: &*clock,
                metrics: &*metrics,
                out: io,
            };
            processor.process(&mut ctx, line);
        });
    }
}

impl<B, P, F, K> TaskRunner for FanController<B, P, F, K>
where
    B: Board,
    P: CommandProcessor,
    F: FanCurve,
    K: Clock,
{
    fn run(&mut self, task: TaskId, tick: &TickInfo) {
        self.metrics.observe(tick);
        match task {
            TaskId::NetworkPoll => self.board.poll_network(),
            TaskId::StatusLed => self.update_status_led(),
            TaskId::Display => self.update_display(),
            TaskId::InputDuty => self.sample_duty_inputs(),
            TaskId::Temperature => self.sample_temperatures(),
            TaskId::InputFrequency => self.sample_input_frequencies(),
            TaskId::OutputUpdate => self.update_outputs(),
            TaskId::Console => self.pump_console(),
            TaskId::Watchdog => self.board.feed(),
        }
    }

    fn pending(&self, task: TaskId) -> bool {
        task == TaskId::OutputUpdate && self.state.dirty
    }
}
