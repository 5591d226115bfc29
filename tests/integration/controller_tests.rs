//! Integration tests for the Scheduler → FanController → ports pipeline.
//!
//! A synthetic clock drives the standard task table; the mock board
//! records every output, indicator and console write.

use std::sync::Arc;

use fanbridge::adapters::curve::MirrorCurve;
use fanbridge::adapters::time::ManualClock;
use fanbridge::app::commands::BasicCommands;
use fanbridge::app::controller::FanController;
use fanbridge::app::ports::{Clock, TaskId};
use fanbridge::config::{LedMode, SystemConfig};
use fanbridge::error::SensorError;
use fanbridge::lockout::Lockout;
use fanbridge::scheduler::Scheduler;
use fanbridge::state::TachFrequencies;

use super::mock_hw::MockBoard;

type Controller = FanController<MockBoard, BasicCommands, MirrorCurve, Arc<ManualClock>>;

struct Rig {
    clock: Arc<ManualClock>,
    freqs: Arc<TachFrequencies>,
    sched: Scheduler,
    ctl: Controller,
}

impl Rig {
    fn new(board: MockBoard) -> Self {
        Self::with_config(board, SystemConfig::default())
    }

    fn with_config(board: MockBoard, config: SystemConfig) -> Self {
        let clock = Arc::new(ManualClock::new(0));
        let freqs = Arc::new(TachFrequencies::new());
        let sched = Scheduler::standard(&config.intervals);
        let ctl = FanController::new(
            board,
            BasicCommands::new(),
            MirrorCurve,
            Arc::clone(&clock),
            config,
            Arc::clone(&freqs),
            Arc::new(Lockout::new()),
        );
        Self {
            clock,
            freqs,
            sched,
            ctl,
        }
    }

    /// Move the clock to `ms` and run one iteration.
    fn tick_at(&mut self, ms: u64) {
        self.clock.set_us(ms * 1000);
        self.sched.tick(self.clock.now_us(), &mut self.ctl);
    }

    fn board(&mut self) -> &mut MockBoard {
        self.ctl.board_mut()
    }
}

// ── Boot iteration ───────────────────────────────────────────

#[test]
fn first_iteration_samples_and_drives_every_output() {
    let mut board = MockBoard::new();
    board.duty_in = [Ok(40.0), Ok(10.0)];
    let mut rig = Rig::new(board);
    rig.freqs.publish(0, 20.0);

    rig.tick_at(0);

    let s = *rig.ctl.state();
    assert_eq!(s.mbfan_duty, [40.0, 10.0]);
    assert_eq!(s.fan_freq[0], 20.0);
    assert_eq!(s.fan_duty, [40.0; 4]);
    assert_eq!(s.mbfan_freq, [20.0, 0.0]);
    assert!(!s.dirty, "output update must consume the dirty flag");

    let b = rig.board();
    assert_eq!(b.duty_writes(), vec![(0, 40.0), (1, 40.0), (2, 40.0), (3, 40.0)]);
    assert_eq!(b.frequency_writes(), vec![(0, 20.0)]);
    assert_eq!(b.led, vec![true]);
    assert_eq!(b.display_refreshes, 1);
    assert_eq!(b.network_polls, 1);
    assert_eq!(b.feeds, 1);
}

// ── Change gate ──────────────────────────────────────────────

#[test]
fn duty_jitter_below_threshold_is_ignored() {
    let mut board = MockBoard::new();
    board.duty_in = [Ok(40.0), Ok(0.0)];
    let mut rig = Rig::new(board);
    rig.tick_at(0);
    let writes = rig.board().outputs.len();

    // 40.4 rounds to 40: no change.
    rig.board().duty_in = [Ok(40.4), Ok(0.0)];
    rig.tick_at(1500);
    assert_eq!(rig.ctl.state().mbfan_duty[0], 40.0);
    assert_eq!(rig.board().outputs.len(), writes);

    // 40.6 rounds to 41: a whole percent, passes the 0.5 gate.
    rig.board().duty_in = [Ok(40.6), Ok(0.0)];
    rig.tick_at(3000);
    assert_eq!(rig.ctl.state().mbfan_duty[0], 41.0);
    assert_eq!(rig.ctl.state().fan_duty, [41.0; 4]);
    assert_eq!(rig.board().outputs.len(), writes + 4);
}

#[test]
fn input_change_triggers_output_update_before_fallback() {
    let mut rig = Rig::new(MockBoard::new());
    rig.tick_at(0);
    assert_eq!(rig.sched.fire_count(TaskId::OutputUpdate), 1);

    rig.board().duty_in = [Ok(55.0), Ok(0.0)];
    rig.tick_at(1500);
    // Dirty since the duty task in this very iteration.
    assert_eq!(rig.sched.fire_count(TaskId::OutputUpdate), 2);
    assert_eq!(rig.ctl.state().fan_duty[0], 55.0);

    // Window restarted at 1500 ms: nothing at 3000, fallback at 4500.
    rig.tick_at(3000);
    assert_eq!(rig.sched.fire_count(TaskId::OutputUpdate), 2);
    rig.tick_at(4500);
    assert_eq!(rig.sched.fire_count(TaskId::OutputUpdate), 3);
}

#[test]
fn several_changes_in_one_iteration_batch_into_one_update() {
    let mut rig = Rig::new(MockBoard::new());
    rig.tick_at(0);
    assert_eq!(rig.sched.fire_count(TaskId::OutputUpdate), 1);

    rig.board().duty_in = [Ok(35.0), Ok(20.0)];
    rig.freqs.publish(0, 18.0);
    rig.tick_at(2000);

    assert_eq!(rig.sched.fire_count(TaskId::OutputUpdate), 2);
    assert_eq!(rig.ctl.state().mbfan_duty, [35.0, 20.0]);
    assert_eq!(rig.ctl.state().mbfan_freq[0], 18.0);
    assert!(!rig.ctl.state().dirty);
}

#[test]
fn fallback_output_pass_writes_nothing_when_unchanged() {
    let mut board = MockBoard::new();
    board.duty_in = [Ok(30.0), Ok(0.0)];
    let mut rig = Rig::new(board);
    rig.tick_at(0);
    let writes = rig.board().outputs.len();

    rig.tick_at(3000);
    assert_eq!(rig.sched.fire_count(TaskId::OutputUpdate), 2);
    assert_eq!(rig.board().outputs.len(), writes);
}

#[test]
fn temperature_gate_is_inclusive() {
    let mut board = MockBoard::new();
    board.temps = [Ok(30.0), Ok(0.0)];
    let mut rig = Rig::new(board);
    rig.tick_at(0);
    assert_eq!(rig.ctl.state().temp[0], 30.0);

    rig.board().temps[0] = Ok(30.25);
    rig.tick_at(10_000);
    assert_eq!(rig.ctl.state().temp[0], 30.0);

    rig.board().temps[0] = Ok(30.5);
    rig.tick_at(20_000);
    assert_eq!(rig.ctl.state().temp[0], 30.5);
}

#[test]
fn tach_change_below_threshold_is_ignored() {
    let mut rig = Rig::new(MockBoard::new());
    rig.freqs.publish(2, 30.0);
    rig.tick_at(0);
    assert_eq!(rig.ctl.state().fan_freq[2], 30.0);

    rig.freqs.publish(2, 30.25);
    rig.tick_at(2000);
    assert_eq!(rig.ctl.state().fan_freq[2], 30.0);

    rig.freqs.publish(2, 31.0);
    rig.tick_at(4000);
    assert_eq!(rig.ctl.state().fan_freq[2], 31.0);
}

// ── Error handling ───────────────────────────────────────────

#[test]
fn sensor_error_keeps_previous_value() {
    let mut board = MockBoard::new();
    board.temps = [Ok(25.0), Ok(26.0)];
    let mut rig = Rig::new(board);
    rig.tick_at(0);

    rig.board().temps = [Ok(35.0), Err(SensorError::AdcReadFailed)];
    rig.tick_at(10_000);
    assert_eq!(rig.ctl.state().temp, [35.0, 26.0]);
    assert_eq!(rig.ctl.metrics().sensor_errors, 1);

    rig.board().duty_in = [Err(SensorError::NoSignal); 2];
    rig.tick_at(11_500);
    assert_eq!(rig.ctl.state().mbfan_duty, [0.0, 0.0]);
    assert_eq!(rig.ctl.metrics().sensor_errors, 3);
}

#[test]
fn dead_duty_input_does_not_freeze_the_other() {
    let mut board = MockBoard::new();
    board.duty_in = [Ok(30.0), Ok(30.0)];
    let mut rig = Rig::new(board);
    rig.tick_at(0);

    rig.board().duty_in = [Ok(65.0), Err(SensorError::NoSignal)];
    rig.tick_at(1500);
    assert_eq!(rig.ctl.state().mbfan_duty, [65.0, 30.0]);
    assert_eq!(rig.ctl.state().fan_duty, [65.0; 4]);
    assert_eq!(rig.ctl.metrics().sensor_errors, 1);
}

#[test]
fn failed_output_write_is_retried_on_next_pass() {
    let mut board = MockBoard::new();
    board.duty_in = [Ok(60.0), Ok(0.0)];
    board.fail_outputs = true;
    let mut rig = Rig::new(board);
    rig.tick_at(0);

    assert_eq!(rig.ctl.state().fan_duty, [0.0; 4]);
    assert_eq!(rig.ctl.metrics().actuator_errors, 4);
    assert!(rig.board().outputs.is_empty());

    rig.board().fail_outputs = false;
    rig.tick_at(3000);
    assert_eq!(rig.ctl.state().fan_duty, [60.0; 4]);
    assert_eq!(rig.board().duty_writes().len(), 4);
    assert_eq!(rig.ctl.metrics().output_writes, 4);
}

// ── Indicators and supervision ───────────────────────────────

#[test]
fn status_led_slow_blink_toggles_each_period() {
    let mut rig = Rig::new(MockBoard::new());
    for ms in [0, 500, 1000, 1500, 2000] {
        rig.tick_at(ms);
    }
    assert_eq!(rig.board().led, vec![true, false, true]);
}

#[test]
fn status_led_always_on() {
    let config = SystemConfig {
        led_mode: LedMode::AlwaysOn,
        ..SystemConfig::default()
    };
    let mut rig = Rig::with_config(MockBoard::new(), config);
    rig.tick_at(0);
    rig.tick_at(1000);
    assert_eq!(rig.board().led, vec![true, true]);
}

#[test]
fn watchdog_is_fed_every_iteration() {
    let mut rig = Rig::new(MockBoard::new());
    for i in 0..7 {
        rig.tick_at(i);
    }
    assert_eq!(rig.board().feeds, 7);
    assert_eq!(rig.ctl.metrics().iterations(), 7);
}

// ── Console ──────────────────────────────────────────────────

#[test]
fn console_command_is_answered_in_the_same_iteration() {
    let mut rig = Rig::new(MockBoard::new());
    rig.board().type_in("*IDN?\r");
    rig.tick_at(0);
    assert!(rig.board().output().starts_with("FanBridge,FANBRIDGE-4,0,"));
    assert_eq!(rig.ctl.console().lines_dispatched(), 1);
    assert_eq!(rig.ctl.processor().handled(), 1);
}

#[test]
fn measurement_reply_sees_this_iterations_samples() {
    let mut board = MockBoard::new();
    board.duty_in = [Ok(70.0), Ok(0.0)];
    let mut rig = Rig::new(board);
    rig.board().type_in("MEAS?\n");
    rig.tick_at(0);
    let out = rig.board().output();
    assert!(out.contains("mbfan1,duty=70.0"));
    assert!(out.contains("fan1,duty=70.0"));
}

#[test]
fn partial_console_line_waits_for_terminator() {
    let mut rig = Rig::new(MockBoard::new());
    rig.board().type_in("SYS:");
    rig.tick_at(0);
    assert!(rig.board().output().is_empty());
    rig.board().type_in("VER?\r");
    rig.tick_at(1);
    assert_eq!(
        rig.board().output(),
        format!("{}\r\n", fanbridge::app::commands::FIRMWARE_VERSION)
    );
}

#[test]
fn lockout_command_without_worker_succeeds() {
    let mut rig = Rig::new(MockBoard::new());
    rig.board().type_in("SYS:LOCKOUT\r");
    rig.tick_at(0);
    assert_eq!(rig.board().output(), "OK\r\n");
}

#[test]
fn local_echo_follows_config() {
    let config = SystemConfig {
        local_echo: true,
        ..SystemConfig::default()
    };
    let mut rig = Rig::with_config(MockBoard::new(), config);
    rig.board().type_in("bogus\r");
    rig.tick_at(0);
    assert_eq!(rig.board().output(), "bogus\r\nERR\r\n");
}
