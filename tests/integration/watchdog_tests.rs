//! Watchdog supervision of the scheduler loop, on the simulated timer.

use std::sync::Arc;

use fanbridge::adapters::time::ManualClock;
use fanbridge::app::ports::{Clock, TaskId, TaskRunner, TickInfo, WatchdogPort};
use fanbridge::config::SystemConfig;
use fanbridge::drivers::watchdog::{BootReport, ResetReason, RetainedRegs, SimWatchdog, WatchdogStatus};
use fanbridge::scheduler::Scheduler;

/// Runs only the watchdog task for real; the display task can be told to
/// stall once.
struct Runner<'r> {
    clock: Arc<ManualClock>,
    wd: SimWatchdog<'r, Arc<ManualClock>>,
    stall_ms: Option<u64>,
    expired: bool,
}

impl TaskRunner for Runner<'_> {
    fn run(&mut self, task: TaskId, _tick: &TickInfo) {
        match task {
            TaskId::Display => {
                if let Some(ms) = self.stall_ms.take() {
                    self.clock.advance_ms(ms);
                }
            }
            TaskId::Watchdog => {
                if self.wd.poll() == WatchdogStatus::Expired {
                    self.expired = true;
                } else {
                    self.wd.feed();
                }
            }
            _ => {}
        }
    }
}

fn run_loop(regs: &RetainedRegs, stall_ms: Option<u64>, iterations: u32) -> bool {
    let config = SystemConfig::default();
    let clock = Arc::new(ManualClock::new(0));
    let mut wd = SimWatchdog::new(Arc::clone(&clock), regs);
    wd.arm(config.watchdog_timeout_ms);
    let mut runner = Runner {
        clock: Arc::clone(&clock),
        wd,
        stall_ms,
        expired: false,
    };
    let mut sched = Scheduler::standard(&config.intervals);
    for _ in 0..iterations {
        clock.advance_ms(10);
        sched.tick(clock.now_us(), &mut runner);
        if runner.expired {
            break;
        }
    }
    runner.expired
}

#[test]
fn healthy_loop_never_trips() {
    let regs = RetainedRegs::new();
    // One simulated minute.
    assert!(!run_loop(&regs, None, 6000));
    assert_eq!(regs.take_reset_reason(), None);
}

#[test]
fn stall_shorter_than_timeout_is_tolerated() {
    let regs = RetainedRegs::new();
    assert!(!run_loop(&regs, Some(7000), 100));
    assert_eq!(regs.take_reset_reason(), None);
}

#[test]
fn hung_task_forces_reset_and_next_boot_reports_it() {
    let regs = RetainedRegs::new();
    assert!(run_loop(&regs, Some(9000), 100));

    // "Reboot": the retained cause surfaces exactly once.
    let reason = regs.take_reset_reason().unwrap();
    assert_eq!(reason, ResetReason::Watchdog);
    let report = BootReport::from_reason(reason);
    assert_eq!(report.notice(), Some("[Rebooted by watchdog]"));
    assert_eq!(regs.take_reset_reason(), None);
}
