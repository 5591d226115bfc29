//! Cooperative task scheduler for the control core.
//!
//! A fixed, ordered table of tasks is evaluated on every loop iteration.
//! The scheduler only decides *when*; the [`TaskRunner`] delegate decides
//! *what*.  Tasks run to completion in declared order, so a task sees
//! every write made by the tasks before it in the same iteration.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  loop {  now = clock.now_us()                                │
//! │          track max iteration latency                         │
//! │          for slot in table (declared order):                 │
//! │              due?  ──▶ runner.run(task, tick) ; last = now   │
//! │  }                                                           │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! A fired task restarts its interval from the moment it fired, not from
//! its nominal deadline.  Late iterations therefore push every later fire
//! back; over long runs the effective period drifts above the nominal one.
//! This matches the behaviour the fan timings were tuned against.

use heapless::Vec;
use log::{debug, info};

use crate::app::ports::{Clock, TaskId, TaskRunner, TickInfo};
use crate::config::TaskIntervals;

// ═══════════════════════════════════════════════════════════════
//  Task table types
// ═══════════════════════════════════════════════════════════════

/// When a task becomes due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// At least `ms` milliseconds since the last fire.
    Every(u32),
    /// When the runner reports pending work, or as [`Cadence::Every`].
    PendingOrEvery(u32),
    /// On every loop iteration.
    EveryIteration,
}

/// One entry of the task table.
#[derive(Debug, Clone)]
pub struct TaskSlot {
    pub task: TaskId,
    pub cadence: Cadence,
    /// `None` until the first fire; a never-fired task is due immediately.
    last_fire_us: Option<u64>,
    fire_count: u64,
}

impl TaskSlot {
    fn new(task: TaskId, cadence: Cadence) -> Self {
        Self {
            task,
            cadence,
            last_fire_us: None,
            fire_count: 0,
        }
    }

    fn interval_elapsed(&self, now_us: u64, ms: u32) -> bool {
        match self.last_fire_us {
            None => true,
            Some(last) => now_us.saturating_sub(last) >= u64::from(ms) * 1000,
        }
    }

    fn is_due(&self, now_us: u64, runner: &impl TaskRunner) -> bool {
        match self.cadence {
            Cadence::Every(ms) => self.interval_elapsed(now_us, ms),
            Cadence::PendingOrEvery(ms) => {
                runner.pending(self.task) || self.interval_elapsed(now_us, ms)
            }
            Cadence::EveryIteration => true,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler engine
// ═══════════════════════════════════════════════════════════════

/// Maximum number of task slots (stack-allocated).
pub const MAX_TASKS: usize = 12;

/// The scheduler engine.
///
/// Decoupled from the hardware: it never calls a port itself, only the
/// [`TaskRunner`] delegate.  This keeps it testable with a synthetic clock.
pub struct Scheduler {
    slots: Vec<TaskSlot, MAX_TASKS>,
    last_tick_us: Option<u64>,
    max_loop_us: u64,
    iterations: u64,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// An empty table.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            last_tick_us: None,
            max_loop_us: 0,
            iterations: 0,
        }
    }

    /// The control core's standard table, in its required order.
    pub fn standard(intervals: &TaskIntervals) -> Self {
        let mut sched = Self::new();
        let table = [
            (TaskId::NetworkPoll, Cadence::Every(intervals.network_poll_ms)),
            (TaskId::StatusLed, Cadence::Every(intervals.status_led_ms)),
            (TaskId::Display, Cadence::Every(intervals.display_ms)),
            (TaskId::InputDuty, Cadence::Every(intervals.input_duty_ms)),
            (TaskId::Temperature, Cadence::Every(intervals.temperature_ms)),
            (TaskId::InputFrequency, Cadence::Every(intervals.input_freq_ms)),
            (
                TaskId::OutputUpdate,
                Cadence::PendingOrEvery(intervals.output_update_ms),
            ),
            (TaskId::Console, Cadence::EveryIteration),
            (TaskId::Watchdog, Cadence::EveryIteration),
        ];
        for (task, cadence) in table {
            // The standard table is smaller than MAX_TASKS.
            let _ = sched.add(task, cadence);
        }
        sched
    }

    /// Append a task.  Returns the slot index, or `None` if full.
    pub fn add(&mut self, task: TaskId, cadence: Cadence) -> Option<usize> {
        let index = self.slots.len();
        self.slots.push(TaskSlot::new(task, cadence)).ok()?;
        debug!("Scheduler: added {:?} ({:?}) at slot {}", task, cadence, index);
        Some(index)
    }

    /// Evaluate the table once at time `now_us`.
    pub fn tick(&mut self, now_us: u64, runner: &mut impl TaskRunner) {
        if let Some(last) = self.last_tick_us {
            let delta = now_us.saturating_sub(last);
            if delta > self.max_loop_us {
                self.max_loop_us = delta;
                debug!("core0: max_loop_time={}", self.max_loop_us);
            }
        }
        self.last_tick_us = Some(now_us);
        self.iterations += 1;

        let info = TickInfo {
            now_us,
            iteration: self.iterations,
            max_loop_us: self.max_loop_us,
        };

        for slot in &mut self.slots {
            if slot.is_due(now_us, &*runner) {
                runner.run(slot.task, &info);
                slot.last_fire_us = Some(now_us);
                slot.fire_count += 1;
            }
        }
    }

    /// Run forever.  Only a watchdog reset ends this loop.
    pub fn run(&mut self, clock: &impl Clock, runner: &mut impl TaskRunner) -> ! {
        info!("Scheduler: entering main loop ({} tasks)", self.slots.len());
        loop {
            self.tick(clock.now_us(), runner);
        }
    }

    /// How many times `task` has fired.
    pub fn fire_count(&self, task: TaskId) -> u64 {
        self.slots
            .iter()
            .find(|s| s.task == task)
            .map_or(0, |s| s.fire_count)
    }

    /// Worst iteration-to-iteration latency observed (µs).
    pub fn max_loop_us(&self) -> u64 {
        self.max_loop_us
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Task order as evaluated each tick.
    pub fn order(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.slots.iter().map(|s| s.task)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
