//! Tach capture worker (second core).
//!
//! Runs a tight loop on [`Core::App`] that owns the [`TachCapture`]
//! hardware exclusively and publishes each completed measurement into the
//! shared [`TachFrequencies`].  The scheduler core only ever reads those
//! slots.
//!
//! Every iteration starts with a [`Lockout::checkpoint`], the worker's one
//! safe point: the scheduler core can park the worker there for a short
//! critical section and the worker resumes when the guard drops.

use std::io;
use std::sync::Arc;
use std::thread::JoinHandle;

use log::{debug, error, info};

use crate::app::ports::{Clock, TachCapture, TachReading};
use crate::drivers::hw_init;
use crate::drivers::task_pin::{self, Core};
use crate::lockout::Lockout;
use crate::state::TachFrequencies;

/// Worker heartbeat period (µs).
const TICK_LOG_US: u64 = 60_000_000;

const WORKER_PRIORITY: u8 = 10;
const WORKER_STACK_KB: usize = 8;

pub struct CaptureWorker<T: TachCapture, K: Clock> {
    capture: T,
    clock: K,
    freqs: Arc<TachFrequencies>,
    lockout: Arc<Lockout>,
    last_iter_us: Option<u64>,
    last_tick_log_us: Option<u64>,
    max_loop_us: u64,
    iterations: u64,
    parks: u32,
}

impl<T: TachCapture, K: Clock> CaptureWorker<T, K> {
    pub fn new(capture: T, clock: K, freqs: Arc<TachFrequencies>, lockout: Arc<Lockout>) -> Self {
        Self {
            capture,
            clock,
            freqs,
            lockout,
            last_iter_us: None,
            last_tick_log_us: None,
            max_loop_us: 0,
            iterations: 0,
            parks: 0,
        }
    }

    /// One loop iteration.  Returns the reading published, if any.
    pub fn step(&mut self) -> Option<TachReading> {
        let parked = self.lockout.checkpoint();
        let now = self.clock.now_us();
        if parked {
            self.parks += 1;
            // Pulses seen while parked belong to no open window.
            self.capture.restart(now);
            self.last_iter_us = None;
        }

        if let Some(last) = self.last_iter_us {
            let delta = now.saturating_sub(last);
            if delta > self.max_loop_us {
                self.max_loop_us = delta;
                debug!("core1: max_loop_time={}", self.max_loop_us);
            }
        }
        self.last_iter_us = Some(now);
        self.iterations += 1;

        let reading = self.capture.poll(now);
        if let Some(r) = reading {
            self.freqs.publish(r.channel, r.hz);
        }

        match self.last_tick_log_us {
            None => self.last_tick_log_us = Some(now),
            Some(t) if now.saturating_sub(t) >= TICK_LOG_US => {
                debug!("core1: tick");
                self.last_tick_log_us = Some(now);
            }
            Some(_) => {}
        }

        self.freqs.record_worker_loop(self.iterations, self.max_loop_us);
        reading
    }

    /// Bring the worker up on the calling thread: attach the capture
    /// interrupts to this core, then register as the lockout victim.
    pub fn start(&mut self) {
        info!("core1: started...");
        if let Err(e) = hw_init::init_capture_interrupts() {
            error!("core1: {}; tach inputs will read 0 Hz", e);
        }
        self.lockout.register_victim();
        self.capture.restart(self.clock.now_us());
    }

    /// [`start`](Self::start), then loop forever.
    pub fn run(mut self) -> ! {
        self.start();
        loop {
            self.step();
        }
    }

    /// Times the worker has been parked by a lockout.
    pub fn parks(&self) -> u32 {
        self.parks
    }

    pub fn max_loop_us(&self) -> u64 {
        self.max_loop_us
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }
}

impl<T, K> CaptureWorker<T, K>
where
    T: TachCapture + Send + 'static,
    K: Clock + Send + 'static,
{
    /// Launch [`run`](Self::run) on the second core.
    pub fn spawn(self) -> io::Result<JoinHandle<()>> {
        task_pin::spawn_on_core(Core::App, WORKER_PRIORITY, WORKER_STACK_KB, "capture\0", move || {
            self.run();
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::time::ManualClock;

    /// Emits a fixed reading on every poll.
    struct Fixed(TachReading);

    impl TachCapture for Fixed {
        fn poll(&mut self, _now_us: u64) -> Option<TachReading> {
            Some(self.0)
        }
    }

    #[test]
    fn step_publishes_reading() {
        let freqs = Arc::new(TachFrequencies::new());
        let clock = Arc::new(ManualClock::new(0));
        let mut w = CaptureWorker::new(
            Fixed(TachReading { channel: 1, hz: 42.0 }),
            Arc::clone(&clock),
            Arc::clone(&freqs),
            Arc::new(Lockout::new()),
        );
        assert!(w.step().is_some());
        assert_eq!(freqs.load(1), 42.0);
        assert_eq!(freqs.published(1), 1);
    }

    /// Counts restarts.
    #[derive(Default)]
    struct Restarts(u32);

    impl TachCapture for Restarts {
        fn poll(&mut self, _now_us: u64) -> Option<TachReading> {
            None
        }

        fn restart(&mut self, _now_us: u64) {
            self.0 += 1;
        }
    }

    #[test]
    fn start_attaches_interrupts_and_registers() {
        let lockout = Arc::new(Lockout::new());
        let mut w = CaptureWorker::new(
            Restarts::default(),
            Arc::new(ManualClock::new(0)),
            Arc::new(TachFrequencies::new()),
            Arc::clone(&lockout),
        );
        w.start();
        assert!(lockout.has_victim());
        assert!(hw_init::capture_interrupts_attached());
        assert_eq!(w.capture.0, 1);
        assert_eq!(w.parks(), 0);
    }

    #[test]
    fn tracks_latency_and_iterations() {
        let freqs = Arc::new(TachFrequencies::new());
        let clock = Arc::new(ManualClock::new(0));
        let mut w = CaptureWorker::new(
            Fixed(TachReading { channel: 0, hz: 1.0 }),
            Arc::clone(&clock),
            Arc::clone(&freqs),
            Arc::new(Lockout::new()),
        );
        w.step();
        clock.advance_us(250);
        w.step();
        clock.advance_us(100);
        w.step();
        assert_eq!(w.max_loop_us(), 250);
        assert_eq!(w.iterations(), 3);
        assert_eq!(freqs.worker_max_loop_us(), 250);
        assert_eq!(freqs.worker_iterations(), 3);
    }
}
