//! Cross-core lockout against a real worker thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use fanbridge::adapters::time::MonotonicClock;
use fanbridge::app::ports::TachCapture;
use fanbridge::capture::CaptureWorker;
use fanbridge::error::LockoutError;
use fanbridge::lockout::Lockout;
use fanbridge::sensors::tach::{PulseCounterCapture, PulseCounters};
use fanbridge::state::TachFrequencies;

use super::mock_hw::SteadyTach;

struct RunningWorker {
    stop: Arc<AtomicBool>,
    handle: thread::JoinHandle<u32>,
}

impl RunningWorker {
    fn start(freqs: &Arc<TachFrequencies>, lockout: &Arc<Lockout>) -> Self {
        Self::with_capture(SteadyTach(12.5), freqs, lockout)
    }

    fn with_capture<T: TachCapture + Send + 'static>(
        capture: T,
        freqs: &Arc<TachFrequencies>,
        lockout: &Arc<Lockout>,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let mut worker = CaptureWorker::new(
            capture,
            MonotonicClock::new(),
            Arc::clone(freqs),
            Arc::clone(lockout),
        );
        let flag = Arc::clone(&stop);
        let handle = thread::spawn(move || {
            worker.start();
            while !flag.load(Ordering::Relaxed) {
                worker.step();
            }
            worker.parks()
        });
        Self { stop, handle }
    }

    fn finish(self) -> u32 {
        self.stop.store(true, Ordering::Relaxed);
        self.handle.join().unwrap()
    }
}

fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    false
}

#[test]
fn worker_parks_while_guard_is_held_and_resumes_after() {
    let freqs = Arc::new(TachFrequencies::new());
    let lockout = Arc::new(Lockout::new());
    let worker = RunningWorker::start(&freqs, &lockout);
    assert!(wait_until(|| lockout.has_victim() && freqs.published(0) > 0));

    let clock = MonotonicClock::new();
    let guard = lockout.acquire(&clock, 2000).expect("worker should park");
    assert!(lockout.is_parked());
    let frozen = freqs.published(0);
    thread::sleep(Duration::from_millis(20));
    assert_eq!(freqs.published(0), frozen, "parked worker must not publish");

    drop(guard);
    assert!(wait_until(|| freqs.published(0) > frozen));
    assert!(!lockout.is_requested());

    let parks = worker.finish();
    assert!(parks >= 1);
    assert_eq!(lockout.rounds(), 1);
}

#[test]
fn second_acquire_while_held_is_busy() {
    let freqs = Arc::new(TachFrequencies::new());
    let lockout = Arc::new(Lockout::new());
    let worker = RunningWorker::start(&freqs, &lockout);
    assert!(wait_until(|| lockout.has_victim()));

    let clock = MonotonicClock::new();
    let guard = lockout.acquire(&clock, 2000).unwrap();
    assert_eq!(lockout.acquire(&clock, 10).unwrap_err(), LockoutError::Busy);
    drop(guard);

    // Released: a fresh round-trip works again.
    let again = lockout.acquire(&clock, 2000);
    assert!(again.is_ok());
    drop(again);

    worker.finish();
    assert_eq!(lockout.rounds(), 2);
}

#[test]
fn repeated_rounds_do_not_lose_the_worker() {
    let freqs = Arc::new(TachFrequencies::new());
    let lockout = Arc::new(Lockout::new());
    let worker = RunningWorker::start(&freqs, &lockout);
    assert!(wait_until(|| lockout.has_victim()));

    let clock = MonotonicClock::new();
    for _ in 0..50 {
        let guard = lockout.acquire(&clock, 2000).unwrap();
        assert!(lockout.is_parked());
        drop(guard);
    }
    let before = freqs.published(0);
    assert!(wait_until(|| freqs.published(0) > before));
    worker.finish();
    assert_eq!(lockout.rounds(), 50);
}

static PARKED_PULSES: PulseCounters = PulseCounters::new();

#[test]
fn pulses_counted_during_lockout_are_discarded() {
    let freqs = Arc::new(TachFrequencies::new());
    let lockout = Arc::new(Lockout::new());
    let capture = PulseCounterCapture::with_counters(&PARKED_PULSES, 20);
    let worker = RunningWorker::with_capture(capture, &freqs, &lockout);
    assert!(wait_until(|| lockout.has_victim() && freqs.published(0) > 0));

    let clock = MonotonicClock::new();
    let guard = lockout.acquire(&clock, 2000).unwrap();
    PARKED_PULSES.record_many(0, 1000);
    thread::sleep(Duration::from_millis(30));
    let before = freqs.published(0);
    drop(guard);

    // The fan is silent after release: the first reading must say so.
    assert!(wait_until(|| freqs.published(0) > before));
    assert_eq!(freqs.load(0), 0.0);

    assert!(worker.finish() >= 1);
}
