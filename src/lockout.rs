//! Cross-core lockout.
//!
//! Lets the scheduler core park the capture worker at a known safe point
//! for a short critical section (flash writes, multi-field updates that must
//! not interleave with worker publishes).
//!
//! ```text
//!   scheduler core                      worker core
//!   ──────────────                      ───────────
//!   acquire() ── request ───────────▶   checkpoint(): sees request
//!             ◀── ack(seq) ──────────     parks, spins
//!   ...critical section...
//!   drop(guard) ── release ─────────▶   resumes next instruction
//! ```
//!
//! Acquisition is bounded by a timeout measured on the caller's [`Clock`],
//! so a wedged worker can never stall the scheduler past the watchdog.

use core::hint::spin_loop;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use log::{debug, warn};

use crate::app::ports::Clock;
use crate::error::LockoutError;

/// Shared lockout primitive.  One instance is created at boot and handed to
/// both cores behind an `Arc`.
#[derive(Debug, Default)]
pub struct Lockout {
    /// A holder exists (or is waiting for the park acknowledgement).
    requested: AtomicBool,
    /// Bumped by every acquisition; the worker echoes it back in `park_ack`.
    request_seq: AtomicU32,
    park_ack: AtomicU32,
    /// The worker is currently spinning inside [`Lockout::checkpoint`].
    parked: AtomicBool,
    /// A worker has registered itself as the parking side.
    victim: AtomicBool,
    /// Completed lockout round-trips.
    rounds: AtomicU32,
}

impl Lockout {
    pub const fn new() -> Self {
        Self {
            requested: AtomicBool::new(false),
            request_seq: AtomicU32::new(0),
            park_ack: AtomicU32::new(0),
            parked: AtomicBool::new(false),
            victim: AtomicBool::new(false),
            rounds: AtomicU32::new(0),
        }
    }

    /// Called once by the worker before entering its loop.
    pub fn register_victim(&self) {
        self.victim.store(true, Ordering::SeqCst);
        debug!("lockout: victim registered");
    }

    pub fn has_victim(&self) -> bool {
        self.victim.load(Ordering::SeqCst)
    }

    /// Park the worker and return a guard holding it parked.
    ///
    /// Fails with [`LockoutError::Busy`] if a guard is already live, and
    /// with [`LockoutError::Timeout`] if the worker does not reach its
    /// checkpoint within `timeout_ms`.  With no registered worker the
    /// lockout is trivially held.
    pub fn acquire(
        &self,
        clock: &impl Clock,
        timeout_ms: u32,
    ) -> Result<LockoutGuard<'_>, LockoutError> {
        if self
            .requested
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(LockoutError::Busy);
        }
        let seq = self.request_seq.fetch_add(1, Ordering::SeqCst).wrapping_add(1);

        if !self.has_victim() {
            self.rounds.fetch_add(1, Ordering::Relaxed);
            return Ok(LockoutGuard { lockout: self });
        }

        let start = clock.now_us();
        let budget_us = u64::from(timeout_ms) * 1000;
        loop {
            if self.park_ack.load(Ordering::SeqCst) == seq {
                self.rounds.fetch_add(1, Ordering::Relaxed);
                return Ok(LockoutGuard { lockout: self });
            }
            if clock.now_us().saturating_sub(start) >= budget_us {
                self.requested.store(false, Ordering::SeqCst);
                warn!("lockout: worker did not park within {} ms", timeout_ms);
                return Err(LockoutError::Timeout);
            }
            spin_loop();
            std::thread::yield_now();
        }
    }

    /// Worker-side safe point.  Returns immediately when no lockout is
    /// requested; otherwise parks until the holder releases.
    ///
    /// Returns `true` if the worker was parked.
    pub fn checkpoint(&self) -> bool {
        if !self.requested.load(Ordering::SeqCst) {
            return false;
        }
        self.parked.store(true, Ordering::SeqCst);
        loop {
            // Acknowledge before re-checking, so a holder that requested
            // after our last look still sees us parked.
            self.park_ack
                .store(self.request_seq.load(Ordering::SeqCst), Ordering::SeqCst);
            if !self.requested.load(Ordering::SeqCst) {
                break;
            }
            spin_loop();
            std::thread::yield_now();
        }
        self.parked.store(false, Ordering::SeqCst);
        true
    }

    /// A guard is live or an acquisition is in progress.
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    pub fn is_parked(&self) -> bool {
        self.parked.load(Ordering::SeqCst)
    }

    pub fn rounds(&self) -> u32 {
        self.rounds.load(Ordering::Relaxed)
    }

    fn release(&self) {
        self.requested.store(false, Ordering::SeqCst);
    }
}

/// Keeps the worker parked until dropped.
#[must_use = "the worker resumes as soon as the guard is dropped"]
#[derive(Debug)]
pub struct LockoutGuard<'a> {
    lockout: &'a Lockout,
}

impl Drop for LockoutGuard<'_> {
    fn drop(&mut self) {
        self.lockout.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    /// Clock that advances 1 ms every time it is read.
    struct SteppingClock(Cell<u64>);

    impl Clock for SteppingClock {
        fn now_us(&self) -> u64 {
            let t = self.0.get();
            self.0.set(t + 1000);
            t
        }
    }

    #[test]
    fn no_victim_acquires_immediately() {
        let lock = Lockout::new();
        let clock = SteppingClock(Cell::new(0));
        let guard = lock.acquire(&clock, 10).unwrap();
        assert!(lock.is_requested());
        drop(guard);
        assert!(!lock.is_requested());
        assert_eq!(lock.rounds(), 1);
    }

    #[test]
    fn second_holder_is_busy() {
        let lock = Lockout::new();
        let clock = SteppingClock(Cell::new(0));
        let _guard = lock.acquire(&clock, 10).unwrap();
        assert_eq!(lock.acquire(&clock, 10).unwrap_err(), LockoutError::Busy);
    }

    #[test]
    fn unresponsive_victim_times_out_and_releases() {
        let lock = Lockout::new();
        lock.register_victim();
        let clock = SteppingClock(Cell::new(0));
        assert_eq!(lock.acquire(&clock, 5).unwrap_err(), LockoutError::Timeout);
        assert!(!lock.is_requested());
        // The worker's next checkpoint does not park.
        assert!(!lock.checkpoint());
        assert_eq!(lock.rounds(), 0);
    }

    #[test]
    fn checkpoint_is_free_without_request() {
        let lock = Lockout::new();
        lock.register_victim();
        assert!(!lock.checkpoint());
        assert!(!lock.is_parked());
    }
}
