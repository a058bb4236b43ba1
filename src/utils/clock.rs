//! Time source shared by the pacer and the tracker.
//!
//! [`TimeSource::sleep_until`] is the only place the pacer blocks, and it is
//! woken early by the [`Shutdown`] token.

use std::{
    sync::{
        Arc, Condvar, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

/// Below this much remaining time the sleep spins instead of blocking.
const SPIN_THRESHOLD: Duration = Duration::from_micros(200);
/// Subtracted from the coarse sleep to avoid oversleeping.
const SLEEP_MARGIN: Duration = Duration::from_micros(100);

/// Cancellation token observed by the blocking loops.
///
/// Cloning shares the token. Triggering it more than once has no further effect.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    inner: Arc<ShutdownInner>,
}

#[derive(Debug, Default)]
struct ShutdownInner {
    triggered: AtomicBool,
    lock: Mutex<()>,
    wake: Condvar,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the token as triggered and wakes every waiter.
    ///
    /// Returns `true` only for the call that actually triggered it.
    pub fn trigger(&self) -> bool {
        let first = !self.inner.triggered.swap(true, Ordering::SeqCst);
        // taking the lock orders the flag store before a waiter's re-check
        let _guard = self.inner.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.inner.wake.notify_all();
        first
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.triggered.load(Ordering::SeqCst)
    }

    /// Blocks for up to `timeout`. Returns `true` if the token fired.
    fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.inner.lock.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if self.is_triggered() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            guard = match self.inner.wake.wait_timeout(guard, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }
}

/// Outcome of a [`TimeSource::sleep_until`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// The deadline was reached (or was already in the past).
    Elapsed,
    /// The shutdown token fired before the deadline.
    Interrupted,
}

#[derive(Debug, Clone, Default)]
pub struct TimeSource {
    shutdown: Shutdown,
}

impl TimeSource {
    pub fn new(shutdown: Shutdown) -> Self {
        Self { shutdown }
    }

    /// Monotonic, high resolution.
    pub fn now(&self) -> Instant {
        Instant::now()
    }

    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    /// Suspends the calling thread until `deadline`.
    ///
    /// A deadline in the past returns [`Wake::Elapsed`] immediately. A coarse
    /// blocking wait covers most of the interval and a yield loop covers the
    /// last [`SPIN_THRESHOLD`], so accuracy is bounded by the scheduler, not
    /// by the timer slack of a single long sleep.
    pub fn sleep_until(&self, deadline: Instant) -> Wake {
        loop {
            if self.shutdown.is_triggered() {
                return Wake::Interrupted;
            }
            let now = Instant::now();
            if now >= deadline {
                return Wake::Elapsed;
            }

            let remaining = deadline - now;
            if remaining > SPIN_THRESHOLD {
                if self.shutdown.wait_timeout(remaining - SLEEP_MARGIN) {
                    return Wake::Interrupted;
                }
            } else {
                std::thread::yield_now();
            }
        }
    }
}

/// Wall clock in microseconds since UNIX_EPOCH, negative before the epoch.
///
/// Only used for the wire timestamp and the one-way delay estimate. Sender and
/// receiver clocks are not synchronized, so delays derived from it are only
/// comparable within one session.
pub fn wall_micros() -> i64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_micros() as i64,
        Err(e) => -(e.duration().as_micros() as i64),
    }
}
