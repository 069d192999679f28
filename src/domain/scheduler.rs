//! Clock abstraction, cooperative cancellation and periodic scheduling.
//!
//! The polling loop that drives live evaluation is expressed as a
//! poll-based periodic task over an injectable clock, so schedules can be
//! tested deterministically without wall-clock waits. `CancelToken` is the
//! same flag the backtest engine checks once per bar.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for deterministic tests.
#[derive(Debug)]
pub struct ManualClock {
    now: std::sync::Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> ManualClock {
        ManualClock {
            now: std::sync::Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("clock lock poisoned");
        *now = *now + by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock poisoned")
    }
}

/// Shared cooperative cancellation flag. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// A fixed-interval schedule. `poll` returns true when a tick is due and
/// advances the schedule; missed intervals collapse into a single tick.
#[derive(Debug)]
pub struct PeriodicTask {
    interval: Duration,
    next_due: DateTime<Utc>,
    cancel: CancelToken,
}

impl PeriodicTask {
    pub fn new(start: DateTime<Utc>, interval: Duration, cancel: CancelToken) -> PeriodicTask {
        PeriodicTask {
            interval,
            next_due: start + interval,
            cancel,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn next_due(&self) -> DateTime<Utc> {
        self.next_due
    }

    /// True when the task should fire at `now`. Never fires after
    /// cancellation.
    pub fn poll(&mut self, now: DateTime<Utc>) -> bool {
        if self.cancel.is_cancelled() || now < self.next_due {
            return false;
        }
        // skip any intervals that elapsed while the caller was busy
        while self.next_due <= now {
            self.next_due = self.next_due + self.interval;
        }
        true
    }
}
