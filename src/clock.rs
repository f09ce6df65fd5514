//! Time source used for entry creation stamps and staleness checks
//!
//! Stores never call `Utc::now()` directly; they ask the [`Clock`] they were
//! configured with. Production code uses [`SystemClock`], tests drive time with
//! a [`ManualClock`].

use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::sync::{Arc, Mutex};

/// A source of "now"
pub trait Clock: Send + Sync + fmt::Debug {
    /// Returns the current instant
    fn now(&self) -> DateTime<Utc>;
}

/// Shared handle to a clock, cloned into every store
pub type SharedClock = Arc<dyn Clock>;

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Returns the default shared clock
pub fn system() -> SharedClock {
    Arc::new(SystemClock)
}

/// A clock that only moves when told to
///
/// Cloning a `ManualClock` yields a handle to the same instant, so a test can
/// keep one handle and hand another to the store under test.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Moves the clock to an absolute instant
    pub fn set(&self, instant: DateTime<Utc>) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now = instant;
    }

    /// Moves the clock forward by `by`
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Whether an entry created at `created_at` has outlived `timeout` at `now`
///
/// The comparison is strict: an entry exactly `timeout` old is still fresh.
/// A creation time in the future (clock skew) counts as fresh.
pub fn is_stale(created_at: DateTime<Utc>, now: DateTime<Utc>, timeout: std::time::Duration) -> bool {
    match (now - created_at).to_std() {
        Ok(age) => age > timeout,
        Err(_) => false,
    }
}
