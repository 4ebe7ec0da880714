//! Time sources and absolute deadlines.
//!
//! Every blocking port call takes a [`Deadline`] computed once at the start of
//! an operation. Nested calls consult the same deadline, so retries inside an
//! operation can never extend the caller's total budget.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Upper bound applied to timeouts so that deadline arithmetic cannot overflow.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// A source of monotonic time.
pub trait Clock {
    /// The current instant.
    fn now(&self) -> Instant;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// The process monotonic clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same instant, so a [`MemoryPort`](crate::MemoryPort) and
/// the code driving it observe the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    /// Create a clock frozen at the current system instant.
    pub fn new() -> Self {
        Self {
            now: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.lock();
        *now += by.min(MAX_TIMEOUT);
    }

    /// Move the clock forward to `instant`. Earlier instants are ignored.
    pub fn advance_to(&self, instant: Instant) {
        let mut now = self.lock();
        if instant > *now {
            *now = instant;
        }
    }

    fn lock(&self) -> MutexGuard<'_, Instant> {
        self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.lock()
    }
}

/// An absolute point in time after which a blocking wait must fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    /// A deadline `timeout` from now on `clock`.
    pub fn after(clock: &impl Clock, timeout: Duration) -> Self {
        Self {
            at: clock.now() + timeout.min(MAX_TIMEOUT),
        }
    }

    /// A deadline at a fixed instant.
    pub fn at(instant: Instant) -> Self {
        Self { at: instant }
    }

    /// The instant this deadline expires.
    pub fn instant(&self) -> Instant {
        self.at
    }

    /// Time left before expiry, or zero once expired.
    pub fn remaining(&self, clock: &impl Clock) -> Duration {
        self.at.saturating_duration_since(clock.now())
    }

    /// Returns true once `clock` has reached the deadline.
    pub fn has_expired(&self, clock: &impl Clock) -> bool {
        clock.now() >= self.at
    }
}
