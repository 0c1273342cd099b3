use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Clock: source of "now" for expiry checks
//
// Validation takes time as an input; the clock is injected at the edges so
// tests can pin it without touching the system time.
// ---------------------------------------------------------------------------

pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time from the OS.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// A clock that always reports the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Timestamp);

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}
