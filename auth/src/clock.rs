use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;

use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;

/// Source of the current instant used for token issuance and expiry checks.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock with one-second resolution.
///
/// Lets callers pin token issuance to a known instant and step across the
/// expiry boundary without sleeping.
#[derive(Debug)]
pub struct FixedClock {
    timestamp: AtomicI64,
}

impl FixedClock {
    /// Create a clock frozen at `instant`.
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self {
            timestamp: AtomicI64::new(instant.timestamp()),
        }
    }

    /// Move the clock forward by `step`.
    pub fn advance(&self, step: Duration) {
        self.timestamp.fetch_add(step.num_seconds(), Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.timestamp.load(Ordering::SeqCst), 0).unwrap_or_default()
    }
}
