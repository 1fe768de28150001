//! Refresh interval with exponential backoff

use std::time::Duration;

/// Delay until the next refresh attempt.
///
/// Starts at the base delay, doubles on every failure up to the cap and
/// snaps back to the base delay on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    /// Creates a backoff starting at `base`, capping at `max`.
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            current: base,
        }
    }

    /// Returns the current delay.
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Doubles the delay, capped at max.
    pub fn fail(&mut self) {
        self.current = self.current.saturating_mul(2).min(self.max);
    }

    /// Resets the delay to base.
    pub fn reset(&mut self) {
        self.current = self.base;
    }

    /// Current delay as whole countdown seconds, rounded to nearest
    pub fn countdown_secs(&self) -> u64 {
        (self.current.as_millis() as u64 + 500) / 1000
    }
}
