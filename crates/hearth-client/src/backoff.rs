//! Reconnect delay schedule: `base * 2^(attempt - 1)`, optionally capped.

use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Option<Duration>,
    attempts: u32,
}

impl Backoff {
    pub fn new(base: Duration, max: Option<Duration>) -> Self {
        Self {
            base,
            max,
            attempts: 0,
        }
    }

    /// Count one more failure and return how long to wait before retrying.
    pub fn next_delay(&mut self) -> Duration {
        self.attempts = self.attempts.saturating_add(1);
        let factor = 2u32.checked_pow(self.attempts - 1).unwrap_or(u32::MAX);
        let delay = self.base.saturating_mul(factor);
        match self.max {
            Some(max) => delay.min(max),
            None => delay,
        }
    }

    /// Forget past failures after a successful connection.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}
