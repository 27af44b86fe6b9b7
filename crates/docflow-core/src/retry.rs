//! Retry policy for transient stage failures.

use std::time::Duration;

/// Capped exponential backoff: `base * 2^(attempt - 1)`, never above `max_delay`.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Attempts before a transient failure becomes terminal.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryConfig {
    /// Delay before re-enqueueing after the given 1-based attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        // Clamp the exponent so the multiplication cannot overflow.
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(2u32.saturating_pow(exponent));
        delay.min(self.max_delay)
    }

    pub fn exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }
}
