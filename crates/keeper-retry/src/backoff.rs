//! Backoff policy: pure retry/delay decision function.

use std::time::Duration;

/// Growth-capped exponential backoff schedule.
///
/// The delay before retry `n` (1-based) is
/// `min(initial_delay * multiplier^(n-1), max_delay)`.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    /// Total attempts, including the first (>= 1).
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Cap applied after growth.
    pub max_delay: Duration,
    /// Growth multiplier per retry.
    pub multiplier: f64,
}

impl BackoffPolicy {
    pub fn new(
        max_attempts: u32,
        initial_delay: Duration,
        max_delay: Duration,
        multiplier: f64,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            max_delay,
            multiplier,
        }
    }

    /// Policy for source/submission API calls: transient network failures,
    /// HTTP 429 and 5xx. 3 attempts, 1s initial, x2 growth, 10s cap.
    #[must_use]
    pub fn api() -> Self {
        Self::new(3, Duration::from_secs(1), Duration::from_secs(10), 2.0)
    }

    /// Policy for ledger submissions: sequence conflicts and underpriced
    /// replacements only. 3 attempts, 2s initial, x1.5 growth, 5s cap.
    #[must_use]
    pub fn submission() -> Self {
        Self::new(3, Duration::from_secs(2), Duration::from_secs(5), 1.5)
    }

    /// Delay to wait before the given retry (1-based: `retry = 1` is the
    /// delay after the first failed attempt).
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(20);
        let grown = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent as i32);
        let capped = grown.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}
