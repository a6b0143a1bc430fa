//! Retry policy for transient Redis failures.
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounded retries with exponential backoff.
///
/// Attempt `0` is the first execution and has no backoff. Retry `k >= 1` waits
/// `initial_backoff_ms * backoff_multiplier^(k - 1)` milliseconds.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,

    /// Backoff before the first retry in milliseconds.
    pub initial_backoff_ms: u64,

    /// Growth factor of the backoff between retries.
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential_backoff(3, 50)
    }
}

impl RetryPolicy {
    /// Fails on the first error.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff_ms: 0,
            backoff_multiplier: 1.0,
        }
    }

    /// Doubles the backoff at every retry.
    pub fn exponential_backoff(max_retries: u32, initial_backoff_ms: u64) -> Self {
        Self {
            max_retries,
            initial_backoff_ms,
            backoff_multiplier: 2.0,
        }
    }

    /// Backoff before the given attempt.
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            Duration::ZERO
        } else {
            let multiplier = self.backoff_multiplier.powi((attempt - 1) as i32);
            Duration::from_millis((self.initial_backoff_ms as f64 * multiplier) as u64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_duration() {
        let policy = RetryPolicy::exponential_backoff(3, 50);
        assert_eq!(policy.backoff_duration(0), Duration::ZERO);
        assert_eq!(policy.backoff_duration(1), Duration::from_millis(50));
        assert_eq!(policy.backoff_duration(2), Duration::from_millis(100));
        assert_eq!(policy.backoff_duration(3), Duration::from_millis(200));

        let policy = RetryPolicy::none();
        assert_eq!(policy.max_retries, 0);
        assert_eq!(policy.backoff_duration(1), Duration::ZERO);
    }
}
