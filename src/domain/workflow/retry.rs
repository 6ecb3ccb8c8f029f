//! Action retry policy

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retry configuration for failed browser actions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay_ms: u64,
    /// Maximum delay between retries
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_delay_ms: 0,
            max_delay_ms: 30_000,
            backoff_multiplier: 1.0,
        }
    }
}

impl RetryConfig {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Fixed delay between attempts, as workflows configure it
    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        let delay_ms = delay.as_millis() as u64;
        Self::new(max_retries)
            .with_initial_delay(delay_ms)
            .with_max_delay(delay_ms)
    }

    pub fn with_initial_delay(mut self, ms: u64) -> Self {
        self.initial_delay_ms = ms;
        self
    }

    pub fn with_max_delay(mut self, ms: u64) -> Self {
        self.max_delay_ms = ms;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Calculate delay for a given attempt number (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::from_millis(self.initial_delay_ms.min(self.max_delay_ms));
        }

        let delay = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        let delay_ms = delay.min(self.max_delay_ms as f64) as u64;

        Duration::from_millis(delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_delay() {
        let retry = RetryConfig::fixed(3, Duration::from_millis(250));
        assert_eq!(retry.max_retries, 3);
        assert_eq!(retry.delay_for_attempt(0), Duration::from_millis(250));
        assert_eq!(retry.delay_for_attempt(2), Duration::from_millis(250));
    }

    #[test]
    fn test_exponential_backoff_is_capped() {
        let retry = RetryConfig::new(5)
            .with_initial_delay(100)
            .with_max_delay(500)
            .with_backoff_multiplier(2.0);

        assert_eq!(retry.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(retry.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(retry.delay_for_attempt(2), Duration::from_millis(400));
        assert_eq!(retry.delay_for_attempt(3), Duration::from_millis(500));
    }

    #[test]
    fn test_default_never_retries() {
        let retry = RetryConfig::default();
        assert_eq!(retry.max_retries, 0);
        assert_eq!(retry.delay_for_attempt(0), Duration::ZERO);
    }
}
