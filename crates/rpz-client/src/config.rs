//! Fetcher configuration types.

use std::time::Duration;

/// Retry configuration for transient fetch failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt
    pub max_retries: u32,

    /// Backoff before the first retry
    pub initial_backoff: Duration,

    /// Upper bound for any single backoff
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryConfig {
    /// Three retries, starting at 500ms and doubling up to 30s
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
        }
    }

    /// Never retry
    #[must_use]
    pub const fn none() -> Self {
        Self::new().max_retries(0)
    }

    /// Set maximum retries
    #[must_use]
    pub const fn max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    /// Set initial backoff duration
    #[must_use]
    pub const fn initial_backoff(mut self, duration: Duration) -> Self {
        self.initial_backoff = duration;
        self
    }

    /// Set maximum backoff duration
    #[must_use]
    pub const fn max_backoff(mut self, duration: Duration) -> Self {
        self.max_backoff = duration;
        self
    }

    /// Total attempts including the first one
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Backoff before retry number `retry` (0-based), doubling each time
    #[must_use]
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let initial = u64::try_from(self.initial_backoff.as_millis()).unwrap_or(u64::MAX);
        let max = u64::try_from(self.max_backoff.as_millis()).unwrap_or(u64::MAX);
        let backoff = 2u64
            .checked_pow(retry)
            .and_then(|factor| initial.checked_mul(factor))
            .unwrap_or(u64::MAX);
        Duration::from_millis(backoff.min(max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_retry_config() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.max_attempts(), 4);
    }

    #[test]
    fn test_exponential_backoff() {
        let config = RetryConfig::new()
            .initial_backoff(Duration::from_millis(100))
            .max_backoff(Duration::from_secs(1));

        assert_eq!(config.backoff_for(0), Duration::from_millis(100));
        assert_eq!(config.backoff_for(1), Duration::from_millis(200));
        assert_eq!(config.backoff_for(2), Duration::from_millis(400));
        assert_eq!(config.backoff_for(3), Duration::from_millis(800));
        assert_eq!(config.backoff_for(4), Duration::from_secs(1)); // capped
        assert_eq!(config.backoff_for(64), Duration::from_secs(1));
    }

    #[test]
    fn test_no_retry() {
        assert_eq!(RetryConfig::none().max_attempts(), 1);
    }
}
