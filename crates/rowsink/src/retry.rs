//! Backoff policy for batch commits
//!
//! Shaped by the sink's two retry knobs (`retry_limit`, `retry_backoff_ms`):
//! delays double per retry from the initial backoff up to a ceiling. Only
//! errors classified as retriable by [`crate::error::Error::is_retriable`]
//! are retried; everything else fails immediately.

use std::time::Duration;

/// Retry policy for batch commits
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the initial attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Ceiling for the doubled delays
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before the given attempt.
    ///
    /// Attempt 0 is the initial try and has no delay; attempt `n` waits
    /// `initial_delay * 2^(n-1)`, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        // past 16 doublings the cap has long since taken over
        let doublings = (attempt - 1).min(16);
        self.initial_delay
            .saturating_mul(1u32 << doublings)
            .min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_sink_config() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.initial_delay, Duration::from_millis(100));
    }

    #[test]
    fn test_initial_attempt_has_no_delay() {
        assert_eq!(
            RetryPolicy::default().delay_for_attempt(0),
            Duration::ZERO
        );
    }

    #[test]
    fn test_delays_double_per_retry() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(800));
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = RetryPolicy {
            max_retries: 50,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
        };
        assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(5));
        // far beyond the doubling window, still just the cap
        assert_eq!(policy.delay_for_attempt(u32::MAX), Duration::from_secs(5));
    }
}
