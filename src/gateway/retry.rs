//! Retry configuration, delay calculation and the shared retry loop.
//!
//! Every outbound call funnels through [`with_retry()`], keeping retry
//! logic in a single place.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::Result;
use crate::telemetry;

/// Configuration for retry behaviour on retryable errors.
///
/// Uses exponential backoff capped at `max_delay`:
///
/// ```rust
/// # use mealgate::RetryConfig;
/// # use std::time::Duration;
/// let config = RetryConfig::new()
///     .max_attempts(5)
///     .initial_delay(Duration::from_millis(200));
/// assert_eq!(config.delay_for_attempt(3), Duration::from_millis(800));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial request).
    /// 1 = no retry. Default: 3.
    pub max_attempts: u32,
    /// Delay after the first failed attempt. Default: 500ms.
    pub initial_delay: Duration,
    /// Maximum delay between attempts (caps exponential growth). Default: 30s.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config that disables retries (single attempt).
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Set maximum attempts (including the initial request).
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    /// Set the delay after the first failed attempt.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum delay between attempts.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Delay between attempt `attempt` and `attempt + 1` (1-indexed).
    ///
    /// `min(initial_delay * 2^(attempt - 1), max_delay)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let delay = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(exponent));
        delay.min(self.max_delay)
    }
}

/// Execute an async operation with retry logic.
///
/// Retries errors classified as retryable by
/// [`MealgateError::is_retryable()`](crate::MealgateError::is_retryable)
/// until `config.max_attempts` attempts have been made. Terminal errors
/// return immediately; an exhausted budget returns the last error as is.
pub(crate) async fn with_retry<F, Fut, T>(config: &RetryConfig, operation: &str, f: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                let delay = config.delay_for_attempt(attempt);
                metrics::counter!(telemetry::RETRIES_TOTAL,
                    "operation" => operation.to_owned(),
                )
                .increment(1);
                warn!(
                    operation,
                    attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "retrying after error"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_from_first_attempt() {
        let config = RetryConfig::new().initial_delay(Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(400));
    }

    #[test]
    fn delay_is_capped() {
        let config = RetryConfig::new()
            .initial_delay(Duration::from_secs(1))
            .max_delay(Duration::from_secs(5));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(4));
        assert_eq!(config.delay_for_attempt(4), Duration::from_secs(5));
        assert_eq!(config.delay_for_attempt(40), Duration::from_secs(5));
    }

    #[test]
    fn attempt_zero_is_treated_as_first() {
        let config = RetryConfig::default();
        assert_eq!(config.delay_for_attempt(0), config.initial_delay);
    }
}
