//! Outbound call gateway.
//!
//! [`CallGateway`] wraps a single network operation with a per-attempt
//! timeout and bounded exponential-backoff retry. It holds no shared
//! state, so it is cheap to clone and to derive per-endpoint variants from
//! via [`CallGateway::with_timeout()`].

pub mod retry;

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

pub use retry::RetryConfig;

use crate::telemetry;
use crate::{MealgateError, Result};

/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout + retry wrapper around one outbound call.
///
/// ```rust,no_run
/// # use mealgate::{CallGateway, RetryConfig};
/// # use std::time::Duration;
/// # async fn run() -> mealgate::Result<()> {
/// let gateway = CallGateway::new(RetryConfig::new(), Duration::from_secs(10));
/// let body = gateway
///     .call("ping", || async { Ok::<_, mealgate::MealgateError>("pong") })
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CallGateway {
    retry: RetryConfig,
    timeout: Duration,
}

impl Default for CallGateway {
    fn default() -> Self {
        Self::new(RetryConfig::default(), DEFAULT_TIMEOUT)
    }
}

impl CallGateway {
    pub fn new(retry: RetryConfig, timeout: Duration) -> Self {
        Self { retry, timeout }
    }

    /// Same retry policy, different per-attempt timeout.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            retry: self.retry.clone(),
            timeout,
        }
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `operation`, retrying retryable failures.
    ///
    /// Each attempt is bounded by the gateway timeout and fails with
    /// [`MealgateError::Timeout`] when it elapses. Unauthorized, forbidden
    /// and validation failures are returned after the first attempt.
    pub async fn call<F, Fut, T>(&self, operation: &str, f: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let start = Instant::now();
        let timeout = self.timeout;
        let result = retry::with_retry(&self.retry, operation, || {
            let attempt = f();
            async move {
                tokio::time::timeout(timeout, attempt)
                    .await
                    .map_err(|_| MealgateError::Timeout(timeout))?
            }
        })
        .await;
        record_call(operation, start, result.is_ok());
        result
    }
}

/// Record call outcome metrics (counter + histogram).
fn record_call(operation: &str, start: Instant, ok: bool) {
    let status = if ok { "ok" } else { "error" };
    metrics::counter!(telemetry::REQUESTS_TOTAL,
        "operation" => operation.to_owned(),
        "status" => status,
    )
    .increment(1);
    metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS,
        "operation" => operation.to_owned(),
    )
    .record(start.elapsed().as_secs_f64());
}
