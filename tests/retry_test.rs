use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use mealgate::{CallGateway, ErrorKind, MealgateError, Result, RetryConfig};
use tokio::time::Instant;

/// Operation that fails N times then succeeds.
struct FailThenSucceed {
    fail_count: AtomicU32,
    fail_with: fn() -> MealgateError,
    total_calls: AtomicU32,
}

impl FailThenSucceed {
    fn new(failures: u32, fail_with: fn() -> MealgateError) -> Arc<Self> {
        Arc::new(Self {
            fail_count: AtomicU32::new(failures),
            fail_with,
            total_calls: AtomicU32::new(0),
        })
    }

    async fn call(&self) -> Result<&'static str> {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        let remaining = self.fail_count.load(Ordering::Relaxed);
        if remaining > 0 {
            self.fail_count.fetch_sub(1, Ordering::Relaxed);
            return Err((self.fail_with)());
        }
        Ok("ok")
    }

    fn call_count(&self) -> u32 {
        self.total_calls.load(Ordering::Relaxed)
    }
}

fn fast_gateway(max_attempts: u32) -> CallGateway {
    CallGateway::new(
        RetryConfig::new()
            .max_attempts(max_attempts)
            .initial_delay(Duration::from_millis(1))
            .max_delay(Duration::from_millis(10)),
        Duration::from_secs(5),
    )
}

fn server_error() -> MealgateError {
    MealgateError::Api {
        status: 503,
        message: "unavailable".into(),
    }
}

#[tokio::test]
async fn retries_transient_error_then_succeeds() {
    let op = FailThenSucceed::new(2, || MealgateError::RateLimited { retry_after: None });
    let result = fast_gateway(3).call("test", || op.call()).await;
    assert_eq!(result.unwrap(), "ok");
    assert_eq!(op.call_count(), 3);
}

#[tokio::test]
async fn gives_up_at_attempt_ceiling() {
    let op = FailThenSucceed::new(10, server_error);
    let result = fast_gateway(3).call("test", || op.call()).await;
    assert!(matches!(result, Err(MealgateError::Api { status: 503, .. })));
    assert_eq!(op.call_count(), 3);
}

#[tokio::test]
async fn unauthorized_is_not_retried() {
    let op = FailThenSucceed::new(10, || MealgateError::Unauthorized);
    let err = fast_gateway(5).call("test", || op.call()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    assert_eq!(op.call_count(), 1);
}

#[tokio::test]
async fn forbidden_is_not_retried() {
    let op = FailThenSucceed::new(10, || MealgateError::Forbidden);
    let err = fast_gateway(5).call("test", || op.call()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    assert_eq!(op.call_count(), 1);
}

#[tokio::test]
async fn validation_failure_is_not_retried() {
    let op = FailThenSucceed::new(10, || MealgateError::ValidationFailed("bad input".into()));
    let err = fast_gateway(5).call("test", || op.call()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    assert_eq!(op.call_count(), 1);
}

#[tokio::test]
async fn disabled_retry_makes_one_attempt() {
    let op = FailThenSucceed::new(1, server_error);
    let gateway = CallGateway::new(RetryConfig::disabled(), Duration::from_secs(5));
    assert!(gateway.call("test", || op.call()).await.is_err());
    assert_eq!(op.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn backoff_doubles_between_attempts() {
    let op = FailThenSucceed::new(10, server_error);
    let gateway = CallGateway::new(
        RetryConfig::new()
            .max_attempts(4)
            .initial_delay(Duration::from_millis(100))
            .max_delay(Duration::from_secs(30)),
        Duration::from_secs(5),
    );

    let start = Instant::now();
    let _ = gateway.call("test", || op.call()).await;

    // 100 + 200 + 400
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(700), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(710), "{elapsed:?}");
    assert_eq!(op.call_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn backoff_is_capped_at_max_delay() {
    let op = FailThenSucceed::new(10, server_error);
    let gateway = CallGateway::new(
        RetryConfig::new()
            .max_attempts(4)
            .initial_delay(Duration::from_millis(100))
            .max_delay(Duration::from_millis(150)),
        Duration::from_secs(5),
    );

    let start = Instant::now();
    let _ = gateway.call("test", || op.call()).await;

    // 100 + 150 + 150
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(400), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(410), "{elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn slow_attempt_times_out_and_is_retried() {
    let calls = AtomicU32::new(0);
    let calls = &calls;
    let gateway = CallGateway::new(
        RetryConfig::new()
            .max_attempts(2)
            .initial_delay(Duration::from_millis(10)),
        Duration::from_secs(1),
    );

    let result = gateway
        .call("slow", || async move {
            calls.fetch_add(1, Ordering::Relaxed);
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, MealgateError>(())
        })
        .await;

    match result {
        Err(MealgateError::Timeout(after)) => assert_eq!(after, Duration::from_secs(1)),
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(calls.load(Ordering::Relaxed), 2);
}

#[tokio::test(start_paused = true)]
async fn per_endpoint_timeout_override() {
    let gateway = CallGateway::new(RetryConfig::disabled(), Duration::from_secs(30));
    let short = gateway.with_timeout(Duration::from_millis(50));
    assert_eq!(short.retry_config(), gateway.retry_config());

    let err = short
        .call("short", || async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok::<_, MealgateError>(())
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);

    // The original keeps its longer budget.
    gateway
        .call("long", || async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok::<_, MealgateError>(())
        })
        .await
        .unwrap();
}

#[test]
fn delay_formula() {
    let config = RetryConfig::new()
        .initial_delay(Duration::from_millis(500))
        .max_delay(Duration::from_secs(3));
    assert_eq!(config.delay_for_attempt(1), Duration::from_millis(500));
    assert_eq!(config.delay_for_attempt(2), Duration::from_millis(1000));
    assert_eq!(config.delay_for_attempt(3), Duration::from_millis(2000));
    assert_eq!(config.delay_for_attempt(4), Duration::from_secs(3));
    assert_eq!(config.delay_for_attempt(40), Duration::from_secs(3));
}
