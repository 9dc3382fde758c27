//! Telemetry metric name constants.
//!
//! Consumers install their own `metrics` recorder (e.g. prometheus,
//! statsd); without a recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `mealgate_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `operation`: call invoked through the gateway (e.g. "analyze_image",
//!   "list_meals")
//! - `status`: outcome: "ok" or "error"

/// Total calls issued through the gateway (after retries settle).
///
/// Labels: `operation`, `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "mealgate_requests_total";

/// Gateway call duration in seconds, including retry delays.
///
/// Labels: `operation`.
pub const REQUEST_DURATION_SECONDS: &str = "mealgate_request_duration_seconds";

/// Total retry attempts (not counting the initial request).
///
/// Labels: `operation`.
pub const RETRIES_TOTAL: &str = "mealgate_retries_total";

/// Total response cache hits.
pub const CACHE_HITS_TOTAL: &str = "mealgate_cache_hits_total";

/// Total response cache misses that started a computation.
pub const CACHE_MISSES_TOTAL: &str = "mealgate_cache_misses_total";

/// Total callers that joined an already in-flight computation.
pub const INFLIGHT_JOINS_TOTAL: &str = "mealgate_inflight_joins_total";

/// Total analyses answered by the fallback generator.
///
/// Labels: `operation`.
pub const FALLBACKS_TOTAL: &str = "mealgate_fallbacks_total";
