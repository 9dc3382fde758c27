//! Mealgate error types

use std::time::Duration;

/// Coarse classification of a failure, used for retry decisions and by
/// callers that only care about the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Timeout,
    RateLimited,
    QuotaExceeded,
    Unauthorized,
    Forbidden,
    ValidationFailed,
    ParseFailed,
    Unknown,
}

/// Mealgate error types
///
/// `Clone` so a single failed computation can be handed to every caller
/// waiting on the same fingerprint.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MealgateError {
    // Transport errors
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    // Provider-side throttling
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    // Terminal errors, never retried
    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    // Data errors
    #[error("parse failed: {0}")]
    ParseFailed(String),

    #[error("JSON error: {0}")]
    Json(String),

    // Local errors
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("{0}")]
    Unknown(String),
}

impl MealgateError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::QuotaExceeded(_) => ErrorKind::QuotaExceeded,
            Self::Unauthorized => ErrorKind::Unauthorized,
            Self::Forbidden => ErrorKind::Forbidden,
            Self::ValidationFailed(_) => ErrorKind::ValidationFailed,
            Self::ParseFailed(_) | Self::Json(_) => ErrorKind::ParseFailed,
            Self::Http(_)
            | Self::Api { .. }
            | Self::Configuration(_)
            | Self::Storage(_)
            | Self::Unknown(_) => ErrorKind::Unknown,
        }
    }

    /// Whether another attempt could change the outcome.
    ///
    /// Authentication, authorization and validation failures are terminal.
    /// Everything else is retried up to the configured ceiling.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self.kind(),
            ErrorKind::Unauthorized | ErrorKind::Forbidden | ErrorKind::ValidationFailed
        )
    }

    /// Provider-supplied retry hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Map a non-success HTTP status to an error.
    ///
    /// `body` is the raw response body; a JSON `error.message`, `message`
    /// or `detail` field is preferred as the error message. A 429 whose body
    /// reports an exhausted quota becomes [`MealgateError::QuotaExceeded`].
    pub fn from_status(status: u16, retry_after: Option<Duration>, body: &str) -> Self {
        let message = error_message(body);
        match status {
            400 | 422 => Self::ValidationFailed(message),
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            429 if body.contains("insufficient_quota") => {
                Self::QuotaExceeded(message)
            }
            429 => Self::RateLimited { retry_after },
            _ => Self::Api { status, message },
        }
    }

    /// Map a transport error, keeping timeouts and body decode failures distinct.
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else if err.is_decode() {
            Self::ParseFailed(err.to_string())
        } else {
            Self::Http(err.to_string())
        }
    }
}

/// Longest raw body echoed into an error message.
const MAX_BODY_CHARS: usize = 200;

fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let candidates = [
            value.pointer("/error/message"),
            value.get("message"),
            value.get("detail"),
            value.get("error"),
        ];
        if let Some(msg) = candidates.into_iter().flatten().find_map(|v| v.as_str()) {
            return msg.to_string();
        }
    }
    body.trim().chars().take(MAX_BODY_CHARS).collect()
}

/// Parse a `Retry-After` header given in seconds.
pub(crate) fn retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

impl From<serde_json::Error> for MealgateError {
    fn from(err: serde_json::Error) -> Self {
        MealgateError::Json(err.to_string())
    }
}

/// Result type alias for Mealgate operations
pub type Result<T> = std::result::Result<T, MealgateError>;
