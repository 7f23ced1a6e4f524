//! Failure taxonomy surfaced to callers of the governed client.
//!
//! Every outcome of [`Governor::request`](crate::governor::Governor::request)
//! is either a JSON value or one of these variants, so callers can match on
//! the failure kind instead of inspecting error strings.

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// Result type for governed API calls.
pub type Result<T> = std::result::Result<T, GovernorError>;

/// Errors returned by the request governor and the typed API on top of it.
///
/// The type is `Clone` because a single in-flight GET may be awaited by many
/// callers at once and each of them receives its own copy of the outcome.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GovernorError {
    /// The request never produced an HTTP response (connect, reset, timeout).
    #[error("network request failed: {0}")]
    Network(String),

    /// Too many calls to this endpoint inside the sliding window.
    #[error("rate limit exceeded for {endpoint}, retry in {retry_after:?}")]
    RateLimited {
        endpoint: String,
        retry_after: Duration,
    },

    /// The endpoint's circuit breaker is open; no network call was made.
    #[error("service unavailable: circuit open for {endpoint}")]
    CircuitOpen { endpoint: String },

    /// The backend answered 401; stored tokens have been cleared.
    #[error("authentication required")]
    AuthRequired,

    /// Any other non-success HTTP status.
    #[error("HTTP {status}: {message}")]
    Http {
        status: StatusCode,
        message: String,
        details: Option<serde_json::Value>,
    },

    /// The response body did not match the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The request could not be built (bad endpoint, invalid input).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Reading or writing persisted tokens failed.
    #[error("token store error: {0}")]
    TokenStore(String),
}

impl GovernorError {
    /// Only bare network failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GovernorError::Network(_))
    }

    /// HTTP status associated with this error, if the backend answered.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            GovernorError::AuthRequired => Some(StatusCode::UNAUTHORIZED),
            GovernorError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Build an [`GovernorError::Http`] from a non-success response body.
    ///
    /// The backend reports errors as `{"message": ..., "details": ...}`;
    /// older endpoints use `error` instead of `message`.
    pub fn from_response(status: StatusCode, body: &serde_json::Value) -> Self {
        let message = body
            .get("message")
            .or_else(|| body.get("error"))
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .or_else(|| body.as_str().filter(|s| !s.is_empty()).map(str::to_string))
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });
        let details = body.get("details").cloned();

        GovernorError::Http {
            status,
            message,
            details,
        }
    }
}

impl From<serde_json::Error> for GovernorError {
    fn from(err: serde_json::Error) -> Self {
        GovernorError::Decode(err.to_string())
    }
}
