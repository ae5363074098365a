//! Error types for the rate governor
use http::StatusCode;
use serde::Deserialize;
use std::time::{Duration, SystemTime};

/// Boxed error used for transport-level failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Structured error payload returned by the API on 4xx/5xx responses.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct ApiErrorBody {
    pub code: i64,
    pub method: String,
    pub request: String,
    pub message: String,
}

impl ApiErrorBody {
    /// Decode a payload, accepting both the bare object and the `{"error": {...}}` envelope
    /// the API wraps it in.
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Wire {
            Wrapped { error: ApiErrorBody },
            Bare(ApiErrorBody),
        }

        serde_json::from_slice::<Wire>(body).map(|wire| match wire {
            Wire::Wrapped { error } => error,
            Wire::Bare(error) => error,
        })
    }
}

/// Failures surfaced to the caller of a governed request.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum GovernorError {
    /// Fail-fast gate refused the call before the short window reset; it was not sent.
    #[error(
        "rate limit exceeded ({remaining} remaining, {requests_in_window} sent this window, resets in {reset_in:?})"
    )]
    LimitExceeded { remaining: u32, requests_in_window: u32, reset_in: Duration },
    /// Server answered 429; retryable once `retry_after` has passed.
    #[error("throttled by server: {}", .error.message)]
    Throttled { retry_after: SystemTime, error: ApiErrorBody },
    /// Structured 4xx/5xx response other than 429.
    #[error("api error {status}: {}", .error.message)]
    Api { status: StatusCode, error: ApiErrorBody },
    /// The caller aborted a blocked admission wait.
    #[error("request cancelled while waiting for the rate limit window: {reason}")]
    Cancelled { reason: &'static str },
    /// The underlying transport failed, or an error body could not be decoded.
    #[error("transport failure: {0}")]
    Transport(#[source] BoxError),
}

impl GovernorError {
    pub fn transport<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        GovernorError::Transport(err.into())
    }

    pub fn is_limit_exceeded(&self) -> bool {
        matches!(self, Self::LimitExceeded { .. })
    }

    pub fn is_throttled(&self) -> bool {
        matches!(self, Self::Throttled { .. })
    }

    pub fn is_api(&self) -> bool {
        matches!(self, Self::Api { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Only throttling is eligible for a delayed resend.
    pub fn is_retryable(&self) -> bool {
        self.is_throttled()
    }

    /// Instant after which a throttled request may be resent.
    pub fn retry_after(&self) -> Option<SystemTime> {
        match self {
            Self::Throttled { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }

    /// Decoded API payload for throttled and structured API failures.
    pub fn api_error(&self) -> Option<&ApiErrorBody> {
        match self {
            Self::Throttled { error, .. } | Self::Api { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Throttled { .. } => Some(StatusCode::TOO_MANY_REQUESTS),
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Malformed rate-limit or date header. Recovered inside the governor by falling back to
/// the local clock; never returned from a governed request.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum HeaderParseError {
    #[error("header {header} missing")]
    Missing { header: &'static str },
    #[error("header {header} is not valid ASCII")]
    NotAscii { header: &'static str },
    #[error("header {header} has {found} segments, expected 3: {value:?}")]
    WrongSegmentCount { header: &'static str, found: usize, value: String },
    #[error("header {header} segment {segment:?} is not a non-negative integer")]
    InvalidSegment { header: &'static str, segment: String },
    #[error("header {header} is not an HTTP date: {value:?}")]
    InvalidDate { header: &'static str, value: String },
}
