//! Error-response classification.
//!
//! - 429 becomes [`GovernorError::Throttled`], retryable after the short window resets.
//! - Any other 4xx/5xx becomes a terminal [`GovernorError::Api`].
//! - A body that is not the structured error payload becomes a transport failure.
//! - Everything else passes through.

use crate::error::{ApiErrorBody, GovernorError};
use crate::headers;
use crate::observer::is_error_status;
use crate::state::RateWindowState;
use http::{HeaderMap, Response, StatusCode};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    state: Arc<RateWindowState>,
}

impl ErrorClassifier {
    pub fn new(state: Arc<RateWindowState>) -> Self {
        Self { state }
    }

    pub fn classify<B>(&self, response: &Response<B>) -> Option<GovernorError>
    where
        B: AsRef<[u8]>,
    {
        self.classify_parts(response.status(), response.headers(), response.body().as_ref())
    }

    /// `None` when the status is not an error and the response should be handed on.
    pub fn classify_parts(
        &self,
        status: StatusCode,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Option<GovernorError> {
        if !is_error_status(status) {
            return None;
        }

        let error = match ApiErrorBody::from_slice(body) {
            Ok(error) => error,
            Err(err) => {
                warn!(target: "ratewarden::classifier", status = status.as_u16(), error = %err, "undecodable error body");
                return Some(GovernorError::transport(err));
            }
        };

        if status != StatusCode::TOO_MANY_REQUESTS {
            return Some(GovernorError::Api { status, error });
        }

        let reset_seconds = headers::short_reset_seconds(headers)
            .unwrap_or_else(|_| self.state.snapshot().short().reset_seconds);
        let wait = std::time::Duration::from_secs(u64::from(reset_seconds));
        info!(target: "ratewarden::classifier", wait_ms = wait.as_millis() as u64, "too many requests, retry scheduled");
        Some(GovernorError::Throttled { retry_after: self.state.clock().now() + wait, error })
    }
}
