//! Post-receive observation.

use crate::state::RateWindowState;
use http::{HeaderMap, Response, StatusCode};
use std::sync::Arc;

/// Feeds every completed response into the shared [`RateWindowState`].
///
/// Runs before any body decoding so the quotas stay current even when the caller later
/// fails to decode the payload.
#[derive(Debug, Clone)]
pub struct ResponseObserver {
    state: Arc<RateWindowState>,
}

impl ResponseObserver {
    pub fn new(state: Arc<RateWindowState>) -> Self {
        Self { state }
    }

    pub fn observe<B>(&self, response: &Response<B>) {
        self.observe_parts(response.status(), response.headers());
    }

    pub fn observe_parts(&self, status: StatusCode, headers: &HeaderMap) {
        self.state.update(headers, is_error_status(status));
    }
}

/// 4xx and 5xx.
pub fn is_error_status(status: StatusCode) -> bool {
    (400..=599).contains(&status.as_u16())
}
