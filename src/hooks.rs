//! The three extension points a request pipeline offers the governor.
//!
//! Any pipeline that can run code before a request is sent, after a response arrives,
//! and when an error response must be turned into a failure can host a governor. The
//! tower [`GovernorLayer`](crate::middleware::GovernorLayer) is one such pipeline; a
//! hand-rolled client can call the hooks directly.

use crate::error::GovernorError;
use crate::gate::CancelSignal;
use async_trait::async_trait;
use http::{HeaderMap, StatusCode};

#[async_trait]
pub trait PipelineHooks: Send + Sync {
    /// Runs before every send. An error means the request must not go out.
    async fn before_send(&self, signal: &CancelSignal) -> Result<(), GovernorError>;

    /// Runs for every completed response, before the body is decoded.
    fn after_receive(&self, status: StatusCode, headers: &HeaderMap);

    /// Turns an error response into a typed failure; `None` hands the response on.
    fn on_error(&self, status: StatusCode, headers: &HeaderMap, body: &[u8]) -> Option<GovernorError>;
}
