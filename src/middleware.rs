//! Tower middleware hosting [`PipelineHooks`].
//!
//! Per call: `before_send` → inner service → `after_receive` → `on_error`. A rejected or
//! cancelled admission never reaches the inner service.

use crate::error::GovernorError;
use crate::gate::CancelSignal;
use crate::hooks::PipelineHooks;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower_layer::Layer;
use tower_service::Service;

/// Extracts the caller's [`CancelSignal`] from a request.
pub trait CancelSource {
    fn cancel_signal(&self) -> CancelSignal;
}

/// Reads a `CancelSignal` from the request extensions, if one was inserted.
impl<B> CancelSource for http::Request<B> {
    fn cancel_signal(&self) -> CancelSignal {
        self.extensions().get::<CancelSignal>().cloned().unwrap_or_default()
    }
}

/// A layer that governs requests through a [`PipelineHooks`] implementation.
#[derive(Debug)]
pub struct GovernorLayer<H> {
    hooks: Arc<H>,
}

impl<H> GovernorLayer<H> {
    pub fn new(hooks: H) -> Self {
        Self { hooks: Arc::new(hooks) }
    }
}

impl<H> Clone for GovernorLayer<H> {
    fn clone(&self) -> Self {
        Self { hooks: self.hooks.clone() }
    }
}

impl<S, H> Layer<S> for GovernorLayer<H> {
    type Service = GovernorService<S, H>;

    fn layer(&self, service: S) -> Self::Service {
        GovernorService { inner: service, hooks: self.hooks.clone() }
    }
}

/// Middleware service produced by [`GovernorLayer`].
#[derive(Debug)]
pub struct GovernorService<S, H> {
    inner: S,
    hooks: Arc<H>,
}

impl<S: Clone, H> Clone for GovernorService<S, H> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone(), hooks: self.hooks.clone() }
    }
}

impl<S, H, Req, B> Service<Req> for GovernorService<S, H>
where
    S: Service<Req, Response = http::Response<B>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Into<crate::error::BoxError>,
    H: PipelineHooks + 'static,
    Req: CancelSource + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    type Response = http::Response<B>;
    type Error = GovernorError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(GovernorError::transport)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let hooks = self.hooks.clone();
        // Use the service that was polled ready; leave a fresh clone in its place.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let signal = req.cancel_signal();

        Box::pin(async move {
            hooks.before_send(&signal).await?;

            let response = inner.call(req).await.map_err(GovernorError::transport)?;

            hooks.after_receive(response.status(), response.headers());
            if let Some(err) =
                hooks.on_error(response.status(), response.headers(), response.body().as_ref())
            {
                return Err(err);
            }
            Ok(response)
        })
    }
}
