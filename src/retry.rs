//! Throttle retry policy
//!
//! Resends a call that the server throttled, once its advertised reset has passed.
//!
//! Semantics:
//! - `max_attempts` counts total attempts (initial try + retries); the default of 2 means
//!   exactly one resend.
//! - Only [`GovernorError::Throttled`] is retried. Every other failure, including
//!   `LimitExceeded` and `Cancelled`, is returned immediately.
//! - The delay before a resend is `retry_after - now`, capped at `max_wait`.
//! - When attempts run out the last `Throttled` error is returned unchanged.
//!
//! Example
//! ```rust
//! use std::time::Duration;
//! use ratewarden::{GovernorError, ThrottleRetryPolicy};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let policy = ThrottleRetryPolicy::builder()
//!     .max_attempts(2)
//!     .max_wait(Duration::from_secs(300))
//!     .build()
//!     .unwrap();
//! let result: Result<u32, GovernorError> = policy.execute(|| async { Ok(7) }).await;
//! assert_eq!(result.unwrap(), 7);
//! # });
//! ```

use crate::clock::{Clock, SystemClock};
use crate::error::GovernorError;
use crate::sleeper::{Sleeper, TokioSleeper};
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tower_layer::Layer;
use tower_service::Service;
use tracing::info;

/// Longest single wait before a resend (the short window's full length).
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(5 * 60);

/// Retry policy for throttled calls.
#[derive(Debug, Clone)]
pub struct ThrottleRetryPolicy {
    max_attempts: usize,
    max_wait: Duration,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
}

impl ThrottleRetryPolicy {
    /// Construct a new builder with defaults.
    pub fn builder() -> ThrottleRetryPolicyBuilder {
        ThrottleRetryPolicyBuilder::new()
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Delay before resending after `err`, or `None` if `err` is not retryable.
    pub fn delay_for(&self, err: &GovernorError) -> Option<Duration> {
        let retry_after = err.retry_after()?;
        let wait = retry_after.duration_since(self.clock.now()).unwrap_or(Duration::ZERO);
        Some(wait.min(self.max_wait))
    }

    /// Execute an async operation, resending it after throttling.
    pub async fn execute<T, Fut, Op>(&self, mut operation: Op) -> Result<T, GovernorError>
    where
        T: Send,
        Fut: Future<Output = Result<T, GovernorError>> + Send,
        Op: FnMut() -> Fut + Send,
    {
        let mut attempt = 1;
        loop {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            let Some(delay) = self.delay_for(&err) else {
                return Err(err);
            };
            if attempt >= self.max_attempts {
                return Err(err);
            }
            info!(target: "ratewarden::retry", attempt, delay_ms = delay.as_millis() as u64, "throttled, resending after delay");
            self.sleeper.sleep(delay).await;
            attempt += 1;
        }
    }
}

impl Default for ThrottleRetryPolicy {
    fn default() -> Self {
        ThrottleRetryPolicyBuilder::new().build_unchecked()
    }
}

/// Errors produced while building a retry policy.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BuildError {
    /// `max_attempts` must be > 0.
    #[error("max_attempts must be > 0 (got {0})")]
    InvalidMaxAttempts(usize),
}

/// Builder for [`ThrottleRetryPolicy`].
pub struct ThrottleRetryPolicyBuilder {
    max_attempts: usize,
    max_wait: Duration,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
}

impl ThrottleRetryPolicyBuilder {
    /// Two attempts, five-minute cap, system clock, tokio timers.
    pub fn new() -> Self {
        Self {
            max_attempts: 2,
            max_wait: DEFAULT_MAX_WAIT,
            clock: Arc::new(SystemClock),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Set total attempts (initial + retries). Must be > 0.
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Cap on any single wait.
    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_sleeper<S: Sleeper + 'static>(mut self, sleeper: S) -> Self {
        self.sleeper = Arc::new(sleeper);
        self
    }

    /// Build the retry policy, validating inputs.
    pub fn build(self) -> Result<ThrottleRetryPolicy, BuildError> {
        if self.max_attempts == 0 {
            return Err(BuildError::InvalidMaxAttempts(0));
        }
        Ok(self.build_unchecked())
    }

    fn build_unchecked(self) -> ThrottleRetryPolicy {
        ThrottleRetryPolicy {
            max_attempts: self.max_attempts,
            max_wait: self.max_wait,
            clock: self.clock,
            sleeper: self.sleeper,
        }
    }
}

impl Default for ThrottleRetryPolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Tower-native throttle retry layer. Requests must be `Clone` so they can be resent.
#[derive(Debug, Clone)]
pub struct ThrottleRetryLayer {
    policy: ThrottleRetryPolicy,
}

impl ThrottleRetryLayer {
    pub fn new(policy: ThrottleRetryPolicy) -> Self {
        Self { policy }
    }
}

impl<S> Layer<S> for ThrottleRetryLayer {
    type Service = ThrottleRetryService<S>;

    fn layer(&self, service: S) -> Self::Service {
        ThrottleRetryService { inner: service, policy: self.policy.clone() }
    }
}

/// Retry service produced by [`ThrottleRetryLayer`].
#[derive(Debug, Clone)]
pub struct ThrottleRetryService<S> {
    inner: S,
    policy: ThrottleRetryPolicy,
}

impl<S, Request> Service<Request> for ThrottleRetryService<S>
where
    Request: Clone + Send + 'static,
    S: Service<Request, Error = GovernorError> + Clone + Send + 'static,
    S::Response: Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = GovernorError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut std::task::Context<'_>) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let policy = self.policy.clone();
        let inner = self.inner.clone();
        Box::pin(async move {
            policy
                .execute(move || {
                    let mut inner = inner.clone();
                    let req = req.clone();
                    async move {
                        futures::future::poll_fn(|cx| inner.poll_ready(cx)).await?;
                        inner.call(req).await
                    }
                })
                .await
        })
    }
}
