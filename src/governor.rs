//! Per-client governor handle.
//!
//! A [`RateGovernor`] owns one [`RateWindowState`] and the three components that share
//! it. Clones share the same state, so one governor is built per client and cloned into
//! whatever pipeline the client uses. There is no global instance.

use crate::classifier::ErrorClassifier;
use crate::clock::{Clock, SystemClock};
use crate::config::GovernorConfig;
use crate::error::GovernorError;
use crate::gate::{CancelSignal, RequestGate};
use crate::hooks::PipelineHooks;
use crate::middleware::GovernorLayer;
use crate::observer::ResponseObserver;
use crate::sleeper::{Sleeper, TokioSleeper};
use crate::state::RateWindowState;
use crate::window::QuotaSnapshot;
use async_trait::async_trait;
use http::{HeaderMap, StatusCode};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct RateGovernor {
    state: Arc<RateWindowState>,
    gate: RequestGate,
    observer: ResponseObserver,
    classifier: ErrorClassifier,
}

impl RateGovernor {
    /// Governor on the system clock and tokio timers.
    ///
    /// # Examples
    /// ```
    /// use ratewarden::{GovernorConfig, LimitMode, RateGovernor};
    /// let governor = RateGovernor::new(GovernorConfig::new(10, 250, LimitMode::Force).unwrap());
    /// assert!(governor.snapshot().observed_at.is_none());
    /// ```
    pub fn new(config: GovernorConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn builder(config: GovernorConfig) -> RateGovernorBuilder {
        RateGovernorBuilder::new(config)
    }

    pub fn config(&self) -> &GovernorConfig {
        self.gate.config()
    }

    pub fn state(&self) -> &Arc<RateWindowState> {
        &self.state
    }

    pub fn snapshot(&self) -> QuotaSnapshot {
        self.state.snapshot()
    }

    pub fn gate(&self) -> &RequestGate {
        &self.gate
    }

    pub fn observer(&self) -> &ResponseObserver {
        &self.observer
    }

    pub fn classifier(&self) -> &ErrorClassifier {
        &self.classifier
    }

    /// Tower layer wired to this governor's state.
    pub fn layer(&self) -> GovernorLayer<RateGovernor> {
        GovernorLayer::new(self.clone())
    }
}

#[async_trait]
impl PipelineHooks for RateGovernor {
    async fn before_send(&self, signal: &CancelSignal) -> Result<(), GovernorError> {
        self.gate.admit(signal).await
    }

    fn after_receive(&self, status: StatusCode, headers: &HeaderMap) {
        self.observer.observe_parts(status, headers);
    }

    fn on_error(&self, status: StatusCode, headers: &HeaderMap, body: &[u8]) -> Option<GovernorError> {
        self.classifier.classify_parts(status, headers, body)
    }
}

/// Builder for [`RateGovernor`].
pub struct RateGovernorBuilder {
    config: GovernorConfig,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
}

impl RateGovernorBuilder {
    pub fn new(config: GovernorConfig) -> Self {
        Self { config, clock: Arc::new(SystemClock), sleeper: Arc::new(TokioSleeper) }
    }

    /// Override the clock (useful for deterministic tests).
    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Provide a custom sleeper implementation.
    pub fn with_sleeper<S: Sleeper + 'static>(mut self, sleeper: S) -> Self {
        self.sleeper = Arc::new(sleeper);
        self
    }

    pub fn build(self) -> RateGovernor {
        let state = Arc::new(RateWindowState::new(self.clock.clone()));
        RateGovernor {
            gate: RequestGate::new(state.clone(), self.config, self.clock, self.sleeper),
            observer: ResponseObserver::new(state.clone()),
            classifier: ErrorClassifier::new(state.clone()),
            state,
        }
    }
}
