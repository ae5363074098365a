//! Pre-send admission.
//!
//! [`RequestGate::admit`] runs before every outbound call. The decision itself is a pure
//! function of one [`QuotaSnapshot`], the policy, and the current time
//! ([`evaluate`]); the state lock is held only long enough to copy the snapshot.
//!
//! Every call proceeds once the short window has reset. Before that, fail-fast rejects
//! outright, while force mode lets calls through until the reserve or the local
//! per-window budget would be breached.
//!
//! In force mode the gate computes one wait (`short reset + 1s` slack) and sleeps it out
//! without re-reading the state on wake. Callers that raced in during the wait are not
//! accounted for, so a long-blocked caller can still overrun the server quota.

use crate::clock::Clock;
use crate::config::{GovernorConfig, LimitMode};
use crate::error::GovernorError;
use crate::sleeper::Sleeper;
use crate::state::RateWindowState;
use crate::window::QuotaSnapshot;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Slack added on top of the advertised reset before a blocked call proceeds.
pub const RESET_SLACK: Duration = Duration::from_secs(1);

/// Outcome of evaluating the policy against a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Send immediately.
    Proceed,
    /// Sleep for `wait`, then send.
    Wait { wait: Duration },
    /// Do not send.
    Reject { remaining: u32, requests_in_window: u32, reset_in: Duration },
}

impl Admission {
    pub fn is_proceed(&self) -> bool {
        matches!(self, Admission::Proceed)
    }
}

/// Decide admission for one call.
pub fn evaluate(snapshot: &QuotaSnapshot, config: &GovernorConfig, now: SystemTime) -> Admission {
    let Some(reset_at) = snapshot.short_reset_at() else {
        return Admission::Proceed;
    };
    let Ok(reset_in) = reset_at.duration_since(now) else {
        return Admission::Proceed;
    };
    if reset_in.is_zero() {
        return Admission::Proceed;
    }

    let short = snapshot.short();
    match config.mode() {
        LimitMode::FailFast => Admission::Reject {
            remaining: short.remaining,
            requests_in_window: snapshot.requests_in_window,
            reset_in,
        },
        LimitMode::Force => {
            let reserve_hit =
                i64::from(config.min_remaining_reserve()) > i64::from(short.remaining) - 1;
            let budget_hit = u64::from(snapshot.requests_in_window) + 1
                > u64::from(config.max_requests_per_window());
            if reserve_hit || budget_hit {
                Admission::Wait { wait: reset_in + RESET_SLACK }
            } else {
                Admission::Proceed
            }
        }
    }
}

/// Caller-supplied abort for a blocked admission: a token, a deadline, both, or neither.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    token: Option<CancellationToken>,
    deadline: Option<tokio::time::Instant>,
}

impl CancelSignal {
    /// A signal that never fires.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn token(token: CancellationToken) -> Self {
        Self { token: Some(token), deadline: None }
    }

    pub fn deadline(deadline: tokio::time::Instant) -> Self {
        Self { token: None, deadline: Some(deadline) }
    }

    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }

    pub fn with_deadline(mut self, deadline: tokio::time::Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Resolves with the reason once the token is cancelled or the deadline passes;
    /// pending forever when neither is set.
    async fn fired(&self) -> &'static str {
        let cancelled = async {
            match &self.token {
                Some(token) => token.cancelled().await,
                None => futures::future::pending::<()>().await,
            }
        };
        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => futures::future::pending::<()>().await,
            }
        };
        tokio::select! {
            _ = cancelled => "cancellation requested",
            _ = expired => "deadline elapsed",
        }
    }
}

/// Admission gate shared by all calls of one client.
#[derive(Debug, Clone)]
pub struct RequestGate {
    state: Arc<RateWindowState>,
    config: GovernorConfig,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
}

impl RequestGate {
    pub fn new(
        state: Arc<RateWindowState>,
        config: GovernorConfig,
        clock: Arc<dyn Clock>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self { state, config, clock, sleeper }
    }

    pub fn config(&self) -> &GovernorConfig {
        &self.config
    }

    /// Evaluate the policy against the latest observation without waiting.
    pub fn check(&self) -> Admission {
        let snapshot = self.state.snapshot();
        evaluate(&snapshot, &self.config, self.clock.now())
    }

    /// Admit, block-then-admit, or reject the next call.
    ///
    /// Returns `LimitExceeded` in fail-fast mode and `Cancelled` when `signal` fires
    /// during a force-mode wait. In both cases the request must not be sent.
    pub async fn admit(&self, signal: &CancelSignal) -> Result<(), GovernorError> {
        match self.check() {
            Admission::Proceed => {
                debug!(target: "ratewarden::gate", "admitted");
                Ok(())
            }
            Admission::Reject { remaining, requests_in_window, reset_in } => {
                warn!(
                    target: "ratewarden::gate",
                    remaining,
                    requests_in_window,
                    reset_in_ms = reset_in.as_millis() as u64,
                    "rate limit reached, rejecting request"
                );
                Err(GovernorError::LimitExceeded { remaining, requests_in_window, reset_in })
            }
            Admission::Wait { wait } => {
                info!(target: "ratewarden::gate", wait_ms = wait.as_millis() as u64, "limit reached, waiting");
                tokio::select! {
                    _ = self.sleeper.sleep(wait) => {
                        info!(target: "ratewarden::gate", wait_ms = wait.as_millis() as u64, "continuing after wait");
                        Ok(())
                    }
                    reason = signal.fired() => {
                        warn!(target: "ratewarden::gate", reason, "admission wait aborted");
                        Err(GovernorError::Cancelled { reason })
                    }
                }
            }
        }
    }
}
