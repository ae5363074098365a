//! Shared quota state for one client.
//!
//! [`RateWindowState`] is the single piece of mutable state behind a governor. Every
//! read and write goes through one mutex held only for the copy or replacement itself;
//! nothing sleeps or awaits while holding it.
//!
//! Invariants:
//! - `update` is the only mutator, and it replaces the snapshot as a unit.
//! - `requests_in_window` is reset at most once per short-window boundary crossing
//!   (the boundary moves forward with every observation) and otherwise only grows.
//! - A malformed header never escapes `update`; the local clock stands in for the
//!   server's, and the kept reset values are shortened by the time since the last
//!   observation so they still point at the same instant.

use crate::clock::Clock;
use crate::error::HeaderParseError;
use crate::headers;
use crate::window::{next_short_boundary, QuotaSnapshot};
use http::HeaderMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;
use tracing::{debug, warn};

/// Last observed quotas plus the local request counter.
#[derive(Debug)]
pub struct RateWindowState {
    inner: Mutex<QuotaSnapshot>,
    clock: Arc<dyn Clock>,
}

impl RateWindowState {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { inner: Mutex::new(QuotaSnapshot::default()), clock }
    }

    fn lock(&self) -> MutexGuard<'_, QuotaSnapshot> {
        // The snapshot is plain data replaced whole, so a poisoned guard is still coherent.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> QuotaSnapshot {
        *self.lock()
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Record the quota headers of a completed response.
    ///
    /// `is_error` marks 4xx/5xx responses, which refresh the quotas but are not counted
    /// against the local per-window budget.
    pub fn update(&self, headers: &HeaderMap, is_error: bool) {
        let now = self.clock.now();
        let (quotas, observed_at) = match headers::parse_quotas(headers) {
            Ok(quotas) => (Some(quotas), self.server_time(headers, now)),
            Err(err) => {
                recover(&err);
                (None, now)
            }
        };

        let mut state = self.lock();
        let mut next = *state;
        if let Some(previous) = next.observed_at {
            if now > next_short_boundary(previous) {
                next.requests_in_window = 0;
            }
        }
        match (quotas, next.observed_at) {
            (Some(quotas), _) => next.quotas = quotas,
            // Kept resets stay anchored to the instant they were reported for.
            (None, Some(previous)) => {
                next.quotas = next.quotas.aged(observed_at.duration_since(previous).unwrap_or_default());
            }
            (None, None) => {}
        }
        next.observed_at = Some(observed_at);
        if !is_error {
            next.requests_in_window = next.requests_in_window.saturating_add(1);
        }
        *state = next;
        drop(state);

        debug!(
            target: "ratewarden::state",
            remaining = next.quotas.short.remaining,
            limit = next.quotas.short.limit,
            reset_seconds = next.quotas.short.reset_seconds,
            requests_in_window = next.requests_in_window,
            is_error,
            "observed rate limit headers"
        );
    }

    fn server_time(&self, headers: &HeaderMap, now: SystemTime) -> SystemTime {
        headers::parse_date(headers).unwrap_or_else(|err| {
            recover(&err);
            now
        })
    }
}

fn recover(err: &HeaderParseError) {
    warn!(target: "ratewarden::state", error = %err, "could not parse rate limit headers, using local clock");
}
