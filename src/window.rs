//! Quota windows advertised by the server.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Length of the short window. Its rollover boundaries are aligned to multiples of this
/// period on the wall clock.
pub const SHORT_WINDOW: Duration = Duration::from_secs(5 * 60);

/// The three independent quota periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Window {
    /// Five minutes.
    Short,
    /// One hour.
    Medium,
    /// One day.
    Long,
}

impl Window {
    pub const ALL: [Window; 3] = [Window::Short, Window::Medium, Window::Long];
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Window::Short => write!(f, "short"),
            Window::Medium => write!(f, "medium"),
            Window::Long => write!(f, "long"),
        }
    }
}

/// Server-reported `(limit, remaining, reset)` for one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Quota {
    pub limit: u32,
    /// Never above `limit`.
    pub remaining: u32,
    /// Seconds until reset, relative to the observation instant.
    pub reset_seconds: u32,
}

impl Quota {
    /// Build a quota, clamping `remaining` to `limit`.
    pub fn new(limit: u32, remaining: u32, reset_seconds: u32) -> Self {
        Self { limit, remaining: remaining.min(limit), reset_seconds }
    }

    pub fn reset_in(&self) -> Duration {
        Duration::from_secs(u64::from(self.reset_seconds))
    }

    /// Absolute reset instant given the observation time.
    pub fn reset_at(&self, observed_at: SystemTime) -> SystemTime {
        observed_at + self.reset_in()
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// The same reset instant seen `elapsed` later; saturates at zero.
    pub fn aged(self, elapsed: Duration) -> Self {
        let elapsed = u32::try_from(elapsed.as_secs()).unwrap_or(u32::MAX);
        Self { reset_seconds: self.reset_seconds.saturating_sub(elapsed), ..self }
    }
}

/// Quotas for all three windows, replaced together on every successful parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QuotaSet {
    pub short: Quota,
    pub medium: Quota,
    pub long: Quota,
}

impl QuotaSet {
    pub fn get(&self, window: Window) -> Quota {
        match window {
            Window::Short => self.short,
            Window::Medium => self.medium,
            Window::Long => self.long,
        }
    }

    /// Rebase every reset onto an observation `elapsed` later.
    pub fn aged(self, elapsed: Duration) -> Self {
        Self { short: self.short.aged(elapsed), medium: self.medium.aged(elapsed), long: self.long.aged(elapsed) }
    }
}

/// Point-in-time copy of the shared window state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QuotaSnapshot {
    pub quotas: QuotaSet,
    /// `None` until the first response has been observed.
    pub observed_at: Option<SystemTime>,
    /// Successful requests since the short window last rolled over.
    pub requests_in_window: u32,
}

impl QuotaSnapshot {
    pub fn short(&self) -> Quota {
        self.quotas.short
    }

    /// Reset instant of `window`, if anything has been observed.
    pub fn reset_at(&self, window: Window) -> Option<SystemTime> {
        self.observed_at.map(|at| self.quotas.get(window).reset_at(at))
    }

    /// `lastObservedAt + short.reset`, the instant the gate waits for.
    pub fn short_reset_at(&self) -> Option<SystemTime> {
        self.reset_at(Window::Short)
    }
}

/// First short-window boundary strictly after `at`: the next multiple of
/// [`SHORT_WINDOW`] since the Unix epoch.
pub fn next_short_boundary(at: SystemTime) -> SystemTime {
    let period = SHORT_WINDOW.as_secs();
    let secs = at.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
    UNIX_EPOCH + Duration::from_secs((secs / period + 1) * period)
}
