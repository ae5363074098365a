//! Governor policy configuration.
//!
//! A [`GovernorConfig`] is validated once and never mutated afterwards; the governor
//! takes it by value at construction.

use serde::Deserialize;
use std::fmt;

/// What the gate does with a call made before the short window resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LimitMode {
    /// Reject the call with `LimitExceeded` without sending it.
    #[default]
    FailFast,
    /// Send until the reserve or the per-window budget would be breached, then block
    /// the caller until the short window resets.
    Force,
}

impl fmt::Display for LimitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimitMode::FailFast => write!(f, "fail-fast"),
            LimitMode::Force => write!(f, "force"),
        }
    }
}

/// Errors produced when validating governor configuration.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    /// `max_requests_per_window` must be > 0.
    #[error("max_requests_per_window must be > 0 (got {provided})")]
    InvalidMaxRequests {
        /// Value provided by caller.
        provided: u32,
    },
}

/// Validated admission policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawGovernorConfig")]
pub struct GovernorConfig {
    min_remaining_reserve: u32,
    max_requests_per_window: u32,
    mode: LimitMode,
}

impl GovernorConfig {
    /// Create a config with validation.
    ///
    /// # Examples
    /// ```
    /// use ratewarden::{GovernorConfig, LimitMode};
    /// let config = GovernorConfig::new(10, 250, LimitMode::Force).unwrap();
    /// assert_eq!(config.max_requests_per_window(), 250);
    /// assert!(GovernorConfig::new(0, 0, LimitMode::FailFast).is_err());
    /// ```
    pub fn new(
        min_remaining_reserve: u32,
        max_requests_per_window: u32,
        mode: LimitMode,
    ) -> Result<Self, ConfigError> {
        if max_requests_per_window == 0 {
            return Err(ConfigError::InvalidMaxRequests { provided: max_requests_per_window });
        }
        Ok(Self { min_remaining_reserve, max_requests_per_window, mode })
    }

    pub fn builder() -> GovernorConfigBuilder {
        GovernorConfigBuilder::new()
    }

    /// Server-side requests this client leaves untouched in the short window.
    pub fn min_remaining_reserve(&self) -> u32 {
        self.min_remaining_reserve
    }

    /// Requests this client may issue per short window.
    pub fn max_requests_per_window(&self) -> u32 {
        self.max_requests_per_window
    }

    pub fn mode(&self) -> LimitMode {
        self.mode
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawGovernorConfig {
    #[serde(default)]
    min_remaining_reserve: u32,
    max_requests_per_window: u32,
    #[serde(default)]
    mode: LimitMode,
}

impl TryFrom<RawGovernorConfig> for GovernorConfig {
    type Error = ConfigError;

    fn try_from(raw: RawGovernorConfig) -> Result<Self, Self::Error> {
        GovernorConfig::new(raw.min_remaining_reserve, raw.max_requests_per_window, raw.mode)
    }
}

/// Builder for [`GovernorConfig`].
#[derive(Debug, Clone)]
pub struct GovernorConfigBuilder {
    min_remaining_reserve: u32,
    max_requests_per_window: u32,
    mode: LimitMode,
}

impl GovernorConfigBuilder {
    /// Defaults: no reserve, unbounded per-window budget, fail-fast.
    pub fn new() -> Self {
        Self { min_remaining_reserve: 0, max_requests_per_window: u32::MAX, mode: LimitMode::FailFast }
    }

    pub fn min_remaining_reserve(mut self, reserve: u32) -> Self {
        self.min_remaining_reserve = reserve;
        self
    }

    /// Must be > 0.
    pub fn max_requests_per_window(mut self, max: u32) -> Self {
        self.max_requests_per_window = max;
        self
    }

    pub fn mode(mut self, mode: LimitMode) -> Self {
        self.mode = mode;
        self
    }

    /// Shorthand for `mode(LimitMode::Force)` / `mode(LimitMode::FailFast)`.
    pub fn force(self, force: bool) -> Self {
        self.mode(if force { LimitMode::Force } else { LimitMode::FailFast })
    }

    pub fn build(self) -> Result<GovernorConfig, ConfigError> {
        GovernorConfig::new(self.min_remaining_reserve, self.max_requests_per_window, self.mode)
    }
}

impl Default for GovernorConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
