//! Convenient re-exports for common ratewarden types.
pub use crate::{
    config::{GovernorConfig, LimitMode},
    error::GovernorError,
    gate::CancelSignal,
    governor::RateGovernor,
    hooks::PipelineHooks,
    middleware::GovernorLayer,
    retry::{ThrottleRetryLayer, ThrottleRetryPolicy},
    window::{QuotaSnapshot, Window},
};
