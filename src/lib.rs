#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # ratewarden
//!
//! Client-side governor for HTTP APIs that publish multi-window rate limits
//! (`X-RateLimit-Limit`, `X-RateLimit-Remaining` and `X-RateLimit-Reset`, each a
//! `short/medium/long` triplet).
//!
//! ## Features
//!
//! - **Quota tracking** from every response, including error responses
//! - **Admission gate** that rejects or waits before the short window runs dry
//! - **Local request budget** per five-minute window
//! - **Error classification**: 429 becomes a retryable `Throttled`, other errors are terminal
//! - **Tower middleware** plus plain hooks for hand-rolled clients
//! - **Throttle retry policy** that resends once the window has reset
//!
//! ## Quick Start
//!
//! ```rust
//! use ratewarden::{GovernorConfig, LimitMode, RateGovernor};
//!
//! let config = GovernorConfig::builder()
//!     .min_remaining_reserve(10)
//!     .max_requests_per_window(250)
//!     .mode(LimitMode::Force)
//!     .build()
//!     .unwrap();
//! let governor = RateGovernor::new(config);
//!
//! // Wrap any `Service<http::Request<_>, Response = http::Response<impl AsRef<[u8]>>>`:
//! let _layer = governor.layer();
//! ```

pub mod classifier;
pub mod clock;
pub mod config;
pub mod error;
pub mod gate;
pub mod governor;
pub mod headers;
pub mod hooks;
pub mod middleware;
pub mod observer;
pub mod prelude;
pub mod retry;
pub mod sleeper;
pub mod state;
pub mod window;

// Re-exports
pub use classifier::ErrorClassifier;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, GovernorConfig, GovernorConfigBuilder, LimitMode};
pub use error::{ApiErrorBody, BoxError, GovernorError, HeaderParseError};
pub use gate::{Admission, CancelSignal, RequestGate};
pub use governor::{RateGovernor, RateGovernorBuilder};
pub use hooks::PipelineHooks;
pub use middleware::{CancelSource, GovernorLayer, GovernorService};
pub use observer::ResponseObserver;
pub use retry::{ThrottleRetryLayer, ThrottleRetryPolicy, ThrottleRetryPolicyBuilder};
pub use sleeper::{Sleeper, TokioSleeper, TrackingSleeper};
pub use state::RateWindowState;
pub use window::{Quota, QuotaSet, QuotaSnapshot, Window};
