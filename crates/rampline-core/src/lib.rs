//! rampline-core — shared configuration and time primitives.
//!
//! Defines the rollout strategy (traffic steps, pacing, health criteria),
//! the `rampline.toml` file format, and the injected clock abstraction the
//! rest of the workspace builds on.

pub mod clock;
pub mod config;

pub use clock::{format_rfc3339, Clock, FixedClock, SystemClock};
pub use config::{
    ConfigError, HealthCriterion, MetricsCheck, MetricsConfig, PlatformConfig, RamplineConfig,
    ServiceRef, Strategy, DEFAULT_REQUEST_TIMEOUT,
};
