//! rampline-metrics — sampled production metrics for rollout gating.
//!
//! Defines the provider seam the controller reads metrics through, the
//! per-criterion collector that turns health criteria into a parallel list
//! of sampled values, and a Prometheus-backed provider implementation.
//!
//! # Architecture
//!
//! ```text
//! collect(provider, offset, criteria) → Vec<f64>
//!   ├── request-count       → Provider::request_count
//!   ├── request-latency     → Provider::latency (percentile → reducer)
//!   └── error-rate-percent  → Provider::error_rate × 100
//! ```

pub mod collector;
pub mod mock;
pub mod prometheus;
pub mod provider;

pub use collector::collect;
pub use mock::{FailingProvider, StaticProvider};
pub use prometheus::PrometheusProvider;
pub use provider::{MetricsError, PercentileReducer, Provider, ProviderError};
