//! Metrics backend seam.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Error type implementations report from individual queries.
pub type ProviderError = Box<dyn std::error::Error + Send + Sync>;

/// Errors from metric collection.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("unsupported percentile {0}")]
    BadPercentile(f64),

    #[error("failed to obtain metrics {metric:?}: {source}")]
    Provider {
        metric: &'static str,
        source: ProviderError,
    },
}

/// Latency aggregation to request from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PercentileReducer {
    P50,
    P95,
    P99,
}

impl PercentileReducer {
    /// Map a configured percentile to a reducer. The table is fixed; any
    /// other percentile is a configuration error.
    pub fn from_percentile(p: f64) -> Result<Self, MetricsError> {
        if p == 50.0 {
            Ok(PercentileReducer::P50)
        } else if p == 95.0 {
            Ok(PercentileReducer::P95)
        } else if p == 99.0 {
            Ok(PercentileReducer::P99)
        } else {
            Err(MetricsError::BadPercentile(p))
        }
    }

    /// The quantile in (0, 1) backends like Prometheus expect.
    pub fn quantile(self) -> f64 {
        match self {
            PercentileReducer::P50 => 0.50,
            PercentileReducer::P95 => 0.95,
            PercentileReducer::P99 => 0.99,
        }
    }
}

/// Aggregated production metrics for one service.
///
/// `offset` is the lookback window ending now. Queries are scoped to the
/// current candidate revision via `set_candidate_revision`; scoping is
/// per-instance state, so the daemon builds one provider per service
/// worker. Queries are cancelled by dropping their future, and
/// implementations bound each query with their own request deadline on
/// top (see `PrometheusProvider::with_request_timeout`).
#[async_trait]
pub trait Provider: Send + Sync {
    /// Total requests served during the window.
    async fn request_count(&self, offset: Duration) -> Result<i64, ProviderError>;

    /// Latency over the window aggregated by the given reducer, in
    /// milliseconds.
    async fn latency(
        &self,
        offset: Duration,
        reducer: PercentileReducer,
    ) -> Result<f64, ProviderError>;

    /// Fraction of requests that failed during the window, in [0, 1].
    async fn error_rate(&self, offset: Duration) -> Result<f64, ProviderError>;

    /// Scope subsequent queries to the given candidate revision.
    fn set_candidate_revision(&self, revision: &str);
}
