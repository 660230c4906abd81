//! Static providers for tests.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::provider::{PercentileReducer, Provider, ProviderError};

/// Provider returning fixed values regardless of window or reducer.
#[derive(Debug)]
pub struct StaticProvider {
    pub request_count: i64,
    pub latency_ms: f64,
    /// Error fraction in [0, 1], as a real backend reports it.
    pub error_rate: f64,
    candidate: Mutex<String>,
}

impl StaticProvider {
    pub fn new(request_count: i64, latency_ms: f64, error_rate: f64) -> Self {
        Self {
            request_count,
            latency_ms,
            error_rate,
            candidate: Mutex::new(String::new()),
        }
    }

    /// The revision queries are currently scoped to.
    pub fn candidate_revision(&self) -> String {
        self.candidate.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for StaticProvider {
    async fn request_count(&self, _offset: Duration) -> Result<i64, ProviderError> {
        Ok(self.request_count)
    }

    async fn latency(
        &self,
        _offset: Duration,
        _reducer: PercentileReducer,
    ) -> Result<f64, ProviderError> {
        Ok(self.latency_ms)
    }

    async fn error_rate(&self, _offset: Duration) -> Result<f64, ProviderError> {
        Ok(self.error_rate)
    }

    fn set_candidate_revision(&self, revision: &str) {
        *self.candidate.lock().unwrap() = revision.to_string();
    }
}

/// Provider failing every query, simulating a backend outage.
#[derive(Debug, Default)]
pub struct FailingProvider;

#[async_trait]
impl Provider for FailingProvider {
    async fn request_count(&self, _offset: Duration) -> Result<i64, ProviderError> {
        Err("metrics backend unavailable".into())
    }

    async fn latency(
        &self,
        _offset: Duration,
        _reducer: PercentileReducer,
    ) -> Result<f64, ProviderError> {
        Err("metrics backend unavailable".into())
    }

    async fn error_rate(&self, _offset: Duration) -> Result<f64, ProviderError> {
        Err("metrics backend unavailable".into())
    }

    fn set_candidate_revision(&self, _revision: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_provider_returns_configured_values() {
        let provider = StaticProvider::new(1000, 500.0, 0.01);
        assert_eq!(
            provider.request_count(Duration::from_secs(60)).await.unwrap(),
            1000
        );
        assert_eq!(
            provider
                .latency(Duration::from_secs(60), PercentileReducer::P99)
                .await
                .unwrap(),
            500.0
        );
        assert_eq!(
            provider.error_rate(Duration::from_secs(60)).await.unwrap(),
            0.01
        );
    }

    #[tokio::test]
    async fn candidate_scoping_is_recorded() {
        let provider = StaticProvider::new(0, 0.0, 0.0);
        assert_eq!(provider.candidate_revision(), "");
        provider.set_candidate_revision("rev-007");
        assert_eq!(provider.candidate_revision(), "rev-007");
    }
}
