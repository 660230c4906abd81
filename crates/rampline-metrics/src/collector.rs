//! Per-criterion metric collection.

use std::time::Duration;

use rampline_core::{HealthCriterion, MetricsCheck};
use tracing::debug;

use crate::provider::{MetricsError, PercentileReducer, Provider, ProviderError};

/// Sample one value per health criterion, in criteria order.
///
/// Error rates come back from providers as fractions and are converted to
/// percentages here so they compare directly against `error-rate-percent`
/// thresholds. Any provider failure aborts the whole collection; the
/// resulting error names the metric that failed.
pub async fn collect(
    provider: &dyn Provider,
    offset: Duration,
    criteria: &[HealthCriterion],
) -> Result<Vec<f64>, MetricsError> {
    let mut values = Vec::with_capacity(criteria.len());
    for criterion in criteria {
        let value = match criterion.metric {
            MetricsCheck::RequestCount => provider
                .request_count(offset)
                .await
                .map(|count| count as f64)
                .map_err(|e| wrap(criterion.metric, e))?,
            MetricsCheck::Latency => {
                let reducer =
                    PercentileReducer::from_percentile(criterion.percentile.unwrap_or_default())?;
                provider
                    .latency(offset, reducer)
                    .await
                    .map_err(|e| wrap(criterion.metric, e))?
            }
            MetricsCheck::ErrorRate => provider
                .error_rate(offset)
                .await
                .map(|rate| rate * 100.0)
                .map_err(|e| wrap(criterion.metric, e))?,
        };
        debug!(metric = criterion.metric.as_str(), value, "sampled metric");
        values.push(value);
    }
    Ok(values)
}

fn wrap(metric: MetricsCheck, source: ProviderError) -> MetricsError {
    MetricsError::Provider {
        metric: metric.as_str(),
        source,
    }
}
