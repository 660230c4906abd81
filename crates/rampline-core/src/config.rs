//! rampline.toml configuration parser and the rollout strategy types.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Default deadline for a single external HTTP call (platform API or
/// metrics backend).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors produced while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid duration {0:?}")]
    BadDuration(String),

    #[error("strategy must have at least one step")]
    EmptySteps,

    #[error("step {0} is outside (0, 100]")]
    StepOutOfRange(i64),

    #[error("steps must be strictly increasing ({1} follows {0})")]
    StepsNotIncreasing(i64, i64),

    #[error("at least one health criterion is required")]
    EmptyCriteria,

    #[error("latency criteria require a percentile")]
    MissingPercentile,
}

/// Kind of metric a health criterion checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricsCheck {
    #[serde(rename = "request-count")]
    RequestCount,
    #[serde(rename = "request-latency")]
    Latency,
    #[serde(rename = "error-rate-percent")]
    ErrorRate,
}

impl MetricsCheck {
    /// Wire/config name of the metric.
    pub fn as_str(self) -> &'static str {
        match self {
            MetricsCheck::RequestCount => "request-count",
            MetricsCheck::Latency => "request-latency",
            MetricsCheck::ErrorRate => "error-rate-percent",
        }
    }

    /// Whether the threshold is a required minimum rather than a maximum.
    ///
    /// Request count gates statistical significance: more traffic is better,
    /// so its threshold is a floor. Every other metric caps a bad signal.
    pub fn is_minimum(self) -> bool {
        matches!(self, MetricsCheck::RequestCount)
    }
}

/// One health criterion: a metric, its threshold, and (for latency) the
/// percentile to aggregate at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCriterion {
    pub metric: MetricsCheck,
    pub threshold: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentile: Option<f64>,
}

impl HealthCriterion {
    /// Label used in health reports, e.g. `request-latency[p99]`.
    pub fn label(&self) -> String {
        match self.metric {
            MetricsCheck::Latency => {
                format!("request-latency[p{}]", self.percentile.unwrap_or_default())
            }
            other => other.as_str().to_string(),
        }
    }
}

/// A rollout strategy: the traffic step ladder plus the health gate
/// evaluated between steps.
#[derive(Debug, Clone)]
pub struct Strategy {
    /// Candidate traffic percentages, strictly increasing, each in (0, 100].
    pub steps: Vec<i64>,
    /// Lookback window handed to the metrics provider.
    pub health_check_offset: Duration,
    /// Minimum wall-clock interval between forward steps.
    pub time_between_rollouts: Duration,
    /// Criteria a candidate must meet to advance.
    pub health_criteria: Vec<HealthCriterion>,
}

impl Strategy {
    /// Check the structural invariants of the strategy.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.steps.is_empty() {
            return Err(ConfigError::EmptySteps);
        }
        let mut prev: Option<i64> = None;
        for &step in &self.steps {
            if step <= 0 || step > 100 {
                return Err(ConfigError::StepOutOfRange(step));
            }
            if let Some(p) = prev {
                if step <= p {
                    return Err(ConfigError::StepsNotIncreasing(p, step));
                }
            }
            prev = Some(step);
        }
        if self.health_criteria.is_empty() {
            return Err(ConfigError::EmptyCriteria);
        }
        for criterion in &self.health_criteria {
            if criterion.metric == MetricsCheck::Latency && criterion.percentile.is_none() {
                return Err(ConfigError::MissingPercentile);
            }
        }
        Ok(())
    }
}

/// Top-level rampline.toml.
#[derive(Debug, Clone, Deserialize)]
pub struct RamplineConfig {
    /// Seconds between reconcile ticks.
    #[serde(default = "default_interval")]
    pub interval: u64,
    pub platform: PlatformConfig,
    pub metrics: MetricsConfig,
    pub rollout: RolloutConfig,
    #[serde(default)]
    pub services: Vec<ServiceRef>,
}

fn default_interval() -> u64 {
    60
}

/// Where the serverless platform API lives.
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformConfig {
    pub base_url: String,
    /// Deadline for each platform API call, e.g. "10s".
    #[serde(default)]
    pub request_timeout: Option<String>,
}

impl PlatformConfig {
    /// Per-call deadline for platform API requests.
    pub fn request_timeout(&self) -> Result<Duration, ConfigError> {
        match &self.request_timeout {
            Some(raw) => parse_duration(raw),
            None => Ok(DEFAULT_REQUEST_TIMEOUT),
        }
    }
}

/// Where the metrics backend lives, with optional query overrides.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub base_url: String,
    /// Deadline for each metrics query, e.g. "10s".
    #[serde(default)]
    pub request_timeout: Option<String>,
    /// PromQL template for request counts. Placeholders: `{service}`,
    /// `{revision}`, `{window}`.
    #[serde(default)]
    pub request_count_query: Option<String>,
    /// PromQL template for latency. Placeholders as above plus `{percentile}`
    /// (a quantile in (0, 1)).
    #[serde(default)]
    pub latency_query: Option<String>,
    /// PromQL template for the error fraction in [0, 1].
    #[serde(default)]
    pub error_rate_query: Option<String>,
}

impl MetricsConfig {
    /// Per-call deadline for metrics queries.
    pub fn request_timeout(&self) -> Result<Duration, ConfigError> {
        match &self.request_timeout {
            Some(raw) => parse_duration(raw),
            None => Ok(DEFAULT_REQUEST_TIMEOUT),
        }
    }
}

/// The `[rollout]` section as written in the file; durations are strings
/// like `"5m"` until `RamplineConfig::strategy` parses them.
#[derive(Debug, Clone, Deserialize)]
pub struct RolloutConfig {
    pub steps: Vec<i64>,
    pub health_check_offset: String,
    pub time_between_rollouts: String,
    #[serde(default)]
    pub criteria: Vec<HealthCriterion>,
}

/// One service to reconcile.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceRef {
    pub namespace: String,
    pub name: String,
}

impl RamplineConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Build and validate the rollout strategy from the `[rollout]` section.
    pub fn strategy(&self) -> Result<Strategy, ConfigError> {
        let strategy = Strategy {
            steps: self.rollout.steps.clone(),
            health_check_offset: parse_duration(&self.rollout.health_check_offset)?,
            time_between_rollouts: parse_duration(&self.rollout.time_between_rollouts)?,
            health_criteria: self.rollout.criteria.clone(),
        };
        strategy.validate()?;
        Ok(strategy)
    }
}

/// Parse a duration string like "500ms", "90s", "5m", "1h", or plain seconds.
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let s = s.trim();
    let number = |v: &str| {
        v.parse::<u64>()
            .map_err(|_| ConfigError::BadDuration(s.to_string()))
    };
    if let Some(ms) = s.strip_suffix("ms") {
        Ok(Duration::from_millis(number(ms)?))
    } else if let Some(secs) = s.strip_suffix('s') {
        Ok(Duration::from_secs(number(secs)?))
    } else if let Some(mins) = s.strip_suffix('m') {
        Ok(Duration::from_secs(number(mins)? * 60))
    } else if let Some(hours) = s.strip_suffix('h') {
        Ok(Duration::from_secs(number(hours)? * 3600))
    } else {
        Ok(Duration::from_secs(number(s)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn criteria() -> Vec<HealthCriterion> {
        vec![
            HealthCriterion {
                metric: MetricsCheck::Latency,
                threshold: 750.0,
                percentile: Some(99.0),
            },
            HealthCriterion {
                metric: MetricsCheck::ErrorRate,
                threshold: 5.0,
                percentile: None,
            },
        ]
    }

    fn strategy(steps: Vec<i64>) -> Strategy {
        Strategy {
            steps,
            health_check_offset: Duration::from_secs(300),
            time_between_rollouts: Duration::from_secs(600),
            health_criteria: criteria(),
        }
    }

    #[test]
    fn valid_strategy() {
        assert!(strategy(vec![10, 40, 70]).validate().is_ok());
        assert!(strategy(vec![100]).validate().is_ok());
    }

    #[test]
    fn rejects_empty_steps() {
        assert!(matches!(
            strategy(vec![]).validate(),
            Err(ConfigError::EmptySteps)
        ));
    }

    #[test]
    fn rejects_out_of_range_steps() {
        assert!(matches!(
            strategy(vec![0, 50]).validate(),
            Err(ConfigError::StepOutOfRange(0))
        ));
        assert!(matches!(
            strategy(vec![50, 110]).validate(),
            Err(ConfigError::StepOutOfRange(110))
        ));
    }

    #[test]
    fn rejects_non_increasing_steps() {
        assert!(matches!(
            strategy(vec![10, 40, 40]).validate(),
            Err(ConfigError::StepsNotIncreasing(40, 40))
        ));
        assert!(matches!(
            strategy(vec![40, 10]).validate(),
            Err(ConfigError::StepsNotIncreasing(40, 10))
        ));
    }

    #[test]
    fn rejects_empty_criteria() {
        let mut s = strategy(vec![10]);
        s.health_criteria.clear();
        assert!(matches!(s.validate(), Err(ConfigError::EmptyCriteria)));
    }

    #[test]
    fn rejects_latency_without_percentile() {
        let mut s = strategy(vec![10]);
        s.health_criteria[0].percentile = None;
        assert!(matches!(s.validate(), Err(ConfigError::MissingPercentile)));
    }

    #[test]
    fn criterion_labels() {
        let c = criteria();
        assert_eq!(c[0].label(), "request-latency[p99]");
        assert_eq!(c[1].label(), "error-rate-percent");
        let rc = HealthCriterion {
            metric: MetricsCheck::RequestCount,
            threshold: 1000.0,
            percentile: None,
        };
        assert_eq!(rc.label(), "request-count");
    }

    #[test]
    fn parse_duration_values() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("90s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("10").unwrap(), Duration::from_secs(10));
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
interval = 30

[platform]
base_url = "http://localhost:8443"

[metrics]
base_url = "http://localhost:9090"

[rollout]
steps = [10, 40, 70]
health_check_offset = "5m"
time_between_rollouts = "10m"

[[rollout.criteria]]
metric = "request-latency"
percentile = 99
threshold = 750

[[rollout.criteria]]
metric = "error-rate-percent"
threshold = 5

[[services]]
namespace = "default"
name = "my-api"
"#;
        let config: RamplineConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.interval, 30);
        assert_eq!(config.services.len(), 1);
        assert_eq!(config.services[0].namespace, "default");

        let strategy = config.strategy().unwrap();
        assert_eq!(strategy.steps, vec![10, 40, 70]);
        assert_eq!(strategy.health_check_offset, Duration::from_secs(300));
        assert_eq!(strategy.time_between_rollouts, Duration::from_secs(600));
        assert_eq!(strategy.health_criteria.len(), 2);
        assert_eq!(strategy.health_criteria[0].metric, MetricsCheck::Latency);

        // Request timeouts fall back to the default when unset.
        assert_eq!(
            config.platform.request_timeout().unwrap(),
            DEFAULT_REQUEST_TIMEOUT
        );
        assert_eq!(
            config.metrics.request_timeout().unwrap(),
            DEFAULT_REQUEST_TIMEOUT
        );
    }

    #[test]
    fn request_timeouts_are_configurable() {
        let toml_str = r#"
[platform]
base_url = "http://localhost:8443"
request_timeout = "3s"

[metrics]
base_url = "http://localhost:9090"
request_timeout = "250ms"

[rollout]
steps = [50]
health_check_offset = "1m"
time_between_rollouts = "1m"

[[rollout.criteria]]
metric = "error-rate-percent"
threshold = 2
"#;
        let config: RamplineConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.platform.request_timeout().unwrap(),
            Duration::from_secs(3)
        );
        assert_eq!(
            config.metrics.request_timeout().unwrap(),
            Duration::from_millis(250)
        );

        let mut bad = config;
        bad.platform.request_timeout = Some("soon".to_string());
        assert!(bad.platform.request_timeout().is_err());
    }

    #[test]
    fn interval_defaults_to_a_minute() {
        let toml_str = r#"
[platform]
base_url = "http://localhost:8443"

[metrics]
base_url = "http://localhost:9090"

[rollout]
steps = [50]
health_check_offset = "1m"
time_between_rollouts = "1m"

[[rollout.criteria]]
metric = "error-rate-percent"
threshold = 2
"#;
        let config: RamplineConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.interval, 60);
        assert!(config.services.is_empty());
    }
}
