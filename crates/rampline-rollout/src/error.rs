//! Rollout error types.

use thiserror::Error;

/// Result type alias for controller passes.
pub type RolloutResult<T> = Result<T, RolloutError>;

/// Errors that can occur while deciding the next traffic split.
#[derive(Debug, Error)]
pub enum RolloutError {
    #[error("rollout strategy has no steps")]
    NoSteps,

    #[error("health diagnosis error: {0}")]
    Health(#[from] rampline_health::HealthError),

    #[error("metrics error: {0}")]
    Metrics(#[from] rampline_metrics::MetricsError),

    /// Every criterion is a request-count gate, so no pass can ever judge
    /// the candidate. The strategy is mis-specified.
    #[error("diagnosis is unknown: health criteria need at least one metric other than request-count")]
    UnknownDiagnosis,
}

/// Result type alias for reconcile passes.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Errors that can occur during a reconcile pass.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("platform client error: {0}")]
    Client(#[from] rampline_platform::ClientError),

    #[error("rollout error: {0}")]
    Rollout(#[from] RolloutError),
}
