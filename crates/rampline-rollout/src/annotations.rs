//! Durable controller state, stored as service annotations.
//!
//! Keys are namespaced so they survive next to user annotations. Values
//! are plain strings; timestamps are RFC3339 from the injected clock.

/// Current stable revision name.
pub const STABLE_REVISION: &str = "rampline.dev/stableRevision";

/// Candidate revision of the rollout in progress, if any.
pub const CANDIDATE_REVISION: &str = "rampline.dev/candidateRevision";

/// Last revision rolled back after an unhealthy diagnosis. It is never
/// re-adopted as a candidate while this annotation names it.
pub const LAST_FAILED_CANDIDATE_REVISION: &str = "rampline.dev/lastFailedCandidateRevision";

/// RFC3339 time of the last forward traffic change, for pacing.
pub const LAST_ROLLOUT: &str = "rampline.dev/lastRollout";

/// Human-readable text of the most recent health diagnosis.
pub const LAST_HEALTH_REPORT: &str = "rampline.dev/lastHealthReport";
