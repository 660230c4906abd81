//! Operator-facing health reports.
//!
//! The report is persisted verbatim in a service annotation and parsed by
//! operators and tooling, so the format is stable. The controller appends a
//! trailing `lastUpdate:` line with its injected clock.

use std::fmt::Write;

use rampline_core::{HealthCriterion, MetricsCheck};

use crate::diagnose::{Diagnosis, DiagnosisResult};

/// Report body used when a candidate was just picked and no diagnosis has
/// run yet.
pub const NO_REPORT_YET: &str = "new candidate, no health report available yet";

/// Render a diagnosis into the report body.
///
/// `enough_time` marks whether the pacing gate would allow a forward step;
/// a healthy-but-held report says so on the status line. Request counts are
/// printed as whole numbers, every other metric with two decimals.
pub fn render(criteria: &[HealthCriterion], diagnosis: &Diagnosis, enough_time: bool) -> String {
    let mut out = format!("status: {}", diagnosis.overall);
    if diagnosis.overall == DiagnosisResult::Healthy && !enough_time {
        out.push_str(", but no enough time since last rollout");
    }
    out.push_str("\nmetrics:");
    for (criterion, result) in criteria.iter().zip(&diagnosis.check_results) {
        out.push('\n');
        let _ = if criterion.metric == MetricsCheck::RequestCount {
            write!(
                out,
                "- {}: {:.0} (needs {:.0})",
                criterion.label(),
                result.actual,
                result.threshold
            )
        } else {
            write!(
                out,
                "- {}: {:.2} (needs {:.2})",
                criterion.label(),
                result.actual,
                result.threshold
            )
        };
    }
    out
}
