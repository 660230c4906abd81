//! Candidate health diagnosis.

use std::fmt;

use rampline_core::{HealthCriterion, MetricsCheck};
use thiserror::Error;

/// Errors from diagnosing a criteria/values pair.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HealthError {
    #[error("the number of health criteria does not match the number of sampled values")]
    InputMismatch,

    #[error("health criteria must be specified")]
    EmptyCriteria,
}

/// Overall verdict of a diagnosis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosisResult {
    /// No signal either way (e.g. only request-count criteria, all met).
    Unknown,
    /// Too little traffic to judge: the request-count floor was not reached.
    Inconclusive,
    /// Every criterion met, with at least one real health signal among them.
    Healthy,
    /// At least one health criterion failed.
    Unhealthy,
}

impl fmt::Display for DiagnosisResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DiagnosisResult::Unknown => "unknown",
            DiagnosisResult::Inconclusive => "inconclusive",
            DiagnosisResult::Healthy => "healthy",
            DiagnosisResult::Unhealthy => "unhealthy",
        };
        f.write_str(s)
    }
}

/// Outcome of checking a single criterion.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckResult {
    pub threshold: f64,
    pub actual: f64,
    pub is_met: bool,
}

/// A diagnosis: the overall verdict plus per-criterion results, parallel to
/// the criteria list it was produced from.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnosis {
    pub overall: DiagnosisResult,
    pub check_results: Vec<CheckResult>,
}

/// Diagnose a candidate from its criteria and the sampled values.
///
/// `values` must be parallel to `criteria`. Request count is a minimum;
/// every other metric is a maximum. An unmet non-request-count criterion
/// makes the verdict Unhealthy no matter what else holds; unmet request
/// count alone makes it Inconclusive. If all criteria are request-count and
/// met, the verdict stays Unknown — traffic volume by itself says nothing
/// about health.
pub fn diagnose(criteria: &[HealthCriterion], values: &[f64]) -> Result<Diagnosis, HealthError> {
    if criteria.len() != values.len() {
        return Err(HealthError::InputMismatch);
    }
    if criteria.is_empty() {
        return Err(HealthError::EmptyCriteria);
    }

    let mut overall = DiagnosisResult::Unknown;
    let mut check_results = Vec::with_capacity(criteria.len());
    for (criterion, &actual) in criteria.iter().zip(values) {
        let is_met = criterion_met(criterion.metric, criterion.threshold, actual);
        check_results.push(CheckResult {
            threshold: criterion.threshold,
            actual,
            is_met,
        });

        if !is_met && criterion.metric == MetricsCheck::RequestCount {
            if overall != DiagnosisResult::Unhealthy {
                overall = DiagnosisResult::Inconclusive;
            }
            continue;
        }
        if !is_met {
            overall = DiagnosisResult::Unhealthy;
            continue;
        }
        if overall == DiagnosisResult::Unknown && criterion.metric != MetricsCheck::RequestCount {
            overall = DiagnosisResult::Healthy;
        }
    }

    Ok(Diagnosis {
        overall,
        check_results,
    })
}

fn criterion_met(metric: MetricsCheck, threshold: f64, actual: f64) -> bool {
    if metric.is_minimum() {
        actual >= threshold
    } else {
        actual <= threshold
    }
}
