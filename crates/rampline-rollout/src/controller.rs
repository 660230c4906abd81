//! Rollout controller — drives the per-service rollout state machine.
//!
//! Given a service snapshot, the controller decides the next traffic split
//! and annotation set: begin a rollout when a new revision is ready,
//! advance a healthy candidate along the strategy's step ladder, hold while
//! evidence is thin or pacing forbids a step, promote at the end of the
//! ladder, and roll back an unhealthy candidate, remembering it as failed.
//!
//! The controller never talks to the platform; it returns the mutated
//! snapshot and the reconciler pushes it back.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, info, warn};

use rampline_core::{format_rfc3339, Clock, Strategy, SystemClock};
use rampline_health::{diagnose, report, DiagnosisResult};
use rampline_metrics::{collect, Provider};
use rampline_platform::Service;

use crate::annotations;
use crate::error::{RolloutError, RolloutResult};
use crate::traffic::{self, CandidateTarget};

/// Result of one controller pass over a service.
#[derive(Debug)]
pub struct Outcome {
    /// The service with the next spec traffic and annotations applied.
    pub service: Service,
    /// Whether the traffic split changed. Annotations may change on an
    /// unchanged pass (health report freshness).
    pub changed: bool,
    pub stable: Option<String>,
    pub candidate: Option<String>,
    /// Overall verdict, when a diagnosis ran this pass.
    pub diagnosis: Option<DiagnosisResult>,
}

impl Outcome {
    fn unchanged(service: Service, stable: Option<String>, candidate: Option<String>) -> Self {
        Self {
            service,
            changed: false,
            stable,
            candidate,
            diagnosis: None,
        }
    }
}

/// The per-service rollout decision engine.
pub struct RolloutController {
    strategy: Strategy,
    metrics: Arc<dyn Provider>,
    clock: Arc<dyn Clock>,
}

impl RolloutController {
    pub fn new(strategy: Strategy, metrics: Arc<dyn Provider>) -> Self {
        Self {
            strategy,
            metrics,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock (tests drive time deterministically).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Decide the next traffic split and annotations for `svc`.
    ///
    /// Reads the status traffic list (what the platform actually serves)
    /// and writes the spec traffic list. The first matching rule wins:
    /// nothing to do, steady state, suppressed failed revision, fresh
    /// candidate, superseded candidate, or health evaluation.
    pub async fn decide(&self, svc: &Service) -> RolloutResult<Outcome> {
        let first_step = *self.strategy.steps.first().ok_or(RolloutError::NoSteps)?;
        let service = svc.qualified_name();
        let next = svc.clone();

        let candidate_target = traffic::detect_candidate(&svc.status.traffic);
        let candidate_rev = candidate_target.as_ref().map(|c| c.revision.as_str());
        let candidate_name = candidate_rev.map(str::to_string);

        let Some(stable) = traffic::detect_stable(&svc.status.traffic, candidate_rev) else {
            debug!(%service, "no stable revision, nothing to shift from");
            return Ok(Outcome::unchanged(next, None, candidate_name));
        };

        let latest = svc.status.latest_ready_revision_name.clone();
        if latest.is_empty() {
            debug!(%service, "no ready revision yet");
            return Ok(Outcome::unchanged(next, Some(stable), candidate_name));
        }

        // Steady state: the newest ready revision already serves as stable.
        if latest == stable && candidate_target.is_none() {
            debug!(%service, %stable, "stable revision is up to date");
            return Ok(Outcome::unchanged(next, Some(stable), None));
        }

        // A rolled-back revision must not re-enter on its own.
        if svc.annotation(annotations::LAST_FAILED_CANDIDATE_REVISION) == Some(latest.as_str()) {
            debug!(%service, revision = %latest, "latest ready revision previously failed, holding");
            return Ok(Outcome::unchanged(next, Some(stable), candidate_name));
        }

        let now = self.clock.now();
        match candidate_target {
            // A new revision and no rollout in flight: start at the first step.
            None => {
                info!(%service, %stable, candidate = %latest, percent = first_step, "starting rollout");
                let next = self.start_candidate(next, &stable, &latest, first_step, now);
                Ok(Outcome {
                    service: next,
                    changed: true,
                    stable: Some(stable),
                    candidate: Some(latest),
                    diagnosis: None,
                })
            }
            // A newer revision superseded the in-flight candidate. The old
            // candidate was never judged unhealthy, so it is not marked
            // failed; the rollout restarts from the first step.
            Some(ref old) if old.revision != latest => {
                info!(%service, superseded = %old.revision, candidate = %latest, "candidate superseded, restarting rollout");
                let next = self.start_candidate(next, &stable, &latest, first_step, now);
                Ok(Outcome {
                    service: next,
                    changed: true,
                    stable: Some(stable),
                    candidate: Some(latest),
                    diagnosis: None,
                })
            }
            Some(candidate) => self.evaluate_candidate(next, &stable, candidate, now).await,
        }
    }

    /// Begin (or restart) a rollout: first step plus fresh annotations.
    fn start_candidate(
        &self,
        mut svc: Service,
        stable: &str,
        candidate: &str,
        step: i64,
        now: DateTime<Utc>,
    ) -> Service {
        svc.spec.traffic = traffic::step_split(stable, candidate, step);
        svc.set_annotation(annotations::STABLE_REVISION, stable);
        svc.set_annotation(annotations::CANDIDATE_REVISION, candidate);
        svc.set_annotation(annotations::LAST_ROLLOUT, format_rfc3339(now));
        svc.set_annotation(
            annotations::LAST_HEALTH_REPORT,
            with_last_update(report::NO_REPORT_YET, now),
        );
        svc
    }

    /// The candidate is the latest ready revision: diagnose it and advance,
    /// hold, promote, or roll back.
    async fn evaluate_candidate(
        &self,
        mut next: Service,
        stable: &str,
        candidate: CandidateTarget,
        now: DateTime<Utc>,
    ) -> RolloutResult<Outcome> {
        let service = next.qualified_name();
        let criteria = &self.strategy.health_criteria;

        self.metrics.set_candidate_revision(&candidate.revision);
        let values = collect(
            self.metrics.as_ref(),
            self.strategy.health_check_offset,
            criteria,
        )
        .await?;
        let diagnosis = diagnose(criteria, &values)?;
        debug!(%service, candidate = %candidate.revision, verdict = %diagnosis.overall, "candidate diagnosed");

        next.set_annotation(annotations::STABLE_REVISION, stable);
        next.set_annotation(annotations::CANDIDATE_REVISION, &candidate.revision);

        match diagnosis.overall {
            DiagnosisResult::Unhealthy => {
                warn!(%service, candidate = %candidate.revision, "candidate unhealthy, rolling back");
                next.spec.traffic = traffic::rollback_split(stable, &candidate.revision);
                next.set_annotation(
                    annotations::LAST_FAILED_CANDIDATE_REVISION,
                    &candidate.revision,
                );
                // A rollback is not a forward step, so pacing state stays.
                next.set_annotation(
                    annotations::LAST_HEALTH_REPORT,
                    with_last_update(&report::render(criteria, &diagnosis, true), now),
                );
                Ok(Outcome {
                    service: next,
                    changed: true,
                    stable: Some(stable.to_string()),
                    candidate: Some(candidate.revision),
                    diagnosis: Some(DiagnosisResult::Unhealthy),
                })
            }
            DiagnosisResult::Healthy => {
                if !self.enough_time_since_last_rollout(&next, now) {
                    debug!(%service, candidate = %candidate.revision, "healthy, but pacing forbids a step");
                    next.set_annotation(
                        annotations::LAST_HEALTH_REPORT,
                        with_last_update(&report::render(criteria, &diagnosis, false), now),
                    );
                    return Ok(Outcome {
                        service: next,
                        changed: false,
                        stable: Some(stable.to_string()),
                        candidate: Some(candidate.revision),
                        diagnosis: Some(DiagnosisResult::Healthy),
                    });
                }

                match next_step(&self.strategy.steps, candidate.percent) {
                    Some(step) => {
                        info!(%service, candidate = %candidate.revision, from = candidate.percent, to = step, "advancing rollout");
                        next.spec.traffic = traffic::step_split(stable, &candidate.revision, step);
                    }
                    None => {
                        info!(%service, candidate = %candidate.revision, "promoting candidate to stable");
                        next.spec.traffic = traffic::promote_split(&candidate.revision);
                        next.set_annotation(annotations::STABLE_REVISION, &candidate.revision);
                        next.remove_annotation(annotations::CANDIDATE_REVISION);
                        // A previously failed revision may be retried again
                        // once a different revision has shipped in between.
                        next.remove_annotation(annotations::LAST_FAILED_CANDIDATE_REVISION);
                    }
                }
                next.set_annotation(annotations::LAST_ROLLOUT, format_rfc3339(now));
                next.set_annotation(
                    annotations::LAST_HEALTH_REPORT,
                    with_last_update(&report::render(criteria, &diagnosis, true), now),
                );
                let promoted = next.annotation(annotations::CANDIDATE_REVISION).is_none();
                Ok(Outcome {
                    service: next,
                    changed: true,
                    stable: Some(if promoted {
                        candidate.revision.clone()
                    } else {
                        stable.to_string()
                    }),
                    candidate: (!promoted).then(|| candidate.revision.clone()),
                    diagnosis: Some(DiagnosisResult::Healthy),
                })
            }
            DiagnosisResult::Inconclusive => {
                debug!(%service, candidate = %candidate.revision, "diagnosis inconclusive, holding");
                next.set_annotation(
                    annotations::LAST_HEALTH_REPORT,
                    with_last_update(&report::render(criteria, &diagnosis, true), now),
                );
                Ok(Outcome {
                    service: next,
                    changed: false,
                    stable: Some(stable.to_string()),
                    candidate: Some(candidate.revision),
                    diagnosis: Some(DiagnosisResult::Inconclusive),
                })
            }
            DiagnosisResult::Unknown => Err(RolloutError::UnknownDiagnosis),
        }
    }

    /// Whether the pacing gate allows a forward step. Missing or
    /// unparseable pacing state counts as far in the past.
    fn enough_time_since_last_rollout(&self, svc: &Service, now: DateTime<Utc>) -> bool {
        let Some(raw) = svc.annotation(annotations::LAST_ROLLOUT) else {
            return true;
        };
        let last = match DateTime::parse_from_rfc3339(raw) {
            Ok(t) => t.with_timezone(&Utc),
            Err(e) => {
                warn!(value = raw, error = %e, "unparseable last-rollout timestamp, ignoring pacing");
                return true;
            }
        };
        let required = TimeDelta::from_std(self.strategy.time_between_rollouts)
            .unwrap_or(TimeDelta::MAX);
        now.signed_duration_since(last) >= required
    }
}

/// The next percent for the candidate, or None when the ladder is done and
/// the candidate should be promoted.
///
/// A percent matching a step advances to the following step. A percent off
/// the ladder (an operator hand-edit) reconciles forward onto the smallest
/// step not below it.
fn next_step(steps: &[i64], current: i64) -> Option<i64> {
    match steps.iter().position(|&s| s == current) {
        Some(i) => steps.get(i + 1).copied(),
        None => steps.iter().copied().find(|&s| s >= current),
    }
}

fn with_last_update(body: &str, now: DateTime<Utc>) -> String {
    format!("{body}\nlastUpdate: {}", format_rfc3339(now))
}
