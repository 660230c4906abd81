//! Traffic split model.
//!
//! Translates between the platform's traffic-target list and the
//! controller's stable/candidate view, and produces the next list after a
//! step, a promotion, or a rollback. Rewrites drop targets the controller
//! does not own: the spec traffic list always comes out as stable +
//! candidate + latest marker (or stable + latest after a promotion).

use rampline_platform::TrafficTarget;

/// Tag on the revision serving the bulk of production traffic.
pub const STABLE_TAG: &str = "stable";

/// Tag on the revision under progressive evaluation.
pub const CANDIDATE_TAG: &str = "candidate";

/// Tag on the floating latest-revision marker.
pub const LATEST_TAG: &str = "latest";

/// An in-flight candidate: a candidate-tagged target currently holding
/// traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateTarget {
    pub revision: String,
    pub percent: i64,
}

/// The candidate of a rollout in progress, if any.
///
/// A candidate-tagged target at 0% is not in flight: rollbacks park the
/// failed revision at 0% to keep its tag URL addressable, and a fresh
/// service may carry a drained candidate tag from earlier operations.
pub fn detect_candidate(traffic: &[TrafficTarget]) -> Option<CandidateTarget> {
    traffic
        .iter()
        .find(|t| t.tag == CANDIDATE_TAG && t.percent > 0 && !t.revision_name.is_empty())
        .map(|t| CandidateTarget {
            revision: t.revision_name.clone(),
            percent: t.percent,
        })
}

/// The revision currently acting as stable.
///
/// The highest-percent target that is not the candidate wins. A tie for
/// the top share means no revision is identifiably stable: an even split
/// must leave the service untouched rather than crown one side by name.
/// The stable tag then decides, as it also does when no non-candidate
/// target carries traffic at all — a candidate at the final step drains
/// the outgoing stable to 0%. Returns None if neither applies.
pub fn detect_stable(traffic: &[TrafficTarget], candidate: Option<&str>) -> Option<String> {
    let is_candidate =
        |t: &TrafficTarget| candidate.is_some_and(|c| t.revision_name == c);

    let mut best: Option<&TrafficTarget> = None;
    let mut contested = false;
    for target in traffic {
        if target.latest_revision
            || target.revision_name.is_empty()
            || target.percent <= 0
            || is_candidate(target)
        {
            continue;
        }
        match best {
            None => best = Some(target),
            Some(b) if target.percent > b.percent => {
                best = Some(target);
                contested = false;
            }
            Some(b) if target.percent == b.percent => contested = true,
            Some(_) => {}
        }
    }
    if let Some(target) = best {
        if !contested {
            return Some(target.revision_name.clone());
        }
    }

    traffic
        .iter()
        .find(|t| t.tag == STABLE_TAG && !t.revision_name.is_empty() && !is_candidate(t))
        .map(|t| t.revision_name.clone())
}

/// Traffic after moving the candidate to `step` percent.
pub fn step_split(stable: &str, candidate: &str, step: i64) -> Vec<TrafficTarget> {
    vec![
        TrafficTarget::tagged(stable, 100 - step, STABLE_TAG),
        TrafficTarget::tagged(candidate, step, CANDIDATE_TAG),
        TrafficTarget::latest(LATEST_TAG),
    ]
}

/// Traffic after promoting the candidate to stable.
pub fn promote_split(candidate: &str) -> Vec<TrafficTarget> {
    vec![
        TrafficTarget::tagged(candidate, 100, STABLE_TAG),
        TrafficTarget::latest(LATEST_TAG),
    ]
}

/// Traffic after rolling an unhealthy candidate back. The candidate stays
/// listed at 0% so its tag URL remains addressable for post-mortem.
pub fn rollback_split(stable: &str, candidate: &str) -> Vec<TrafficTarget> {
    vec![
        TrafficTarget::tagged(stable, 100, STABLE_TAG),
        TrafficTarget::tagged(candidate, 0, CANDIDATE_TAG),
        TrafficTarget::latest(LATEST_TAG),
    ]
}
