//! Per-service reconciliation pass.
//!
//! One pass fetches the service, lets the controller decide, and replaces
//! the object when the traffic split or any annotation changed. Spec and
//! annotations travel in a single replace call, so the platform never sees
//! a partial write. The reconciler keeps no state of its own.

use std::sync::Arc;

use tracing::{debug, info, warn};

use rampline_platform::{ClientError, PlatformClient};

use crate::controller::RolloutController;
use crate::error::ReconcileResult;

/// Summary of one reconcile pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassSummary {
    /// Whether the traffic split changed.
    pub changed: bool,
    /// Whether a replace was written to the platform this pass.
    pub applied: bool,
}

/// Runs reconcile passes for services.
pub struct Reconciler {
    client: Arc<dyn PlatformClient>,
    controller: RolloutController,
}

impl Reconciler {
    pub fn new(client: Arc<dyn PlatformClient>, controller: RolloutController) -> Self {
        Self { client, controller }
    }

    /// Run one pass over `namespace/name`: fetch, decide, push back.
    pub async fn reconcile(&self, namespace: &str, name: &str) -> ReconcileResult<PassSummary> {
        let svc = self.client.get_service(namespace, name).await?;
        let service = svc.qualified_name();

        let outcome = self.controller.decide(&svc).await?;
        info!(
            %service,
            stable = outcome.stable.as_deref().unwrap_or(""),
            candidate = outcome.candidate.as_deref().unwrap_or(""),
            diagnosis = %outcome
                .diagnosis
                .map(|d| d.to_string())
                .unwrap_or_default(),
            changed = outcome.changed,
            "reconciled service"
        );

        let dirty =
            outcome.changed || outcome.service.metadata.annotations != svc.metadata.annotations;
        if !dirty {
            debug!(%service, "service already converged");
            return Ok(PassSummary {
                changed: false,
                applied: false,
            });
        }

        match self
            .client
            .replace_service(namespace, name, &outcome.service)
            .await
        {
            Ok(_) => Ok(PassSummary {
                changed: outcome.changed,
                applied: true,
            }),
            // Another writer got there first; the next pass recomputes from
            // the updated object.
            Err(ClientError::Conflict(_)) => {
                warn!(%service, "write conflict, retrying next pass");
                Ok(PassSummary {
                    changed: false,
                    applied: false,
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}
