//! Apply and destroy a whole manifest.
//!
//! Job queues reference compute environments, so apply walks compute
//! environments first and destroy walks job queues first.

use super::plan::{Plan, PlannedAction};
use super::resource::{BatchResource, ComputeEnvironments, JobQueues};
use super::service::BatchReconcilerService;
use crate::error::ReconcileResult;
use crate::manifest::Manifest;
use crate::types::ResourceKind;
use log::{info, warn};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceOutcome {
    pub kind: ResourceKind,
    pub name: String,
    pub action: PlannedAction,
    /// Present for every resource that exists afterwards.
    pub arn: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub outcomes: Vec<ResourceOutcome>,
}

impl ApplyReport {
    pub fn changed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.action != PlannedAction::NoOp)
            .count()
    }

    pub fn outcome(&self, kind: ResourceKind, name: &str) -> Option<&ResourceOutcome> {
        self.outcomes
            .iter()
            .find(|outcome| outcome.kind == kind && outcome.name == name)
    }
}

impl BatchReconcilerService {
    /// Bring AWS Batch in line with the manifest.
    ///
    /// Stops at the first failing resource; outcomes of earlier resources
    /// are logged but not returned.
    pub async fn apply(&self, manifest: &Manifest) -> ReconcileResult<ApplyReport> {
        let plan = self.plan(manifest).await?;
        let mut report = ApplyReport::default();

        for spec in &manifest.compute_environments {
            let outcome = self
                .apply_one(&ComputeEnvironments, &plan, &spec.name, spec)
                .await?;
            report.outcomes.push(outcome);
        }
        for spec in &manifest.job_queues {
            let outcome = self.apply_one(&JobQueues, &plan, &spec.name, spec).await?;
            report.outcomes.push(outcome);
        }

        info!(
            "Apply finished: {} of {} resources changed",
            report.changed(),
            report.outcomes.len()
        );
        Ok(report)
    }

    async fn apply_one<R: BatchResource>(
        &self,
        handler: &R,
        plan: &Plan,
        name: &str,
        spec: &R::Spec,
    ) -> ReconcileResult<ResourceOutcome> {
        let action = plan
            .entry(R::KIND, name)
            .map_or(PlannedAction::Create, |entry| entry.action);

        let arn = match action {
            PlannedAction::Create => Some(self.create_resource(handler, spec).await?),
            PlannedAction::Replace => {
                warn!("Replacing {} '{}'", R::KIND, name);
                self.delete_resource(handler, name).await?;
                Some(self.create_resource(handler, spec).await?)
            }
            PlannedAction::Update => self
                .update_resource(handler, spec)
                .await?
                .map(|record| R::tracked(&record).arn),
            PlannedAction::NoOp | PlannedAction::Delete => {
                self.tracked(R::KIND, name).map(|resource| resource.arn)
            }
        };

        Ok(ResourceOutcome {
            kind: R::KIND,
            name: name.to_string(),
            action,
            arn,
        })
    }

    /// Delete every resource named in the manifest.
    pub async fn destroy(&self, manifest: &Manifest) -> ReconcileResult<ApplyReport> {
        let mut report = ApplyReport::default();

        for spec in &manifest.job_queues {
            report
                .outcomes
                .push(self.destroy_one(&JobQueues, &spec.name).await?);
        }
        for spec in &manifest.compute_environments {
            report
                .outcomes
                .push(self.destroy_one(&ComputeEnvironments, &spec.name).await?);
        }

        info!("Destroy finished: {} resources deleted", report.changed());
        Ok(report)
    }

    async fn destroy_one<R: BatchResource>(
        &self,
        handler: &R,
        name: &str,
    ) -> ReconcileResult<ResourceOutcome> {
        let action = if self.read_resource(handler, name).await?.is_some() {
            self.delete_resource(handler, name).await?;
            PlannedAction::Delete
        } else {
            PlannedAction::NoOp
        };

        Ok(ResourceOutcome {
            kind: R::KIND,
            name: name.to_string(),
            action,
            arn: None,
        })
    }
}
