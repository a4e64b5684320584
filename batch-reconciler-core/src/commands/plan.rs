//! Plan creation: compare the manifest against what AWS Batch reports

use super::resource::{ComputeEnvironments, JobQueues};
use crate::error::ReconcileResult;
use crate::manifest::Manifest;
use crate::types::{
    ComputeEnvironmentRecord, ComputeEnvironmentSpec, JobQueueRecord, JobQueueSpec, ResourceKind,
};
use serde::Serialize;
use std::fmt::{self, Debug};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlannedAction {
    NoOp,
    Create,
    Update,
    /// An attribute fixed at creation differs: delete, then create.
    Replace,
    Delete,
}

impl fmt::Display for PlannedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            PlannedAction::NoOp => "no-op",
            PlannedAction::Create => "create",
            PlannedAction::Update => "update",
            PlannedAction::Replace => "replace",
            PlannedAction::Delete => "delete",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldChange {
    pub field: String,
    pub current: String,
    pub desired: String,
    /// The API cannot change this attribute in place.
    pub forces_replacement: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanEntry {
    pub kind: ResourceKind,
    pub name: String,
    pub action: PlannedAction,
    pub changes: Vec<FieldChange>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub entries: Vec<PlanEntry>,
}

impl Plan {
    pub fn has_changes(&self) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.action != PlannedAction::NoOp)
    }

    pub fn entry(&self, kind: ResourceKind, name: &str) -> Option<&PlanEntry> {
        self.entries
            .iter()
            .find(|entry| entry.kind == kind && entry.name == name)
    }
}

/// Collects field differences between a spec and a record.
#[derive(Default)]
struct Differ {
    changes: Vec<FieldChange>,
}

impl Differ {
    fn compare<T: PartialEq + Debug>(
        &mut self,
        field: &str,
        current: &T,
        desired: &T,
        forces_replacement: bool,
    ) {
        if current != desired {
            self.changes.push(FieldChange {
                field: field.to_string(),
                current: format!("{current:?}"),
                desired: format!("{desired:?}"),
                forces_replacement,
            });
        }
    }

    fn into_action(self) -> (PlannedAction, Vec<FieldChange>) {
        let action = if self.changes.is_empty() {
            PlannedAction::NoOp
        } else if self.changes.iter().any(|c| c.forces_replacement) {
            PlannedAction::Replace
        } else {
            PlannedAction::Update
        };
        (action, self.changes)
    }
}

/// Compare a compute environment spec with its remote record.
///
/// Optional spec attributes left unset are not compared, the API picks
/// its own value for them.
pub fn diff_compute_environment(
    spec: &ComputeEnvironmentSpec,
    record: &ComputeEnvironmentRecord,
) -> (PlannedAction, Vec<FieldChange>) {
    let mut differ = Differ::default();
    differ.compare("type", &record.kind, &Some(spec.kind), true);
    if spec.state.is_some() {
        differ.compare("state", &record.state, &spec.state, false);
    }
    differ.compare(
        "service_role_arn",
        &record.service_role,
        &Some(spec.service_role_arn.clone()),
        false,
    );

    match (&spec.compute_resources, &record.compute_resources) {
        (Some(desired), Some(current)) => {
            differ.compare("compute_resources.type", &current.kind, &Some(desired.kind), true);
            differ.compare(
                "compute_resources.min_vcpus",
                &current.min_vcpus,
                &Some(desired.min_vcpus),
                false,
            );
            differ.compare(
                "compute_resources.max_vcpus",
                &current.max_vcpus,
                &Some(desired.max_vcpus),
                false,
            );
            if desired.desired_vcpus.is_some() {
                differ.compare(
                    "compute_resources.desired_vcpus",
                    &current.desired_vcpus,
                    &desired.desired_vcpus,
                    false,
                );
            }
            differ.compare(
                "compute_resources.instance_types",
                &current.instance_types,
                &desired.instance_types,
                true,
            );
            differ.compare(
                "compute_resources.instance_role_arn",
                &current.instance_role,
                &Some(desired.instance_role_arn.clone()),
                true,
            );
            differ.compare(
                "compute_resources.security_group_ids",
                &current.security_group_ids,
                &desired.security_group_ids,
                true,
            );
            differ.compare(
                "compute_resources.subnets",
                &current.subnets,
                &desired.subnets,
                true,
            );
            for (field, current_value, desired_value) in [
                ("ec2_key_pair", &current.ec2_key_pair, &desired.ec2_key_pair),
                ("image_id", &current.image_id, &desired.image_id),
                (
                    "spot_iam_fleet_role_arn",
                    &current.spot_iam_fleet_role,
                    &desired.spot_iam_fleet_role_arn,
                ),
            ] {
                if desired_value.is_some() {
                    differ.compare(
                        &format!("compute_resources.{field}"),
                        current_value,
                        desired_value,
                        true,
                    );
                }
            }
            if desired.bid_percentage.is_some() {
                differ.compare(
                    "compute_resources.bid_percentage",
                    &current.bid_percentage,
                    &desired.bid_percentage,
                    true,
                );
            }
            differ.compare("compute_resources.tags", &current.tags, &desired.tags, true);
        }
        (desired, current) => {
            differ.compare(
                "compute_resources",
                &current.is_some(),
                &desired.is_some(),
                true,
            );
        }
    }

    differ.into_action()
}

/// A listed compute environment matches a remote ARN either verbatim or by
/// the name at the end of the ARN.
fn same_compute_environment(listed: &str, arn: &str) -> bool {
    listed == arn
        || arn
            .rsplit_once('/')
            .is_some_and(|(_, name)| name == listed)
}

pub fn diff_job_queue(
    spec: &JobQueueSpec,
    record: &JobQueueRecord,
) -> (PlannedAction, Vec<FieldChange>) {
    let mut differ = Differ::default();
    differ.compare("state", &record.state, &Some(spec.state), false);
    differ.compare("priority", &record.priority, &Some(spec.priority), false);

    let order_matches = spec.compute_environments.len() == record.compute_environments.len()
        && spec
            .compute_environments
            .iter()
            .zip(&record.compute_environments)
            .all(|(listed, arn)| same_compute_environment(listed, arn));
    if !order_matches {
        differ.compare(
            "compute_environments",
            &record.compute_environments,
            &spec.compute_environments,
            false,
        );
    }

    differ.into_action()
}

fn entry(
    kind: ResourceKind,
    name: &str,
    diff: Option<(PlannedAction, Vec<FieldChange>)>,
) -> PlanEntry {
    let (action, changes) = diff.unwrap_or((PlannedAction::Create, Vec::new()));
    PlanEntry {
        kind,
        name: name.to_string(),
        action,
        changes,
    }
}

impl super::service::BatchReconcilerService {
    /// Read every resource in the manifest and decide what apply would do.
    pub async fn plan(&self, manifest: &Manifest) -> ReconcileResult<Plan> {
        manifest.validate()?;
        let mut plan = Plan::default();

        for spec in &manifest.compute_environments {
            let current = self.read_resource(&ComputeEnvironments, &spec.name).await?;
            let diff = current
                .as_ref()
                .map(|record| diff_compute_environment(spec, record));
            plan.entries
                .push(entry(ResourceKind::ComputeEnvironment, &spec.name, diff));
        }

        for spec in &manifest.job_queues {
            let current = self.read_resource(&JobQueues, &spec.name).await?;
            let diff = current.as_ref().map(|record| diff_job_queue(spec, record));
            plan.entries
                .push(entry(ResourceKind::JobQueue, &spec.name, diff));
        }

        Ok(plan)
    }
}
