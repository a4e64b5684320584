//! Drives the reconciler service end to end against the in-memory Batch API.

use batch_reconciler_core::config::RetrySettings;
use batch_reconciler_core::mapping::{
    disable_compute_environment_request, ComputeResourceUpdateRequest,
};
use batch_reconciler_core::test_utils::{
    compute_environment_arn, job_queue_arn, InMemoryBatchApi, ManualClock, RecordedCall, Step,
};
use batch_reconciler_core::types::{
    ComputeEnvironmentType, ComputeResourceType, ComputeResourcesSpec,
};
use batch_reconciler_core::{
    AwsError, BatchReconcilerService, ComputeEnvironmentSpec, JobQueueSpec, Manifest,
    PlannedAction, ReconcileError, ReconcilerConfig, ResourceKind, ResourceState, ResourceStatus,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

fn compute_environment(name: &str) -> ComputeEnvironmentSpec {
    ComputeEnvironmentSpec {
        name: name.to_string(),
        kind: ComputeEnvironmentType::Managed,
        state: Some(ResourceState::Enabled),
        service_role_arn: "arn:aws:iam::123456789012:role/AWSBatchServiceRole".to_string(),
        compute_resources: Some(ComputeResourcesSpec {
            kind: ComputeResourceType::Ec2,
            min_vcpus: 0,
            max_vcpus: 1,
            desired_vcpus: None,
            instance_types: BTreeSet::from(["m3.medium".to_string()]),
            instance_role_arn: "arn:aws:iam::123456789012:instance-profile/ecsInstanceRole"
                .to_string(),
            security_group_ids: BTreeSet::from(["sg-0123456789abcdef0".to_string()]),
            subnets: BTreeSet::from(["subnet-0123456789abcdef0".to_string()]),
            ec2_key_pair: None,
            image_id: None,
            bid_percentage: None,
            spot_iam_fleet_role_arn: None,
            tags: BTreeMap::new(),
        }),
    }
}

fn job_queue(name: &str, compute_environment: &str) -> JobQueueSpec {
    JobQueueSpec {
        name: name.to_string(),
        state: ResourceState::Enabled,
        priority: 1,
        compute_environments: vec![compute_environment.to_string()],
    }
}

struct Harness {
    api: Arc<InMemoryBatchApi>,
    clock: Arc<ManualClock>,
    service: BatchReconcilerService,
}

fn harness(config: ReconcilerConfig) -> Harness {
    let api = Arc::new(InMemoryBatchApi::new());
    let clock = Arc::new(ManualClock::new());
    let service = BatchReconcilerService::with_clock(api.clone(), clock.clone(), config);
    Harness {
        api,
        clock,
        service,
    }
}

#[test_log::test(tokio::test)]
async fn test_create_converges_after_two_retries() {
    let h = harness(ReconcilerConfig::immediate());
    h.api.script_compute_environment(
        "q1",
        [
            Step::Present("CREATING", ResourceState::Enabled),
            Step::Present("CREATING", ResourceState::Enabled),
            Step::Present("VALID", ResourceState::Enabled),
        ],
    );

    let arn = h
        .service
        .create_compute_environment(&compute_environment("q1"))
        .await
        .unwrap();

    assert_eq!(arn, compute_environment_arn("q1"));
    assert_eq!(h.api.describe_count(), 3);
    assert_eq!(h.clock.sleeps().len(), 2);
    let tracked = h
        .service
        .tracked(ResourceKind::ComputeEnvironment, "q1")
        .unwrap();
    assert_eq!(tracked.status, ResourceStatus::Valid);
}

#[test_log::test(tokio::test)]
async fn test_create_uses_configured_initial_delay() {
    let h = harness(ReconcilerConfig::default());
    h.api
        .script_compute_environment("ce", [Step::Present("VALID", ResourceState::Enabled)]);

    h.service
        .create_compute_environment(&compute_environment("ce"))
        .await
        .unwrap();

    assert_eq!(h.clock.sleeps(), vec![Duration::from_secs(3)]);
}

#[tokio::test]
async fn test_create_rejection_names_the_resource() {
    let h = harness(ReconcilerConfig::immediate());
    h.api
        .fail_create("q1", "ClientException: subnet-0123456789abcdef0 not found");

    let err = h
        .service
        .create_compute_environment(&compute_environment("q1"))
        .await
        .unwrap_err();

    assert!(matches!(err, ReconcileError::Creation { .. }));
    assert!(err.to_string().contains("'q1'"), "error was: {err}");
    assert_eq!(h.api.describe_count(), 0);
}

#[tokio::test]
async fn test_invalid_spec_makes_no_calls() {
    let h = harness(ReconcilerConfig::immediate());
    let mut spec = compute_environment("q1");
    spec.service_role_arn = "AWSBatchServiceRole".to_string();

    let err = h.service.create_compute_environment(&spec).await.unwrap_err();

    assert!(matches!(err, ReconcileError::InvalidSpec { .. }));
    assert!(h.api.calls().is_empty());
}

#[tokio::test]
async fn test_create_fails_fast_on_invalid_status() {
    let h = harness(ReconcilerConfig::immediate());
    h.api.script_compute_environment(
        "ce",
        [
            Step::Present("CREATING", ResourceState::Enabled),
            Step::Present("INVALID", ResourceState::Enabled),
        ],
    );

    let err = h
        .service
        .create_compute_environment(&compute_environment("ce"))
        .await
        .unwrap_err();

    match err {
        ReconcileError::UnexpectedStatus { status, reason, .. } => {
            assert_eq!(status, "INVALID");
            assert!(reason.unwrap_or_default().contains("subnet not found"));
        }
        other => panic!("expected UnexpectedStatus, got {other:?}"),
    }
    assert_eq!(h.api.describe_count(), 2);
}

#[tokio::test]
async fn test_create_times_out_no_earlier_than_configured() {
    let mut config = ReconcilerConfig::immediate();
    config.create.timeout_secs = 30;
    let h = harness(config);
    h.api
        .script_compute_environment("ce", [Step::Present("CREATING", ResourceState::Enabled)]);

    let err = h
        .service
        .create_compute_environment(&compute_environment("ce"))
        .await
        .unwrap_err();

    match err {
        ReconcileError::ConvergenceTimeout {
            last_status,
            timeout,
            ..
        } => {
            assert_eq!(last_status.as_deref(), Some("CREATING"));
            assert_eq!(timeout, Duration::from_secs(30));
        }
        other => panic!("expected ConvergenceTimeout, got {other:?}"),
    }
    assert!(h.clock.elapsed() >= Duration::from_secs(30));
}

#[tokio::test]
async fn test_read_of_duplicated_name_is_ambiguous() {
    let h = harness(ReconcilerConfig::immediate());
    h.api.script_job_queue("q", [Step::Duplicated("VALID")]);

    let err = h.service.read_job_queue("q").await.unwrap_err();

    assert!(matches!(
        err,
        ReconcileError::Ambiguous {
            kind: ResourceKind::JobQueue,
            count: 2,
            ..
        }
    ));
}

#[tokio::test]
async fn test_read_of_missing_resource_clears_tracking() {
    let h = harness(ReconcilerConfig::immediate());
    h.api.script_job_queue(
        "q",
        [
            Step::Present("VALID", ResourceState::Enabled),
            Step::Absent,
        ],
    );

    assert!(h.service.read_job_queue("q").await.unwrap().is_some());
    assert!(h.service.tracked(ResourceKind::JobQueue, "q").is_some());

    assert!(h.service.read_job_queue("q").await.unwrap().is_none());
    assert!(h.service.tracked_state().is_empty());
}

#[tokio::test]
async fn test_update_sends_only_mutable_fields() {
    let h = harness(ReconcilerConfig::immediate());
    h.api.script_compute_environment(
        "ce",
        [
            Step::Present("UPDATING", ResourceState::Enabled),
            Step::Present("VALID", ResourceState::Enabled),
        ],
    );
    let mut spec = compute_environment("ce");
    if let Some(resources) = spec.compute_resources.as_mut() {
        resources.max_vcpus = 8;
        resources.subnets = BTreeSet::from(["subnet-other".to_string()]);
    }

    let record = h.service.update_compute_environment(&spec).await.unwrap();

    assert_eq!(record.unwrap().status, ResourceStatus::Valid);
    let mutations = h.api.mutations();
    assert_eq!(mutations.len(), 1);
    match &mutations[0] {
        RecordedCall::UpdateComputeEnvironment(request) => {
            assert_eq!(
                request.compute_resources,
                Some(ComputeResourceUpdateRequest {
                    minv_cpus: Some(0),
                    maxv_cpus: Some(8),
                    desiredv_cpus: None,
                })
            );
            let json = serde_json::to_string(request).unwrap();
            assert!(!json.contains("subnet"), "request was: {json}");
        }
        other => panic!("expected an update, got {other:?}"),
    }
}

#[tokio::test]
async fn test_update_without_wait_reads_once() {
    let mut config = ReconcilerConfig::immediate();
    config.wait_on_update = false;
    let h = harness(config);
    h.api
        .script_job_queue("q", [Step::Present("UPDATING", ResourceState::Enabled)]);

    let record = h
        .service
        .update_job_queue(&job_queue("q", "ce"))
        .await
        .unwrap();

    assert_eq!(record.unwrap().status, ResourceStatus::Updating);
    assert_eq!(h.api.describe_count(), 1);
}

#[tokio::test]
async fn test_delete_of_absent_resource_is_a_noop() {
    let h = harness(ReconcilerConfig::immediate());

    h.service.delete_compute_environment("gone").await.unwrap();
    h.service.delete_job_queue("gone").await.unwrap();

    assert!(h.api.mutations().is_empty());
    assert_eq!(h.api.describe_count(), 2);
}

#[test_log::test(tokio::test)]
async fn test_delete_disables_then_deletes() {
    let h = harness(ReconcilerConfig::immediate());
    h.api.script_compute_environment(
        "ce",
        [
            Step::Present("VALID", ResourceState::Enabled),
            Step::Present("UPDATING", ResourceState::Disabled),
            Step::Present("VALID", ResourceState::Disabled),
            Step::Present("DELETING", ResourceState::Disabled),
            Step::Absent,
        ],
    );

    h.service.delete_compute_environment("ce").await.unwrap();

    assert_eq!(
        h.api.mutations(),
        vec![
            RecordedCall::UpdateComputeEnvironment(disable_compute_environment_request("ce")),
            RecordedCall::DeleteComputeEnvironment("ce".to_string()),
        ]
    );
    assert!(h
        .service
        .tracked(ResourceKind::ComputeEnvironment, "ce")
        .is_none());
}

#[tokio::test]
async fn test_delete_skips_disable_when_already_disabled() {
    let h = harness(ReconcilerConfig::immediate());
    h.api.script_job_queue(
        "q",
        [
            Step::Present("VALID", ResourceState::Disabled),
            Step::Absent,
        ],
    );

    h.service.delete_job_queue("q").await.unwrap();

    assert_eq!(
        h.api.mutations(),
        vec![RecordedCall::DeleteJobQueue("q".to_string())]
    );
}

#[tokio::test]
async fn test_delete_retries_transient_failures() {
    let h = harness(ReconcilerConfig::immediate());
    h.api.script_compute_environment(
        "ce",
        [
            Step::Present("VALID", ResourceState::Disabled),
            Step::Absent,
        ],
    );
    h.api.fail_delete("ce", 2);

    h.service.delete_compute_environment("ce").await.unwrap();

    let deletes = h
        .api
        .mutations()
        .into_iter()
        .filter(|call| matches!(call, RecordedCall::DeleteComputeEnvironment(_)))
        .count();
    assert_eq!(deletes, 3);
}

#[tokio::test]
async fn test_delete_gives_up_after_retry_ceiling() {
    let mut config = ReconcilerConfig::immediate();
    config.delete_retry = RetrySettings {
        timeout_secs: 5,
        min_interval_ms: 500,
    };
    let h = harness(config);
    h.api
        .script_compute_environment("ce", [Step::Present("VALID", ResourceState::Disabled)]);
    h.api.fail_delete("ce", u32::MAX);

    let err = h.service.delete_compute_environment("ce").await.unwrap_err();

    match err {
        ReconcileError::TransientDelete { attempts, name, .. } => {
            assert_eq!(name, "ce");
            assert!(attempts > 1);
        }
        other => panic!("expected TransientDelete, got {other:?}"),
    }
    assert!(h.clock.elapsed() >= Duration::from_secs(5));
    assert!(h.service.tracked(ResourceKind::ComputeEnvironment, "ce").is_some());
}

#[tokio::test]
async fn test_failed_disable_stops_the_delete() {
    let h = harness(ReconcilerConfig::immediate());
    h.api
        .script_compute_environment("ce", [Step::Present("VALID", ResourceState::Enabled)]);
    h.api.fail_update("ce", "ClientException: resource is busy");

    let err = h.service.delete_compute_environment("ce").await.unwrap_err();

    assert!(matches!(err, ReconcileError::Aws(AwsError::BatchError(_))));
    assert_eq!(
        h.api.mutations(),
        vec![RecordedCall::UpdateComputeEnvironment(
            disable_compute_environment_request("ce")
        )]
    );
}

#[test_log::test(tokio::test)]
async fn test_delete_waits_out_an_unfinished_create() {
    let h = harness(ReconcilerConfig::immediate());
    h.api.script_compute_environment(
        "ce",
        [
            Step::Present("CREATING", ResourceState::Enabled),
            Step::Present("CREATING", ResourceState::Enabled),
            Step::Present("VALID", ResourceState::Disabled),
            Step::Present("DELETING", ResourceState::Disabled),
            Step::Absent,
        ],
    );

    h.service.delete_compute_environment("ce").await.unwrap();

    assert_eq!(
        h.api.mutations(),
        vec![
            RecordedCall::UpdateComputeEnvironment(disable_compute_environment_request("ce")),
            RecordedCall::DeleteComputeEnvironment("ce".to_string()),
        ]
    );
    assert!(h.service.tracked_state().is_empty());
}

#[tokio::test]
async fn test_delete_of_creating_but_disabled_resource_waits_before_deleting() {
    let h = harness(ReconcilerConfig::immediate());
    let creating = Step::Present("CREATING", ResourceState::Disabled);
    h.api.script_compute_environment(
        "ce",
        [
            creating.clone(),
            creating,
            Step::Present("VALID", ResourceState::Disabled),
            Step::Absent,
        ],
    );

    h.service.delete_compute_environment("ce").await.unwrap();

    assert_eq!(
        h.api.mutations(),
        vec![RecordedCall::DeleteComputeEnvironment("ce".to_string())]
    );
    assert_eq!(h.api.describe_count(), 4);
}

#[tokio::test]
async fn test_delete_of_resource_already_deleting_only_waits() {
    let h = harness(ReconcilerConfig::immediate());
    h.api.script_job_queue(
        "q",
        [
            Step::Present("DELETING", ResourceState::Enabled),
            Step::Absent,
        ],
    );

    h.service.delete_job_queue("q").await.unwrap();

    assert!(h.api.mutations().is_empty());
    assert!(h.service.tracked(ResourceKind::JobQueue, "q").is_none());
}

#[tokio::test]
async fn test_delete_ends_when_resource_vanishes_while_disabling() {
    let h = harness(ReconcilerConfig::immediate());
    h.api.script_compute_environment(
        "ce",
        [
            Step::Present("VALID", ResourceState::Enabled),
            Step::Absent,
        ],
    );

    h.service.delete_compute_environment("ce").await.unwrap();

    assert_eq!(
        h.api.mutations(),
        vec![RecordedCall::UpdateComputeEnvironment(
            disable_compute_environment_request("ce")
        )]
    );
    assert!(h
        .service
        .tracked(ResourceKind::ComputeEnvironment, "ce")
        .is_none());
}

const MANIFEST: &str = r#"
[[compute_environment]]
name = "ce"
type = "MANAGED"
service_role_arn = "arn:aws:iam::123456789012:role/AWSBatchServiceRole"

[compute_environment.compute_resources]
type = "EC2"
min_vcpus = 0
max_vcpus = 1
instance_types = ["m3.medium"]
instance_role_arn = "arn:aws:iam::123456789012:instance-profile/ecsInstanceRole"
security_group_ids = ["sg-0123456789abcdef0"]
subnets = ["subnet-0123456789abcdef0"]

[[job_queue]]
name = "q"
state = "ENABLED"
priority = 1
compute_environments = ["ce"]
"#;

#[test_log::test(tokio::test)]
async fn test_apply_creates_environments_before_queues() {
    let manifest = Manifest::from_toml_str(MANIFEST).unwrap();
    let h = harness(ReconcilerConfig::immediate());
    h.api.script_compute_environment(
        "ce",
        [
            Step::Absent,
            Step::Present("CREATING", ResourceState::Enabled),
            Step::Present("VALID", ResourceState::Enabled),
        ],
    );
    h.api.script_job_queue(
        "q",
        [Step::Absent, Step::Present("VALID", ResourceState::Enabled)],
    );

    let report = h.service.apply(&manifest).await.unwrap();

    assert_eq!(report.changed(), 2);
    let queue = report.outcome(ResourceKind::JobQueue, "q").unwrap();
    assert_eq!(queue.action, PlannedAction::Create);
    assert_eq!(queue.arn.as_deref(), Some(job_queue_arn("q").as_str()));

    let creates: Vec<_> = h
        .api
        .mutations()
        .into_iter()
        .map(|call| match call {
            RecordedCall::CreateComputeEnvironment(_) => "ce",
            RecordedCall::CreateJobQueue(_) => "q",
            _ => "other",
        })
        .collect();
    assert_eq!(creates, vec!["ce", "q"]);
}

#[tokio::test]
async fn test_plan_classifies_existing_resources() {
    let manifest = Manifest::from_toml_str(MANIFEST).unwrap();
    let h = harness(ReconcilerConfig::immediate());
    // The in-memory record carries no network settings, so the environment
    // differs in attributes that cannot change in place.
    h.api
        .script_compute_environment("ce", [Step::Present("VALID", ResourceState::Enabled)]);
    h.api
        .script_job_queue("q", [Step::Present("VALID", ResourceState::Enabled)]);

    let plan = h.service.plan(&manifest).await.unwrap();

    let ce = plan
        .entry(ResourceKind::ComputeEnvironment, "ce")
        .unwrap();
    assert_eq!(ce.action, PlannedAction::Replace);
    assert!(ce.changes.iter().any(|c| c.field == "compute_resources.subnets"));
    let queue = plan.entry(ResourceKind::JobQueue, "q").unwrap();
    assert_eq!(queue.action, PlannedAction::NoOp);
    assert!(h.api.mutations().is_empty());
}

#[tokio::test]
async fn test_destroy_deletes_queues_before_environments() {
    let manifest = Manifest::from_toml_str(MANIFEST).unwrap();
    let h = harness(ReconcilerConfig::immediate());
    let disabled = Step::Present("VALID", ResourceState::Disabled);
    h.api.script_compute_environment(
        "ce",
        [disabled.clone(), disabled.clone(), Step::Absent],
    );
    h.api
        .script_job_queue("q", [disabled.clone(), disabled, Step::Absent]);

    let report = h.service.destroy(&manifest).await.unwrap();

    assert_eq!(report.changed(), 2);
    assert_eq!(
        h.api.mutations(),
        vec![
            RecordedCall::DeleteJobQueue("q".to_string()),
            RecordedCall::DeleteComputeEnvironment("ce".to_string()),
        ]
    );
}

#[test_log::test(tokio::test)]
async fn test_apply_replace_deletes_before_recreating() {
    let manifest = Manifest::from_toml_str(MANIFEST).unwrap();
    let h = harness(ReconcilerConfig::immediate());
    let enabled = Step::Present("VALID", ResourceState::Enabled);
    // Plan read, delete read, disable wait, delete wait, then the create wait.
    h.api.script_compute_environment(
        "ce",
        [
            enabled.clone(),
            enabled.clone(),
            Step::Present("VALID", ResourceState::Disabled),
            Step::Absent,
            Step::Present("CREATING", ResourceState::Enabled),
            enabled.clone(),
        ],
    );
    h.api.script_job_queue("q", [enabled]);

    let report = h.service.apply(&manifest).await.unwrap();

    let ce = report
        .outcome(ResourceKind::ComputeEnvironment, "ce")
        .unwrap();
    assert_eq!(ce.action, PlannedAction::Replace);
    assert_eq!(ce.arn.as_deref(), Some(compute_environment_arn("ce").as_str()));
    assert_eq!(
        report.outcome(ResourceKind::JobQueue, "q").unwrap().action,
        PlannedAction::NoOp
    );

    let sequence: Vec<_> = h
        .api
        .mutations()
        .into_iter()
        .map(|call| match call {
            RecordedCall::UpdateComputeEnvironment(request) => {
                assert_eq!(request, disable_compute_environment_request("ce"));
                "disable"
            }
            RecordedCall::DeleteComputeEnvironment(_) => "delete",
            RecordedCall::CreateComputeEnvironment(_) => "create",
            _ => "other",
        })
        .collect();
    assert_eq!(sequence, vec!["disable", "delete", "create"]);
    assert_eq!(
        h.service
            .tracked(ResourceKind::ComputeEnvironment, "ce")
            .unwrap()
            .status,
        ResourceStatus::Valid
    );
}
