//! Per-kind glue between the generic reconciler and the Batch API.

use crate::aws::{AwsResult, BatchApi};
use crate::error::ReconcileResult;
use crate::mapping::{
    create_compute_environment_request, create_job_queue_request,
    disable_compute_environment_request, disable_job_queue_request,
    update_compute_environment_request, update_job_queue_request,
};
use crate::types::{
    ComputeEnvironmentRecord, ComputeEnvironmentSpec, JobQueueRecord, JobQueueSpec,
    ResourceKind, ResourceState, ResourceStatus, TrackedResource,
};
use crate::validation::{validate_compute_environment, validate_job_queue};
use async_trait::async_trait;

/// A Batch resource kind the reconciler can drive through its lifecycle.
#[async_trait]
pub trait BatchResource: Send + Sync {
    type Spec: Send + Sync;
    type Record: Clone + Send + Sync;

    const KIND: ResourceKind;

    fn spec_name(spec: &Self::Spec) -> &str;
    fn validate(spec: &Self::Spec) -> ReconcileResult<()>;

    fn status(record: &Self::Record) -> &ResourceStatus;
    fn state(record: &Self::Record) -> Option<ResourceState>;
    fn status_reason(record: &Self::Record) -> Option<&str>;
    fn tracked(record: &Self::Record) -> TrackedResource;

    async fn create(&self, api: &dyn BatchApi, spec: &Self::Spec) -> AwsResult<String>;
    async fn describe(&self, api: &dyn BatchApi, name: &str) -> AwsResult<Vec<Self::Record>>;
    async fn update(&self, api: &dyn BatchApi, spec: &Self::Spec) -> AwsResult<()>;
    async fn disable(&self, api: &dyn BatchApi, name: &str) -> AwsResult<()>;
    async fn delete(&self, api: &dyn BatchApi, name: &str) -> AwsResult<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ComputeEnvironments;

#[async_trait]
impl BatchResource for ComputeEnvironments {
    type Spec = ComputeEnvironmentSpec;
    type Record = ComputeEnvironmentRecord;

    const KIND: ResourceKind = ResourceKind::ComputeEnvironment;

    fn spec_name(spec: &Self::Spec) -> &str {
        &spec.name
    }

    fn validate(spec: &Self::Spec) -> ReconcileResult<()> {
        validate_compute_environment(spec)
    }

    fn status(record: &Self::Record) -> &ResourceStatus {
        &record.status
    }

    fn state(record: &Self::Record) -> Option<ResourceState> {
        record.state
    }

    fn status_reason(record: &Self::Record) -> Option<&str> {
        record.status_reason.as_deref()
    }

    fn tracked(record: &Self::Record) -> TrackedResource {
        TrackedResource::from(record)
    }

    async fn create(&self, api: &dyn BatchApi, spec: &Self::Spec) -> AwsResult<String> {
        api.create_compute_environment(&create_compute_environment_request(spec))
            .await
    }

    async fn describe(&self, api: &dyn BatchApi, name: &str) -> AwsResult<Vec<Self::Record>> {
        api.describe_compute_environments(name).await
    }

    async fn update(&self, api: &dyn BatchApi, spec: &Self::Spec) -> AwsResult<()> {
        api.update_compute_environment(&update_compute_environment_request(spec))
            .await
    }

    async fn disable(&self, api: &dyn BatchApi, name: &str) -> AwsResult<()> {
        api.update_compute_environment(&disable_compute_environment_request(name))
            .await
    }

    async fn delete(&self, api: &dyn BatchApi, name: &str) -> AwsResult<()> {
        api.delete_compute_environment(name).await
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JobQueues;

#[async_trait]
impl BatchResource for JobQueues {
    type Spec = JobQueueSpec;
    type Record = JobQueueRecord;

    const KIND: ResourceKind = ResourceKind::JobQueue;

    fn spec_name(spec: &Self::Spec) -> &str {
        &spec.name
    }

    fn validate(spec: &Self::Spec) -> ReconcileResult<()> {
        validate_job_queue(spec)
    }

    fn status(record: &Self::Record) -> &ResourceStatus {
        &record.status
    }

    fn state(record: &Self::Record) -> Option<ResourceState> {
        record.state
    }

    fn status_reason(record: &Self::Record) -> Option<&str> {
        record.status_reason.as_deref()
    }

    fn tracked(record: &Self::Record) -> TrackedResource {
        TrackedResource::from(record)
    }

    async fn create(&self, api: &dyn BatchApi, spec: &Self::Spec) -> AwsResult<String> {
        api.create_job_queue(&create_job_queue_request(spec)).await
    }

    async fn describe(&self, api: &dyn BatchApi, name: &str) -> AwsResult<Vec<Self::Record>> {
        api.describe_job_queues(name).await
    }

    async fn update(&self, api: &dyn BatchApi, spec: &Self::Spec) -> AwsResult<()> {
        api.update_job_queue(&update_job_queue_request(spec)).await
    }

    async fn disable(&self, api: &dyn BatchApi, name: &str) -> AwsResult<()> {
        api.update_job_queue(&disable_job_queue_request(name)).await
    }

    async fn delete(&self, api: &dyn BatchApi, name: &str) -> AwsResult<()> {
        api.delete_job_queue(name).await
    }
}
