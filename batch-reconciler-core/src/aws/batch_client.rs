//! AWS Batch client wrapper over `aws-sdk-batch`

use crate::aws::{AwsError, AwsResult, BatchApi};
use crate::mapping::{
    ComputeEnvironmentOrderEntry, ComputeResourceRequest, CreateComputeEnvironmentRequest,
    CreateJobQueueRequest, UpdateComputeEnvironmentRequest, UpdateJobQueueRequest,
};
use crate::types::{
    ComputeEnvironmentRecord, ComputeResourcesRecord, JobQueueRecord, ResourceStatus,
};
use async_trait::async_trait;
use aws_sdk_batch::error::{DisplayErrorContext, SdkError};
use aws_sdk_batch::types::{
    CeState, CeType, ComputeEnvironmentDetail, ComputeEnvironmentOrder, ComputeResource,
    ComputeResourceUpdate, CrType, JqState, JobQueueDetail,
};
use aws_sdk_batch::Client as BatchClient;
use log::debug;
use std::error::Error;
use std::fmt::Debug;

pub struct AwsBatchClient {
    client: BatchClient,
}

impl AwsBatchClient {
    pub fn new(client: BatchClient) -> Self {
        Self { client }
    }

    /// Load SDK configuration through the standard credential provider chain.
    pub async fn from_env(region: Option<&str>, profile: Option<&str>) -> AwsResult<Self> {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_config::Region::new(region.to_string()));
        }
        if let Some(profile) = profile {
            loader = loader.profile_name(profile);
        }
        let config = loader.load().await;

        match config.region() {
            Some(region) => debug!("Using AWS region {region}"),
            None => {
                return Err(AwsError::ConfigError(
                    "No AWS region configured; pass --region or set AWS_REGION".to_string(),
                ))
            }
        }
        Ok(Self::new(BatchClient::new(&config)))
    }
}

/// Requests the SDK refused to build never reach the service and will fail
/// the same way on every attempt.
fn sdk_error<E, R>(action: &str, error: SdkError<E, R>) -> AwsError
where
    E: Error + Send + Sync + 'static,
    R: Debug + Send + Sync + 'static,
{
    let message = format!("Failed to {action}: {}", DisplayErrorContext(&error));
    match error {
        SdkError::ConstructionFailure(_) => AwsError::ConfigError(message),
        SdkError::ServiceError(_) => AwsError::BatchError(message),
        _ => AwsError::SdkError(message),
    }
}

fn compute_resource(request: &ComputeResourceRequest) -> ComputeResource {
    let tags = (!request.tags.is_empty()).then(|| {
        request
            .tags
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    });

    ComputeResource::builder()
        .r#type(CrType::from(request.kind.as_str()))
        .minv_cpus(request.minv_cpus)
        .maxv_cpus(request.maxv_cpus)
        .set_desiredv_cpus(request.desiredv_cpus)
        .set_instance_types(Some(request.instance_types.clone()))
        .instance_role(&request.instance_role)
        .set_security_group_ids(Some(request.security_group_ids.clone()))
        .set_subnets(Some(request.subnets.clone()))
        .set_ec2_key_pair(request.ec2_key_pair.clone())
        .set_image_id(request.image_id.clone())
        .set_bid_percentage(request.bid_percentage)
        .set_spot_iam_fleet_role(request.spot_iam_fleet_role.clone())
        .set_tags(tags)
        .build()
}

fn compute_environment_order(
    entries: &[ComputeEnvironmentOrderEntry],
) -> Vec<ComputeEnvironmentOrder> {
    entries
        .iter()
        .map(|entry| {
            ComputeEnvironmentOrder::builder()
                .order(entry.order)
                .compute_environment(&entry.compute_environment)
                .build()
        })
        .collect()
}

fn compute_environment_record(detail: &ComputeEnvironmentDetail) -> ComputeEnvironmentRecord {
    ComputeEnvironmentRecord {
        name: detail
            .compute_environment_name()
            .unwrap_or_default()
            .to_string(),
        arn: detail.compute_environment_arn().unwrap_or_default().to_string(),
        kind: detail.r#type().and_then(|t| t.as_str().parse().ok()),
        state: detail.state().and_then(|s| s.as_str().parse().ok()),
        status: detail
            .status()
            .map_or(ResourceStatus::Other(String::new()), |s| {
                ResourceStatus::from(s.as_str())
            }),
        status_reason: detail.status_reason().map(str::to_string),
        service_role: detail.service_role().map(str::to_string),
        compute_resources: detail.compute_resources().map(compute_resources_record),
    }
}

fn compute_resources_record(resources: &ComputeResource) -> ComputeResourcesRecord {
    ComputeResourcesRecord {
        kind: resources.r#type().and_then(|t| t.as_str().parse().ok()),
        min_vcpus: resources.minv_cpus(),
        max_vcpus: resources.maxv_cpus(),
        desired_vcpus: resources.desiredv_cpus(),
        instance_types: resources.instance_types().iter().cloned().collect(),
        instance_role: resources.instance_role().map(str::to_string),
        security_group_ids: resources.security_group_ids().iter().cloned().collect(),
        subnets: resources.subnets().iter().cloned().collect(),
        ec2_key_pair: resources.ec2_key_pair().map(str::to_string),
        image_id: resources.image_id().map(str::to_string),
        bid_percentage: resources.bid_percentage(),
        spot_iam_fleet_role: resources.spot_iam_fleet_role().map(str::to_string),
        tags: resources
            .tags()
            .map(|tags| tags.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default(),
    }
}

fn job_queue_record(detail: &JobQueueDetail) -> JobQueueRecord {
    let mut order: Vec<_> = detail
        .compute_environment_order()
        .iter()
        .map(|entry| {
            (
                entry.order().unwrap_or_default(),
                entry.compute_environment().unwrap_or_default().to_string(),
            )
        })
        .collect();
    order.sort_by_key(|(position, _)| *position);

    JobQueueRecord {
        name: detail.job_queue_name().unwrap_or_default().to_string(),
        arn: detail.job_queue_arn().unwrap_or_default().to_string(),
        state: detail.state().and_then(|s| s.as_str().parse().ok()),
        status: detail
            .status()
            .map_or(ResourceStatus::Other(String::new()), |s| {
                ResourceStatus::from(s.as_str())
            }),
        status_reason: detail.status_reason().map(str::to_string),
        priority: detail.priority(),
        compute_environments: order.into_iter().map(|(_, ce)| ce).collect(),
    }
}

#[async_trait]
impl BatchApi for AwsBatchClient {
    async fn create_compute_environment(
        &self,
        request: &CreateComputeEnvironmentRequest,
    ) -> AwsResult<String> {
        let compute_resources = request
            .compute_resources
            .as_ref()
            .map(compute_resource);

        let response = self
            .client
            .create_compute_environment()
            .compute_environment_name(&request.compute_environment_name)
            .r#type(CeType::from(request.kind.as_str()))
            .set_state(request.state.map(|s| CeState::from(s.as_str())))
            .service_role(&request.service_role)
            .set_compute_resources(compute_resources)
            .send()
            .await
            .map_err(|e| sdk_error("create compute environment", e))?;

        response
            .compute_environment_arn()
            .map(str::to_string)
            .ok_or_else(|| {
                AwsError::BatchError(format!(
                    "CreateComputeEnvironment returned no ARN for '{}'",
                    request.compute_environment_name
                ))
            })
    }

    async fn describe_compute_environments(
        &self,
        name: &str,
    ) -> AwsResult<Vec<ComputeEnvironmentRecord>> {
        let response = self
            .client
            .describe_compute_environments()
            .compute_environments(name)
            .send()
            .await
            .map_err(|e| sdk_error("describe compute environments", e))?;
        Ok(response
            .compute_environments()
            .iter()
            .map(compute_environment_record)
            .collect())
    }

    async fn update_compute_environment(
        &self,
        request: &UpdateComputeEnvironmentRequest,
    ) -> AwsResult<()> {
        let compute_resources = request.compute_resources.as_ref().map(|update| {
            ComputeResourceUpdate::builder()
                .set_minv_cpus(update.minv_cpus)
                .set_maxv_cpus(update.maxv_cpus)
                .set_desiredv_cpus(update.desiredv_cpus)
                .build()
        });

        self.client
            .update_compute_environment()
            .compute_environment(&request.compute_environment)
            .set_state(request.state.map(|s| CeState::from(s.as_str())))
            .set_service_role(request.service_role.clone())
            .set_compute_resources(compute_resources)
            .send()
            .await
            .map_err(|e| sdk_error("update compute environment", e))?;
        Ok(())
    }

    async fn delete_compute_environment(&self, name: &str) -> AwsResult<()> {
        self.client
            .delete_compute_environment()
            .compute_environment(name)
            .send()
            .await
            .map_err(|e| sdk_error("delete compute environment", e))?;
        Ok(())
    }

    async fn create_job_queue(&self, request: &CreateJobQueueRequest) -> AwsResult<String> {
        let order = compute_environment_order(&request.compute_environment_order);
        let response = self
            .client
            .create_job_queue()
            .job_queue_name(&request.job_queue_name)
            .state(JqState::from(request.state.as_str()))
            .priority(request.priority)
            .set_compute_environment_order(Some(order))
            .send()
            .await
            .map_err(|e| sdk_error("create job queue", e))?;

        response
            .job_queue_arn()
            .map(str::to_string)
            .ok_or_else(|| {
                AwsError::BatchError(format!(
                    "CreateJobQueue returned no ARN for '{}'",
                    request.job_queue_name
                ))
            })
    }

    async fn describe_job_queues(&self, name: &str) -> AwsResult<Vec<JobQueueRecord>> {
        let response = self
            .client
            .describe_job_queues()
            .job_queues(name)
            .send()
            .await
            .map_err(|e| sdk_error("describe job queues", e))?;
        Ok(response.job_queues().iter().map(job_queue_record).collect())
    }

    async fn update_job_queue(&self, request: &UpdateJobQueueRequest) -> AwsResult<()> {
        let order = request
            .compute_environment_order
            .as_deref()
            .map(compute_environment_order);

        self.client
            .update_job_queue()
            .job_queue(&request.job_queue)
            .set_state(request.state.map(|s| JqState::from(s.as_str())))
            .set_priority(request.priority)
            .set_compute_environment_order(order)
            .send()
            .await
            .map_err(|e| sdk_error("update job queue", e))?;
        Ok(())
    }

    async fn delete_job_queue(&self, name: &str) -> AwsResult<()> {
        self.client
            .delete_job_queue()
            .job_queue(name)
            .send()
            .await
            .map_err(|e| sdk_error("delete job queue", e))?;
        Ok(())
    }
}
