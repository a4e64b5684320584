//! Builds Batch API requests from resource specifications (deterministic)

use super::requests::{
    ComputeEnvironmentOrderEntry, ComputeResourceRequest, ComputeResourceUpdateRequest,
    CreateComputeEnvironmentRequest, CreateJobQueueRequest, UpdateComputeEnvironmentRequest,
    UpdateJobQueueRequest,
};
use crate::types::{ComputeEnvironmentSpec, ComputeResourcesSpec, JobQueueSpec, ResourceState};

pub fn create_compute_environment_request(
    spec: &ComputeEnvironmentSpec,
) -> CreateComputeEnvironmentRequest {
    CreateComputeEnvironmentRequest {
        compute_environment_name: spec.name.clone(),
        kind: spec.kind,
        state: spec.state,
        service_role: spec.service_role_arn.clone(),
        compute_resources: spec.compute_resources.as_ref().map(compute_resource_request),
    }
}

fn compute_resource_request(resources: &ComputeResourcesSpec) -> ComputeResourceRequest {
    ComputeResourceRequest {
        kind: resources.kind,
        minv_cpus: resources.min_vcpus,
        maxv_cpus: resources.max_vcpus,
        desiredv_cpus: resources.desired_vcpus,
        instance_types: resources.instance_types.iter().cloned().collect(),
        instance_role: resources.instance_role_arn.clone(),
        security_group_ids: resources.security_group_ids.iter().cloned().collect(),
        subnets: resources.subnets.iter().cloned().collect(),
        ec2_key_pair: resources.ec2_key_pair.clone(),
        image_id: resources.image_id.clone(),
        bid_percentage: resources.bid_percentage,
        spot_iam_fleet_role: resources.spot_iam_fleet_role_arn.clone(),
        tags: resources.tags.clone(),
    }
}

/// Only the members the API accepts after creation: state, service role
/// and the vCPU bounds.
pub fn update_compute_environment_request(
    spec: &ComputeEnvironmentSpec,
) -> UpdateComputeEnvironmentRequest {
    UpdateComputeEnvironmentRequest {
        compute_environment: spec.name.clone(),
        state: spec.state,
        service_role: Some(spec.service_role_arn.clone()),
        compute_resources: spec
            .compute_resources
            .as_ref()
            .map(|resources| ComputeResourceUpdateRequest {
                minv_cpus: Some(resources.min_vcpus),
                maxv_cpus: Some(resources.max_vcpus),
                desiredv_cpus: resources.desired_vcpus,
            }),
    }
}

pub fn disable_compute_environment_request(name: &str) -> UpdateComputeEnvironmentRequest {
    UpdateComputeEnvironmentRequest {
        compute_environment: name.to_string(),
        state: Some(ResourceState::Disabled),
        service_role: None,
        compute_resources: None,
    }
}

pub fn create_job_queue_request(spec: &JobQueueSpec) -> CreateJobQueueRequest {
    CreateJobQueueRequest {
        job_queue_name: spec.name.clone(),
        state: spec.state,
        priority: spec.priority,
        compute_environment_order: compute_environment_order(&spec.compute_environments),
    }
}

pub fn update_job_queue_request(spec: &JobQueueSpec) -> UpdateJobQueueRequest {
    UpdateJobQueueRequest {
        job_queue: spec.name.clone(),
        state: Some(spec.state),
        priority: Some(spec.priority),
        compute_environment_order: Some(compute_environment_order(&spec.compute_environments)),
    }
}

pub fn disable_job_queue_request(name: &str) -> UpdateJobQueueRequest {
    UpdateJobQueueRequest {
        job_queue: name.to_string(),
        state: Some(ResourceState::Disabled),
        priority: None,
        compute_environment_order: None,
    }
}

/// List position becomes the order, starting at 1.
fn compute_environment_order(environments: &[String]) -> Vec<ComputeEnvironmentOrderEntry> {
    environments
        .iter()
        .zip(1..)
        .map(|(environment, order)| ComputeEnvironmentOrderEntry {
            order,
            compute_environment: environment.clone(),
        })
        .collect()
}
