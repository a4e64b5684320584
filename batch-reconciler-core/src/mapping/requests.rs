//! Request payloads sent to the Batch API, shaped after its JSON members.

use crate::types::{ComputeEnvironmentType, ComputeResourceType, ResourceState};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateComputeEnvironmentRequest {
    pub compute_environment_name: String,
    #[serde(rename = "type")]
    pub kind: ComputeEnvironmentType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<ResourceState>,
    pub service_role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compute_resources: Option<ComputeResourceRequest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeResourceRequest {
    #[serde(rename = "type")]
    pub kind: ComputeResourceType,
    #[serde(rename = "minvCpus")]
    pub minv_cpus: i32,
    #[serde(rename = "maxvCpus")]
    pub maxv_cpus: i32,
    #[serde(rename = "desiredvCpus", skip_serializing_if = "Option::is_none")]
    pub desiredv_cpus: Option<i32>,
    pub instance_types: Vec<String>,
    pub instance_role: String,
    pub security_group_ids: Vec<String>,
    pub subnets: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ec2_key_pair: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bid_percentage: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spot_iam_fleet_role: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

/// In-place update of a compute environment.
///
/// Carries no member for attributes fixed at creation (network, instance
/// role, instance types, image, key pair, tags), so they cannot be re-sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateComputeEnvironmentRequest {
    pub compute_environment: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<ResourceState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compute_resources: Option<ComputeResourceUpdateRequest>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComputeResourceUpdateRequest {
    #[serde(rename = "minvCpus", skip_serializing_if = "Option::is_none")]
    pub minv_cpus: Option<i32>,
    #[serde(rename = "maxvCpus", skip_serializing_if = "Option::is_none")]
    pub maxv_cpus: Option<i32>,
    #[serde(rename = "desiredvCpus", skip_serializing_if = "Option::is_none")]
    pub desiredv_cpus: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobQueueRequest {
    pub job_queue_name: String,
    pub state: ResourceState,
    pub priority: i32,
    pub compute_environment_order: Vec<ComputeEnvironmentOrderEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeEnvironmentOrderEntry {
    pub order: i32,
    pub compute_environment: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateJobQueueRequest {
    pub job_queue: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<ResourceState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compute_environment_order: Option<Vec<ComputeEnvironmentOrderEntry>>,
}
