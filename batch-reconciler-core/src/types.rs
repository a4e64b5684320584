//! Resource specifications, remote records and the locally tracked mirror.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// The two AWS Batch resource kinds handled by the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    ComputeEnvironment,
    JobQueue,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::ComputeEnvironment => "compute environment",
            ResourceKind::JobQueue => "job queue",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declares a closed set of upper-case API literals.
///
/// Parsing is case-insensitive, the canonical form is what the API expects,
/// and serde goes through the same `FromStr` so a manifest with a bad value
/// fails at load time with the list of accepted values.
macro_rules! allow_list_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $literal:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALLOWED: &'static [&'static str] = &[$($literal),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $literal),+
                }
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $(
                    if s.eq_ignore_ascii_case($literal) {
                        return Ok($name::$variant);
                    }
                )+
                Err(format!(
                    "expected one of {}, got '{}'",
                    Self::ALLOWED.join(", "),
                    s
                ))
            }
        }

        impl TryFrom<String> for $name {
            type Error = String;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.as_str().to_string()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

allow_list_enum!(
    /// Whether AWS Batch manages the capacity of a compute environment.
    ComputeEnvironmentType {
        Managed => "MANAGED",
        Unmanaged => "UNMANAGED",
    }
);

allow_list_enum!(
    /// Purchasing model of a managed compute environment.
    ComputeResourceType {
        Ec2 => "EC2",
        Spot => "SPOT",
    }
);

allow_list_enum!(
    /// Enablement state shared by compute environments and job queues.
    ResourceState {
        Enabled => "ENABLED",
        Disabled => "DISABLED",
    }
);

/// Lifecycle status reported by the Batch API.
///
/// Values the API may add later are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResourceStatus {
    Creating,
    Updating,
    Deleting,
    Deleted,
    Valid,
    Invalid,
    Other(String),
}

impl ResourceStatus {
    pub const CREATING: &'static str = "CREATING";
    pub const UPDATING: &'static str = "UPDATING";
    pub const DELETING: &'static str = "DELETING";
    pub const DELETED: &'static str = "DELETED";
    pub const VALID: &'static str = "VALID";
    pub const INVALID: &'static str = "INVALID";

    pub fn as_str(&self) -> &str {
        match self {
            ResourceStatus::Creating => Self::CREATING,
            ResourceStatus::Updating => Self::UPDATING,
            ResourceStatus::Deleting => Self::DELETING,
            ResourceStatus::Deleted => Self::DELETED,
            ResourceStatus::Valid => Self::VALID,
            ResourceStatus::Invalid => Self::INVALID,
            ResourceStatus::Other(s) => s,
        }
    }
}

impl From<&str> for ResourceStatus {
    fn from(value: &str) -> Self {
        match value {
            Self::CREATING => ResourceStatus::Creating,
            Self::UPDATING => ResourceStatus::Updating,
            Self::DELETING => ResourceStatus::Deleting,
            Self::DELETED => ResourceStatus::Deleted,
            Self::VALID => ResourceStatus::Valid,
            Self::INVALID => ResourceStatus::Invalid,
            other => ResourceStatus::Other(other.to_string()),
        }
    }
}

impl From<String> for ResourceStatus {
    fn from(value: String) -> Self {
        ResourceStatus::from(value.as_str())
    }
}

impl From<ResourceStatus> for String {
    fn from(value: ResourceStatus) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Desired state of a compute environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComputeEnvironmentSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ComputeEnvironmentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<ResourceState>,
    pub service_role_arn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute_resources: Option<ComputeResourcesSpec>,
}

/// Capacity description of a managed compute environment.
///
/// Only the vCPU bounds can change after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComputeResourcesSpec {
    #[serde(rename = "type")]
    pub kind: ComputeResourceType,
    pub min_vcpus: i32,
    pub max_vcpus: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired_vcpus: Option<i32>,
    pub instance_types: BTreeSet<String>,
    pub instance_role_arn: String,
    pub security_group_ids: BTreeSet<String>,
    pub subnets: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ec2_key_pair: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bid_percentage: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spot_iam_fleet_role_arn: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

/// Desired state of a job queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobQueueSpec {
    pub name: String,
    pub state: ResourceState,
    pub priority: i32,
    /// Compute environment names or ARNs, in dispatch order.
    pub compute_environments: Vec<String>,
}

/// A compute environment as described by the Batch API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeEnvironmentRecord {
    pub name: String,
    pub arn: String,
    pub kind: Option<ComputeEnvironmentType>,
    pub state: Option<ResourceState>,
    pub status: ResourceStatus,
    pub status_reason: Option<String>,
    pub service_role: Option<String>,
    pub compute_resources: Option<ComputeResourcesRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeResourcesRecord {
    pub kind: Option<ComputeResourceType>,
    pub min_vcpus: Option<i32>,
    pub max_vcpus: Option<i32>,
    pub desired_vcpus: Option<i32>,
    pub instance_types: BTreeSet<String>,
    pub instance_role: Option<String>,
    pub security_group_ids: BTreeSet<String>,
    pub subnets: BTreeSet<String>,
    pub ec2_key_pair: Option<String>,
    pub image_id: Option<String>,
    pub bid_percentage: Option<i32>,
    pub spot_iam_fleet_role: Option<String>,
    pub tags: BTreeMap<String, String>,
}

/// A job queue as described by the Batch API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobQueueRecord {
    pub name: String,
    pub arn: String,
    pub state: Option<ResourceState>,
    pub status: ResourceStatus,
    pub status_reason: Option<String>,
    pub priority: Option<i32>,
    /// Compute environment ARNs sorted by their order.
    pub compute_environments: Vec<String>,
}

/// Cached observation of one remote resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedResource {
    pub kind: ResourceKind,
    pub name: String,
    pub arn: String,
    pub status: ResourceStatus,
    pub state: Option<ResourceState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_reason: Option<String>,
    pub observed_at: DateTime<Utc>,
}

impl From<&ComputeEnvironmentRecord> for TrackedResource {
    fn from(record: &ComputeEnvironmentRecord) -> Self {
        Self {
            kind: ResourceKind::ComputeEnvironment,
            name: record.name.clone(),
            arn: record.arn.clone(),
            status: record.status.clone(),
            state: record.state,
            status_reason: record.status_reason.clone(),
            observed_at: Utc::now(),
        }
    }
}

impl From<&JobQueueRecord> for TrackedResource {
    fn from(record: &JobQueueRecord) -> Self {
        Self {
            kind: ResourceKind::JobQueue,
            name: record.name.clone(),
            arn: record.arn.clone(),
            status: record.status.clone(),
            state: record.state,
            status_reason: record.status_reason.clone(),
            observed_at: Utc::now(),
        }
    }
}

/// The reconciler's mirror of remote state, keyed by kind and name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedState {
    resources: BTreeMap<String, TrackedResource>,
}

impl TrackedState {
    fn key(kind: ResourceKind, name: &str) -> String {
        format!("{kind:?}/{name}")
    }

    pub fn get(&self, kind: ResourceKind, name: &str) -> Option<&TrackedResource> {
        self.resources.get(&Self::key(kind, name))
    }

    pub fn upsert(&mut self, resource: TrackedResource) {
        self.resources
            .insert(Self::key(resource.kind, &resource.name), resource);
    }

    pub fn evict(&mut self, kind: ResourceKind, name: &str) -> Option<TrackedResource> {
        self.resources.remove(&Self::key(kind, name))
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedResource> {
        self.resources.values()
    }
}
