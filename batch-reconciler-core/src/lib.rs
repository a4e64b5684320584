//! This crate provides the core reconciler for AWS Batch resources:
//! - Compute environment and job queue create/read/update/delete
//! - Convergence polling on asynchronous status transitions
//! - Manifest loading, planning and apply/destroy ordering
//!

pub mod aws;
pub mod commands;
pub mod config;
mod error;
pub mod manifest;
pub mod mapping;
pub mod retry;
#[cfg(any(test, feature = "test-util"))]
pub mod test_utils;
pub mod types;
pub mod validation;
pub mod waiter;

// Re-exports for a small, focused public API
pub use aws::{AwsBatchClient, AwsError, BatchApi};
pub use commands::{ApplyReport, BatchReconcilerService, Plan, PlannedAction};
pub use config::ReconcilerConfig;
pub use error::{ReconcileError, ReconcileResult};
pub use manifest::Manifest;
pub use types::{
    ComputeEnvironmentRecord, ComputeEnvironmentSpec, JobQueueRecord, JobQueueSpec, ResourceKind,
    ResourceState, ResourceStatus, TrackedResource, TrackedState,
};
