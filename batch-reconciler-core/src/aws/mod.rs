//! AWS SDK integration: the Batch API seam and its `aws-sdk-batch` implementation.

pub mod batch_client;

use crate::mapping::{
    CreateComputeEnvironmentRequest, CreateJobQueueRequest, UpdateComputeEnvironmentRequest,
    UpdateJobQueueRequest,
};
use crate::types::{ComputeEnvironmentRecord, JobQueueRecord};
use async_trait::async_trait;
use thiserror::Error;

pub use batch_client::AwsBatchClient;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AwsError {
    #[error("AWS configuration error: {0}")]
    ConfigError(String),
    #[error("Batch client error: {0}")]
    BatchError(String),
    #[error("AWS SDK error: {0}")]
    SdkError(String),
}

pub type AwsResult<T> = Result<T, AwsError>;

/// The outbound calls the reconciler makes against AWS Batch.
///
/// Every call is a plain request/response; asynchronous effects are only
/// observed through later `describe_*` calls.
#[async_trait]
pub trait BatchApi: Send + Sync {
    /// Returns the ARN of the new compute environment.
    async fn create_compute_environment(
        &self,
        request: &CreateComputeEnvironmentRequest,
    ) -> AwsResult<String>;

    async fn describe_compute_environments(
        &self,
        name: &str,
    ) -> AwsResult<Vec<ComputeEnvironmentRecord>>;

    async fn update_compute_environment(
        &self,
        request: &UpdateComputeEnvironmentRequest,
    ) -> AwsResult<()>;

    async fn delete_compute_environment(&self, name: &str) -> AwsResult<()>;

    /// Returns the ARN of the new job queue.
    async fn create_job_queue(&self, request: &CreateJobQueueRequest) -> AwsResult<String>;

    async fn describe_job_queues(&self, name: &str) -> AwsResult<Vec<JobQueueRecord>>;

    async fn update_job_queue(&self, request: &UpdateJobQueueRequest) -> AwsResult<()>;

    async fn delete_job_queue(&self, name: &str) -> AwsResult<()>;
}
