//! Test doubles: a manual clock and an in-memory Batch API.
//!
//! The in-memory API replays scripted status sequences per resource and
//! records every outbound call, so reconciler behaviour can be asserted
//! without network access.

use crate::aws::{AwsError, AwsResult, BatchApi};
use crate::mapping::{
    CreateComputeEnvironmentRequest, CreateJobQueueRequest, UpdateComputeEnvironmentRequest,
    UpdateJobQueueRequest,
};
use crate::types::{
    ComputeEnvironmentRecord, ComputeResourcesRecord, JobQueueRecord, ResourceState,
    ResourceStatus,
};
use crate::waiter::Clock;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Clock whose time only moves when something sleeps on it.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    /// Virtual time spent sleeping so far.
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        *self.offset.lock().unwrap_or_else(PoisonError::into_inner) += duration;
        self.sleeps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(duration);
    }
}

/// One outbound call observed by [`InMemoryBatchApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    CreateComputeEnvironment(CreateComputeEnvironmentRequest),
    DescribeComputeEnvironments(String),
    UpdateComputeEnvironment(UpdateComputeEnvironmentRequest),
    DeleteComputeEnvironment(String),
    CreateJobQueue(CreateJobQueueRequest),
    DescribeJobQueues(String),
    UpdateJobQueue(UpdateJobQueueRequest),
    DeleteJobQueue(String),
}

/// What a describe call returns for one name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// No record.
    Absent,
    /// One record with this status and state.
    Present(&'static str, ResourceState),
    /// The same record returned twice.
    Duplicated(&'static str),
}

#[derive(Default)]
struct Inner {
    calls: Vec<RecordedCall>,
    compute_environments: HashMap<String, VecDeque<Step>>,
    job_queues: HashMap<String, VecDeque<Step>>,
    create_errors: HashMap<String, String>,
    update_errors: HashMap<String, String>,
    delete_failures: HashMap<String, u32>,
}

/// Scripted [`BatchApi`] for tests.
///
/// Each describe pops the next [`Step`] for the name, repeating the last one
/// once the script runs out. Mutating calls only record themselves (and the
/// configured failures); the script decides what describe sees afterwards.
#[derive(Default)]
pub struct InMemoryBatchApi {
    inner: Mutex<Inner>,
}

impl InMemoryBatchApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn script_compute_environment(&self, name: &str, steps: impl IntoIterator<Item = Step>) {
        self.lock()
            .compute_environments
            .insert(name.to_string(), steps.into_iter().collect());
    }

    pub fn script_job_queue(&self, name: &str, steps: impl IntoIterator<Item = Step>) {
        self.lock()
            .job_queues
            .insert(name.to_string(), steps.into_iter().collect());
    }

    pub fn fail_create(&self, name: &str, message: &str) {
        self.lock()
            .create_errors
            .insert(name.to_string(), message.to_string());
    }

    pub fn fail_update(&self, name: &str, message: &str) {
        self.lock()
            .update_errors
            .insert(name.to_string(), message.to_string());
    }

    /// Make the next `times` delete calls for `name` fail.
    pub fn fail_delete(&self, name: &str, times: u32) {
        self.lock().delete_failures.insert(name.to_string(), times);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    /// Calls other than describes.
    pub fn mutations(&self) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|call| {
                !matches!(
                    call,
                    RecordedCall::DescribeComputeEnvironments(_)
                        | RecordedCall::DescribeJobQueues(_)
                )
            })
            .collect()
    }

    pub fn describe_count(&self) -> usize {
        self.calls().len() - self.mutations().len()
    }

    fn next_step(script: &mut HashMap<String, VecDeque<Step>>, name: &str) -> Step {
        match script.get_mut(name) {
            Some(steps) if steps.len() > 1 => steps.pop_front().unwrap_or(Step::Absent),
            Some(steps) => steps.front().cloned().unwrap_or(Step::Absent),
            None => Step::Absent,
        }
    }

    fn check(errors: &HashMap<String, String>, name: &str) -> AwsResult<()> {
        match errors.get(name) {
            Some(message) => Err(AwsError::BatchError(message.clone())),
            None => Ok(()),
        }
    }

    fn check_delete(failures: &mut HashMap<String, u32>, name: &str) -> AwsResult<()> {
        match failures.get_mut(name) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(AwsError::BatchError(format!(
                    "Cannot delete, found existing JobQueue relationship for {name}"
                )))
            }
            _ => Ok(()),
        }
    }
}

pub fn compute_environment_arn(name: &str) -> String {
    format!("arn:aws:batch:us-east-1:123456789012:compute-environment/{name}")
}

pub fn job_queue_arn(name: &str) -> String {
    format!("arn:aws:batch:us-east-1:123456789012:job-queue/{name}")
}

fn compute_environment_record(
    name: &str,
    status: &str,
    state: ResourceState,
) -> ComputeEnvironmentRecord {
    ComputeEnvironmentRecord {
        name: name.to_string(),
        arn: compute_environment_arn(name),
        kind: Some(crate::types::ComputeEnvironmentType::Managed),
        state: Some(state),
        status: ResourceStatus::from(status),
        status_reason: (status == ResourceStatus::INVALID)
            .then(|| "CLIENT_ERROR - subnet not found".to_string()),
        service_role: Some("arn:aws:iam::123456789012:role/AWSBatchServiceRole".to_string()),
        compute_resources: Some(ComputeResourcesRecord {
            kind: Some(crate::types::ComputeResourceType::Ec2),
            min_vcpus: Some(0),
            max_vcpus: Some(1),
            ..ComputeResourcesRecord::default()
        }),
    }
}

fn job_queue_record(name: &str, status: &str, state: ResourceState) -> JobQueueRecord {
    JobQueueRecord {
        name: name.to_string(),
        arn: job_queue_arn(name),
        state: Some(state),
        status: ResourceStatus::from(status),
        status_reason: None,
        priority: Some(1),
        compute_environments: vec![compute_environment_arn("ce")],
    }
}

#[async_trait]
impl BatchApi for InMemoryBatchApi {
    async fn create_compute_environment(
        &self,
        request: &CreateComputeEnvironmentRequest,
    ) -> AwsResult<String> {
        let mut inner = self.lock();
        inner
            .calls
            .push(RecordedCall::CreateComputeEnvironment(request.clone()));
        Self::check(&inner.create_errors, &request.compute_environment_name)?;
        Ok(compute_environment_arn(&request.compute_environment_name))
    }

    async fn describe_compute_environments(
        &self,
        name: &str,
    ) -> AwsResult<Vec<ComputeEnvironmentRecord>> {
        let mut inner = self.lock();
        inner
            .calls
            .push(RecordedCall::DescribeComputeEnvironments(name.to_string()));
        Ok(match Self::next_step(&mut inner.compute_environments, name) {
            Step::Absent => Vec::new(),
            Step::Present(status, state) => {
                vec![compute_environment_record(name, status, state)]
            }
            Step::Duplicated(status) => {
                let record = compute_environment_record(name, status, ResourceState::Enabled);
                vec![record.clone(), record]
            }
        })
    }

    async fn update_compute_environment(
        &self,
        request: &UpdateComputeEnvironmentRequest,
    ) -> AwsResult<()> {
        let mut inner = self.lock();
        inner
            .calls
            .push(RecordedCall::UpdateComputeEnvironment(request.clone()));
        Self::check(&inner.update_errors, &request.compute_environment)
    }

    async fn delete_compute_environment(&self, name: &str) -> AwsResult<()> {
        let mut inner = self.lock();
        inner
            .calls
            .push(RecordedCall::DeleteComputeEnvironment(name.to_string()));
        Self::check_delete(&mut inner.delete_failures, name)
    }

    async fn create_job_queue(&self, request: &CreateJobQueueRequest) -> AwsResult<String> {
        let mut inner = self.lock();
        inner.calls.push(RecordedCall::CreateJobQueue(request.clone()));
        Self::check(&inner.create_errors, &request.job_queue_name)?;
        Ok(job_queue_arn(&request.job_queue_name))
    }

    async fn describe_job_queues(&self, name: &str) -> AwsResult<Vec<JobQueueRecord>> {
        let mut inner = self.lock();
        inner
            .calls
            .push(RecordedCall::DescribeJobQueues(name.to_string()));
        Ok(match Self::next_step(&mut inner.job_queues, name) {
            Step::Absent => Vec::new(),
            Step::Present(status, state) => vec![job_queue_record(name, status, state)],
            Step::Duplicated(status) => {
                let record = job_queue_record(name, status, ResourceState::Enabled);
                vec![record.clone(), record]
            }
        })
    }

    async fn update_job_queue(&self, request: &UpdateJobQueueRequest) -> AwsResult<()> {
        let mut inner = self.lock();
        inner.calls.push(RecordedCall::UpdateJobQueue(request.clone()));
        Self::check(&inner.update_errors, &request.job_queue)
    }

    async fn delete_job_queue(&self, name: &str) -> AwsResult<()> {
        let mut inner = self.lock();
        inner.calls.push(RecordedCall::DeleteJobQueue(name.to_string()));
        Self::check_delete(&mut inner.delete_failures, name)
    }
}
