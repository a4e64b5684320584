//! Create, read, update and delete for any [`BatchResource`].

use super::resource::{BatchResource, ComputeEnvironments, JobQueues};
use super::service::BatchReconcilerService;
use crate::aws::AwsError;
use crate::error::{ReconcileError, ReconcileResult};
use crate::retry::{retry, RetryError, RetryFailure};
use crate::types::{
    ComputeEnvironmentRecord, ComputeEnvironmentSpec, JobQueueRecord, JobQueueSpec,
    ResourceState, ResourceStatus,
};
use crate::waiter::{wait_for_state, Observed};
use log::{debug, info};

const CREATE_PENDING: &[&str] = &[ResourceStatus::CREATING, ResourceStatus::UPDATING];
const UPDATE_PENDING: &[&str] = &[ResourceStatus::UPDATING];
const DELETE_PENDING: &[&str] = &[ResourceStatus::UPDATING, ResourceStatus::DELETING];

/// Pseudo-statuses of the disable phase of a delete.
const ENABLED: &str = "ENABLED";
const DISABLED: &str = "DISABLED";
const DISABLE_PENDING: &[&str] = &[ResourceStatus::CREATING, ResourceStatus::UPDATING, ENABLED];

/// Collapse status and state into one value for the disable wait.
///
/// A resource still being created or updated stays pending whatever its
/// state; once settled, a disabled resource reads `DISABLED` whatever its
/// status, and a valid but still enabled one reads `ENABLED` so the wait
/// keeps going until the update shows up.
fn disable_status(status: &ResourceStatus, state: Option<ResourceState>) -> String {
    match (status, state) {
        (ResourceStatus::Creating | ResourceStatus::Updating, _) => status.as_str().to_string(),
        (_, Some(ResourceState::Disabled)) => DISABLED.to_string(),
        (ResourceStatus::Valid, _) => ENABLED.to_string(),
        (other, _) => other.as_str().to_string(),
    }
}

fn is_retryable(error: &AwsError) -> bool {
    !matches!(error, AwsError::ConfigError(_))
}

impl BatchReconcilerService {
    /// Describe `name`, failing if it is not unique.
    async fn find<R: BatchResource>(
        &self,
        handler: &R,
        name: &str,
    ) -> ReconcileResult<Option<R::Record>> {
        let mut records = handler.describe(self.api.as_ref(), name).await?;
        match records.len() {
            0 => Ok(None),
            1 => Ok(records.pop()),
            count => Err(ReconcileError::Ambiguous {
                kind: R::KIND,
                name: name.to_string(),
                count,
            }),
        }
    }

    /// Read and mirror the result into the tracked state.
    pub(crate) async fn read_resource<R: BatchResource>(
        &self,
        handler: &R,
        name: &str,
    ) -> ReconcileResult<Option<R::Record>> {
        let found = self.find(handler, name).await?;
        match &found {
            Some(record) => self.track(R::tracked(record)),
            None => {
                debug!("{} '{}' not found", R::KIND, name);
                self.untrack(R::KIND, name);
            }
        }
        Ok(found)
    }

    async fn observe<R: BatchResource>(
        &self,
        handler: &R,
        name: &str,
    ) -> ReconcileResult<Observed<R::Record>> {
        Ok(match self.read_resource(handler, name).await? {
            Some(record) => {
                let reason = R::status_reason(&record).map(str::to_string);
                let status = R::status(&record).as_str().to_string();
                Observed::present(record, status).with_reason(reason)
            }
            None => Observed::absent(ResourceStatus::DELETED),
        })
    }

    async fn observe_disable<R: BatchResource>(
        &self,
        handler: &R,
        name: &str,
    ) -> ReconcileResult<Observed<R::Record>> {
        Ok(match self.read_resource(handler, name).await? {
            Some(record) => {
                let reason = R::status_reason(&record).map(str::to_string);
                let status = disable_status(R::status(&record), R::state(&record));
                Observed::present(record, status).with_reason(reason)
            }
            // Gone already: nothing is left to disable.
            None => Observed::absent(DISABLED),
        })
    }

    pub(crate) async fn create_resource<R: BatchResource>(
        &self,
        handler: &R,
        spec: &R::Spec,
    ) -> ReconcileResult<String> {
        R::validate(spec)?;
        let name = R::spec_name(spec);

        info!("Creating {} '{}'", R::KIND, name);
        let arn = handler
            .create(self.api.as_ref(), spec)
            .await
            .map_err(|e| ReconcileError::Creation {
                kind: R::KIND,
                name: name.to_string(),
                message: e.to_string(),
            })?;

        info!("Waiting for {} '{}' to be available", R::KIND, name);
        let wait = self.config.create.wait_config(
            R::KIND,
            name,
            CREATE_PENDING,
            ResourceStatus::VALID,
            self.config.not_found_checks,
        );
        let outcome =
            wait_for_state(self.clock.as_ref(), &wait, || self.observe(handler, name)).await?;

        info!(
            "{} '{}' created: {} ({} poll retries)",
            R::KIND,
            name,
            arn,
            outcome.retries()
        );
        Ok(arn)
    }

    /// In-place update of the mutable attributes, then a refreshing read.
    pub(crate) async fn update_resource<R: BatchResource>(
        &self,
        handler: &R,
        spec: &R::Spec,
    ) -> ReconcileResult<Option<R::Record>> {
        R::validate(spec)?;
        let name = R::spec_name(spec);

        info!("Updating {} '{}'", R::KIND, name);
        handler.update(self.api.as_ref(), spec).await?;

        if self.config.wait_on_update {
            let wait = self.config.update.wait_config(
                R::KIND,
                name,
                UPDATE_PENDING,
                ResourceStatus::VALID,
                self.config.not_found_checks,
            );
            wait_for_state(self.clock.as_ref(), &wait, || self.observe(handler, name)).await?;
        }

        self.read_resource(handler, name).await
    }

    /// Disable, delete with retries, then wait until the resource is gone.
    ///
    /// Deleting something that does not exist succeeds without any call
    /// besides the initial describe. A resource already `DELETING` only gets
    /// the final wait, and one that vanishes while being disabled is done.
    /// A failing disable update is returned as-is and no delete is attempted.
    pub(crate) async fn delete_resource<R: BatchResource>(
        &self,
        handler: &R,
        name: &str,
    ) -> ReconcileResult<()> {
        let Some(record) = self.read_resource(handler, name).await? else {
            debug!("{} '{}' is already gone", R::KIND, name);
            return Ok(());
        };

        if *R::status(&record) == ResourceStatus::Deleting {
            info!("{} '{}' is already being deleted", R::KIND, name);
        } else if self.disable(handler, name, &record).await? {
            self.delete_with_retry(handler, name).await?;
        } else {
            self.untrack(R::KIND, name);
            info!("{} '{}' disappeared while being disabled", R::KIND, name);
            return Ok(());
        }

        let wait = self.config.delete.wait_config(
            R::KIND,
            name,
            DELETE_PENDING,
            ResourceStatus::DELETED,
            self.config.not_found_checks,
        );
        wait_for_state(self.clock.as_ref(), &wait, || self.observe(handler, name)).await?;

        self.untrack(R::KIND, name);
        info!("{} '{}' deleted", R::KIND, name);
        Ok(())
    }

    /// Bring `record` to `DISABLED`. Returns `false` if the resource
    /// disappeared on the way.
    async fn disable<R: BatchResource>(
        &self,
        handler: &R,
        name: &str,
        record: &R::Record,
    ) -> ReconcileResult<bool> {
        let state = R::state(record);
        if state != Some(ResourceState::Disabled) {
            info!("Disabling {} '{}'", R::KIND, name);
            handler.disable(self.api.as_ref(), name).await?;
        }

        if disable_status(R::status(record), state) == DISABLED {
            return Ok(true);
        }
        let wait = self.config.disable.wait_config(
            R::KIND,
            name,
            DISABLE_PENDING,
            DISABLED,
            self.config.not_found_checks,
        );
        let outcome = wait_for_state(self.clock.as_ref(), &wait, || {
            self.observe_disable(handler, name)
        })
        .await?;
        Ok(outcome.state.is_some())
    }

    async fn delete_with_retry<R: BatchResource>(
        &self,
        handler: &R,
        name: &str,
    ) -> ReconcileResult<()> {
        let policy = self.config.delete_retry.policy();
        let description = format!("Deleting {} '{}'", R::KIND, name);
        retry(self.clock.as_ref(), &policy, &description, || async move {
            handler
                .delete(self.api.as_ref(), name)
                .await
                .map_err(|e| {
                    if is_retryable(&e) {
                        RetryError::Retryable(e)
                    } else {
                        RetryError::Permanent(e)
                    }
                })
        })
        .await
        .map_err(|failure| match failure {
            RetryFailure::Exhausted {
                attempts,
                last_error,
            } => ReconcileError::TransientDelete {
                kind: R::KIND,
                name: name.to_string(),
                attempts,
                message: last_error.to_string(),
            },
            RetryFailure::Permanent { error, .. } => ReconcileError::Aws(error),
        })
    }

    pub async fn create_compute_environment(
        &self,
        spec: &ComputeEnvironmentSpec,
    ) -> ReconcileResult<String> {
        self.create_resource(&ComputeEnvironments, spec).await
    }

    pub async fn read_compute_environment(
        &self,
        name: &str,
    ) -> ReconcileResult<Option<ComputeEnvironmentRecord>> {
        self.read_resource(&ComputeEnvironments, name).await
    }

    pub async fn update_compute_environment(
        &self,
        spec: &ComputeEnvironmentSpec,
    ) -> ReconcileResult<Option<ComputeEnvironmentRecord>> {
        self.update_resource(&ComputeEnvironments, spec).await
    }

    pub async fn delete_compute_environment(&self, name: &str) -> ReconcileResult<()> {
        self.delete_resource(&ComputeEnvironments, name).await
    }

    pub async fn create_job_queue(&self, spec: &JobQueueSpec) -> ReconcileResult<String> {
        self.create_resource(&JobQueues, spec).await
    }

    pub async fn read_job_queue(&self, name: &str) -> ReconcileResult<Option<JobQueueRecord>> {
        self.read_resource(&JobQueues, name).await
    }

    pub async fn update_job_queue(
        &self,
        spec: &JobQueueSpec,
    ) -> ReconcileResult<Option<JobQueueRecord>> {
        self.update_resource(&JobQueues, spec).await
    }

    pub async fn delete_job_queue(&self, name: &str) -> ReconcileResult<()> {
        self.delete_resource(&JobQueues, name).await
    }
}
