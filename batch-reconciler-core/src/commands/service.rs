//! Batch Reconciler Service Layer
//!
//! The service owns the Batch API client, the clock used for polling, the
//! timing configuration and the tracked mirror of remote state. Adapters
//! (the CLI, tests) drive it through create/read/update/delete per resource
//! and the manifest-level plan/apply/destroy operations.

use crate::aws::{AwsBatchClient, BatchApi};
use crate::config::ReconcilerConfig;
use crate::error::ReconcileResult;
use crate::types::{ResourceKind, TrackedResource, TrackedState};
use crate::waiter::{Clock, TokioClock};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub struct BatchReconcilerService {
    pub(crate) api: Arc<dyn BatchApi>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) config: ReconcilerConfig,
    tracked: Mutex<TrackedState>,
}

impl BatchReconcilerService {
    /// Build a service over an existing API client, polling on the tokio clock.
    pub fn new(api: Arc<dyn BatchApi>, config: ReconcilerConfig) -> Self {
        Self::with_clock(api, Arc::new(TokioClock), config)
    }

    pub fn with_clock(
        api: Arc<dyn BatchApi>,
        clock: Arc<dyn Clock>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            api,
            clock,
            config,
            tracked: Mutex::new(TrackedState::default()),
        }
    }

    /// Create a service talking to AWS Batch through the default credential
    /// provider chain, optionally pinned to a region and profile.
    pub async fn from_env(
        region: Option<&str>,
        profile: Option<&str>,
        config: ReconcilerConfig,
    ) -> ReconcileResult<Self> {
        let client = AwsBatchClient::from_env(region, profile).await?;
        Ok(Self::new(Arc::new(client), config))
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Snapshot of everything observed so far.
    pub fn tracked_state(&self) -> TrackedState {
        self.lock_tracked().clone()
    }

    pub fn tracked(&self, kind: ResourceKind, name: &str) -> Option<TrackedResource> {
        self.lock_tracked().get(kind, name).cloned()
    }

    pub(crate) fn track(&self, resource: TrackedResource) {
        self.lock_tracked().upsert(resource);
    }

    pub(crate) fn untrack(&self, kind: ResourceKind, name: &str) {
        self.lock_tracked().evict(kind, name);
    }

    fn lock_tracked(&self) -> MutexGuard<'_, TrackedState> {
        self.tracked.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
