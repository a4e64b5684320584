//! Error types surfaced by the reconciler.

use crate::aws::AwsError;
use crate::types::ResourceKind;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconcileError {
    /// The create call itself was rejected. Not retried.
    #[error("Failed to create {kind} '{name}': {message}")]
    Creation {
        kind: ResourceKind,
        name: String,
        message: String,
    },

    /// More than one remote record answered to a single name.
    #[error("Found {count} {kind}s named '{name}', expected at most one")]
    Ambiguous {
        kind: ResourceKind,
        name: String,
        count: usize,
    },

    /// The remote resource did not reach the target status in time.
    /// It may still be converging remotely.
    #[error(
        "Timed out after {timeout:?} waiting for {kind} '{name}' to become {target} (last status: {})",
        .last_status.as_deref().unwrap_or("unknown")
    )]
    ConvergenceTimeout {
        kind: ResourceKind,
        name: String,
        target: String,
        last_status: Option<String>,
        timeout: Duration,
    },

    #[error(
        "Unexpected status {status} for {kind} '{name}' while waiting for {target}{}",
        .reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default()
    )]
    UnexpectedStatus {
        kind: ResourceKind,
        name: String,
        target: String,
        status: String,
        reason: Option<String>,
    },

    #[error("{kind} '{name}' could not be found while waiting for {target}")]
    NotFound {
        kind: ResourceKind,
        name: String,
        target: String,
    },

    /// Delete kept failing until the retry ceiling passed.
    #[error("Failed to delete {kind} '{name}' after {attempts} attempts: {message}")]
    TransientDelete {
        kind: ResourceKind,
        name: String,
        attempts: u32,
        message: String,
    },

    #[error("Invalid specification for '{name}': {}", .problems.join("; "))]
    InvalidSpec { name: String, problems: Vec<String> },

    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error(transparent)]
    Aws(#[from] AwsError),
}

impl ReconcileError {
    pub fn manifest(message: impl Into<String>) -> Self {
        Self::Manifest(message.into())
    }

    /// Name of the resource the error concerns, when there is one.
    pub fn resource_name(&self) -> Option<&str> {
        match self {
            Self::Creation { name, .. }
            | Self::Ambiguous { name, .. }
            | Self::ConvergenceTimeout { name, .. }
            | Self::UnexpectedStatus { name, .. }
            | Self::NotFound { name, .. }
            | Self::TransientDelete { name, .. }
            | Self::InvalidSpec { name, .. } => Some(name),
            Self::Manifest(_) | Self::Aws(_) => None,
        }
    }
}

pub type ReconcileResult<T> = Result<T, ReconcileError>;
