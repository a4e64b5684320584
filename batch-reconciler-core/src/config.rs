//! Reconciler timing configuration.
//!
//! Every field has a default so a manifest only needs to name what it
//! overrides. Defaults follow what AWS Batch typically needs to settle a
//! compute environment or job queue.

use crate::retry::RetryPolicy;
use crate::types::ResourceKind;
use crate::waiter::WaitConfig;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

/// Timing of one convergence poll phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WaitSettings {
    pub timeout_secs: u64,
    pub delay_secs: u64,
    pub min_interval_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval_secs: Option<u64>,
}

impl WaitSettings {
    /// Create-phase timings: a short initial delay, then slower polls.
    pub const CREATE: Self = Self::new(600, 3, 10);

    pub const fn new(timeout_secs: u64, delay_secs: u64, min_interval_secs: u64) -> Self {
        Self {
            timeout_secs,
            delay_secs,
            min_interval_secs,
            poll_interval_secs: None,
        }
    }

    pub fn wait_config(
        &self,
        kind: ResourceKind,
        name: &str,
        pending: &'static [&'static str],
        target: &'static str,
        not_found_checks: u32,
    ) -> WaitConfig {
        WaitConfig {
            kind,
            name: name.to_string(),
            pending,
            target,
            timeout: Duration::from_secs(self.timeout_secs),
            delay: Duration::from_secs(self.delay_secs),
            min_interval: Duration::from_secs(self.min_interval_secs),
            poll_interval: self.poll_interval_secs.map(Duration::from_secs),
            not_found_checks,
        }
    }
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self::new(600, 10, 3)
    }
}

/// A phase table as written in a manifest; unset fields keep the phase default.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct WaitOverrides {
    timeout_secs: Option<u64>,
    delay_secs: Option<u64>,
    min_interval_secs: Option<u64>,
    poll_interval_secs: Option<u64>,
}

impl WaitOverrides {
    fn over(self, base: WaitSettings) -> WaitSettings {
        WaitSettings {
            timeout_secs: self.timeout_secs.unwrap_or(base.timeout_secs),
            delay_secs: self.delay_secs.unwrap_or(base.delay_secs),
            min_interval_secs: self.min_interval_secs.unwrap_or(base.min_interval_secs),
            poll_interval_secs: self.poll_interval_secs.or(base.poll_interval_secs),
        }
    }
}

fn create_phase<'de, D: Deserializer<'de>>(deserializer: D) -> Result<WaitSettings, D::Error> {
    WaitOverrides::deserialize(deserializer).map(|overrides| overrides.over(WaitSettings::CREATE))
}

/// Ceiling for retrying the delete call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    pub timeout_secs: u64,
    pub min_interval_ms: u64,
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_secs(self.timeout_secs),
            min_interval: Duration::from_millis(self.min_interval_ms),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            min_interval_ms: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReconcilerConfig {
    #[serde(deserialize_with = "create_phase")]
    pub create: WaitSettings,
    pub update: WaitSettings,
    pub disable: WaitSettings,
    pub delete: WaitSettings,
    pub delete_retry: RetrySettings,
    /// Consecutive "not found" refreshes tolerated while waiting.
    pub not_found_checks: u32,
    /// Poll for VALID between an update and the refreshing read.
    pub wait_on_update: bool,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            create: WaitSettings::CREATE,
            update: WaitSettings::default(),
            disable: WaitSettings::default(),
            delete: WaitSettings::default(),
            delete_retry: RetrySettings::default(),
            not_found_checks: 20,
            wait_on_update: true,
        }
    }
}

impl ReconcilerConfig {
    /// Zero delays and one-second polls everywhere, for fast local runs.
    pub fn immediate() -> Self {
        let quick = WaitSettings {
            timeout_secs: 600,
            delay_secs: 0,
            min_interval_secs: 0,
            poll_interval_secs: Some(1),
        };
        Self {
            create: quick,
            update: quick,
            disable: quick,
            delete: quick,
            ..Self::default()
        }
    }
}
