//! Convergence polling: wait for a remote resource to reach a target status.
//!
//! Time is read and spent only through [`Clock`], so the loop can be driven
//! by a manual clock in tests and by `tokio::time` in production.

use crate::error::{ReconcileError, ReconcileResult};
use crate::types::ResourceKind;
use async_trait::async_trait;
use log::debug;
use std::future::Future;
use std::time::{Duration, Instant};

/// First backoff step when no fixed poll interval is configured.
const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
/// Upper bound of the doubling backoff (the minimum interval may exceed it).
const MAX_BACKOFF: Duration = Duration::from_secs(10);

#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// One refresh result. `state` is `None` when the resource was not found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observed<T> {
    pub state: Option<T>,
    pub status: String,
    pub reason: Option<String>,
}

impl<T> Observed<T> {
    pub fn present(state: T, status: impl Into<String>) -> Self {
        Self {
            state: Some(state),
            status: status.into(),
            reason: None,
        }
    }

    pub fn absent(status: impl Into<String>) -> Self {
        Self {
            state: None,
            status: status.into(),
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason;
        self
    }
}

#[derive(Debug, Clone)]
pub struct WaitConfig {
    pub kind: ResourceKind,
    pub name: String,
    pub pending: &'static [&'static str],
    pub target: &'static str,
    pub timeout: Duration,
    /// Sleep before the first refresh.
    pub delay: Duration,
    /// Floor applied to the backoff.
    pub min_interval: Duration,
    /// Replaces the backoff with a fixed interval when set.
    pub poll_interval: Option<Duration>,
    /// Consecutive not-found refreshes tolerated before giving up.
    pub not_found_checks: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitOutcome<T> {
    pub state: Option<T>,
    pub status: String,
    pub attempts: u32,
    pub elapsed: Duration,
}

impl<T> WaitOutcome<T> {
    /// Refreshes after the first one.
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

/// Poll `refresh` until it reports `config.target`.
///
/// Pending statuses keep the loop going, anything else fails immediately.
/// A timeout is only reported once the clock shows at least
/// `config.timeout` since the call started.
pub async fn wait_for_state<T, F, Fut>(
    clock: &dyn Clock,
    config: &WaitConfig,
    mut refresh: F,
) -> ReconcileResult<WaitOutcome<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ReconcileResult<Observed<T>>>,
{
    let start = clock.now();
    if !config.delay.is_zero() {
        clock.sleep(config.delay).await;
    }

    let mut attempts = 0u32;
    let mut not_found = 0u32;
    let mut backoff = INITIAL_BACKOFF;

    loop {
        let observed = refresh().await?;
        attempts += 1;

        if observed.status == config.target {
            let elapsed = clock.now().saturating_duration_since(start);
            debug!(
                "{} '{}' reached {} after {} refreshes",
                config.kind, config.name, config.target, attempts
            );
            return Ok(WaitOutcome {
                state: observed.state,
                status: observed.status,
                attempts,
                elapsed,
            });
        }

        if observed.state.is_none() {
            not_found += 1;
            if not_found > config.not_found_checks {
                return Err(ReconcileError::NotFound {
                    kind: config.kind,
                    name: config.name.clone(),
                    target: config.target.to_string(),
                });
            }
            debug!(
                "{} '{}' not found ({}/{})",
                config.kind, config.name, not_found, config.not_found_checks
            );
        } else if config.pending.contains(&observed.status.as_str()) {
            not_found = 0;
            debug!(
                "{} '{}' is {}, waiting for {}",
                config.kind, config.name, observed.status, config.target
            );
        } else {
            return Err(ReconcileError::UnexpectedStatus {
                kind: config.kind,
                name: config.name.clone(),
                target: config.target.to_string(),
                status: observed.status,
                reason: observed.reason,
            });
        }

        let elapsed = clock.now().saturating_duration_since(start);
        if elapsed >= config.timeout {
            return Err(ReconcileError::ConvergenceTimeout {
                kind: config.kind,
                name: config.name.clone(),
                target: config.target.to_string(),
                last_status: Some(observed.status),
                timeout: config.timeout,
            });
        }

        let wait = match config.poll_interval {
            Some(interval) => interval,
            None => {
                let wait = backoff.min(MAX_BACKOFF).max(config.min_interval);
                backoff = backoff.saturating_mul(2);
                wait
            }
        };
        clock.sleep(wait.min(config.timeout - elapsed)).await;
    }
}
