//! Time-bounded retry with doubling backoff.

use crate::waiter::Clock;
use log::warn;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

const INITIAL_BACKOFF: Duration = Duration::from_millis(100);
const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Classification returned by a retried operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError<E> {
    Retryable(E),
    Permanent(E),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryFailure<E> {
    /// The ceiling passed while the operation still failed.
    Exhausted { attempts: u32, last_error: E },
    Permanent { attempts: u32, error: E },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub min_interval: Duration,
}

/// Run `op` until it succeeds, fails permanently, or `policy.timeout` passes.
pub async fn retry<T, E, F, Fut>(
    clock: &dyn Clock,
    policy: &RetryPolicy,
    description: &str,
    mut op: F,
) -> Result<T, RetryFailure<E>>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RetryError<E>>>,
{
    let start = clock.now();
    let mut attempts = 0u32;
    let mut backoff = INITIAL_BACKOFF;

    loop {
        attempts += 1;
        let error = match op().await {
            Ok(value) => return Ok(value),
            Err(RetryError::Permanent(error)) => {
                return Err(RetryFailure::Permanent { attempts, error })
            }
            Err(RetryError::Retryable(error)) => error,
        };

        let elapsed = clock.now().saturating_duration_since(start);
        if elapsed >= policy.timeout {
            return Err(RetryFailure::Exhausted {
                attempts,
                last_error: error,
            });
        }

        let wait = backoff.min(MAX_BACKOFF).max(policy.min_interval);
        backoff = backoff.saturating_mul(2);
        warn!("{description} failed (attempt {attempts}), retrying in {wait:?}: {error}");
        clock.sleep(wait.min(policy.timeout - elapsed)).await;
    }
}
