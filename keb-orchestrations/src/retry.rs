//! Bounded retry and polling combinators.
//!
//! Remote calls retry transient failures with a fixed interval, a maximum
//! number of attempts and a ceiling on total elapsed time. Application
//! errors are returned on the first occurrence.
//!
//! ```ignore
//! use keb_orchestrations::retry::{retry_with_backoff, RetryPolicy};
//!
//! let status = retry_with_backoff(&RetryPolicy::default(), "runtime_operation_status", || async {
//!     client.runtime_operation_status(&tenant, &operation_id).await
//! })
//! .await?;
//! ```

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{error, warn};

/// Classifies an error as worth another attempt.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

/// Fixed-interval retry configuration for remote calls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Delay between attempts
    pub interval: Duration,
    /// Upper bound on the total time spent retrying
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, interval: Duration, timeout: Duration) -> Self {
        Self {
            max_attempts,
            interval,
            timeout,
        }
    }

    /// A policy that gives up after the first failure.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            interval: Duration::ZERO,
            timeout: Duration::ZERO,
        }
    }
}

/// Run `operation` until it succeeds, fails permanently or the policy is exhausted.
///
/// The last error is returned when attempts or the time budget run out.
pub async fn retry_with_backoff<F, Fut, T, E>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display + Transient,
{
    let started = Instant::now();
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if !e.is_transient() => return Err(e),
            Err(e) => {
                let out_of_attempts = attempt >= policy.max_attempts.max(1);
                let out_of_time = started.elapsed() + policy.interval > policy.timeout;
                if out_of_attempts || out_of_time {
                    error!(
                        operation = %operation_name,
                        attempt = attempt,
                        error = %e,
                        "Operation failed after retries"
                    );
                    return Err(e);
                }

                warn!(
                    operation = %operation_name,
                    attempt = attempt,
                    error = %e,
                    delay_ms = policy.interval.as_millis() as u64,
                    "Operation failed, retrying"
                );

                tokio::time::sleep(policy.interval).await;
            }
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PollError<E> {
    #[error("condition not met within {0:?}")]
    Timeout(Duration),
    #[error("{0}")]
    Failed(E),
}

/// Evaluate `condition` every `interval` until it yields a value or `timeout` passes.
///
/// `Ok(None)` from the condition means "not yet"; an `Err` stops polling.
pub async fn poll_until<F, Fut, T, E>(
    interval: Duration,
    timeout: Duration,
    mut condition: F,
) -> Result<T, PollError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    let deadline = Instant::now() + timeout;

    loop {
        if let Some(value) = condition().await.map_err(PollError::Failed)? {
            return Ok(value);
        }
        if Instant::now() + interval > deadline {
            return Err(PollError::Timeout(timeout));
        }
        tokio::time::sleep(interval).await;
    }
}
