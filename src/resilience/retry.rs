//! Bounded retry driver for a single effector operation.

use std::future::Future;

use tracing::{debug, warn};

use super::backoff::BackoffPolicy;
use crate::error::EffectorError;
use crate::model::RetryPolicy;

/// Drives repeated invocation of a fallible async operation up to
/// `max_attempts` times, sleeping per the backoff policy between attempts.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    max_attempts: u32,
    backoff: BackoffPolicy,
}

impl RetryExecutor {
    /// Build from a retry policy.
    pub fn new(policy: &RetryPolicy) -> Self {
        Self {
            max_attempts: policy.max_attempts,
            backoff: BackoffPolicy::new(policy),
        }
    }

    /// Invoke `operation` until it succeeds or the attempt budget runs out.
    ///
    /// The closure is called once per attempt with the 0-indexed attempt
    /// number and must produce a fresh future each time. No delay is
    /// applied before the first attempt or after the last. A fast-fail
    /// error (open circuit) aborts immediately without consuming further
    /// attempts. On exhaustion, the returned [`EffectorError::RetryExhausted`]
    /// carries the last underlying error text.
    pub async fn run<T, F, Fut>(&self, operation: F) -> Result<T, EffectorError>
    where
        F: Fn(u32) -> Fut,
        Fut: Future<Output = Result<T, EffectorError>>,
    {
        let mut last_error: Option<EffectorError> = None;
        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                let delay = self.backoff.delay(attempt - 1);
                debug!(attempt, delay_ms = delay.as_millis() as u64, "backing off before retry");
                tokio::time::sleep(delay).await;
            }
            match operation(attempt).await {
                Ok(value) => {
                    debug!(attempt, "attempt succeeded");
                    return Ok(value);
                }
                Err(err) if err.is_fast_fail() => return Err(err),
                Err(err) => {
                    warn!(attempt, error = %err, "attempt failed");
                    last_error = Some(err);
                }
            }
        }
        let last = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempts were made".to_string());
        Err(EffectorError::RetryExhausted {
            attempts: self.max_attempts,
            last,
        })
    }
}
