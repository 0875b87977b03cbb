//! Backoff delay computation for retry attempts.

use std::time::Duration;

use rand::Rng;

use crate::model::RetryPolicy;

/// Pure mapping from attempt number to delay.
///
/// The un-jittered delay for attempt `n` (0-indexed) is
/// `min(initial_delay * exponential_base^n, max_delay)`. With jitter
/// enabled, a uniform offset in ±10% of that value is added and the result
/// is clamped to zero.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    initial_delay: f64,
    max_delay: f64,
    exponential_base: f64,
    jitter: bool,
}

impl BackoffPolicy {
    /// Build from a retry policy.
    pub fn new(policy: &RetryPolicy) -> Self {
        Self {
            initial_delay: policy.initial_delay,
            max_delay: policy.max_delay,
            exponential_base: policy.exponential_base,
            jitter: policy.jitter,
        }
    }

    /// Un-jittered delay in seconds for the given attempt.
    pub fn base_delay(&self, attempt: u32) -> f64 {
        let delay = self.initial_delay * self.exponential_base.powi(attempt as i32);
        delay.min(self.max_delay)
    }

    /// Delay to sleep after the given attempt failed.
    pub fn delay(&self, attempt: u32) -> Duration {
        let mut delay = self.base_delay(attempt);
        if self.jitter {
            let spread = delay * 0.1;
            delay += rand::thread_rng().gen_range(-spread..=spread);
        }
        Duration::from_secs_f64(delay.max(0.0))
    }
}
