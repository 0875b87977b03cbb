//! Circuit breaker gating calls to a single agent.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::model::CircuitBreakerPolicy;

/// Gate state of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Calls pass through normally.
    Closed,
    /// Calls are blocked until the recovery timeout elapses.
    Open,
    /// A trial window: calls are admitted, the next outcome decides.
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    failure_count: u32,
    last_failure: Option<Instant>,
    half_open_successes: u32,
}

/// Per-agent failure gate.
///
/// One breaker instance is shared by every task routed to the same agent
/// and may be touched from concurrent dispatches; every read/modify
/// sequence runs under the internal lock.
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    recovery_timeout: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Build a closed breaker from a policy.
    pub fn new(policy: &CircuitBreakerPolicy) -> Self {
        Self {
            failure_threshold: policy.failure_threshold,
            recovery_timeout: Duration::from_secs_f64(policy.recovery_timeout),
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                failure_count: 0,
                last_failure: None,
                half_open_successes: 0,
            }),
        }
    }

    /// Whether a call may proceed right now.
    ///
    /// An OPEN breaker transitions to HALF_OPEN (and admits the call) once
    /// the recovery timeout has elapsed since the last recorded failure.
    /// The check itself never mutates the failure counters.
    pub fn can_execute(&self) -> bool {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        match inner.state {
            BreakerState::Closed => true,
            BreakerState::Open => {
                let recovered = match inner.last_failure {
                    Some(at) => at.elapsed() >= self.recovery_timeout,
                    None => true,
                };
                if recovered {
                    debug!("recovery timeout elapsed, admitting trial call");
                    inner.state = BreakerState::HalfOpen;
                    inner.half_open_successes = 0;
                    true
                } else {
                    false
                }
            }
            BreakerState::HalfOpen => true,
        }
    }

    /// Record a successful call.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        match inner.state {
            BreakerState::HalfOpen => {
                inner.half_open_successes += 1;
                if inner.half_open_successes >= 1 {
                    debug!("trial call succeeded, closing circuit");
                    inner.state = BreakerState::Closed;
                    inner.failure_count = 0;
                    inner.half_open_successes = 0;
                    inner.last_failure = None;
                }
            }
            BreakerState::Closed => {
                inner.failure_count = 0;
            }
            BreakerState::Open => {}
        }
    }

    /// Record a failed call.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().expect("breaker lock poisoned");
        inner.failure_count += 1;
        inner.last_failure = Some(Instant::now());
        match inner.state {
            BreakerState::HalfOpen => {
                warn!("trial call failed, reopening circuit");
                inner.state = BreakerState::Open;
            }
            BreakerState::Closed if inner.failure_count >= self.failure_threshold => {
                warn!(
                    failures = inner.failure_count,
                    "failure threshold reached, opening circuit"
                );
                inner.state = BreakerState::Open;
            }
            _ => {}
        }
    }

    /// Current gate state.
    pub fn state(&self) -> BreakerState {
        self.inner.lock().expect("breaker lock poisoned").state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, recovery_secs: f64) -> CircuitBreaker {
        CircuitBreaker::new(&CircuitBreakerPolicy {
            failure_threshold: threshold,
            recovery_timeout: recovery_secs,
        })
    }

    #[test]
    fn opens_exactly_at_threshold() {
        let b = breaker(3, 60.0);
        b.record_failure();
        b.record_failure();
        assert_eq!(b.state(), BreakerState::Closed);
        b.record_failure();
        assert_eq!(b.state(), BreakerState::Open);
        assert!(!b.can_execute());
    }

    #[test]
    fn success_in_closed_clears_accumulated_failures() {
        let b = breaker(3, 60.0);
        b.record_failure();
        b.record_failure();
        b.record_success();
        b.record_failure();
        b.record_failure();
        assert_eq!(b.state(), BreakerState::Closed);
    }

    #[test]
    fn half_open_failure_reopens_immediately() {
        let b = breaker(1, 0.0);
        b.record_failure();
        assert!(b.can_execute());
        assert_eq!(b.state(), BreakerState::HalfOpen);
        b.record_failure();
        assert_eq!(b.state(), BreakerState::Open);
    }
}
