//! Resilience primitives shared by every effector: exponential backoff,
//! circuit breaking, and a bounded retry driver.

/// Exponential backoff with optional jitter.
pub mod backoff;
/// Failure-gating circuit breaker.
pub mod breaker;
/// Bounded retry execution.
pub mod retry;

pub use backoff::BackoffPolicy;
pub use breaker::{BreakerState, CircuitBreaker};
pub use retry::RetryExecutor;
