//! Error types for the orchestration engine.
//!
//! Only [`ConfigError`] ever surfaces to callers: every runtime failure of
//! an effector call is converted into a failure-flagged
//! [`EffectorResponse`](crate::model::EffectorResponse) before it crosses
//! the dispatch boundary.

use std::time::Duration;

use thiserror::Error;

/// Errors raised while loading, validating, or instantiating a workflow
/// definition. Fatal: raised before any task is dispatched.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading the configuration file failed.
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// The file extension maps to no supported format.
    #[error("unsupported configuration format: {0:?}")]
    UnsupportedFormat(String),

    /// The file contents could not be parsed into a definition.
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    /// A task references an agent that is not declared.
    #[error("task '{task}' references undefined agent '{agent}'")]
    UndefinedAgent {
        /// Referencing task name.
        task: String,
        /// Missing agent name.
        agent: String,
    },

    /// A task depends on a task that is not declared.
    #[error("task '{task}' depends on undefined task '{dependency}'")]
    UndefinedDependency {
        /// Referencing task name.
        task: String,
        /// Missing dependency name.
        dependency: String,
    },

    /// The dependency graph contains a cycle.
    #[error("circular dependency detected involving task '{0}'")]
    CyclicDependency(String),

    /// An agent's type tag is not registered with the effector registry.
    #[error("unknown effector type '{0}'")]
    UnknownEffectorType(String),

    /// An agent requires an endpoint but none is configured.
    #[error("agent '{0}' has no endpoint configured")]
    MissingEndpoint(String),

    /// Building the HTTP client for an agent failed.
    #[error("failed to build HTTP client for agent '{agent}': {message}")]
    HttpClient {
        /// Agent name.
        agent: String,
        /// Underlying builder error.
        message: String,
    },
}

/// Failure of a single effector call, internal to the resilience layer.
///
/// Never propagates out of
/// [`ResilientEffector`](crate::effector::ResilientEffector): the wrapper
/// converts it into a failure response.
#[derive(Debug, Error)]
pub enum EffectorError {
    /// The effector returned a failure response; carries its error text.
    #[error("{0}")]
    Call(String),

    /// The per-call timeout elapsed before the effector answered.
    #[error("Agent execution timeout after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    /// Fast-fail: the agent's circuit breaker is open.
    #[error("Circuit breaker is open")]
    CircuitOpen,

    /// Every retry attempt was consumed; carries the last underlying
    /// error text.
    #[error("all {attempts} attempts failed: {last}")]
    RetryExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// Error text of the final attempt.
        last: String,
    },
}

impl EffectorError {
    /// Fast-fail conditions must not consume retry attempts.
    pub fn is_fast_fail(&self) -> bool {
        matches!(self, EffectorError::CircuitOpen)
    }
}
