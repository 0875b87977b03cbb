//! Circuit breaker + retry composition around one effector.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, instrument, warn};

use super::Effector;
use crate::error::EffectorError;
use crate::model::{AgentDefinition, EffectorResponse};
use crate::resilience::{BreakerState, CircuitBreaker, RetryExecutor};

/// One effector wrapped with the owning agent's circuit breaker and retry
/// policies. This is the unit registered per configured agent; the breaker
/// and retry state are shared by every task routed to the agent.
pub struct ResilientEffector {
    name: String,
    effector: Arc<dyn Effector>,
    breaker: CircuitBreaker,
    retry: RetryExecutor,
    call_timeout: Duration,
}

impl std::fmt::Debug for ResilientEffector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientEffector")
            .field("name", &self.name)
            .field("breaker", &self.breaker.state())
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}

impl ResilientEffector {
    /// Wrap `effector` with the agent's resilience policies.
    pub fn new(definition: &AgentDefinition, effector: Arc<dyn Effector>) -> Self {
        Self {
            name: definition.name.clone(),
            effector,
            breaker: CircuitBreaker::new(&definition.circuit_breaker),
            retry: RetryExecutor::new(&definition.retry_policy),
            call_timeout: definition.call_timeout(),
        }
    }

    /// Current state of the agent's circuit breaker.
    pub fn breaker_state(&self) -> BreakerState {
        self.breaker.state()
    }

    /// Execute `action` through the breaker gate and the retry executor.
    ///
    /// Never returns an error: a blocked gate produces a fast-fail
    /// response without touching the breaker counters; each attempt is
    /// bounded by the agent's per-call timeout and a timed-out attempt
    /// counts as a failed attempt; the breaker records exactly one success
    /// or failure per wrapped call.
    #[instrument(skip(self, parameters), fields(agent = %self.name, action = %action))]
    pub async fn execute_with_resilience(
        &self,
        action: &str,
        parameters: &HashMap<String, Value>,
    ) -> EffectorResponse {
        let start = Instant::now();

        if !self.breaker.can_execute() {
            debug!("circuit open, fast-failing");
            return EffectorResponse::failure("Circuit breaker is open")
                .with_elapsed(start.elapsed());
        }

        let effector = Arc::clone(&self.effector);
        let call_timeout = self.call_timeout;
        let outcome = self
            .retry
            .run(move |_attempt| {
                let effector = Arc::clone(&effector);
                async move {
                    match tokio::time::timeout(
                        call_timeout,
                        effector.execute(action, parameters),
                    )
                    .await
                    {
                        Ok(response) if response.success => Ok(response),
                        Ok(response) => Err(EffectorError::Call(
                            response
                                .error
                                .unwrap_or_else(|| "Unknown error".to_string()),
                        )),
                        Err(_) => Err(EffectorError::Timeout(call_timeout)),
                    }
                }
            })
            .await;

        match outcome {
            Ok(response) => {
                self.breaker.record_success();
                response.with_elapsed(start.elapsed())
            }
            Err(error) => {
                self.breaker.record_failure();
                warn!(error = %error, "call failed after resilience handling");
                let message = match error {
                    EffectorError::RetryExhausted { last, .. } => last,
                    other => other.to_string(),
                };
                EffectorResponse::failure(message).with_elapsed(start.elapsed())
            }
        }
    }
}
