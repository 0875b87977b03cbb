//! Task-to-effector dispatch.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{instrument, warn};

use crate::effector::{EffectorRegistry, ResilientEffector};
use crate::error::ConfigError;
use crate::model::{EffectorResponse, TaskRecord, WorkflowDefinition};

/// Resolves a task's agent name to its resilient effector and invokes it.
///
/// Every failure mode is converted into a failure response; dispatching
/// never raises.
pub struct TaskDispatcher {
    effectors: HashMap<String, Arc<ResilientEffector>>,
}

impl fmt::Debug for TaskDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut agents: Vec<&str> = self.effectors.keys().map(String::as_str).collect();
        agents.sort_unstable();
        f.debug_struct("TaskDispatcher").field("agents", &agents).finish()
    }
}

impl TaskDispatcher {
    /// Build one resilient effector per declared agent.
    pub fn from_definition(
        definition: &WorkflowDefinition,
        registry: &EffectorRegistry,
    ) -> Result<Self, ConfigError> {
        let mut effectors = HashMap::new();
        for agent in &definition.agents {
            let effector = registry.build(agent)?;
            effectors.insert(
                agent.name.clone(),
                Arc::new(ResilientEffector::new(agent, effector)),
            );
        }
        Ok(Self { effectors })
    }

    /// The resilient effector registered for `agent`, if any.
    pub fn effector(&self, agent: &str) -> Option<&Arc<ResilientEffector>> {
        self.effectors.get(agent)
    }

    /// Dispatch a task to its agent.
    ///
    /// An unknown agent name produces a failure response without touching
    /// any breaker state.
    #[instrument(skip(self, task), fields(task = %task.name, agent = %task.agent))]
    pub async fn dispatch(&self, task: &TaskRecord) -> EffectorResponse {
        let Some(effector) = self.effectors.get(&task.agent) else {
            warn!("agent not registered");
            return EffectorResponse::failure(format!("Agent '{}' not found", task.agent));
        };
        effector
            .execute_with_resilience(&task.action, &task.parameters)
            .await
    }
}
