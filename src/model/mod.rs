//! Shared data model for workflow definitions, runtime execution records,
//! and effector call outcomes.
//!
//! Definition types (`WorkflowDefinition`, `AgentDefinition`,
//! `TaskDefinition`) are immutable once loaded. Runtime records
//! (`WorkflowRecord`, `TaskRecord`) are created when a run starts and are
//! mutated exclusively by the engine's state tracker.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Execution status of a single task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting for its dependencies to complete.
    Pending,
    /// Currently dispatched to an effector.
    Running,
    /// Failed with attempts remaining; eligible for re-dispatch.
    Retrying,
    /// Finished successfully. Terminal.
    Completed,
    /// Failed with no attempts remaining. Terminal.
    Failed,
    /// Cancelled before completion. Terminal.
    Cancelled,
}

impl TaskStatus {
    /// True once the task can never change status again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Retrying => "retrying",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Execution status of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Created but not yet started.
    Pending,
    /// The orchestration loop is active.
    Running,
    /// Every task completed. Terminal.
    Completed,
    /// The run failed outright. Terminal.
    Failed,
    /// Cancelled by an external request. Terminal.
    Cancelled,
    /// Some tasks succeeded and the failure policy permits a partial
    /// outcome. Terminal.
    PartiallyCompleted,
}

impl WorkflowStatus {
    /// True once the workflow record can never change status again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WorkflowStatus::Completed
                | WorkflowStatus::Failed
                | WorkflowStatus::Cancelled
                | WorkflowStatus::PartiallyCompleted
        )
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkflowStatus::Pending => "pending",
            WorkflowStatus::Running => "running",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Failed => "failed",
            WorkflowStatus::Cancelled => "cancelled",
            WorkflowStatus::PartiallyCompleted => "partially_completed",
        };
        f.write_str(s)
    }
}

/// Policy applied when a task fails permanently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStrategy {
    /// Stop scheduling and fail the workflow on the first intolerable
    /// task failure.
    #[default]
    StopOnFirstFailure,
    /// Keep scheduling remaining tasks; the workflow still ends FAILED if
    /// any task failed.
    ContinueOnFailure,
    /// Keep scheduling remaining tasks and permit a PARTIALLY_COMPLETED
    /// terminal status.
    PartialCompletionAllowed,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> f64 {
    1.0
}

fn default_max_delay() -> f64 {
    60.0
}

fn default_exponential_base() -> f64 {
    2.0
}

fn default_jitter() -> bool {
    true
}

/// Retry policy for repeated invocation of a failing operation.
///
/// Delays are expressed in seconds, matching the workflow file format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry, in seconds.
    #[serde(default = "default_initial_delay")]
    pub initial_delay: f64,

    /// Upper bound on any single delay, in seconds.
    #[serde(default = "default_max_delay")]
    pub max_delay: f64,

    /// Multiplier applied to the delay after each failed attempt.
    #[serde(default = "default_exponential_base")]
    pub exponential_base: f64,

    /// Randomize each delay by up to ±10% to avoid synchronized retries.
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            exponential_base: default_exponential_base(),
            jitter: default_jitter(),
        }
    }
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_recovery_timeout() -> f64 {
    60.0
}

/// Circuit breaker policy for a single agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerPolicy {
    /// Consecutive failures required to open the circuit.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Seconds the circuit stays open before admitting a trial call.
    #[serde(default = "default_recovery_timeout")]
    pub recovery_timeout: f64,
}

impl Default for CircuitBreakerPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            recovery_timeout: default_recovery_timeout(),
        }
    }
}

fn default_api_key_header() -> String {
    "X-API-Key".to_string()
}

/// Authentication settings for an agent endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Authentication scheme: `bearer`, `api_key`, or `basic`.
    #[serde(rename = "type", default)]
    pub auth_type: String,

    /// Bearer token.
    #[serde(default)]
    pub token: Option<String>,

    /// API key value.
    #[serde(default)]
    pub key: Option<String>,

    /// Header carrying the API key.
    #[serde(default = "default_api_key_header")]
    pub header: String,

    /// Username for basic authentication.
    #[serde(default)]
    pub username: Option<String>,

    /// Password for basic authentication.
    #[serde(default)]
    pub password: Option<String>,
}

fn default_call_timeout() -> f64 {
    30.0
}

fn default_version() -> String {
    "1.0.0".to_string()
}

/// A remote service that tasks can be delegated to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefinition {
    /// Unique agent name, referenced by tasks.
    pub name: String,

    /// Effector type tag resolved against the engine's registry,
    /// e.g. `ai_agent`, `mcp_server`, `http_api`.
    #[serde(rename = "type")]
    pub kind: String,

    /// Service endpoint URL.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Optional authentication descriptor.
    #[serde(default)]
    pub authentication: Option<AuthConfig>,

    /// Per-call timeout in seconds.
    #[serde(default = "default_call_timeout")]
    pub timeout: f64,

    /// Retry policy for individual calls to this agent.
    #[serde(default, alias = "retry_config")]
    pub retry_policy: RetryPolicy,

    /// Circuit breaker policy shared by every task routed to this agent.
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerPolicy,

    /// Extra payload fields merged into every AI effector request.
    #[serde(default)]
    pub custom_params: HashMap<String, Value>,
}

impl AgentDefinition {
    /// Per-call timeout as a [`Duration`].
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout)
    }
}

/// One unit of work inside a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDefinition {
    /// Unique task name.
    pub name: String,

    /// Human-readable description.
    #[serde(default)]
    pub description: Option<String>,

    /// Name of the agent this task is dispatched to.
    #[serde(alias = "agent_name")]
    pub agent: String,

    /// Action passed to the effector (tool name, HTTP verb, ...).
    pub action: String,

    /// Opaque parameter map forwarded to the effector.
    #[serde(default)]
    pub parameters: HashMap<String, Value>,

    /// Per-call timeout in seconds.
    #[serde(default = "default_call_timeout")]
    pub timeout: f64,

    /// Retry policy for tracker-level re-dispatch of the whole task.
    #[serde(default, alias = "retry_config")]
    pub retry_policy: RetryPolicy,

    /// Names of tasks that must complete before this one starts.
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Tolerate this task failing permanently without failing the
    /// workflow, regardless of the workflow-level failure strategy.
    #[serde(default)]
    pub continue_on_failure: bool,
}

/// A validated, immutable workflow description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Workflow name.
    pub name: String,

    /// Human-readable description.
    #[serde(default)]
    pub description: Option<String>,

    /// Definition version string.
    #[serde(default = "default_version")]
    pub version: String,

    /// Tasks, in declaration order.
    pub tasks: Vec<TaskDefinition>,

    /// Agents tasks may be dispatched to.
    pub agents: Vec<AgentDefinition>,

    /// Overall run timeout in seconds; `None` means unbounded.
    #[serde(default)]
    pub global_timeout: Option<f64>,

    /// Dispatch every ready task concurrently instead of one per tick.
    #[serde(default, alias = "parallel_execution")]
    pub parallel: bool,

    /// Workflow-level failure policy.
    #[serde(default)]
    pub failure_strategy: FailureStrategy,
}

/// Runtime record of a single task. One record per [`TaskDefinition`],
/// created at run start, immutable once terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Unique record id.
    pub id: String,

    /// Task name, copied from the definition.
    pub name: String,

    /// Current status.
    pub status: TaskStatus,

    /// Time the task first entered RUNNING.
    pub start_time: Option<DateTime<Utc>>,

    /// Time the task last produced an outcome.
    pub end_time: Option<DateTime<Utc>>,

    /// Number of dispatches so far. Never exceeds `max_attempts`.
    pub attempts: u32,

    /// Dispatch budget, copied from the task's retry policy.
    pub max_attempts: u32,

    /// Result value, present once COMPLETED.
    pub result: Option<Value>,

    /// Error text from the most recent failure.
    pub error: Option<String>,

    /// Agent the task is dispatched to.
    pub agent: String,

    /// Action forwarded to the effector.
    pub action: String,

    /// Parameters forwarded to the effector.
    pub parameters: HashMap<String, Value>,
}

impl TaskRecord {
    /// Seed a pending record from a task definition.
    pub fn from_definition(definition: &TaskDefinition) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: definition.name.clone(),
            status: TaskStatus::Pending,
            start_time: None,
            end_time: None,
            attempts: 0,
            max_attempts: definition.retry_policy.max_attempts,
            result: None,
            error: None,
            agent: definition.agent.clone(),
            action: definition.action.clone(),
            parameters: definition.parameters.clone(),
        }
    }
}

/// Runtime record of one workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRecord {
    /// Unique run id.
    pub id: String,

    /// Workflow name.
    pub name: String,

    /// Current status.
    pub status: WorkflowStatus,

    /// Time the run entered RUNNING.
    pub start_time: Option<DateTime<Utc>>,

    /// Time the run reached a terminal status.
    pub end_time: Option<DateTime<Utc>>,

    /// Task records, in declaration order.
    pub tasks: Vec<TaskRecord>,

    /// Number of COMPLETED tasks.
    pub completed_count: usize,

    /// Number of FAILED tasks.
    pub failed_count: usize,

    /// Total number of tasks; fixed at run creation.
    pub total_count: usize,

    /// Whether the failure strategy permits a partial outcome.
    pub partial_completion_allowed: bool,
}

impl WorkflowRecord {
    /// Seed a pending record from a workflow definition.
    pub fn from_definition(definition: &WorkflowDefinition) -> Self {
        let tasks: Vec<TaskRecord> = definition
            .tasks
            .iter()
            .map(TaskRecord::from_definition)
            .collect();
        Self {
            id: Uuid::new_v4().to_string(),
            name: definition.name.clone(),
            status: WorkflowStatus::Pending,
            start_time: None,
            end_time: None,
            total_count: tasks.len(),
            tasks,
            completed_count: 0,
            failed_count: 0,
            partial_completion_allowed: definition.failure_strategy
                == FailureStrategy::PartialCompletionAllowed,
        }
    }

    /// Look up a task record by name.
    pub fn task(&self, name: &str) -> Option<&TaskRecord> {
        self.tasks.iter().find(|t| t.name == name)
    }

    /// Fraction of tasks completed, in `[0, 100]`.
    pub fn progress(&self) -> f64 {
        if self.total_count == 0 {
            return 0.0;
        }
        (self.completed_count as f64 / self.total_count as f64) * 100.0
    }
}

/// Outcome of a single effector call.
///
/// Every failure mode is represented as `success == false` with `error`
/// populated; the call path never raises across the dispatch boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectorResponse {
    /// Whether the call succeeded.
    pub success: bool,

    /// Decoded result, present iff `success`.
    pub result: Option<Value>,

    /// Error text, present iff not `success`.
    pub error: Option<String>,

    /// Wall-clock duration of the call, including retries.
    #[serde(default)]
    pub elapsed: Duration,

    /// Protocol-specific extras such as the HTTP status code.
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl EffectorResponse {
    /// A successful response carrying `result`.
    pub fn ok(result: Value) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
            elapsed: Duration::ZERO,
            metadata: HashMap::new(),
        }
    }

    /// A failure response carrying `error`.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
            elapsed: Duration::ZERO,
            metadata: HashMap::new(),
        }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    /// Overwrite the measured duration.
    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = elapsed;
        self
    }
}

/// Aggregate outcome of a workflow run, derived exactly once when the run
/// reaches a terminal status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowResult {
    /// Run id.
    pub workflow_id: String,

    /// Terminal workflow status.
    pub status: WorkflowStatus,

    /// Number of COMPLETED tasks.
    pub completed_count: usize,

    /// Number of FAILED tasks.
    pub failed_count: usize,

    /// Total number of tasks.
    pub total_count: usize,

    /// Wall-clock duration of the run.
    pub elapsed: Duration,

    /// Results of completed tasks, keyed by task name.
    pub results: HashMap<String, Value>,

    /// Errors of failed tasks, keyed by task name.
    pub errors: HashMap<String, String>,
}

impl WorkflowResult {
    /// Derive the aggregate result from a terminal workflow record.
    pub fn from_record(record: &WorkflowRecord, elapsed: Duration) -> Self {
        let mut results = HashMap::new();
        let mut errors = HashMap::new();
        for task in &record.tasks {
            match task.status {
                TaskStatus::Completed => {
                    if let Some(result) = &task.result {
                        results.insert(task.name.clone(), result.clone());
                    }
                }
                TaskStatus::Failed => {
                    if let Some(error) = &task.error {
                        errors.insert(task.name.clone(), error.clone());
                    }
                }
                _ => {}
            }
        }
        Self {
            workflow_id: record.id.clone(),
            status: record.status,
            completed_count: record.completed_count,
            failed_count: record.failed_count,
            total_count: record.total_count,
            elapsed,
            results,
            errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_policy_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_delay, 1.0);
        assert_eq!(policy.max_delay, 60.0);
        assert_eq!(policy.exponential_base, 2.0);
        assert!(policy.jitter);
    }

    #[test]
    fn terminal_statuses() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
        assert!(!TaskStatus::Retrying.is_terminal());
        assert!(WorkflowStatus::PartiallyCompleted.is_terminal());
        assert!(!WorkflowStatus::Running.is_terminal());
    }

    #[test]
    fn record_seeding_fixes_totals() {
        let definition: WorkflowDefinition = serde_yaml::from_str(
            r#"
            name: demo
            agents:
              - name: svc
                type: http_api
                endpoint: http://localhost:9999
            tasks:
              - name: first
                agent: svc
                action: GET
              - name: second
                agent: svc
                action: GET
                depends_on: [first]
            "#,
        )
        .unwrap();
        let record = WorkflowRecord::from_definition(&definition);
        assert_eq!(record.total_count, 2);
        assert_eq!(record.status, WorkflowStatus::Pending);
        assert!(record.tasks.iter().all(|t| t.status == TaskStatus::Pending));
        assert_eq!(record.tasks[0].max_attempts, 3);
    }
}
