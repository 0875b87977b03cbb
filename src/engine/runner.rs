//! The workflow engine: construction, the scheduling loop, and run
//! finalization.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{error, info, instrument, warn};

use super::dispatcher::TaskDispatcher;
use super::events::{EventNotifier, WorkflowEvent};
use super::tracker::StateTracker;
use crate::config;
use crate::effector::EffectorRegistry;
use crate::error::ConfigError;
use crate::model::{EffectorResponse, WorkflowDefinition, WorkflowRecord, WorkflowResult};

/// Orchestrates one workflow run to a terminal status.
///
/// Construction validates the definition and instantiates one resilient
/// effector per declared agent; [`Engine::run`] then drives the
/// dependency-driven scheduling loop until every task has settled (or the
/// run is cancelled or times out) and derives the aggregate
/// [`WorkflowResult`].
pub struct Engine {
    definition: Arc<WorkflowDefinition>,
    dispatcher: Arc<TaskDispatcher>,
    tracker: Arc<StateTracker>,
    notifier: EventNotifier,
    started: AtomicBool,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("workflow", &self.definition.name)
            .field("parallel", &self.definition.parallel)
            .field("tasks", &self.definition.tasks.len())
            .finish()
    }
}

impl Engine {
    /// Build an engine for `definition` using the built-in effector kinds.
    pub fn new(definition: WorkflowDefinition) -> Result<Self, ConfigError> {
        Self::with_registry(definition, EffectorRegistry::with_defaults())
    }

    /// Build an engine resolving agent type tags against `registry`.
    pub fn with_registry(
        definition: WorkflowDefinition,
        registry: EffectorRegistry,
    ) -> Result<Self, ConfigError> {
        config::validate(&definition)?;
        let dispatcher = TaskDispatcher::from_definition(&definition, &registry)?;
        let notifier = EventNotifier::new();
        let tracker = StateTracker::new(&definition, notifier.clone());
        info!(
            workflow = %definition.name,
            tasks = definition.tasks.len(),
            agents = definition.agents.len(),
            "engine ready"
        );
        Ok(Self {
            definition: Arc::new(definition),
            dispatcher: Arc::new(dispatcher),
            tracker: Arc::new(tracker),
            notifier,
            started: AtomicBool::new(false),
        })
    }

    /// Open a subscription to the run's lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.notifier.subscribe()
    }

    /// A point-in-time copy of the workflow execution record.
    pub fn snapshot(&self) -> WorkflowRecord {
        self.tracker.snapshot()
    }

    /// Request cooperative cancellation. The workflow record becomes
    /// CANCELLED immediately; the loop observes it at the next tick
    /// boundary and in-flight effector calls run to their own timeout,
    /// their late outcomes discarded.
    pub fn cancel(&self) {
        self.tracker.cancel();
    }

    /// Run the workflow to a terminal status and derive the aggregate
    /// result. A second call returns the result of the already-driven run.
    #[instrument(skip(self), fields(workflow = %self.definition.name))]
    pub async fn run(&self) -> WorkflowResult {
        let start = Instant::now();
        if self.started.swap(true, Ordering::SeqCst) {
            warn!("run already started, returning current state");
            return WorkflowResult::from_record(&self.tracker.snapshot(), start.elapsed());
        }

        self.tracker.start_workflow();
        match self.definition.global_timeout {
            Some(seconds) => {
                let budget = Duration::from_secs_f64(seconds);
                if tokio::time::timeout(budget, self.drive()).await.is_err() {
                    error!(timeout_secs = seconds, "global timeout expired");
                    self.tracker.fail_workflow("Workflow timeout");
                }
            }
            None => self.drive().await,
        }
        if !self.tracker.workflow_terminal() {
            self.tracker.complete_workflow();
        }

        let record = self.tracker.snapshot();
        let result = WorkflowResult::from_record(&record, start.elapsed());
        info!(
            status = %result.status,
            completed = result.completed_count,
            failed = result.failed_count,
            total = result.total_count,
            "run finished"
        );
        result
    }

    /// Tick until no task is ready or retryable, or the workflow record
    /// turns terminal (cancellation, intolerable failure).
    async fn drive(&self) {
        loop {
            if self.tracker.workflow_terminal() {
                break;
            }
            let ready = self.tracker.ready_tasks();
            let retryable = self.tracker.retryable_tasks();
            if ready.is_empty() && retryable.is_empty() {
                break;
            }

            if self.definition.parallel {
                let batch: Vec<String> = ready.into_iter().chain(retryable).collect();
                join_all(batch.into_iter().map(|name| self.run_task(name))).await;
            } else {
                // One dispatch per tick: first ready task in declaration
                // order, else first retryable.
                let name = ready
                    .into_iter()
                    .next()
                    .or_else(|| retryable.into_iter().next())
                    .expect("non-empty batch");
                self.run_task(name).await;
            }

            tokio::task::yield_now().await;
        }
    }

    /// Dispatch one task and apply its outcome. A panicking dispatch is
    /// converted into an ordinary task failure so it cannot corrupt
    /// sibling task state.
    async fn run_task(&self, name: String) {
        if !self.tracker.start_task(&name) {
            return;
        }
        let Some(task) = self.tracker.task_snapshot(&name) else {
            return;
        };

        let dispatcher = Arc::clone(&self.dispatcher);
        let handle = tokio::spawn(async move { dispatcher.dispatch(&task).await });
        let response: EffectorResponse = match handle.await {
            Ok(response) => response,
            Err(join_error) => {
                error!(task = %name, error = %join_error, "dispatch raised unexpectedly");
                EffectorResponse::failure(format!("Task execution failed: {join_error}"))
            }
        };

        if response.success {
            self.tracker
                .complete_task(&name, response.result.unwrap_or(Value::Null));
        } else {
            self.tracker
                .fail_task(&name, response.error.as_deref().unwrap_or("Unknown error"));
        }
    }
}
