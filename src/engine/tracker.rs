//! Dependency-aware execution state for one workflow run.
//!
//! The tracker owns the [`WorkflowRecord`] and performs every state
//! transition; nothing else mutates the records. Terminal task statuses
//! are immutable: outcomes arriving after a task (or the whole workflow)
//! has settled are discarded.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, warn};

use super::events::{EventNotifier, WorkflowEvent};
use crate::model::{
    FailureStrategy, TaskRecord, TaskStatus, WorkflowDefinition, WorkflowRecord, WorkflowStatus,
};

/// State machine for task and workflow execution records.
#[derive(Debug)]
pub struct StateTracker {
    record: Mutex<WorkflowRecord>,
    dependencies: HashMap<String, Vec<String>>,
    continue_on_failure: HashMap<String, bool>,
    strategy: FailureStrategy,
    notifier: EventNotifier,
}

impl StateTracker {
    /// Seed a tracker from a validated definition.
    pub fn new(definition: &WorkflowDefinition, notifier: EventNotifier) -> Self {
        let dependencies = definition
            .tasks
            .iter()
            .map(|t| (t.name.clone(), t.depends_on.clone()))
            .collect();
        let continue_on_failure = definition
            .tasks
            .iter()
            .map(|t| (t.name.clone(), t.continue_on_failure))
            .collect();
        Self {
            record: Mutex::new(WorkflowRecord::from_definition(definition)),
            dependencies,
            continue_on_failure,
            strategy: definition.failure_strategy,
            notifier,
        }
    }

    /// Transition the workflow from PENDING to RUNNING.
    pub fn start_workflow(&self) {
        let event = {
            let mut record = self.record.lock().expect("tracker lock poisoned");
            if record.status != WorkflowStatus::Pending {
                return;
            }
            record.status = WorkflowStatus::Running;
            record.start_time = Some(Utc::now());
            WorkflowEvent::WorkflowStarted {
                workflow_id: record.id.clone(),
                name: record.name.clone(),
            }
        };
        self.notifier.emit(event);
    }

    /// Dispatch `name`: PENDING → RUNNING (dependencies must all be
    /// COMPLETED) or RETRYING → RUNNING. Increments the attempt counter.
    ///
    /// Returns false, without mutating anything, when the transition is
    /// not legal — the workflow is already terminal, the task is not
    /// dispatchable, or a dependency is incomplete.
    pub fn start_task(&self, name: &str) -> bool {
        let event = {
            let mut record = self.record.lock().expect("tracker lock poisoned");
            if record.status.is_terminal() {
                return false;
            }
            if !self.dependencies_completed(&record, name) {
                warn!(task = name, "refusing dispatch: incomplete dependency");
                return false;
            }
            let Some(task) = record.tasks.iter_mut().find(|t| t.name == name) else {
                return false;
            };
            match task.status {
                TaskStatus::Pending | TaskStatus::Retrying => {}
                other => {
                    warn!(task = name, status = %other, "refusing dispatch: not dispatchable");
                    return false;
                }
            }
            task.status = TaskStatus::Running;
            task.attempts += 1;
            task.start_time = Some(Utc::now());
            let attempt = task.attempts;
            debug!(task = name, attempt, "task started");
            WorkflowEvent::TaskStarted {
                workflow_id: record.id.clone(),
                task: name.to_string(),
                attempt,
            }
        };
        self.notifier.emit(event);
        true
    }

    /// Apply a successful outcome: RUNNING → COMPLETED.
    pub fn complete_task(&self, name: &str, result: Value) {
        let mut events = Vec::new();
        {
            let mut record = self.record.lock().expect("tracker lock poisoned");
            if record.status.is_terminal() {
                debug!(task = name, "discarding late success");
                return;
            }
            let Some(task) = record.tasks.iter_mut().find(|t| t.name == name) else {
                return;
            };
            if task.status != TaskStatus::Running {
                return;
            }
            task.status = TaskStatus::Completed;
            task.end_time = Some(Utc::now());
            task.result = Some(result);
            record.completed_count += 1;
            debug!(task = name, "task completed");
            events.push(WorkflowEvent::TaskCompleted {
                workflow_id: record.id.clone(),
                task: name.to_string(),
            });
            if all_terminal(&record) {
                let partial_allowed = self.partial_allowed(&record);
                if let Some(event) = finalize(&mut record, partial_allowed) {
                    events.push(event);
                }
            }
        }
        for event in events {
            self.notifier.emit(event);
        }
    }

    /// Apply a failed outcome: RUNNING → RETRYING while attempts remain,
    /// RUNNING → FAILED otherwise. A permanent failure that is not
    /// tolerated by the failure policy forces the workflow to FAILED and
    /// stops further scheduling.
    pub fn fail_task(&self, name: &str, error: &str) {
        let mut events = Vec::new();
        {
            let mut record = self.record.lock().expect("tracker lock poisoned");
            if record.status.is_terminal() {
                debug!(task = name, "discarding late failure");
                return;
            }
            let Some(task) = record.tasks.iter_mut().find(|t| t.name == name) else {
                return;
            };
            if task.status != TaskStatus::Running {
                return;
            }
            task.error = Some(error.to_string());
            task.end_time = Some(Utc::now());
            if task.attempts < task.max_attempts {
                task.status = TaskStatus::Retrying;
                let attempt = task.attempts;
                debug!(task = name, attempt, "task will be retried");
                events.push(WorkflowEvent::TaskRetry {
                    workflow_id: record.id.clone(),
                    task: name.to_string(),
                    attempt,
                    error: error.to_string(),
                });
            } else {
                task.status = TaskStatus::Failed;
                record.failed_count += 1;
                warn!(task = name, error, "task failed permanently");
                events.push(WorkflowEvent::TaskFailed {
                    workflow_id: record.id.clone(),
                    task: name.to_string(),
                    error: error.to_string(),
                });
                if !self.tolerates_failure(name) {
                    let reason = format!("Task '{name}' failed: {error}");
                    if let Some(event) = force_fail(&mut record, &reason) {
                        events.push(event);
                    }
                } else if all_terminal(&record) {
                    let partial_allowed = self.partial_allowed(&record);
                    if let Some(event) = finalize(&mut record, partial_allowed) {
                        events.push(event);
                    }
                }
            }
        }
        for event in events {
            self.notifier.emit(event);
        }
    }

    /// Resolve the final workflow status once no task is dispatchable.
    pub fn complete_workflow(&self) {
        let event = {
            let mut record = self.record.lock().expect("tracker lock poisoned");
            let partial_allowed = self.partial_allowed(&record);
            finalize(&mut record, partial_allowed)
        };
        if let Some(event) = event {
            self.notifier.emit(event);
        }
    }

    /// Force the workflow to FAILED (global timeout, intolerable task
    /// failure). In-flight tasks keep running; their late outcomes are
    /// discarded.
    pub fn fail_workflow(&self, error: &str) {
        let event = {
            let mut record = self.record.lock().expect("tracker lock poisoned");
            force_fail(&mut record, error)
        };
        if let Some(event) = event {
            self.notifier.emit(event);
        }
    }

    /// Cancel the run: the workflow record becomes CANCELLED immediately
    /// and every non-terminal task is cancelled with it.
    pub fn cancel(&self) {
        let mut record = self.record.lock().expect("tracker lock poisoned");
        if record.status.is_terminal() {
            return;
        }
        let now = Utc::now();
        record.status = WorkflowStatus::Cancelled;
        record.end_time = Some(now);
        for task in &mut record.tasks {
            if !task.status.is_terminal() {
                task.status = TaskStatus::Cancelled;
                task.end_time = Some(now);
            }
        }
        warn!(workflow = %record.name, "workflow cancelled");
    }

    /// Names of PENDING tasks whose dependencies are all COMPLETED, in
    /// declaration order.
    pub fn ready_tasks(&self) -> Vec<String> {
        let record = self.record.lock().expect("tracker lock poisoned");
        record
            .tasks
            .iter()
            .filter(|t| {
                t.status == TaskStatus::Pending && self.dependencies_completed(&record, &t.name)
            })
            .map(|t| t.name.clone())
            .collect()
    }

    /// Names of tasks currently RETRYING, in declaration order.
    pub fn retryable_tasks(&self) -> Vec<String> {
        let record = self.record.lock().expect("tracker lock poisoned");
        record
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Retrying)
            .map(|t| t.name.clone())
            .collect()
    }

    /// Whether every task has settled.
    pub fn all_terminal(&self) -> bool {
        let record = self.record.lock().expect("tracker lock poisoned");
        all_terminal(&record)
    }

    /// Whether the workflow record has reached a terminal status.
    pub fn workflow_terminal(&self) -> bool {
        self.record
            .lock()
            .expect("tracker lock poisoned")
            .status
            .is_terminal()
    }

    /// A point-in-time copy of the workflow record.
    pub fn snapshot(&self) -> WorkflowRecord {
        self.record.lock().expect("tracker lock poisoned").clone()
    }

    /// A point-in-time copy of one task record.
    pub fn task_snapshot(&self, name: &str) -> Option<TaskRecord> {
        self.record
            .lock()
            .expect("tracker lock poisoned")
            .task(name)
            .cloned()
    }

    fn dependencies_completed(&self, record: &WorkflowRecord, name: &str) -> bool {
        let Some(deps) = self.dependencies.get(name) else {
            return true;
        };
        deps.iter().all(|dep| {
            record
                .task(dep)
                .map(|t| t.status == TaskStatus::Completed)
                .unwrap_or(false)
        })
    }

    /// Whether a permanent failure of `name` leaves the workflow running.
    /// The per-task flag takes precedence over the workflow strategy.
    fn tolerates_failure(&self, name: &str) -> bool {
        if self.continue_on_failure.get(name).copied().unwrap_or(false) {
            return true;
        }
        self.strategy != FailureStrategy::StopOnFirstFailure
    }

    /// Whether a PARTIALLY_COMPLETED outcome is permitted: either the
    /// workflow strategy allows it, or every failed task carries
    /// `continue_on_failure`.
    fn partial_allowed(&self, record: &WorkflowRecord) -> bool {
        if self.strategy == FailureStrategy::PartialCompletionAllowed {
            return true;
        }
        let failed: Vec<&TaskRecord> = record
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Failed)
            .collect();
        !failed.is_empty()
            && failed.iter().all(|t| {
                self.continue_on_failure
                    .get(&t.name)
                    .copied()
                    .unwrap_or(false)
            })
    }
}

fn all_terminal(record: &WorkflowRecord) -> bool {
    record.tasks.iter().all(|t| t.status.is_terminal())
}

fn finalize(record: &mut WorkflowRecord, partial_allowed: bool) -> Option<WorkflowEvent> {
    if record.status != WorkflowStatus::Running {
        return None;
    }
    record.status = if record.failed_count == 0 {
        WorkflowStatus::Completed
    } else if record.completed_count > 0 && partial_allowed {
        WorkflowStatus::PartiallyCompleted
    } else {
        WorkflowStatus::Failed
    };
    record.end_time = Some(Utc::now());
    debug!(workflow = %record.name, status = %record.status, "workflow finished");
    Some(WorkflowEvent::WorkflowCompleted {
        workflow_id: record.id.clone(),
        status: record.status,
    })
}

fn force_fail(record: &mut WorkflowRecord, error: &str) -> Option<WorkflowEvent> {
    if record.status.is_terminal() {
        return None;
    }
    record.status = WorkflowStatus::Failed;
    record.end_time = Some(Utc::now());
    warn!(workflow = %record.name, error, "workflow failed");
    Some(WorkflowEvent::WorkflowFailed {
        workflow_id: record.id.clone(),
        error: error.to_string(),
    })
}
