use std::collections::HashMap;

use proptest::prelude::*;
use serde_json::json;

use conductor::engine::{EventNotifier, StateTracker};
use conductor::model::{
    FailureStrategy, RetryPolicy, TaskDefinition, TaskStatus, WorkflowDefinition, WorkflowStatus,
};

fn task(name: &str, depends_on: Vec<String>, max_attempts: u32) -> TaskDefinition {
    TaskDefinition {
        name: name.to_string(),
        description: None,
        agent: "worker".to_string(),
        action: "run".to_string(),
        parameters: HashMap::new(),
        timeout: 5.0,
        retry_policy: RetryPolicy {
            max_attempts,
            ..RetryPolicy::default()
        },
        depends_on,
        continue_on_failure: false,
    }
}

fn definition(tasks: Vec<TaskDefinition>, strategy: FailureStrategy) -> WorkflowDefinition {
    WorkflowDefinition {
        name: "tracker-test".to_string(),
        description: None,
        version: "1.0.0".to_string(),
        tasks,
        agents: Vec::new(),
        global_timeout: None,
        parallel: false,
        failure_strategy: strategy,
    }
}

fn tracker(tasks: Vec<TaskDefinition>, strategy: FailureStrategy) -> StateTracker {
    let tracker = StateTracker::new(&definition(tasks, strategy), EventNotifier::new());
    tracker.start_workflow();
    tracker
}

#[test]
fn ready_tasks_require_completed_dependencies() {
    let t = tracker(
        vec![
            task("fetch", vec![], 1),
            task("parse", vec!["fetch".to_string()], 1),
        ],
        FailureStrategy::StopOnFirstFailure,
    );

    assert_eq!(t.ready_tasks(), vec!["fetch".to_string()]);
    assert!(!t.start_task("parse"));

    assert!(t.start_task("fetch"));
    assert!(t.ready_tasks().is_empty());
    t.complete_task("fetch", json!("done"));
    assert_eq!(t.ready_tasks(), vec!["parse".to_string()]);
}

#[test]
fn terminal_task_records_are_immutable() {
    let t = tracker(
        vec![task("only", vec![], 1)],
        FailureStrategy::StopOnFirstFailure,
    );
    assert!(t.start_task("only"));
    t.complete_task("only", json!(1));

    t.fail_task("only", "late failure");
    t.complete_task("only", json!(2));

    let record = t.snapshot();
    let only = record.task("only").unwrap();
    assert_eq!(only.status, TaskStatus::Completed);
    assert_eq!(only.result, Some(json!(1)));
    assert!(only.error.is_none());
}

#[test]
fn failure_with_remaining_attempts_transitions_to_retrying() {
    let t = tracker(
        vec![task("wobbly", vec![], 3)],
        FailureStrategy::StopOnFirstFailure,
    );
    assert!(t.start_task("wobbly"));
    t.fail_task("wobbly", "try again");

    let record = t.snapshot();
    let wobbly = record.task("wobbly").unwrap();
    assert_eq!(wobbly.status, TaskStatus::Retrying);
    assert_eq!(wobbly.attempts, 1);
    assert_eq!(t.retryable_tasks(), vec!["wobbly".to_string()]);

    // Re-dispatch increments the attempt counter again.
    assert!(t.start_task("wobbly"));
    assert_eq!(t.snapshot().task("wobbly").unwrap().attempts, 2);
}

#[test]
fn task_failing_at_max_attempts_is_never_dispatched_again() {
    let t = tracker(
        vec![task("doomed", vec![], 2)],
        FailureStrategy::PartialCompletionAllowed,
    );
    for _ in 0..2 {
        assert!(t.start_task("doomed"));
        t.fail_task("doomed", "nope");
    }

    let record = t.snapshot();
    let doomed = record.task("doomed").unwrap();
    assert_eq!(doomed.status, TaskStatus::Failed);
    assert_eq!(doomed.attempts, doomed.max_attempts);
    assert!(t.retryable_tasks().is_empty());
    assert!(!t.start_task("doomed"));
}

#[test]
fn intolerable_failure_forces_workflow_failed_early() {
    let t = tracker(
        vec![task("gate", vec![], 1), task("after", vec![], 1)],
        FailureStrategy::StopOnFirstFailure,
    );
    assert!(t.start_task("gate"));
    t.fail_task("gate", "broken");

    let record = t.snapshot();
    assert_eq!(record.status, WorkflowStatus::Failed);
    assert_eq!(record.task("after").unwrap().status, TaskStatus::Pending);
    // Terminal workflow: nothing further can be dispatched.
    assert!(!t.start_task("after"));
}

#[test]
fn all_tasks_completed_resolves_workflow_completed() {
    let t = tracker(
        vec![task("a", vec![], 1), task("b", vec![], 1)],
        FailureStrategy::StopOnFirstFailure,
    );
    for name in ["a", "b"] {
        assert!(t.start_task(name));
        t.complete_task(name, json!(name));
    }
    let record = t.snapshot();
    assert_eq!(record.status, WorkflowStatus::Completed);
    assert_eq!(record.completed_count, 2);
    assert_eq!(record.failed_count, 0);
}

#[test]
fn cancellation_discards_late_outcomes() {
    let t = tracker(
        vec![task("inflight", vec![], 1)],
        FailureStrategy::StopOnFirstFailure,
    );
    assert!(t.start_task("inflight"));
    t.cancel();

    let record = t.snapshot();
    assert_eq!(record.status, WorkflowStatus::Cancelled);
    assert_eq!(record.task("inflight").unwrap().status, TaskStatus::Cancelled);

    // The dispatch finished after cancellation: its outcome is dropped.
    t.complete_task("inflight", json!("late"));
    let record = t.snapshot();
    assert_eq!(record.task("inflight").unwrap().status, TaskStatus::Cancelled);
    assert!(record.task("inflight").unwrap().result.is_none());
}

#[test]
fn workflow_terminal_exactly_once() {
    let t = tracker(
        vec![task("solo", vec![], 1)],
        FailureStrategy::StopOnFirstFailure,
    );
    assert!(t.start_task("solo"));
    t.complete_task("solo", json!(1));
    assert_eq!(t.snapshot().status, WorkflowStatus::Completed);

    // Forcing a failure afterwards must not rewrite the terminal status.
    t.fail_workflow("too late");
    assert_eq!(t.snapshot().status, WorkflowStatus::Completed);
}

fn dag_strategy() -> impl Strategy<Value = Vec<Vec<bool>>> {
    // Row i holds dependency flags against tasks 0..i, so the graph is
    // acyclic by construction.
    prop::collection::vec(prop::collection::vec(any::<bool>(), 0..8), 1..8)
}

proptest! {
    /// For arbitrary acyclic dependency graphs, a task is never reported
    /// ready while one of its dependencies is incomplete, and driving the
    /// run to the end completes every task.
    #[test]
    fn ready_tasks_never_include_incomplete_dependencies(masks in dag_strategy()) {
        let tasks: Vec<TaskDefinition> = masks
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let deps = (0..i)
                    .filter(|j| row.get(*j).copied().unwrap_or(false))
                    .map(|j| format!("task-{j}"))
                    .collect();
                task(&format!("task-{i}"), deps, 1)
            })
            .collect();
        let total = tasks.len();
        let deps_by_name: HashMap<String, Vec<String>> = tasks
            .iter()
            .map(|t| (t.name.clone(), t.depends_on.clone()))
            .collect();

        let t = tracker(tasks, FailureStrategy::StopOnFirstFailure);
        loop {
            let ready = t.ready_tasks();
            let snapshot = t.snapshot();
            for name in &ready {
                for dep in &deps_by_name[name] {
                    prop_assert_eq!(
                        snapshot.task(dep).unwrap().status,
                        TaskStatus::Completed
                    );
                }
            }
            let Some(next) = ready.first() else { break };
            prop_assert!(t.start_task(next));
            t.complete_task(next, json!(null));
        }

        let record = t.snapshot();
        prop_assert_eq!(record.completed_count, total);
        prop_assert_eq!(record.status, WorkflowStatus::Completed);
    }
}
