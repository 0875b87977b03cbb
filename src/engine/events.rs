//! Lifecycle event delivery for workflow runs.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::model::WorkflowStatus;

/// Default capacity of the event channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A lifecycle event emitted during a workflow run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// The run entered RUNNING.
    WorkflowStarted {
        /// Run id.
        workflow_id: String,
        /// Workflow name.
        name: String,
    },
    /// A task was dispatched.
    TaskStarted {
        /// Run id.
        workflow_id: String,
        /// Task name.
        task: String,
        /// Dispatch attempt number, starting at 1.
        attempt: u32,
    },
    /// A task completed successfully.
    TaskCompleted {
        /// Run id.
        workflow_id: String,
        /// Task name.
        task: String,
    },
    /// A task failed with attempts remaining and will be re-dispatched.
    TaskRetry {
        /// Run id.
        workflow_id: String,
        /// Task name.
        task: String,
        /// Attempts consumed so far.
        attempt: u32,
        /// Error text of the failed attempt.
        error: String,
    },
    /// A task failed permanently.
    TaskFailed {
        /// Run id.
        workflow_id: String,
        /// Task name.
        task: String,
        /// Error text.
        error: String,
    },
    /// The run reached a terminal status with all tasks settled.
    WorkflowCompleted {
        /// Run id.
        workflow_id: String,
        /// Terminal status.
        status: WorkflowStatus,
    },
    /// The run was forced to FAILED.
    WorkflowFailed {
        /// Run id.
        workflow_id: String,
        /// Reason.
        error: String,
    },
}

/// Fan-out of lifecycle events to any number of subscribers.
///
/// Delivery is fire-and-forget over a broadcast channel: a subscriber that
/// lags, panics, or drops its receiver never blocks the engine or affects
/// delivery to the other subscribers.
#[derive(Debug, Clone)]
pub struct EventNotifier {
    sender: broadcast::Sender<WorkflowEvent>,
}

impl EventNotifier {
    /// Create a notifier with the default channel capacity.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Open a new subscription. Events emitted before this call are not
    /// replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.sender.subscribe()
    }

    /// Emit an event to all current subscribers.
    pub fn emit(&self, event: WorkflowEvent) {
        debug!(?event, "workflow event");
        // send only fails when there are no receivers, which is fine for
        // fire-and-forget delivery.
        let _ = self.sender.send(event);
    }
}

impl Default for EventNotifier {
    fn default() -> Self {
        Self::new()
    }
}
