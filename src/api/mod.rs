//! REST front-end for submitting and tracking workflow runs.
//!
//! Executions live in memory only; nothing survives a process restart.
//! Submitted definitions run in the background and are tracked by an
//! execution id.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{error, info};
use uuid::Uuid;

use crate::engine::Engine;
use crate::model::{WorkflowDefinition, WorkflowRecord, WorkflowResult, WorkflowStatus};

/// Shared state behind the router: every submitted execution, in memory.
#[derive(Debug)]
pub struct ApiState {
    executions: Mutex<HashMap<Uuid, Execution>>,
    started_at: Instant,
}

#[derive(Debug)]
struct Execution {
    engine: Arc<Engine>,
    name: String,
    submitted_at: DateTime<Utc>,
    result: Arc<Mutex<Option<WorkflowResult>>>,
}

impl ApiState {
    /// Create empty server state.
    pub fn new() -> Self {
        Self {
            executions: Mutex::new(HashMap::new()),
            started_at: Instant::now(),
        }
    }
}

impl Default for ApiState {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the API router.
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/workflows", post(submit_workflow).get(list_workflows))
        .route("/workflows/:id", get(get_workflow).delete(cancel_workflow))
        .route("/workflows/:id/status", get(workflow_status))
        .route("/workflows/:id/result", get(workflow_result))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_secs: f64,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct SubmitResponse {
    execution_id: Uuid,
    name: String,
    status: WorkflowStatus,
    submitted_at: DateTime<Utc>,
    total_tasks: usize,
}

#[derive(Debug, Serialize)]
struct ExecutionSummary {
    execution_id: Uuid,
    name: String,
    status: WorkflowStatus,
    submitted_at: DateTime<Utc>,
    completed_count: usize,
    failed_count: usize,
    total_count: usize,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    execution_id: Uuid,
    status: WorkflowStatus,
    progress: f64,
    message: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

async fn health(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs_f64(),
        timestamp: Utc::now(),
    })
}

async fn submit_workflow(
    State(state): State<Arc<ApiState>>,
    Json(definition): Json<WorkflowDefinition>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let engine = Engine::new(definition)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;
    let engine = Arc::new(engine);

    let execution_id = Uuid::new_v4();
    let snapshot = engine.snapshot();
    let execution = Execution {
        engine: Arc::clone(&engine),
        name: snapshot.name.clone(),
        submitted_at: Utc::now(),
        result: Arc::new(Mutex::new(None)),
    };
    let result_slot = Arc::clone(&execution.result);

    let response = SubmitResponse {
        execution_id,
        name: execution.name.clone(),
        status: snapshot.status,
        submitted_at: execution.submitted_at,
        total_tasks: snapshot.total_count,
    };
    state.executions.lock().await.insert(execution_id, execution);

    info!(%execution_id, workflow = %response.name, "workflow queued");
    tokio::spawn(async move {
        let result = engine.run().await;
        if !result.errors.is_empty() {
            error!(%execution_id, errors = result.errors.len(), "run finished with errors");
        }
        *result_slot.lock().await = Some(result);
    });

    Ok(Json(response))
}

async fn list_workflows(State(state): State<Arc<ApiState>>) -> Json<Vec<ExecutionSummary>> {
    let executions = state.executions.lock().await;
    let mut summaries: Vec<ExecutionSummary> = executions
        .iter()
        .map(|(id, execution)| {
            let snapshot = execution.engine.snapshot();
            ExecutionSummary {
                execution_id: *id,
                name: execution.name.clone(),
                status: snapshot.status,
                submitted_at: execution.submitted_at,
                completed_count: snapshot.completed_count,
                failed_count: snapshot.failed_count,
                total_count: snapshot.total_count,
            }
        })
        .collect();
    summaries.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
    Json(summaries)
}

async fn get_workflow(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<WorkflowRecord>, ApiError> {
    let executions = state.executions.lock().await;
    let execution = executions
        .get(&id)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Workflow execution not found"))?;
    Ok(Json(execution.engine.snapshot()))
}

async fn workflow_status(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<StatusResponse>, ApiError> {
    let executions = state.executions.lock().await;
    let execution = executions
        .get(&id)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Workflow execution not found"))?;
    let snapshot = execution.engine.snapshot();
    Ok(Json(StatusResponse {
        execution_id: id,
        status: snapshot.status,
        progress: snapshot.progress(),
        message: format!("Workflow {}", snapshot.status),
    }))
}

async fn workflow_result(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<WorkflowResult>, ApiError> {
    let executions = state.executions.lock().await;
    let execution = executions
        .get(&id)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Workflow execution not found"))?;
    let result = execution.result.lock().await.clone();
    result.map(Json).ok_or_else(|| {
        api_error(
            StatusCode::NOT_FOUND,
            "Workflow execution has not finished",
        )
    })
}

async fn cancel_workflow(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let executions = state.executions.lock().await;
    let execution = executions
        .get(&id)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Workflow execution not found"))?;
    let status = execution.engine.snapshot().status;
    if status.is_terminal() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("Cannot cancel workflow with status: {status}"),
        ));
    }
    execution.engine.cancel();
    info!(%id, "workflow cancelled");
    Ok(Json(serde_json::json!({
        "message": "Workflow cancelled successfully"
    })))
}
