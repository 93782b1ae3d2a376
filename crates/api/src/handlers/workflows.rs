//! Workflow CRUD and manual execution.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use uuid::Uuid;

use engine::{TriggerSource, WorkflowDefinition};

use super::AppState;
use crate::error::ApiError;

pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let workflow: WorkflowDefinition = serde_json::from_value(payload)
        .map_err(|e| ApiError::BadDefinition(e.to_string()))?;
    let id = workflow.id;

    let hooks = state.service.register_workflow(workflow)?;
    let paths: Vec<_> = hooks.iter().map(|h| h.path.clone()).collect();

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "id": id, "webhookPaths": paths })),
    ))
}

pub async fn list(State(state): State<AppState>) -> Json<Value> {
    let workflows: Vec<Value> = state
        .service
        .workflows()
        .iter()
        .map(|w| {
            json!({
                "id": w.id,
                "name": w.name,
                "nodes": w.nodes.len(),
                "edges": w.edges.len(),
                "createdAt": w.created_at,
            })
        })
        .collect();
    Json(json!({ "success": true, "workflows": workflows }))
}

pub async fn get(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    let workflow = state.service.workflow(id).ok_or(ApiError::WorkflowNotFound)?;
    Ok(Json(json!({ "success": true, "workflow": &*workflow })))
}

pub async fn delete(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    if state.service.remove_workflow(id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::WorkflowNotFound)
    }
}

#[derive(serde::Deserialize, Default)]
pub struct ExecuteWorkflowDto {
    #[serde(default)]
    pub input: Value,
}

/// Run a workflow synchronously with a manual trigger.
pub async fn execute(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    payload: Option<Json<ExecuteWorkflowDto>>,
) -> Result<Json<Value>, ApiError> {
    let workflow = state.service.workflow(id).ok_or(ApiError::WorkflowNotFound)?;
    let input = payload.map(|Json(p)| p.input).unwrap_or(Value::Null);

    let record = state
        .service
        .executor()
        .run(&workflow, input, TriggerSource::Manual)
        .await?;

    Ok(Json(json!({
        "success": true,
        "executionId": record.execution_id,
        "output": record.output,
        "nodeResults": record.node_results,
    })))
}
