//! Inbound webhook dispatch and webhook management.

use std::collections::HashMap;

use axum::extract::{OriginalUri, Query, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use tracing::debug;

use webhook::{WebhookReply, WebhookRequest};

use super::AppState;
use crate::error::ApiError;

pub async fn list(State(state): State<AppState>) -> Json<Value> {
    let hooks: Vec<_> = state
        .service
        .workflows()
        .iter()
        .flat_map(|w| state.service.list_for_workflow(w.id))
        .map(|h| h.snapshot())
        .collect();
    Json(json!({ "success": true, "webhooks": hooks }))
}

pub async fn toggle(
    axum::extract::Path(id): axum::extract::Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    match state.service.toggle(&id) {
        Some(active) => Ok(Json(json!({ "success": true, "active": active }))),
        None => Err(ApiError::WebhookNotFound),
    }
}

/// Catch-all entry point for registered webhook paths.
///
/// The body is parsed leniently: invalid or absent JSON becomes the raw
/// string (or null), never a 400 — the workflow decides what to make of
/// its input.
pub async fn receive(
    State(state): State<AppState>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: String,
) -> Result<Response, ApiError> {
    let headers: HashMap<String, String> = headers
        .iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
        .collect();

    let body = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&body).unwrap_or(Value::String(body))
    };

    let request = WebhookRequest {
        method: method.as_str().to_string(),
        path: uri.path().to_string(),
        headers,
        query,
        body,
    };
    debug!("inbound webhook: {} {}", request.method, request.path);

    let reply = state.service.handle_request(request).await?;

    Ok(match reply {
        WebhookReply::Accepted { execution_id } => (
            StatusCode::ACCEPTED,
            Json(json!({ "success": true, "executionId": execution_id })),
        )
            .into_response(),

        WebhookReply::Completed { execution_id, response } => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "executionId": execution_id,
                "response": response,
            })),
        )
            .into_response(),

        // A respond node dictates the reply verbatim; no envelope.
        WebhookReply::Custom(over) => {
            let status =
                StatusCode::from_u16(over.status_code).unwrap_or(StatusCode::OK);
            let mut response = match &over.body {
                Value::String(s) => s.clone().into_response(),
                other => Json(other.clone()).into_response(),
            };
            *response.status_mut() = status;
            for (name, value) in &over.headers {
                if let (Ok(name), Ok(value)) = (
                    axum::http::HeaderName::try_from(name.as_str()),
                    axum::http::HeaderValue::try_from(value.as_str()),
                ) {
                    response.headers_mut().insert(name, value);
                }
            }
            response
        }
    })
}
