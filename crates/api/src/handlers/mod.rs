pub mod webhooks;
pub mod workflows;

use std::sync::Arc;

use axum::Json;
use serde_json::{json, Value};
use webhook::WebhookService;

/// Shared handler state.  The service owns the workflow store and the
/// executor; handlers stay thin.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<WebhookService>,
}

impl AppState {
    pub fn new(service: Arc<WebhookService>) -> Self {
        Self { service }
    }
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
