//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use webhook::WebhookError;

/// Anything a handler can fail with, already shaped for the wire.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("workflow not found")]
    WorkflowNotFound,
    #[error("webhook not found")]
    WebhookNotFound,
    #[error("invalid workflow definition: {0}")]
    BadDefinition(String),
    #[error(transparent)]
    Webhook(#[from] WebhookError),
    #[error(transparent)]
    Engine(#[from] engine::EngineError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::WorkflowNotFound | Self::WebhookNotFound => StatusCode::NOT_FOUND,
            Self::BadDefinition(_) => StatusCode::BAD_REQUEST,
            Self::Webhook(e) => match e {
                WebhookError::NotFound(_) => StatusCode::NOT_FOUND,
                WebhookError::Disabled => StatusCode::FORBIDDEN,
                WebhookError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
                WebhookError::AuthenticationFailed => StatusCode::UNAUTHORIZED,
                WebhookError::PathCollision(_) => StatusCode::CONFLICT,
                WebhookError::InvalidWorkflow(_) => StatusCode::BAD_REQUEST,
                WebhookError::WorkflowMissing(_) | WebhookError::Execution(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Engine(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({ "success": false, "error": self.to_string() }));
        (status, body).into_response()
    }
}
