//! Webhook-level error types.

use thiserror::Error;
use uuid::Uuid;

use engine::EngineError;

/// Errors produced while registering webhooks or routing inbound requests.
///
/// The routing variants (`NotFound`, `Disabled`, `MethodNotAllowed`,
/// `AuthenticationFailed`) are all rejected before the engine is ever
/// invoked.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// The requested path is already owned by a different workflow.
    #[error("webhook path already exists: {0}")]
    PathCollision(String),

    /// No webhook is registered at the requested path.
    #[error("no webhook registered at path '{0}'")]
    NotFound(String),

    /// The webhook exists but has been deactivated.
    #[error("webhook is disabled")]
    Disabled,

    /// The request verb does not match the webhook's configured method.
    #[error("method not allowed, expected {expected}")]
    MethodNotAllowed { expected: String },

    /// The request failed the webhook's authentication check.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// The webhook points at a workflow that is no longer stored.
    #[error("workflow {0} not found for webhook")]
    WorkflowMissing(Uuid),

    /// The workflow failed DAG validation at registration time.
    #[error("invalid workflow: {0}")]
    InvalidWorkflow(#[source] EngineError),

    /// A synchronous (`onCompleted`) run failed.
    #[error("execution failed: {0}")]
    Execution(#[source] EngineError),
}
