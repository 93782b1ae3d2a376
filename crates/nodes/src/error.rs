//! Node-level error type.

use thiserror::Error;

/// Errors returned by a handler's `run` method.
///
/// The engine uses the variant to decide retry behaviour:
/// - `Retryable` — the node is re-dispatched with exponential back-off.
/// - `Fatal`     — the whole run is immediately aborted.
#[derive(Debug, Error, Clone)]
pub enum NodeError {
    /// Transient failure; the engine should re-try the node.
    #[error("retryable node error: {0}")]
    Retryable(String),

    /// Permanent failure; no retry should be attempted.
    #[error("fatal node error: {0}")]
    Fatal(String),
}
