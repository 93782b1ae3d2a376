//! Engine-level error types.

use thiserror::Error;

/// Errors produced by the workflow engine (validation + execution).
#[derive(Debug, Error)]
pub enum EngineError {
    // ------ Validation errors ------

    /// Two or more nodes share the same ID.
    #[error("duplicate node ID: '{0}'")]
    DuplicateNodeId(String),

    /// An edge references a node ID that doesn't exist in the workflow.
    #[error("edge references unknown node '{node_id}' ({side} side)")]
    UnknownNodeReference {
        node_id: String,
        side: &'static str,
    },

    /// Topological sort detected a cycle.
    #[error("workflow graph contains a cycle")]
    CycleDetected,

    // ------ Execution errors ------

    /// No node qualifies as an entry point (neither trigger-typed nor
    /// edge-less).
    #[error("workflow has no start node")]
    NoStartNode,

    /// A node's type has no registered handler.
    #[error("no handler registered for node type '{0}'")]
    UnknownNodeType(String),

    /// The run executed more distinct nodes than the configured ceiling.
    #[error("execution limit exceeded: {executed} nodes executed, limit is {limit}")]
    ExecutionLimitExceeded { executed: usize, limit: usize },

    /// The per-run deadline expired before the run finished.
    #[error("run exceeded its deadline of {deadline_ms}ms")]
    TimedOut { deadline_ms: u64 },

    /// A node failed with a fatal error; the whole run is aborted.
    #[error("node '{node_id}' failed fatally: {message}")]
    NodeFatal {
        node_id: String,
        message: String,
    },

    /// A node's retryable error was exhausted.
    #[error("node '{node_id}' exceeded retry limit: {message}")]
    NodeRetryExhausted {
        node_id: String,
        message: String,
    },
}
