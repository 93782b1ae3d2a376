//! The `NodeHandler` trait — the contract every node type must fulfil.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::node::{Node, TriggerSource};
use crate::NodeError;

/// Per-run context passed to every handler.
///
/// One `RunContext` is allocated per engine run and shared (by reference)
/// across that run's handler invocations only — never across runs.
#[derive(Debug)]
pub struct RunContext {
    /// ID of the parent workflow.
    pub workflow_id: Uuid,
    /// ID of the current execution run.
    pub execution_id: Uuid,
    /// How this run was started.
    pub trigger_source: TriggerSource,
    /// The payload the initiating stimulus supplied, verbatim.
    pub trigger_payload: Value,
    /// Per-run variable bag, writable by handlers.
    variables: Mutex<HashMap<String, Value>>,
}

impl RunContext {
    pub fn new(
        workflow_id: Uuid,
        execution_id: Uuid,
        trigger_source: TriggerSource,
        trigger_payload: Value,
    ) -> Self {
        Self {
            workflow_id,
            execution_id,
            trigger_source,
            trigger_payload,
            variables: Mutex::new(HashMap::new()),
        }
    }

    /// Store a run-scoped variable.
    pub fn set_variable(&self, name: impl Into<String>, value: Value) {
        self.variables
            .lock()
            .expect("variable bag lock poisoned")
            .insert(name.into(), value);
    }

    /// Read back a run-scoped variable.
    pub fn variable(&self, name: &str) -> Option<Value> {
        self.variables
            .lock()
            .expect("variable bag lock poisoned")
            .get(name)
            .cloned()
    }
}

/// The core handler trait.
///
/// A handler receives the node definition (for its `config`), the merged
/// output of its upstream nodes, and the run context.  Templated config
/// strings are resolved against `input` via the `expression` crate.
#[async_trait]
pub trait NodeHandler: Send + Sync {
    async fn run(
        &self,
        node: &Node,
        input: Value,
        ctx: &RunContext,
    ) -> Result<Value, NodeError>;
}
