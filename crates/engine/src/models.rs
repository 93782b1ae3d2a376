//! Core domain models for the workflow engine.
//!
//! These types are the source of truth for what a workflow looks like in
//! memory.  `Node` and `TriggerSource` live in the `nodes` crate (shared
//! with handler implementations) and are re-exported here.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub use nodes::{Node, TriggerSource};

// ---------------------------------------------------------------------------
// Edge
// ---------------------------------------------------------------------------

/// Directed data-flow connection between two node ports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    /// Output port index on the source node.
    #[serde(default, alias = "sourceEndpoint")]
    pub source_endpoint: u32,
    /// Input port index on the target node.
    #[serde(default, alias = "targetEndpoint")]
    pub target_endpoint: u32,
}

impl Edge {
    /// Convenience constructor for testing: default port 0 on both ends.
    pub fn between(source: impl Into<String>, target: impl Into<String>) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: format!("{source}->{target}"),
            source,
            target,
            source_endpoint: 0,
            target_endpoint: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// WorkflowDefinition
// ---------------------------------------------------------------------------

/// A complete workflow definition, immutable for the duration of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub name: String,
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl WorkflowDefinition {
    /// Convenience constructor for testing.
    pub fn new(name: impl Into<String>, nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            nodes,
            edges,
            created_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// ExecutionRecord
// ---------------------------------------------------------------------------

/// Outcome of one node within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NodeOutcome {
    Succeeded { output: Value },
    Failed { error: String },
}

/// Explicit status/headers/body triple produced by a respond node.
///
/// The webhook service is contractually allowed to surface this verbatim
/// to the original caller instead of the default envelope (sync mode only).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseOverride {
    pub status_code: u16,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    pub body: Value,
}

impl ResponseOverride {
    /// Parse a node output carrying the respond marker.
    pub fn from_output(output: &Value) -> Option<Self> {
        let obj = output.as_object()?;
        if obj.get(nodes::builtin::RESPOND_MARKER)?.as_bool() != Some(true) {
            return None;
        }

        let headers = obj
            .get("headers")
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_owned())))
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            status_code: obj
                .get("status_code")
                .and_then(Value::as_u64)
                .and_then(|code| u16::try_from(code).ok())
                .unwrap_or(200),
            headers,
            body: obj.get("body").cloned().unwrap_or(Value::Null),
        })
    }
}

/// The result of one complete engine run.
///
/// Created at the start of a run, populated incrementally as nodes
/// complete, and exclusively owned by that run — never shared across
/// concurrent runs of the same workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub execution_id: Uuid,
    pub workflow_id: Uuid,
    pub trigger_source: TriggerSource,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Per-node trace, keyed by node id.
    pub node_results: HashMap<String, NodeOutcome>,
    /// Output of the last executed node.
    pub output: Value,
    /// Set when a respond node ran during this execution.
    pub response_override: Option<ResponseOverride>,
}
