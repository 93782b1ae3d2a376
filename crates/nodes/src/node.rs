//! Node and trigger-source types.
//!
//! Defined here (in the nodes crate) so both the engine and individual node
//! handler implementations can import them without a circular dependency.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single step in the workflow graph.
///
/// Opaque to the engine: all type-specific behaviour lives behind the
/// registry, keyed by `node_type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier within this workflow (referenced by edges).
    pub id: String,
    /// Maps to a registered `NodeHandler` implementation.
    #[serde(rename = "type")]
    pub node_type: String,
    /// Display/debug label.
    #[serde(default)]
    pub name: String,
    /// Arbitrary handler-specific settings; string values may themselves
    /// contain `{{ }}` interpolation templates.
    #[serde(default)]
    pub config: Value,
}

impl Node {
    /// Convenience constructor for testing.
    pub fn new(id: impl Into<String>, node_type: impl Into<String>, config: Value) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            node_type: node_type.into(),
            config,
        }
    }
}

/// How an execution was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    Manual,
    Webhook,
    Schedule,
}

impl std::fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Manual => write!(f, "manual"),
            Self::Webhook => write!(f, "webhook"),
            Self::Schedule => write!(f, "schedule"),
        }
    }
}
