//! `engine` crate — workflow models, DAG validation, and the execution
//! engine.

pub mod dag;
pub mod error;
pub mod executor;
pub mod models;

pub use dag::validate_dag;
pub use error::EngineError;
pub use executor::{ExecutorConfig, WorkflowExecutor};
pub use models::{
    Edge, ExecutionRecord, Node, NodeOutcome, ResponseOverride, TriggerSource, WorkflowDefinition,
};
