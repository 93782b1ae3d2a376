//! Workflow execution engine.
//!
//! `WorkflowExecutor` is the central orchestrator for one run:
//! 1. Performs structural pre-checks (duplicate IDs, dangling edges).
//! 2. Selects entry points (trigger-typed nodes, or nodes with no
//!    incoming edges) and walks the graph breadth-first from them.
//! 3. Merges upstream outputs, dispatches each node via its registered
//!    `NodeHandler`, and records the result in a run-local output map.
//! 4. Handles `NodeError::Retryable` (up to `max_retries`) and
//!    `NodeError::Fatal` (abort immediately).
//! 5. Bounds the run by a distinct-node ceiling and a wall-clock deadline.
//!
//! Run isolation is a hard invariant: every call to [`WorkflowExecutor::run`]
//! allocates its own output map and `RunContext`.  Nothing node-scoped is
//! ever written to shared state, so concurrent runs of the same definition
//! cannot observe each other's partial results.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use nodes::{HandlerRegistry, Node, NodeError, NodeHandler, RunContext, TriggerSource};

use crate::models::{
    Edge, ExecutionRecord, NodeOutcome, ResponseOverride, WorkflowDefinition,
};
use crate::EngineError;

/// Separator used when a node has multiple incoming edges: the upstream
/// outputs are stringified and concatenated.  Deliberately simple and
/// lossy — callers needing a structured multi-input merge must route
/// through an explicit merge-type node.
const MERGE_SEPARATOR: &str = "\n---\n";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning knobs for the executor.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum number of times a retryable node failure will be retried.
    pub max_retries: u32,
    /// Base delay for exponential back-off between retries.
    pub retry_base_delay: Duration,
    /// Ceiling on distinct executed nodes per run.  Registration-time DAG
    /// validation rejects cycles outright; this bound covers definitions
    /// that bypassed registration.
    pub max_executed_nodes: usize,
    /// Wall-clock deadline for one run.  On expiry the run fails with
    /// `TimedOut` and any waiting caller is released; an in-flight
    /// external call is not forcibly stopped (best-effort cancellation).
    pub run_deadline: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_base_delay: Duration::from_millis(100),
            max_executed_nodes: 250,
            run_deadline: Duration::from_secs(60),
        }
    }
}

// ---------------------------------------------------------------------------
// WorkflowExecutor
// ---------------------------------------------------------------------------

/// Stateless orchestrator that runs workflow executions.
///
/// One executor can serve many concurrent runs; all per-run state lives in
/// the stack frame of [`WorkflowExecutor::run`].
pub struct WorkflowExecutor {
    registry: Arc<HandlerRegistry>,
    config: ExecutorConfig,
}

impl WorkflowExecutor {
    /// Create a new executor.
    pub fn new(registry: Arc<HandlerRegistry>, config: ExecutorConfig) -> Self {
        Self { registry, config }
    }

    /// The handler registry this executor dispatches through.
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Run the workflow with a fresh execution ID.
    pub async fn run(
        &self,
        workflow: &WorkflowDefinition,
        initial_input: Value,
        trigger_source: TriggerSource,
    ) -> Result<ExecutionRecord, EngineError> {
        self.run_with_id(workflow, initial_input, trigger_source, Uuid::new_v4())
            .await
    }

    /// Run the workflow under a caller-supplied execution ID.
    ///
    /// Detached callers (fire-and-forget webhook dispatch) pre-generate the
    /// ID so they can acknowledge it before the run finishes.
    ///
    /// # Errors
    /// Returns `EngineError` for structural failures, missing handlers,
    /// fatal node errors, retry exhaustion, the node ceiling, or the
    /// per-run deadline.
    #[instrument(skip(self, workflow, initial_input), fields(workflow_id = %workflow.id, execution_id = %execution_id))]
    pub async fn run_with_id(
        &self,
        workflow: &WorkflowDefinition,
        initial_input: Value,
        trigger_source: TriggerSource,
        execution_id: Uuid,
    ) -> Result<ExecutionRecord, EngineError> {
        let started_at = Utc::now();
        let deadline = tokio::time::Instant::now() + self.config.run_deadline;

        // ------------------------------------------------------------------
        // Structural pre-checks: duplicate IDs and dangling edges are
        // rejected before any node executes.  Cycles are tolerated here
        // (bounded by the ceiling); registration rejects them earlier.
        // ------------------------------------------------------------------
        let mut node_map: HashMap<&str, &Node> = HashMap::with_capacity(workflow.nodes.len());
        for node in &workflow.nodes {
            if node_map.insert(node.id.as_str(), node).is_some() {
                return Err(EngineError::DuplicateNodeId(node.id.clone()));
            }
        }

        let mut incoming: HashMap<&str, Vec<&Edge>> = HashMap::new();
        let mut outgoing: HashMap<&str, Vec<&str>> = HashMap::new();
        for edge in &workflow.edges {
            if !node_map.contains_key(edge.source.as_str()) {
                return Err(EngineError::UnknownNodeReference {
                    node_id: edge.source.clone(),
                    side: "source",
                });
            }
            if !node_map.contains_key(edge.target.as_str()) {
                return Err(EngineError::UnknownNodeReference {
                    node_id: edge.target.clone(),
                    side: "target",
                });
            }
            incoming.entry(edge.target.as_str()).or_default().push(edge);
            outgoing.entry(edge.source.as_str()).or_default().push(edge.target.as_str());
        }

        // ------------------------------------------------------------------
        // Entry-point selection: explicit trigger-category nodes, plus any
        // node the author left unconnected upstream.
        // ------------------------------------------------------------------
        let start_nodes: Vec<&str> = workflow
            .nodes
            .iter()
            .filter(|n| {
                self.registry.is_trigger(&n.node_type)
                    || incoming.get(n.id.as_str()).is_none()
            })
            .map(|n| n.id.as_str())
            .collect();

        if start_nodes.is_empty() {
            return Err(EngineError::NoStartNode);
        }

        info!(
            "starting run: {} nodes, {} start node(s): {:?}",
            workflow.nodes.len(),
            start_nodes.len(),
            start_nodes
        );

        let ctx = RunContext::new(workflow.id, execution_id, trigger_source, initial_input.clone());

        // Run-local state, allocated fresh for every run.
        let mut outputs: HashMap<String, Value> = HashMap::new();
        let mut node_results: HashMap<String, NodeOutcome> = HashMap::new();
        let mut executed: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<&str> = start_nodes.into_iter().collect();
        let mut last_output = Value::Null;
        let mut response_override: Option<ResponseOverride> = None;

        while let Some(node_id) = queue.pop_front() {
            // Idempotent re-enqueue is a no-op.
            if executed.contains(node_id) {
                continue;
            }
            if executed.len() >= self.config.max_executed_nodes {
                return Err(EngineError::ExecutionLimitExceeded {
                    executed: executed.len(),
                    limit: self.config.max_executed_nodes,
                });
            }
            executed.insert(node_id.to_owned());

            let node = node_map[node_id];
            let input = merge_inputs(node_id, &incoming, &outputs, &initial_input);

            let registration = self
                .registry
                .resolve(&node.node_type)
                .ok_or_else(|| EngineError::UnknownNodeType(node.node_type.clone()))?;

            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Err(self.timed_out(node_id));
            }

            let dispatch = self.execute_with_retry(node, registration.handler.as_ref(), input, &ctx);
            match tokio::time::timeout(deadline - now, dispatch).await {
                Err(_elapsed) => {
                    warn!("deadline expired while node '{}' was in flight", node_id);
                    return Err(self.timed_out(node_id));
                }
                Ok(Err(engine_err)) => {
                    node_results.insert(
                        node_id.to_owned(),
                        NodeOutcome::Failed { error: engine_err.to_string() },
                    );
                    error!("node '{}' failed: {}", node_id, engine_err);
                    return Err(engine_err);
                }
                Ok(Ok(output)) => {
                    if let Some(over) = ResponseOverride::from_output(&output) {
                        response_override = Some(over);
                    }

                    info!("node '{}' succeeded", node_id);
                    node_results.insert(
                        node_id.to_owned(),
                        NodeOutcome::Succeeded { output: output.clone() },
                    );
                    last_output = output.clone();
                    outputs.insert(node_id.to_owned(), output);

                    if let Some(targets) = outgoing.get(node_id) {
                        for &target in targets {
                            if !executed.contains(target) {
                                queue.push_back(target);
                            }
                        }
                    }
                }
            }
        }

        info!("run {} finished: {} node(s) executed", execution_id, executed.len());

        Ok(ExecutionRecord {
            execution_id,
            workflow_id: workflow.id,
            trigger_source,
            started_at,
            finished_at: Utc::now(),
            node_results,
            output: last_output,
            response_override,
        })
    }

    fn timed_out(&self, node_id: &str) -> EngineError {
        warn!("run timed out at node '{}'", node_id);
        EngineError::TimedOut {
            deadline_ms: self.config.run_deadline.as_millis() as u64,
        }
    }

    // -----------------------------------------------------------------------
    // Internal: execute a single node with retry logic.
    // -----------------------------------------------------------------------

    async fn execute_with_retry(
        &self,
        node: &Node,
        handler: &dyn NodeHandler,
        input: Value,
        ctx: &RunContext,
    ) -> Result<Value, EngineError> {
        let mut attempts = 0u32;

        loop {
            match handler.run(node, input.clone(), ctx).await {
                Ok(output) => return Ok(output),

                Err(NodeError::Fatal(msg)) => {
                    return Err(EngineError::NodeFatal {
                        node_id: node.id.clone(),
                        message: msg,
                    });
                }

                Err(NodeError::Retryable(msg)) => {
                    attempts += 1;
                    if attempts > self.config.max_retries {
                        return Err(EngineError::NodeRetryExhausted {
                            node_id: node.id.clone(),
                            message: msg,
                        });
                    }

                    let delay = self.config.retry_base_delay
                        * 2u32.pow(attempts.saturating_sub(1));

                    warn!(
                        "node '{}' retryable error (attempt {}/{}), retrying in {:?}: {}",
                        node.id, attempts, self.config.max_retries, delay, msg
                    );

                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Gather the already-computed outputs of a node's upstream edges.
///
/// No incoming edges → the run's initial input.  One computed upstream →
/// that output as-is.  Several → stringified concatenation with
/// [`MERGE_SEPARATOR`] (the documented lossy merge policy).
fn merge_inputs(
    node_id: &str,
    incoming: &HashMap<&str, Vec<&Edge>>,
    outputs: &HashMap<String, Value>,
    initial_input: &Value,
) -> Value {
    let Some(edges) = incoming.get(node_id) else {
        return initial_input.clone();
    };

    let computed: Vec<&Value> = edges
        .iter()
        .filter_map(|edge| outputs.get(edge.source.as_str()))
        .collect();

    match computed.as_slice() {
        [] => initial_input.clone(),
        [single] => (*single).clone(),
        many => Value::String(
            many.iter()
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(MERGE_SEPARATOR),
        ),
    }
}
