//! Built-in, provider-free node handlers.
//!
//! Everything here is pure control-flow and data shaping: trigger
//! pass-throughs, field assignment, condition gates, merge/split, waits,
//! and the webhook respond node.  Handlers that call external providers
//! (HTTP, AI, email, chat) live outside this crate and register themselves
//! through the same [`HandlerRegistry`] API.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use expression::{evaluate_condition, interpolate, interpolate_deep, resolve_path, Condition};

use crate::node::Node;
use crate::registry::{FailurePolicy, HandlerMeta, HandlerRegistry};
use crate::traits::{NodeHandler, RunContext};
use crate::NodeError;

/// Marker field a respond node sets on its output so the webhook service
/// can surface the status/headers/body triple verbatim.
pub const RESPOND_MARKER: &str = "_respond";

/// Register every built-in handler on `registry`.
///
/// Called by [`HandlerRegistry::with_builtins`]; callers wiring a custom
/// registry can invoke it directly and then overwrite individual types.
pub fn register_builtins(registry: &mut HandlerRegistry) {
    registry.register("trigger.manual", Arc::new(ManualTrigger), HandlerMeta::trigger());
    registry.register("trigger.webhook", Arc::new(WebhookTrigger), HandlerMeta::trigger());
    registry.register("trigger.schedule", Arc::new(ScheduleTrigger), HandlerMeta::trigger());

    registry.register("set", Arc::new(SetFields), HandlerMeta::action(FailurePolicy::Abort));
    registry.register("filter", Arc::new(Filter), HandlerMeta::action(FailurePolicy::Abort));
    registry.register("switch", Arc::new(Switch), HandlerMeta::action(FailurePolicy::Abort));
    registry.register("merge", Arc::new(Merge), HandlerMeta::action(FailurePolicy::Recoverable));
    registry.register("split", Arc::new(Split), HandlerMeta::action(FailurePolicy::Recoverable));
    registry.register("loop", Arc::new(LoopBatch), HandlerMeta::action(FailurePolicy::Abort));
    registry.register("wait", Arc::new(Wait), HandlerMeta::action(FailurePolicy::Recoverable));
    registry.register("respond", Arc::new(Respond), HandlerMeta::action(FailurePolicy::Recoverable));
}

fn bad_config(node: &Node, what: &str) -> NodeError {
    NodeError::Fatal(format!("node '{}': invalid config: {what}", node.id))
}

// ---------------------------------------------------------------------------
// Trigger pass-throughs
// ---------------------------------------------------------------------------

/// `trigger.manual` — passes the initiating payload straight through.
pub struct ManualTrigger;

#[async_trait]
impl NodeHandler for ManualTrigger {
    async fn run(&self, _node: &Node, input: Value, _ctx: &RunContext) -> Result<Value, NodeError> {
        if input.is_null() {
            Ok(json!({ "triggered": true, "timestamp": Utc::now().to_rfc3339() }))
        } else {
            Ok(input)
        }
    }
}

/// `trigger.webhook` — the request was already routed by the webhook
/// service; this node reshapes the payload into a stable
/// body/query/headers envelope for downstream nodes.
pub struct WebhookTrigger;

#[async_trait]
impl NodeHandler for WebhookTrigger {
    async fn run(&self, node: &Node, input: Value, ctx: &RunContext) -> Result<Value, NodeError> {
        let webhook = resolve_path(&ctx.trigger_payload, "webhook")
            .or_else(|| resolve_path(&input, "webhook"))
            .cloned()
            .unwrap_or(Value::Null);

        let pick = |key: &str, fallback: Value| {
            resolve_path(&webhook, key)
                .or_else(|| resolve_path(&input, key))
                .cloned()
                .unwrap_or(fallback)
        };

        Ok(json!({
            "body": pick("body", input.clone()),
            "query": pick("query", json!({})),
            "headers": pick("headers", json!({})),
            "method": pick("method", json!("POST")),
            "path": pick("path", node.config.get("path").cloned().unwrap_or(json!(""))),
            "timestamp": pick("timestamp", json!(Utc::now().to_rfc3339())),
        }))
    }
}

/// `trigger.schedule` — annotates the payload with the firing time and the
/// cron expression that caused it.
pub struct ScheduleTrigger;

#[async_trait]
impl NodeHandler for ScheduleTrigger {
    async fn run(&self, node: &Node, input: Value, _ctx: &RunContext) -> Result<Value, NodeError> {
        let mut out = as_object(&input);
        out.insert("triggered".into(), json!(true));
        out.insert("scheduled_time".into(), json!(Utc::now().to_rfc3339()));
        if let Some(expr) = node.config.get("cron_expression") {
            out.insert("cron_expression".into(), expr.clone());
        }
        Ok(Value::Object(out))
    }
}

// ---------------------------------------------------------------------------
// Data shaping
// ---------------------------------------------------------------------------

/// `set` — assigns fields on the record; string values are interpolated
/// against the incoming input.
pub struct SetFields;

#[derive(Deserialize, Default)]
struct SetConfig {
    #[serde(default)]
    fields: Map<String, Value>,
}

#[async_trait]
impl NodeHandler for SetFields {
    async fn run(&self, node: &Node, input: Value, _ctx: &RunContext) -> Result<Value, NodeError> {
        let config: SetConfig = serde_json::from_value(node.config.clone())
            .map_err(|e| bad_config(node, &e.to_string()))?;

        let mut out = as_object(&input);
        for (key, value) in config.fields {
            let resolved = match value {
                Value::String(template) => Value::String(interpolate(&template, &input)),
                other => other,
            };
            out.insert(key, resolved);
        }
        Ok(Value::Object(out))
    }
}

/// `filter` — condition gate.  Non-matching single items become `null`;
/// arrays are filtered item by item.
pub struct Filter;

#[derive(Deserialize, Default)]
struct ConditionsConfig {
    #[serde(default)]
    conditions: Vec<Condition>,
}

#[async_trait]
impl NodeHandler for Filter {
    async fn run(&self, node: &Node, input: Value, _ctx: &RunContext) -> Result<Value, NodeError> {
        let config: ConditionsConfig = serde_json::from_value(node.config.clone())
            .map_err(|e| bad_config(node, &e.to_string()))?;

        let passes = |item: &Value| config.conditions.iter().all(|c| evaluate_condition(item, c));

        match input {
            Value::Array(items) => Ok(Value::Array(items.into_iter().filter(|i| passes(i)).collect())),
            single if passes(&single) => Ok(single),
            _ => Ok(Value::Null),
        }
    }
}

/// `switch` — annotates the record with the index/output label of the
/// first matching condition so downstream edges can branch on it.
pub struct Switch;

#[derive(Deserialize)]
struct SwitchArm {
    #[serde(flatten)]
    condition: Condition,
    /// Optional output label; falls back to the arm's index.
    output: Option<Value>,
}

#[derive(Deserialize, Default)]
struct SwitchConfig {
    #[serde(default)]
    conditions: Vec<SwitchArm>,
}

#[async_trait]
impl NodeHandler for Switch {
    async fn run(&self, node: &Node, input: Value, _ctx: &RunContext) -> Result<Value, NodeError> {
        let config: SwitchConfig = serde_json::from_value(node.config.clone())
            .map_err(|e| bad_config(node, &e.to_string()))?;

        let mut out = as_object(&input);
        for (index, arm) in config.conditions.iter().enumerate() {
            if evaluate_condition(&input, &arm.condition) {
                out.insert(
                    "_switch_output".into(),
                    arm.output.clone().unwrap_or(json!(index)),
                );
                out.insert("_matched_condition".into(), json!(index));
                return Ok(Value::Object(out));
            }
        }

        out.insert("_switch_output".into(), json!("default"));
        out.insert("_matched_condition".into(), json!(-1));
        Ok(Value::Object(out))
    }
}

/// `merge` — pass-through.  The engine has already concatenated multiple
/// incoming outputs by the time this node runs; a structured merge policy
/// would live here.
pub struct Merge;

#[async_trait]
impl NodeHandler for Merge {
    async fn run(&self, _node: &Node, input: Value, _ctx: &RunContext) -> Result<Value, NodeError> {
        Ok(input)
    }
}

/// `split` — extracts a sequence for downstream fan-out.
pub struct Split;

#[async_trait]
impl NodeHandler for Split {
    async fn run(&self, node: &Node, input: Value, _ctx: &RunContext) -> Result<Value, NodeError> {
        if let Some(path) = node.config.get("items_path").and_then(Value::as_str) {
            if let Some(items @ Value::Array(_)) = resolve_path(&input, path) {
                return Ok(items.clone());
            }
        }
        if input.is_array() {
            return Ok(input);
        }
        Ok(Value::Array(vec![input]))
    }
}

/// `loop` — slices a sequence into batches for downstream iteration.
///
/// Pure data shaping: extracts the items (optionally via `items_path`),
/// wraps a non-array value in a one-element batch, and reports the batch
/// arithmetic alongside.
pub struct LoopBatch;

#[derive(Deserialize, Default)]
struct LoopConfig {
    #[serde(default, alias = "itemsPath")]
    items_path: Option<String>,
    #[serde(default = "default_batch_size", alias = "batchSize")]
    batch_size: usize,
}

fn default_batch_size() -> usize {
    1
}

#[async_trait]
impl NodeHandler for LoopBatch {
    async fn run(&self, node: &Node, input: Value, _ctx: &RunContext) -> Result<Value, NodeError> {
        let config: LoopConfig = serde_json::from_value(node.config.clone())
            .map_err(|e| bad_config(node, &e.to_string()))?;

        let items = match &config.items_path {
            Some(path) => resolve_path(&input, path).cloned().unwrap_or(Value::Null),
            None => input,
        };
        let items = match items {
            Value::Array(items) => items,
            other => vec![other],
        };

        let batch_size = config.batch_size.max(1);
        let total_items = items.len();
        Ok(json!({
            "items": items,
            "batch_size": batch_size,
            "total_items": total_items,
            "batches": total_items.div_ceil(batch_size),
        }))
    }
}

/// `wait` — sleeps for a configured duration, then passes the input
/// through.  The engine's per-run deadline caps the sleep.
pub struct Wait;

#[derive(Deserialize)]
struct WaitConfig {
    #[serde(default = "default_duration")]
    duration: f64,
    #[serde(default)]
    unit: WaitUnit,
}

fn default_duration() -> f64 {
    1.0
}

#[derive(Deserialize, Default, Clone, Copy)]
#[serde(rename_all = "lowercase")]
enum WaitUnit {
    #[default]
    Seconds,
    Minutes,
    Hours,
}

impl WaitUnit {
    fn millis(self, duration: f64) -> u64 {
        let factor = match self {
            Self::Seconds => 1_000.0,
            Self::Minutes => 60_000.0,
            Self::Hours => 3_600_000.0,
        };
        (duration.max(0.0) * factor) as u64
    }
}

#[async_trait]
impl NodeHandler for Wait {
    async fn run(&self, node: &Node, input: Value, _ctx: &RunContext) -> Result<Value, NodeError> {
        let config: WaitConfig = serde_json::from_value(node.config.clone())
            .unwrap_or(WaitConfig { duration: default_duration(), unit: WaitUnit::Seconds });

        let millis = config.unit.millis(config.duration);
        debug!("waiting {millis}ms in node '{}'", node.id);
        tokio::time::sleep(std::time::Duration::from_millis(millis)).await;

        let mut out = as_object(&input);
        out.insert("_waited_ms".into(), json!(millis));
        Ok(Value::Object(out))
    }
}

// ---------------------------------------------------------------------------
// Respond
// ---------------------------------------------------------------------------

/// `respond` — produces an explicit status/headers/body triple that the
/// webhook service may surface verbatim to the original caller (sync
/// `onCompleted` mode only).
pub struct Respond;

#[async_trait]
impl NodeHandler for Respond {
    async fn run(&self, node: &Node, input: Value, _ctx: &RunContext) -> Result<Value, NodeError> {
        let status_code = node
            .config
            .get("status_code")
            .and_then(Value::as_u64)
            .unwrap_or(200);
        let headers = node
            .config
            .get("headers")
            .cloned()
            .unwrap_or_else(|| json!({ "content-type": "application/json" }));

        let body = match node.config.get("body") {
            None | Some(Value::Null) => input,
            Some(Value::String(template)) => Value::String(interpolate(template, &input)),
            Some(other) => interpolate_deep(other, &input),
        };

        Ok(json!({
            RESPOND_MARKER: true,
            "status_code": status_code,
            "headers": headers,
            "body": body,
        }))
    }
}

/// Clone `value` into a JSON object map, wrapping non-object values under
/// a `"value"` key so annotations always have somewhere to land.
fn as_object(value: &Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map.clone(),
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("value".into(), other.clone());
            map
        }
    }
}
