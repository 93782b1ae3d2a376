//! End-to-end tests for the webhook trigger service.
//!
//! Each test builds its own registry, executor, and service — nothing is
//! shared between tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use engine::{Edge, EngineError, ExecutorConfig, Node, WorkflowDefinition, WorkflowExecutor};
use nodes::mock::MockHandler;
use nodes::{FailurePolicy, HandlerMeta, HandlerRegistry, NodeError, NodeHandler, RunContext};

use crate::error::WebhookError;
use crate::model::{AuthConfig, WebhookOptions};
use crate::service::{WebhookReply, WebhookRequest, WebhookService};

/// Doubles the `body.n` field of its input.
struct Doubling;

#[async_trait]
impl NodeHandler for Doubling {
    async fn run(&self, _node: &Node, input: Value, _ctx: &RunContext) -> Result<Value, NodeError> {
        let n = input
            .get("body")
            .and_then(|b| b.get("n"))
            .and_then(Value::as_i64)
            .ok_or_else(|| NodeError::Fatal("input has no body.n".into()))?;
        Ok(json!(n * 2))
    }
}

fn service_with(spy: Arc<MockHandler>) -> WebhookService {
    let mut registry = HandlerRegistry::with_builtins();
    registry.register("double", Arc::new(Doubling), HandlerMeta::action(FailurePolicy::Abort));
    registry.register("spy", spy, HandlerMeta::action(FailurePolicy::Abort));
    let executor = WorkflowExecutor::new(Arc::new(registry), ExecutorConfig::default());
    WebhookService::new(Arc::new(executor))
}

/// trigger.webhook(config) → double
fn doubling_workflow(trigger_config: Value) -> WorkflowDefinition {
    WorkflowDefinition::new(
        "doubler",
        vec![
            Node::new("hook", "trigger.webhook", trigger_config),
            Node::new("calc", "double", Value::Null),
        ],
        vec![Edge::between("hook", "calc")],
    )
}

fn request(method: &str, path: &str, headers: &[(&str, &str)], body: Value) -> WebhookRequest {
    WebhookRequest {
        method: method.into(),
        path: path.into(),
        headers: headers.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        query: HashMap::new(),
        body,
    }
}

// ============================================================
// onCompleted happy path
// ============================================================

#[tokio::test]
async fn on_completed_webhook_returns_the_engine_output() {
    let service = service_with(Arc::new(MockHandler::echoing("spy")));
    let workflow = doubling_workflow(json!({ "path": "/hook/x", "method": "POST" }));

    let registered = service.register_workflow(workflow).expect("registers");
    assert_eq!(registered.len(), 1);
    assert_eq!(registered[0].path, "/hook/x");

    let reply = service
        .handle_request(request("POST", "/hook/x", &[], json!({ "n": 3 })))
        .await
        .expect("request succeeds");

    match reply {
        WebhookReply::Completed { response, .. } => assert_eq!(response, json!(6)),
        other => panic!("expected Completed, got {other:?}"),
    }

    let hook = service.webhook_by_path("/hook/x").expect("registered");
    assert_eq!(hook.trigger_count(), 1);
    assert!(hook.last_triggered_at().is_some());
}

// ============================================================
// Authentication
// ============================================================

#[tokio::test]
async fn missing_auth_header_rejects_before_the_engine_runs() {
    let spy = Arc::new(MockHandler::echoing("spy"));
    let service = service_with(Arc::clone(&spy));

    // Workflow whose only node is the spy: if auth is bypassed, the spy
    // call count will betray it.
    let workflow = WorkflowDefinition::new(
        "guarded",
        vec![
            Node::new("hook", "trigger.webhook", json!({ "path": "/hook/secret" })),
            Node::new("work", "spy", Value::Null),
        ],
        vec![Edge::between("hook", "work")],
    );
    let workflow_id = workflow.id;
    service.register_workflow(workflow).expect("registers");

    // Re-register the path with header auth.
    service
        .register(
            workflow_id,
            WebhookOptions {
                path: Some("/hook/secret".into()),
                auth: AuthConfig::Header { name: "X-Secret".into(), value: "abc".into() },
                ..WebhookOptions::default()
            },
        )
        .expect("re-registration of own path");

    let err = service
        .handle_request(request("POST", "/hook/secret", &[], json!({})))
        .await
        .expect_err("must be rejected");
    assert!(matches!(err, WebhookError::AuthenticationFailed));
    assert_eq!(spy.call_count(), 0, "engine must never be invoked");

    // With the right header the same request goes through.
    let reply = service
        .handle_request(request("POST", "/hook/secret", &[("X-Secret", "abc")], json!({})))
        .await
        .expect("authenticated request succeeds");
    assert!(matches!(reply, WebhookReply::Completed { .. }));
    assert_eq!(spy.call_count(), 1);
}

// ============================================================
// Routing rejections
// ============================================================

#[tokio::test]
async fn unknown_path_is_not_found() {
    let service = service_with(Arc::new(MockHandler::echoing("spy")));
    let err = service
        .handle_request(request("POST", "/hook/ghost", &[], json!({})))
        .await
        .expect_err("nothing registered");
    assert!(matches!(err, WebhookError::NotFound(p) if p == "/hook/ghost"));
}

#[tokio::test]
async fn method_mismatch_is_rejected() {
    let service = service_with(Arc::new(MockHandler::echoing("spy")));
    let workflow = doubling_workflow(json!({ "path": "/hook/post-only", "method": "POST" }));
    service.register_workflow(workflow).expect("registers");

    let err = service
        .handle_request(request("GET", "/hook/post-only", &[], json!({})))
        .await
        .expect_err("GET must be rejected");
    assert!(matches!(err, WebhookError::MethodNotAllowed { expected } if expected == "POST"));
}

#[tokio::test]
async fn toggled_off_webhook_is_disabled() {
    let service = service_with(Arc::new(MockHandler::echoing("spy")));
    let workflow = doubling_workflow(json!({ "path": "/hook/flip" }));
    let registered = service.register_workflow(workflow).expect("registers");

    assert_eq!(service.toggle(&registered[0].id), Some(false));

    let err = service
        .handle_request(request("POST", "/hook/flip", &[], json!({ "n": 1 })))
        .await
        .expect_err("disabled hook rejects");
    assert!(matches!(err, WebhookError::Disabled));

    // Flip back on and it works again.
    assert_eq!(service.toggle(&registered[0].id), Some(true));
    assert!(service
        .handle_request(request("POST", "/hook/flip", &[], json!({ "n": 1 })))
        .await
        .is_ok());
}

// ============================================================
// Registration semantics
// ============================================================

#[tokio::test]
async fn path_owned_by_another_workflow_collides() {
    let service = service_with(Arc::new(MockHandler::echoing("spy")));
    let first = doubling_workflow(json!({ "path": "/hook/shared" }));
    service.register_workflow(first).expect("first registers");

    let second = doubling_workflow(json!({ "path": "/hook/shared" }));
    let err = service.register_workflow(second).expect_err("collision");
    assert!(matches!(err, WebhookError::PathCollision(p) if p == "/hook/shared"));
}

#[tokio::test]
async fn workflow_without_webhook_nodes_gets_a_default_path() {
    let service = service_with(Arc::new(MockHandler::echoing("spy")));
    let workflow = WorkflowDefinition::new(
        "plain",
        vec![Node::new("calc", "double", Value::Null)],
        vec![],
    );
    let workflow_id = workflow.id;

    let registered = service.register_workflow(workflow).expect("registers");
    assert_eq!(registered.len(), 1);
    assert_eq!(registered[0].path, format!("/webhook/{workflow_id}/trigger"));
    assert_eq!(registered[0].method, "ANY");
}

#[tokio::test]
async fn cyclic_workflow_is_rejected_at_registration() {
    let service = service_with(Arc::new(MockHandler::echoing("spy")));
    let workflow = WorkflowDefinition::new(
        "cyclic",
        vec![
            Node::new("a", "double", Value::Null),
            Node::new("b", "double", Value::Null),
        ],
        vec![Edge::between("a", "b"), Edge::between("b", "a")],
    );

    let err = service.register_workflow(workflow).expect_err("cycle rejected");
    assert!(matches!(
        err,
        WebhookError::InvalidWorkflow(EngineError::CycleDetected)
    ));
    assert!(service.paths().is_empty(), "nothing may be registered");
}

#[tokio::test]
async fn re_registration_carries_trigger_statistics() {
    let service = service_with(Arc::new(MockHandler::echoing("spy")));
    let workflow = doubling_workflow(json!({ "path": "/hook/stats" }));
    let workflow_id = workflow.id;
    service.register_workflow(workflow).expect("registers");

    service
        .handle_request(request("POST", "/hook/stats", &[], json!({ "n": 2 })))
        .await
        .expect("first trigger");

    // Same workflow re-registers the same path.
    let hook = service
        .register(
            workflow_id,
            WebhookOptions { path: Some("/hook/stats".into()), ..WebhookOptions::default() },
        )
        .expect("own path can be re-registered");
    assert_eq!(hook.trigger_count(), 1);
    assert!(hook.is_active());
}

#[test]
fn concurrent_registration_and_lookup_make_progress() {
    // Registration holds the webhook table and the path index together;
    // lookups on the hot path must never hold the two guards in the
    // opposite order, or a racing pair wedges the whole service.
    let service = Arc::new(service_with(Arc::new(MockHandler::echoing("spy"))));
    let workflow_id = uuid::Uuid::new_v4();

    let registrar = {
        let service = Arc::clone(&service);
        std::thread::spawn(move || {
            for _ in 0..10_000 {
                service
                    .register(
                        workflow_id,
                        WebhookOptions { path: Some("/hook/hot".into()), ..WebhookOptions::default() },
                    )
                    .expect("same workflow re-registers its own path");
            }
        })
    };

    let reader = {
        let service = Arc::clone(&service);
        std::thread::spawn(move || {
            for _ in 0..10_000 {
                let _ = service.webhook_by_path("/hook/hot");
            }
        })
    };

    registrar.join().expect("registrar thread finished");
    reader.join().expect("reader thread finished");
    assert!(service.webhook_by_path("/hook/hot").is_some());
}

// ============================================================
// onReceived
// ============================================================

#[tokio::test]
async fn on_received_acknowledges_before_the_run_finishes() {
    let spy = Arc::new(MockHandler::echoing("spy"));
    let service = Arc::new(service_with(Arc::clone(&spy)));

    let workflow = WorkflowDefinition::new(
        "detached",
        vec![
            Node::new(
                "hook",
                "trigger.webhook",
                json!({ "path": "/hook/async", "responseMode": "onReceived" }),
            ),
            Node::new("work", "spy", Value::Null),
        ],
        vec![Edge::between("hook", "work")],
    );
    service.register_workflow(workflow).expect("registers");

    let reply = service
        .handle_request(request("POST", "/hook/async", &[], json!({ "n": 1 })))
        .await
        .expect("acknowledged");
    assert!(matches!(reply, WebhookReply::Accepted { .. }));

    // The detached run still happens; give it a moment to land.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert_eq!(spy.call_count(), 1);
}

// ============================================================
// Respond-node override
// ============================================================

#[tokio::test]
async fn respond_node_overrides_the_sync_envelope() {
    let service = service_with(Arc::new(MockHandler::echoing("spy")));
    let workflow = WorkflowDefinition::new(
        "custom-response",
        vec![
            Node::new("hook", "trigger.webhook", json!({ "path": "/hook/custom" })),
            Node::new(
                "out",
                "respond",
                json!({ "status_code": 201, "body": { "created": true } }),
            ),
        ],
        vec![Edge::between("hook", "out")],
    );
    service.register_workflow(workflow).expect("registers");

    let reply = service
        .handle_request(request("POST", "/hook/custom", &[], json!({})))
        .await
        .expect("request succeeds");

    match reply {
        WebhookReply::Custom(over) => {
            assert_eq!(over.status_code, 201);
            assert_eq!(over.body, json!({ "created": true }));
        }
        other => panic!("expected Custom, got {other:?}"),
    }
}

// ============================================================
// Removal
// ============================================================

#[tokio::test]
async fn removing_a_workflow_deletes_its_webhooks() {
    let service = service_with(Arc::new(MockHandler::echoing("spy")));
    let workflow = doubling_workflow(json!({ "path": "/hook/gone" }));
    let workflow_id = workflow.id;
    service.register_workflow(workflow).expect("registers");

    assert!(service.remove_workflow(workflow_id));
    assert!(service.webhook_by_path("/hook/gone").is_none());
    assert!(service.workflow(workflow_id).is_none());

    let err = service
        .handle_request(request("POST", "/hook/gone", &[], json!({})))
        .await
        .expect_err("removed path is gone");
    assert!(matches!(err, WebhookError::NotFound(_)));
}
