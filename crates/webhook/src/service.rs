//! The webhook trigger service.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use engine::{validate_dag, ResponseOverride, TriggerSource, WorkflowDefinition, WorkflowExecutor};

use crate::auth::authenticate;
use crate::error::WebhookError;
use crate::model::{RegisteredWebhook, ResponseMode, WebhookOptions};

/// An inbound request, pre-extracted from whatever HTTP layer fronts the
/// service.
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub body: Value,
}

/// What the original caller should receive.
#[derive(Debug)]
pub enum WebhookReply {
    /// `onReceived`: acknowledged, run proceeding detached.
    Accepted { execution_id: Uuid },
    /// `onCompleted`: run finished; default output envelope.
    Completed { execution_id: Uuid, response: Value },
    /// `onCompleted` with a respond node: surface its triple verbatim.
    Custom(ResponseOverride),
}

/// Maps public HTTP paths to workflows and runs the routing pipeline:
/// path lookup → active check → method check → auth → engine invocation.
///
/// Process-wide state with explicit construction — tests build a fresh
/// service per test rather than sharing a singleton.
pub struct WebhookService {
    executor: Arc<WorkflowExecutor>,
    workflows: RwLock<HashMap<Uuid, Arc<WorkflowDefinition>>>,
    /// webhook id → record
    webhooks: RwLock<HashMap<String, Arc<RegisteredWebhook>>>,
    /// path → webhook id.  Lock order when holding both guards:
    /// `webhooks` first, then `path_index`.
    path_index: RwLock<HashMap<String, String>>,
}

impl WebhookService {
    pub fn new(executor: Arc<WorkflowExecutor>) -> Self {
        info!("webhook service initialized");
        Self {
            executor,
            workflows: RwLock::new(HashMap::new()),
            webhooks: RwLock::new(HashMap::new()),
            path_index: RwLock::new(HashMap::new()),
        }
    }

    pub fn executor(&self) -> &Arc<WorkflowExecutor> {
        &self.executor
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Store `workflow` and register every webhook-style trigger node it
    /// contains at its configured (or default) path.
    ///
    /// Workflows without any webhook trigger are registered under one
    /// synthesized default path, so every stored workflow is triggerable.
    /// Cyclic or otherwise malformed graphs are rejected here, before they
    /// can ever execute.
    pub fn register_workflow(
        &self,
        workflow: WorkflowDefinition,
    ) -> Result<Vec<Arc<RegisteredWebhook>>, WebhookError> {
        validate_dag(&workflow).map_err(WebhookError::InvalidWorkflow)?;

        let workflow = Arc::new(workflow);
        self.workflows
            .write()
            .expect("workflow store lock poisoned")
            .insert(workflow.id, Arc::clone(&workflow));

        let webhook_nodes: Vec<_> = workflow
            .nodes
            .iter()
            .filter(|n| {
                self.executor.registry().is_trigger(&n.node_type)
                    && (n.node_type.contains("webhook")
                        || n.name.to_lowercase().contains("webhook"))
            })
            .collect();

        let default_path = format!("/webhook/{}/trigger", workflow.id);

        if webhook_nodes.is_empty() {
            let registered =
                self.register(workflow.id, WebhookOptions { path: Some(default_path), ..WebhookOptions::default() })?;
            info!("registered default webhook for workflow {}: {}", workflow.id, registered.path);
            return Ok(vec![registered]);
        }

        let mut registered = Vec::with_capacity(webhook_nodes.len());
        for node in webhook_nodes {
            let mut options: WebhookOptions =
                serde_json::from_value(node.config.clone()).unwrap_or_default();
            if options.path.is_none() {
                options.path = Some(default_path.clone());
            }
            let hook = self.register(workflow.id, options)?;
            info!(
                "registered webhook for workflow {} (node '{}'): {}",
                workflow.id, node.id, hook.path
            );
            registered.push(hook);
        }

        Ok(registered)
    }

    /// Register a single webhook endpoint for `workflow_id`.
    ///
    /// Re-registering a path the same workflow already owns replaces the
    /// record in place (reactivated, statistics carried over); a path held
    /// by a different workflow is a [`WebhookError::PathCollision`].
    pub fn register(
        &self,
        workflow_id: Uuid,
        options: WebhookOptions,
    ) -> Result<Arc<RegisteredWebhook>, WebhookError> {
        let mut webhooks = self.webhooks.write().expect("webhook table lock poisoned");
        let mut path_index = self.path_index.write().expect("path index lock poisoned");

        let path = options
            .path
            .clone()
            .unwrap_or_else(|| format!("/webhook/{workflow_id}/trigger"));

        let mut hook = RegisteredWebhook::new(workflow_id, path.clone(), options);

        if let Some(existing_id) = path_index.get(&path).cloned() {
            if let Some(existing) = webhooks.get(&existing_id) {
                if existing.workflow_id != workflow_id {
                    return Err(WebhookError::PathCollision(path));
                }
                hook = hook.carry_stats_from(existing.as_ref());
            }
            webhooks.remove(&existing_id);
        }

        let hook = Arc::new(hook);
        path_index.insert(path, hook.id.clone());
        webhooks.insert(hook.id.clone(), Arc::clone(&hook));
        Ok(hook)
    }

    // -----------------------------------------------------------------------
    // Request handling
    // -----------------------------------------------------------------------

    /// Run the full routing pipeline for one inbound request.
    ///
    /// Every rejection here happens before the engine is invoked.
    pub async fn handle_request(&self, request: WebhookRequest) -> Result<WebhookReply, WebhookError> {
        let hook = self
            .webhook_by_path(&request.path)
            .ok_or_else(|| WebhookError::NotFound(request.path.clone()))?;

        if !hook.is_active() {
            return Err(WebhookError::Disabled);
        }

        if hook.method != "ANY" && hook.method != request.method.to_uppercase() {
            return Err(WebhookError::MethodNotAllowed { expected: hook.method.clone() });
        }

        authenticate(&hook.auth, &request.headers).inspect_err(|_| {
            warn!("webhook auth failed: {}", request.path);
        })?;

        let workflow = self
            .workflows
            .read()
            .expect("workflow store lock poisoned")
            .get(&hook.workflow_id)
            .cloned()
            .ok_or(WebhookError::WorkflowMissing(hook.workflow_id))?;

        hook.record_trigger();
        info!(
            "webhook triggered: {} (count {})",
            request.path,
            hook.trigger_count()
        );

        let payload = json!({
            "webhook": {
                "path": request.path,
                "method": request.method,
                "headers": request.headers,
                "query": request.query,
                "body": request.body,
                "timestamp": Utc::now().to_rfc3339(),
            },
            "body": request.body,
            "query": request.query,
        });

        let execution_id = Uuid::new_v4();

        match hook.response_mode {
            ResponseMode::OnReceived => {
                // Fire and forget: the caller only ever learns the
                // execution id; failures surface in the logs.
                let executor = Arc::clone(&self.executor);
                tokio::spawn(async move {
                    match executor
                        .run_with_id(&workflow, payload, TriggerSource::Webhook, execution_id)
                        .await
                    {
                        Ok(record) => info!(
                            "detached webhook run {} finished ({} nodes)",
                            execution_id,
                            record.node_results.len()
                        ),
                        Err(e) => error!("detached webhook run {} failed: {}", execution_id, e),
                    }
                });
                Ok(WebhookReply::Accepted { execution_id })
            }

            ResponseMode::OnCompleted => {
                let record = self
                    .executor
                    .run_with_id(&workflow, payload, TriggerSource::Webhook, execution_id)
                    .await
                    .map_err(WebhookError::Execution)?;

                match record.response_override {
                    Some(over) => Ok(WebhookReply::Custom(over)),
                    None => Ok(WebhookReply::Completed {
                        execution_id: record.execution_id,
                        response: record.output,
                    }),
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle and lookups
    // -----------------------------------------------------------------------

    /// Flip a webhook's active flag.  Returns the new state, or `None` for
    /// an unknown id.
    pub fn toggle(&self, webhook_id: &str) -> Option<bool> {
        let webhooks = self.webhooks.read().expect("webhook table lock poisoned");
        let hook = webhooks.get(webhook_id)?;
        let now_active = !hook.is_active();
        hook.set_active(now_active);
        info!("webhook {} {}", webhook_id, if now_active { "enabled" } else { "disabled" });
        Some(now_active)
    }

    /// Deactivate (without deleting) every webhook of a workflow.
    pub fn deactivate_workflow(&self, workflow_id: Uuid) {
        let webhooks = self.webhooks.read().expect("webhook table lock poisoned");
        for hook in webhooks.values().filter(|h| h.workflow_id == workflow_id) {
            hook.set_active(false);
        }
    }

    /// Explicitly remove a workflow and hard-delete its webhooks.
    pub fn remove_workflow(&self, workflow_id: Uuid) -> bool {
        let removed = self
            .workflows
            .write()
            .expect("workflow store lock poisoned")
            .remove(&workflow_id)
            .is_some();

        let mut webhooks = self.webhooks.write().expect("webhook table lock poisoned");
        let mut path_index = self.path_index.write().expect("path index lock poisoned");
        webhooks.retain(|_, hook| {
            if hook.workflow_id == workflow_id {
                path_index.remove(&hook.path);
                false
            } else {
                true
            }
        });

        removed
    }

    pub fn workflow(&self, workflow_id: Uuid) -> Option<Arc<WorkflowDefinition>> {
        self.workflows
            .read()
            .expect("workflow store lock poisoned")
            .get(&workflow_id)
            .cloned()
    }

    pub fn workflows(&self) -> Vec<Arc<WorkflowDefinition>> {
        self.workflows
            .read()
            .expect("workflow store lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    pub fn webhook_by_path(&self, path: &str) -> Option<Arc<RegisteredWebhook>> {
        // Lock order is `webhooks` before `path_index` (see `register`);
        // copy the id out and release the index guard before touching the
        // webhook table rather than holding both in reverse order.
        let id = self
            .path_index
            .read()
            .expect("path index lock poisoned")
            .get(path)
            .cloned()?;
        self.webhooks
            .read()
            .expect("webhook table lock poisoned")
            .get(&id)
            .cloned()
    }

    pub fn list_for_workflow(&self, workflow_id: Uuid) -> Vec<Arc<RegisteredWebhook>> {
        self.webhooks
            .read()
            .expect("webhook table lock poisoned")
            .values()
            .filter(|h| h.workflow_id == workflow_id)
            .cloned()
            .collect()
    }

    pub fn paths(&self) -> Vec<String> {
        self.path_index
            .read()
            .expect("path index lock poisoned")
            .keys()
            .cloned()
            .collect()
    }
}
