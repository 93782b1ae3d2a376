//! Maps `node_type` strings to handler implementations.

use std::collections::HashMap;
use std::sync::Arc;

use crate::traits::NodeHandler;

/// Broad category a handler belongs to.
///
/// `Trigger` handlers mark nodes that qualify as run entry points; the
/// webhook service also uses the kind to find webhook-style trigger nodes
/// during workflow registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    Trigger,
    Action,
}

/// How a handler signals failure, documented at registration time.
///
/// Mixing both styles inside one workflow makes failure behaviour
/// unpredictable for the author, so every registration must declare its
/// policy up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// The handler returns `Err(..)` on failure; the engine aborts the run.
    Abort,
    /// The handler returns an error-shaped payload as ordinary output so
    /// downstream nodes can branch on it; it never returns `Err(..)`.
    Recoverable,
}

/// Registration metadata kept alongside the handler.
#[derive(Debug, Clone, Copy)]
pub struct HandlerMeta {
    pub kind: HandlerKind,
    pub failure_policy: FailurePolicy,
}

impl HandlerMeta {
    pub fn trigger() -> Self {
        Self { kind: HandlerKind::Trigger, failure_policy: FailurePolicy::Recoverable }
    }

    pub fn action(failure_policy: FailurePolicy) -> Self {
        Self { kind: HandlerKind::Action, failure_policy }
    }
}

/// A handler plus its registration metadata.
#[derive(Clone)]
pub struct Registration {
    pub handler: Arc<dyn NodeHandler>,
    pub meta: HandlerMeta,
}

/// Lookup table from node-type identifier to executable handler.
///
/// Construct one per process (or one per test — there is no shared
/// singleton) and register handlers explicitly at startup.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Registration>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-populated with the built-in handlers.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::builtin::register_builtins(&mut registry);
        registry
    }

    /// Register `handler` for `node_type`.
    ///
    /// Last registration wins: a second registration for the same type
    /// silently overwrites the first, so callers control ordering.
    pub fn register(
        &mut self,
        node_type: impl Into<String>,
        handler: Arc<dyn NodeHandler>,
        meta: HandlerMeta,
    ) {
        self.handlers.insert(node_type.into(), Registration { handler, meta });
    }

    pub fn resolve(&self, node_type: &str) -> Option<&Registration> {
        self.handlers.get(node_type)
    }

    /// Whether `node_type` is registered as a trigger handler.
    pub fn is_trigger(&self, node_type: &str) -> bool {
        self.handlers
            .get(node_type)
            .is_some_and(|r| r.meta.kind == HandlerKind::Trigger)
    }

    pub fn registered_types(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockHandler;
    use serde_json::json;

    #[test]
    fn resolve_returns_registered_handler() {
        let mut registry = HandlerRegistry::new();
        registry.register(
            "echo",
            Arc::new(MockHandler::echoing("echo")),
            HandlerMeta::action(FailurePolicy::Abort),
        );

        assert!(registry.resolve("echo").is_some());
        assert!(registry.resolve("nope").is_none());
        assert_eq!(registry.registered_types(), vec!["echo".to_string()]);
    }

    #[tokio::test]
    async fn last_registration_wins() {
        let mut registry = HandlerRegistry::new();
        registry.register(
            "x",
            Arc::new(MockHandler::returning("first", json!({ "v": 1 }))),
            HandlerMeta::action(FailurePolicy::Abort),
        );
        registry.register(
            "x",
            Arc::new(MockHandler::returning("second", json!({ "v": 2 }))),
            HandlerMeta::action(FailurePolicy::Abort),
        );

        let registration = registry.resolve("x").expect("registered");
        let ctx = crate::RunContext::new(
            uuid::Uuid::new_v4(),
            uuid::Uuid::new_v4(),
            crate::TriggerSource::Manual,
            json!({}),
        );
        let node = crate::Node::new("n1", "x", serde_json::Value::Null);
        let out = registration.handler.run(&node, json!({}), &ctx).await.unwrap();
        assert_eq!(out["v"], 2);
    }

    #[test]
    fn trigger_kind_is_visible_through_is_trigger() {
        let mut registry = HandlerRegistry::new();
        registry.register("trigger.test", Arc::new(MockHandler::echoing("t")), HandlerMeta::trigger());
        registry.register(
            "action.test",
            Arc::new(MockHandler::echoing("a")),
            HandlerMeta::action(FailurePolicy::Abort),
        );

        assert!(registry.is_trigger("trigger.test"));
        assert!(!registry.is_trigger("action.test"));
        assert!(!registry.is_trigger("unregistered"));
    }
}
