//! `webhook` crate — the webhook trigger service.
//!
//! Owns the mapping from public HTTP paths to workflows, authenticates
//! inbound requests, and invokes the execution engine with either
//! fire-and-forget (`onReceived`) or block-for-result (`onCompleted`)
//! response semantics.

pub mod auth;
pub mod error;
pub mod model;
pub mod service;

pub use error::WebhookError;
pub use model::{AuthConfig, RegisteredWebhook, ResponseMode, WebhookAuth, WebhookInfo, WebhookOptions};
pub use service::{WebhookReply, WebhookRequest, WebhookService};

#[cfg(test)]
mod service_tests;
