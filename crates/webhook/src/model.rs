//! Registered-webhook records and registration options.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::sha256_hex;

/// Sync vs async response strategy for a webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResponseMode {
    /// Acknowledge immediately; the run proceeds detached and its result is
    /// only observable via logs/execution history.
    OnReceived,
    /// Block the caller until the run finishes, then return its output (or
    /// a respond node's explicit triple).
    #[default]
    OnCompleted,
}

/// Stored credential material, hashed where applicable.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WebhookAuth {
    #[default]
    None,
    Basic {
        username: String,
        password_hash: String,
    },
    Header {
        name: String,
        value_hash: String,
    },
    /// Requires a bearer token to be present; full signature verification
    /// is an external collaborator concern.
    Jwt,
}

/// Plaintext auth settings as supplied at registration time; hashed into
/// [`WebhookAuth`] before storage.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AuthConfig {
    #[default]
    None,
    Basic {
        username: String,
        password: String,
    },
    Header {
        name: String,
        value: String,
    },
    Jwt,
}

impl AuthConfig {
    pub(crate) fn into_stored(self) -> WebhookAuth {
        match self {
            Self::None => WebhookAuth::None,
            Self::Basic { username, password } => WebhookAuth::Basic {
                username,
                password_hash: sha256_hex(&password),
            },
            Self::Header { name, value } => WebhookAuth::Header {
                name,
                value_hash: sha256_hex(&value),
            },
            Self::Jwt => WebhookAuth::Jwt,
        }
    }
}

/// Registration options, typically read from a webhook trigger node's
/// config.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct WebhookOptions {
    pub path: Option<String>,
    pub method: Option<String>,
    #[serde(default, alias = "responseMode")]
    pub response_mode: ResponseMode,
    #[serde(default)]
    pub auth: AuthConfig,
}

/// One registered webhook endpoint.
///
/// The record itself is read-mostly and shared behind an `Arc`; the
/// mutable bits (active flag, trigger statistics) are atomics so
/// concurrent triggers never race on a read-modify-write.
#[derive(Debug)]
pub struct RegisteredWebhook {
    pub id: String,
    pub path: String,
    pub workflow_id: Uuid,
    /// Uppercased HTTP verb, or `ANY`.
    pub method: String,
    pub response_mode: ResponseMode,
    pub auth: WebhookAuth,
    pub created_at: DateTime<Utc>,
    active: AtomicBool,
    trigger_count: AtomicU64,
    /// Millis since epoch; 0 means never triggered.
    last_triggered_at_ms: AtomicI64,
}

impl RegisteredWebhook {
    pub(crate) fn new(workflow_id: Uuid, path: String, options: WebhookOptions) -> Self {
        Self {
            id: format!("wh_{}", Uuid::new_v4()),
            path,
            workflow_id,
            method: options.method.as_deref().unwrap_or("ANY").to_uppercase(),
            response_mode: options.response_mode,
            auth: options.auth.into_stored(),
            created_at: Utc::now(),
            active: AtomicBool::new(true),
            trigger_count: AtomicU64::new(0),
            last_triggered_at_ms: AtomicI64::new(0),
        }
    }

    /// Re-registration carries the previous trigger count forward.
    pub(crate) fn carry_stats_from(self, previous: &RegisteredWebhook) -> Self {
        self.trigger_count
            .store(previous.trigger_count(), Ordering::Relaxed);
        self.last_triggered_at_ms.store(
            previous.last_triggered_at_ms.load(Ordering::Relaxed),
            Ordering::Relaxed,
        );
        self
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Relaxed);
    }

    /// Atomically bump the trigger statistics.
    pub(crate) fn record_trigger(&self) {
        self.trigger_count.fetch_add(1, Ordering::Relaxed);
        self.last_triggered_at_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    pub fn trigger_count(&self) -> u64 {
        self.trigger_count.load(Ordering::Relaxed)
    }

    pub fn last_triggered_at(&self) -> Option<DateTime<Utc>> {
        match self.last_triggered_at_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => Utc.timestamp_millis_opt(ms).single(),
        }
    }

    /// Serialisable point-in-time view for API listings.
    pub fn snapshot(&self) -> WebhookInfo {
        WebhookInfo {
            id: self.id.clone(),
            path: self.path.clone(),
            workflow_id: self.workflow_id,
            method: self.method.clone(),
            response_mode: self.response_mode,
            is_active: self.is_active(),
            created_at: self.created_at,
            trigger_count: self.trigger_count(),
            last_triggered_at: self.last_triggered_at(),
        }
    }
}

/// Point-in-time view of a [`RegisteredWebhook`].
#[derive(Debug, Clone, Serialize)]
pub struct WebhookInfo {
    pub id: String,
    pub path: String,
    pub workflow_id: Uuid,
    pub method: String,
    pub response_mode: ResponseMode,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub trigger_count: u64,
    pub last_triggered_at: Option<DateTime<Utc>>,
}
