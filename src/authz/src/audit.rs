//! Audit sink boundary
//!
//! Every role mutation and every executed workflow step emits an
//! [`AuditEvent`]. Sinks are fire-and-forget: a failing sink must never
//! abort an already-decided authorization or state transition, so the
//! trait returns nothing and implementations swallow their own errors.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

/// A change event for the external audit pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Event identifier
    pub id: String,

    /// Subject that performed the action
    pub subject_id: String,

    /// What happened (e.g., "role.assigned", "workflow.step_executed")
    pub action: String,

    /// Resource kind the action touched
    pub resource: String,

    /// Identifier of the touched resource
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,

    /// Structured description of the change
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub changes: serde_json::Value,

    /// When the event happened
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        subject_id: impl Into<String>,
        action: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            subject_id: subject_id.into(),
            action: action.into(),
            resource: resource.into(),
            resource_id: None,
            changes: serde_json::Value::Null,
            timestamp: Utc::now(),
        }
    }

    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn with_changes(mut self, changes: serde_json::Value) -> Self {
        self.changes = changes;
        self
    }
}

/// Fire-and-forget audit event consumer
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, event: AuditEvent);
}

/// Default sink: structured log lines via `tracing`
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, event: AuditEvent) {
        tracing::info!(
            target: "audit",
            subject = %event.subject_id,
            action = %event.action,
            resource = %event.resource,
            resource_id = event.resource_id.as_deref().unwrap_or("-"),
            "audit event"
        );
    }
}

/// Sink that discards everything
pub struct NullAuditSink;

#[async_trait]
impl AuditSink for NullAuditSink {
    async fn record(&self, _event: AuditEvent) {}
}

/// In-memory sink for tests and inspection
#[derive(Default)]
pub struct MemoryAuditSink {
    events: RwLock<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<AuditEvent> {
        self.events.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, event: AuditEvent) {
        self.events.write().await.push(event);
    }
}
