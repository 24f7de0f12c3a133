//! Durable audit event store
//!
//! The `AuditEventStore` trait is the narrow seam the store-backed publisher
//! dispatches through: an existence check on the idempotency key and an
//! insert that surfaces unique-constraint violations as
//! [`Error::DuplicateKey`](crate::error::Error::DuplicateKey).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::envelope::CanonicalEnvelope;
use crate::error::Result;

pub mod pg;

pub use pg::{create_pool, PgAuditEventStore};

/// Flattened persisted representation of a canonical envelope
#[derive(Debug, Clone)]
pub struct AuditEventRecord {
    pub event_id: Uuid,
    pub event_time: DateTime<Utc>,
    pub event_type: String,
    pub severity: String,
    pub source: String,
    pub service_name: Option<String>,
    pub service_version: Option<String>,
    pub environment: Option<String>,
    pub session_id: Option<String>,
    pub conversation_id: Option<String>,
    pub group_id: Option<String>,
    pub interaction_id: Option<String>,
    pub trace_id: Option<String>,
    pub span_id: Option<String>,
    /// Deduplication key; the store column carries a unique constraint
    pub idempotency_key: Option<String>,
    pub business_keys: Value,
    pub extra: Value,
    pub actor: Value,
    pub error: Value,
    /// Full envelope as one JSON document, for consumers that want the
    /// unflattened event
    pub event_payload: Value,
}

impl AuditEventRecord {
    /// Flatten an envelope into its persisted shape
    pub fn from_envelope(envelope: &CanonicalEnvelope) -> Result<Self> {
        let event_payload = serde_json::to_value(envelope)?;

        Ok(Self {
            event_id: envelope.event_id,
            event_time: envelope.event_time,
            event_type: envelope.event_type.clone(),
            severity: envelope.severity.as_str().to_string(),
            source: envelope.source.as_str().to_string(),
            service_name: envelope.service_name.clone(),
            service_version: envelope.service_version.clone(),
            environment: envelope.environment.clone(),
            session_id: envelope.session_id.clone(),
            conversation_id: envelope.conversation_id.clone(),
            group_id: envelope.group_id.clone(),
            interaction_id: envelope.interaction_id.clone(),
            trace_id: envelope.trace_id.clone(),
            span_id: envelope.span_id.clone(),
            idempotency_key: envelope.idempotency_key.clone(),
            business_keys: serde_json::to_value(&envelope.business_keys)?,
            extra: serde_json::to_value(&envelope.extra)?,
            actor: serde_json::to_value(&envelope.actor)?,
            error: serde_json::to_value(&envelope.error)?,
            event_payload,
        })
    }
}

/// Trait for durable audit event persistence backends
#[async_trait]
pub trait AuditEventStore: Send + Sync {
    /// True when a record with this idempotency key already exists
    async fn exists_by_key(&self, idempotency_key: &str) -> Result<bool>;

    /// Persist one record
    ///
    /// Fails with `Error::DuplicateKey` when the idempotency key collides
    /// with an existing record.
    async fn insert(&self, record: &AuditEventRecord) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{AuditSeverity, AuditSource};

    #[test]
    fn test_record_flattens_envelope() {
        let envelope = CanonicalEnvelope::new("order.created")
            .with_severity(AuditSeverity::Warn)
            .with_source(AuditSource::Api)
            .with_conversation_id("6e9a6f0e-8f8a-4f7b-9a65-b43a0be2d1c1")
            .with_idempotency_key("k-1")
            .with_extra("amount", serde_json::json!(3));

        let record = AuditEventRecord::from_envelope(&envelope).unwrap();
        assert_eq!(record.event_id, envelope.event_id);
        assert_eq!(record.severity, "WARN");
        assert_eq!(record.source, "API");
        assert_eq!(record.idempotency_key.as_deref(), Some("k-1"));
        assert_eq!(record.extra["amount"], serde_json::json!(3));
        assert_eq!(record.event_payload["eventType"], "order.created");
    }
}
