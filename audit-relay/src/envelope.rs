//! Canonical audit envelope and write-request types
//!
//! The envelope is the normalized form every publish path converges on before
//! a backend sees it. Values are immutable: the `with_*` builders consume the
//! value and return an enriched copy, so a shared envelope is never mutated
//! in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{Error, Result};

/// True when an optional string field is missing or whitespace-only
pub(crate) fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|s| s.trim().is_empty())
}

/// Audit event severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditSeverity {
    #[default]
    Info,
    Warn,
    Error,
}

impl AuditSeverity {
    /// Severity name as stored and joined into idempotency keys
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }

    /// Resolve free-text severity from outbox rows; unknown or blank
    /// values fall back to `Info`.
    pub fn parse_lenient(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_uppercase()).as_deref() {
            Some("WARN") => Self::Warn,
            Some("ERROR") => Self::Error,
            _ => Self::Info,
        }
    }
}

impl std::fmt::Display for AuditSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Origin of an audit event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditSource {
    Ui,
    Api,
    Batch,
    System,
    #[default]
    Other,
}

impl AuditSource {
    /// Source name as stored and joined into idempotency keys
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ui => "UI",
            Self::Api => "API",
            Self::Batch => "BATCH",
            Self::System => "SYSTEM",
            Self::Other => "OTHER",
        }
    }

    /// Resolve free-text source from outbox rows; unknown or blank values
    /// fall back to `Other`.
    pub fn parse_lenient(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_uppercase()).as_deref() {
            Some("UI") => Self::Ui,
            Some("API") => Self::Api,
            Some("BATCH") => Self::Batch,
            Some("SYSTEM") => Self::System,
            _ => Self::Other,
        }
    }
}

impl std::fmt::Display for AuditSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical audit envelope, generic and reusable across services
///
/// Wire format is camelCase JSON; the same shape is stored in outbox
/// `canonical_envelope` blobs and sent as the bus payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalEnvelope {
    /// Unique event identifier, generated at creation when absent
    #[serde(default = "Uuid::new_v4")]
    pub event_id: Uuid,
    /// When the event occurred, generated at creation when absent
    #[serde(default = "Utc::now")]
    pub event_time: DateTime<Utc>,
    /// Event type (stage name)
    pub event_type: String,
    #[serde(default)]
    pub severity: AuditSeverity,
    #[serde(default)]
    pub source: AuditSource,
    #[serde(default)]
    pub service_name: Option<String>,
    #[serde(default)]
    pub service_version: Option<String>,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    /// Correlation anchor; must be a valid UUID before dispatch
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub interaction_id: Option<String>,
    #[serde(default)]
    pub trace_id: Option<String>,
    #[serde(default)]
    pub span_id: Option<String>,
    /// Deduplication key; nullable until enrichment
    #[serde(default)]
    pub idempotency_key: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub business_keys: HashMap<String, serde_json::Value>,
    #[serde(default, rename = "extraMap", skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub actor: HashMap<String, serde_json::Value>,
    #[serde(default, rename = "errorMap", skip_serializing_if = "HashMap::is_empty")]
    pub error: HashMap<String, serde_json::Value>,
}

impl CanonicalEnvelope {
    /// Create a new envelope with a generated event id and timestamp
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_time: Utc::now(),
            event_type: event_type.into(),
            severity: AuditSeverity::default(),
            source: AuditSource::default(),
            service_name: None,
            service_version: None,
            environment: None,
            session_id: None,
            conversation_id: None,
            group_id: None,
            interaction_id: None,
            trace_id: None,
            span_id: None,
            idempotency_key: None,
            business_keys: HashMap::new(),
            extra: HashMap::new(),
            actor: HashMap::new(),
            error: HashMap::new(),
        }
    }

    pub fn with_severity(mut self, severity: AuditSeverity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_source(mut self, source: AuditSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = Some(name.into());
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_conversation_id(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn with_group_id(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    pub fn with_interaction_id(mut self, interaction_id: impl Into<String>) -> Self {
        self.interaction_id = Some(interaction_id.into());
        self
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    pub fn with_span_id(mut self, span_id: impl Into<String>) -> Self {
        self.span_id = Some(span_id.into());
        self
    }

    /// Return a copy carrying the given idempotency key
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn with_extra_map(mut self, extra: HashMap<String, serde_json::Value>) -> Self {
        self.extra.extend(extra);
        self
    }

    pub fn with_error_entry(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.error.insert(key.into(), value);
        self
    }

    /// Check the dispatch invariants
    ///
    /// Fails when `conversation_id` is blank or not a well-formed UUID, and
    /// when a UI-sourced event carries no session id.
    pub fn validate(&self) -> Result<()> {
        let conversation_id = self
            .conversation_id
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                Error::Validation("conversationId is required and must be a UUID".into())
            })?;

        Uuid::parse_str(conversation_id)
            .map_err(|_| Error::Validation("conversationId must be a valid UUID".into()))?;

        if self.source == AuditSource::Ui && is_blank(&self.session_id) {
            return Err(Error::Validation(
                "sessionId is required when source is UI".into(),
            ));
        }

        Ok(())
    }
}

/// Consumer-friendly request to publish audit events without building the
/// full canonical envelope
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditWriteRequest {
    pub event_type: String,
    #[serde(default)]
    pub severity: AuditSeverity,
    #[serde(default)]
    pub source: AuditSource,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub interaction_id: Option<String>,
    #[serde(default)]
    pub trace_id: Option<String>,
    #[serde(default)]
    pub span_id: Option<String>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub business_keys: HashMap<String, serde_json::Value>,
    #[serde(default, rename = "extraMap", skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub actor: HashMap<String, serde_json::Value>,
    #[serde(default, rename = "errorMap", skip_serializing_if = "HashMap::is_empty")]
    pub error: HashMap<String, serde_json::Value>,
}

impl AuditWriteRequest {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            ..Self::default()
        }
    }

    pub fn with_severity(mut self, severity: AuditSeverity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_source(mut self, source: AuditSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_conversation_id(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn with_group_id(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = Some(group_id.into());
        self
    }

    pub fn with_interaction_id(mut self, interaction_id: impl Into<String>) -> Self {
        self.interaction_id = Some(interaction_id.into());
        self
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn with_extra_map(mut self, extra: HashMap<String, serde_json::Value>) -> Self {
        self.extra.extend(extra);
        self
    }

    pub fn with_error_entry(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.error.insert(key.into(), value);
        self
    }

    /// Normalize into a canonical envelope, forcing the given severity
    pub fn into_envelope(self, severity: AuditSeverity) -> CanonicalEnvelope {
        let mut envelope = CanonicalEnvelope::new(self.event_type)
            .with_severity(severity)
            .with_source(self.source);
        envelope.session_id = self.session_id;
        envelope.conversation_id = self.conversation_id;
        envelope.group_id = self.group_id;
        envelope.interaction_id = self.interaction_id;
        envelope.trace_id = self.trace_id;
        envelope.span_id = self.span_id;
        envelope.idempotency_key = self.idempotency_key;
        envelope.business_keys = self.business_keys;
        envelope.extra = self.extra;
        envelope.actor = self.actor;
        envelope.error = self.error;
        envelope
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_envelope_generates_identity() {
        let a = CanonicalEnvelope::new("order.created");
        let b = CanonicalEnvelope::new("order.created");
        assert_ne!(a.event_id, b.event_id);
        assert_eq!(a.severity, AuditSeverity::Info);
        assert_eq!(a.source, AuditSource::Other);
        assert!(a.idempotency_key.is_none());
    }

    #[test]
    fn test_with_idempotency_key_is_copy_on_write() {
        let original = CanonicalEnvelope::new("order.created")
            .with_conversation_id("6e9a6f0e-8f8a-4f7b-9a65-b43a0be2d1c1");
        let enriched = original.clone().with_idempotency_key("abc");

        assert!(original.idempotency_key.is_none());
        assert_eq!(enriched.idempotency_key.as_deref(), Some("abc"));
        assert_eq!(enriched.event_id, original.event_id);
    }

    #[test]
    fn test_validate_requires_conversation_id() {
        let envelope = CanonicalEnvelope::new("order.created");
        assert!(matches!(
            envelope.validate(),
            Err(crate::error::Error::Validation(_))
        ));
    }

    #[test]
    fn test_validate_rejects_malformed_conversation_id() {
        let envelope = CanonicalEnvelope::new("order.created").with_conversation_id("not-a-uuid");
        assert!(matches!(
            envelope.validate(),
            Err(crate::error::Error::Validation(_))
        ));
    }

    #[test]
    fn test_validate_ui_requires_session_id() {
        let envelope = CanonicalEnvelope::new("page.view")
            .with_source(AuditSource::Ui)
            .with_conversation_id("6e9a6f0e-8f8a-4f7b-9a65-b43a0be2d1c1");
        assert!(matches!(
            envelope.validate(),
            Err(crate::error::Error::Validation(_))
        ));

        let envelope = envelope.with_session_id("session-1");
        assert!(envelope.validate().is_ok());
    }

    #[test]
    fn test_lenient_parsing_falls_back() {
        assert_eq!(AuditSource::parse_lenient(Some("ui")), AuditSource::Ui);
        assert_eq!(AuditSource::parse_lenient(Some("bogus")), AuditSource::Other);
        assert_eq!(AuditSource::parse_lenient(None), AuditSource::Other);
        assert_eq!(
            AuditSeverity::parse_lenient(Some(" warn ")),
            AuditSeverity::Warn
        );
        assert_eq!(AuditSeverity::parse_lenient(Some("")), AuditSeverity::Info);
    }

    #[test]
    fn test_envelope_serde_roundtrip_camel_case() {
        let envelope = CanonicalEnvelope::new("order.created")
            .with_conversation_id("6e9a6f0e-8f8a-4f7b-9a65-b43a0be2d1c1")
            .with_source(AuditSource::Api)
            .with_extra("amount", serde_json::json!(12));

        let json = serde_json::to_value(&envelope).unwrap();
        assert!(json.get("eventId").is_some());
        assert!(json.get("conversationId").is_some());
        assert_eq!(json["source"], "API");

        let decoded: CanonicalEnvelope = serde_json::from_value(json).unwrap();
        assert_eq!(decoded.event_id, envelope.event_id);
        assert_eq!(decoded.extra["amount"], serde_json::json!(12));
    }

    #[test]
    fn test_into_envelope_forces_severity_and_copies_fields() {
        let request = AuditWriteRequest::new("job.failed")
            .with_severity(AuditSeverity::Info)
            .with_conversation_id("6e9a6f0e-8f8a-4f7b-9a65-b43a0be2d1c1")
            .with_group_id("g-1")
            .with_error_entry("message", serde_json::json!("boom"));

        let envelope = request.into_envelope(AuditSeverity::Error);
        assert_eq!(envelope.severity, AuditSeverity::Error);
        assert_eq!(envelope.group_id.as_deref(), Some("g-1"));
        assert_eq!(envelope.error["message"], serde_json::json!("boom"));
    }
}
