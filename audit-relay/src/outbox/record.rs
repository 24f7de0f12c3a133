//! Outbox row representation and payload resolution

use serde_json::Value;
use std::collections::HashMap;

use crate::envelope::{AuditSeverity, AuditSource, AuditWriteRequest, CanonicalEnvelope};
use crate::error::{Error, Result};

/// Delivery state of an outbox row
///
/// `Sent` and `DeadLetter` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboxStatus {
    Pending,
    Processing,
    Sent,
    DeadLetter,
}

impl OutboxStatus {
    /// Status name as stored in the outbox table
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::Sent => "SENT",
            Self::DeadLetter => "DEAD_LETTER",
        }
    }
}

impl std::fmt::Display for OutboxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One pending or attempted delivery, as claimed from the outbox table
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OutboxRecord {
    pub id: i64,
    pub stage: Option<String>,
    pub conversation_id: Option<String>,
    pub trace_id: Option<String>,
    pub source: Option<String>,
    pub severity: Option<String>,
    pub metadata: Option<Value>,
    pub audit_write_request: Option<Value>,
    pub canonical_envelope: Option<Value>,
    pub retry_count: i32,
    pub max_retries: i32,
}

/// The effective dispatch payload of an outbox row
///
/// Resolved once per row by [`OutboxRecord::payload`]; downstream code sees
/// an explicit one-of instead of three nullable blobs.
#[derive(Debug, Clone)]
pub enum OutboxPayload {
    Envelope(CanonicalEnvelope),
    WriteRequest(AuditWriteRequest),
    StageMetadata {
        stage: String,
        conversation_id: Option<String>,
        trace_id: Option<String>,
        source: AuditSource,
        severity: AuditSeverity,
        metadata: HashMap<String, Value>,
    },
}

fn non_empty_object(value: &Option<Value>) -> bool {
    matches!(value, Some(Value::Object(map)) if !map.is_empty())
}

impl OutboxRecord {
    /// Resolve the effective payload by precedence:
    /// canonical envelope > write request > stage + metadata.
    ///
    /// A blob counts as present when it is a non-empty JSON object.
    /// Malformed blob content fails with `Error::Serialization`, which is
    /// fatal for this record only.
    pub fn payload(&self) -> Result<OutboxPayload> {
        if non_empty_object(&self.canonical_envelope) {
            let envelope: CanonicalEnvelope =
                serde_json::from_value(self.canonical_envelope.clone().unwrap_or_default())
                    .map_err(|e| {
                        Error::Serialization(format!(
                            "Invalid canonical envelope on outbox row {}: {}",
                            self.id, e
                        ))
                    })?;
            return Ok(OutboxPayload::Envelope(envelope));
        }

        if non_empty_object(&self.audit_write_request) {
            let request: AuditWriteRequest =
                serde_json::from_value(self.audit_write_request.clone().unwrap_or_default())
                    .map_err(|e| {
                        Error::Serialization(format!(
                            "Invalid write request on outbox row {}: {}",
                            self.id, e
                        ))
                    })?;
            return Ok(OutboxPayload::WriteRequest(request));
        }

        let stage = self
            .stage
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                Error::Serialization(format!(
                    "Outbox row {} carries no dispatchable payload",
                    self.id
                ))
            })?;

        let metadata = match &self.metadata {
            Some(Value::Object(map)) => map.clone().into_iter().collect(),
            _ => HashMap::new(),
        };

        Ok(OutboxPayload::StageMetadata {
            stage: stage.to_string(),
            conversation_id: self.conversation_id.clone(),
            trace_id: self.trace_id.clone(),
            source: AuditSource::parse_lenient(self.source.as_deref()),
            severity: AuditSeverity::parse_lenient(self.severity.as_deref()),
            metadata,
        })
    }
}
