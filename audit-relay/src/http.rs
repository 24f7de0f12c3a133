//! Thin HTTP ingress adapter
//!
//! Two endpoints: event publishing with payload-shape precedence, and an
//! on-demand outbox drain trigger. Both are thin glue over the audit
//! service and the drain engine; all validation and delivery semantics live
//! in the core.

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::envelope::{AuditSeverity, AuditSource, AuditWriteRequest, CanonicalEnvelope};
use crate::error::{Error, Result};
use crate::outbox::{DrainSummary, OutboxDrainEngine};
use crate::service::AuditService;

/// Shared state for the ingress router
#[derive(Clone)]
pub struct AppState {
    pub service: AuditService,
    pub drain: Arc<OutboxDrainEngine>,
}

/// Publish request accepting one of three payload shapes
///
/// Precedence: canonical envelope > write request > stage + metadata.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishApiRequest {
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub trace_id: Option<String>,
    #[serde(default)]
    pub source: Option<AuditSource>,
    #[serde(default)]
    pub severity: Option<AuditSeverity>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
    #[serde(default)]
    pub audit_write_request: Option<AuditWriteRequest>,
    #[serde(default)]
    pub canonical_envelope: Option<CanonicalEnvelope>,
}

#[derive(Debug, Serialize)]
struct PublishAccepted {
    status: &'static str,
    mode: &'static str,
}

fn accepted(mode: &'static str) -> Json<PublishAccepted> {
    Json(PublishAccepted {
        status: "ACCEPTED",
        mode,
    })
}

async fn publish(
    State(state): State<AppState>,
    Json(request): Json<PublishApiRequest>,
) -> Result<Json<PublishAccepted>> {
    if let Some(envelope) = request.canonical_envelope {
        state.service.publish_envelope(envelope).await?;
        return Ok(accepted("canonicalEnvelope"));
    }

    if let Some(write_request) = request.audit_write_request {
        state.service.publish_request(write_request).await?;
        return Ok(accepted("auditWriteRequest"));
    }

    let stage = request.stage.as_deref().map(str::trim).unwrap_or_default();
    let conversation_id = request
        .conversation_id
        .as_deref()
        .map(str::trim)
        .unwrap_or_default();
    if stage.is_empty() || conversation_id.is_empty() {
        return Err(Error::Validation(
            "Either canonicalEnvelope/auditWriteRequest OR stage+conversationId is required".into(),
        ));
    }

    let mut write_request = AuditWriteRequest::new(stage)
        .with_conversation_id(conversation_id)
        .with_source(request.source.unwrap_or_default())
        .with_severity(request.severity.unwrap_or_default());
    if let Some(trace_id) = request.trace_id {
        write_request = write_request.with_trace_id(trace_id);
    }
    if let Some(metadata) = request.metadata.filter(|m| !m.is_empty()) {
        write_request = write_request.with_extra_map(metadata);
    }

    state.service.publish_request(write_request).await?;
    Ok(accepted("stage+metadata"))
}

/// Drain trigger body; both bounds optional
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainApiRequest {
    #[serde(default)]
    pub max_batches: Option<u32>,
    #[serde(default)]
    pub batch_size: Option<u32>,
}

async fn drain(
    State(state): State<AppState>,
    body: Option<Json<DrainApiRequest>>,
) -> Result<Json<DrainSummary>> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let summary = state
        .drain
        .drain(request.max_batches, request.batch_size)
        .await?;
    Ok(Json(summary))
}

/// Build the ingress router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/events/publish", post(publish))
        .route("/v1/outbox/drain", post(drain))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
