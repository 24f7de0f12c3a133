//! Drain loop and retry policy
//!
//! One drain invocation claims up to `max_batches` batches of eligible rows
//! and dispatches each row independently: a failing row is resolved with a
//! backed-off retry or a dead-letter, and never aborts the rest of its
//! batch. Invocations may run concurrently across process instances; the
//! queue's claim step is the only synchronization between them.

use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use super::queue::{validate_table_name, FailureDisposition, OutboxQueue};
use super::record::{OutboxPayload, OutboxRecord, OutboxStatus};
use crate::config::OutboxConfig;
use crate::envelope::AuditWriteRequest;
use crate::error::Result;
use crate::service::AuditService;

/// Fallback retry budget for rows whose `max_retries` is unset or zero
const DEFAULT_MAX_RETRIES: i32 = 5;

/// Bound on the stored `last_error` text, in characters
const MAX_ERROR_CHARS: usize = 2000;

/// Per-invocation drain outcome, returned to the caller and not persisted
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainSummary {
    pub batches_processed: u32,
    pub claimed_count: u32,
    pub sent_count: u32,
    pub failed_count: u32,
    pub dead_letter_count: u32,
    pub elapsed_ms: u64,
}

/// Polls the outbox queue and dispatches claimed rows through the audit
/// service
pub struct OutboxDrainEngine {
    queue: Arc<dyn OutboxQueue>,
    service: AuditService,
    config: OutboxConfig,
}

impl OutboxDrainEngine {
    /// Create a drain engine
    ///
    /// Fails fast on an invalid outbox table name so a misconfigured engine
    /// never reaches the queue.
    pub fn new(
        queue: Arc<dyn OutboxQueue>,
        service: AuditService,
        config: OutboxConfig,
    ) -> Result<Self> {
        validate_table_name(&config.table)?;
        Ok(Self {
            queue,
            service,
            config,
        })
    }

    /// Run one bounded drain invocation
    ///
    /// Overrides apply when positive; otherwise the configured defaults are
    /// used. The invocation stops early on an empty claim.
    pub async fn drain(
        &self,
        max_batches_override: Option<u32>,
        batch_size_override: Option<u32>,
    ) -> Result<DrainSummary> {
        let started = Instant::now();

        let max_batches =
            positive_or_default(max_batches_override, self.config.max_batches_per_call);
        let batch_size = positive_or_default(batch_size_override, self.config.batch_size);

        let mut summary = DrainSummary::default();

        for _ in 0..max_batches {
            let records = self
                .queue
                .claim_batch(batch_size, &self.config.worker_id)
                .await?;
            if records.is_empty() {
                break;
            }

            summary.batches_processed += 1;
            summary.claimed_count += records.len() as u32;

            for record in records {
                let outcome = self.dispatch(&record).await;
                match outcome {
                    Ok(()) => {
                        self.queue.mark_sent(record.id).await?;
                        summary.sent_count += 1;
                    }
                    Err(e) => {
                        summary.failed_count += 1;
                        tracing::error!(record_id = record.id, "Failed to drain outbox row: {}", e);

                        let disposition = failure_disposition(
                            &record,
                            &e.to_string(),
                            self.config.max_retry_delay_seconds,
                        );
                        if disposition.status == OutboxStatus::DeadLetter {
                            summary.dead_letter_count += 1;
                            tracing::warn!(
                                record_id = record.id,
                                retry_count = disposition.retry_count,
                                "Outbox row moved to dead letter"
                            );
                        }
                        self.queue.mark_failed(record.id, &disposition).await?;
                    }
                }
            }
        }

        summary.elapsed_ms = started.elapsed().as_millis() as u64;
        Ok(summary)
    }

    /// Reconstruct the dispatch payload and forward it through the service
    async fn dispatch(&self, record: &OutboxRecord) -> Result<()> {
        match record.payload()? {
            OutboxPayload::Envelope(envelope) => self.service.publish_envelope(envelope).await,
            OutboxPayload::WriteRequest(request) => self.service.publish_request(request).await,
            OutboxPayload::StageMetadata {
                stage,
                conversation_id,
                trace_id,
                source,
                severity,
                metadata,
            } => {
                let mut request = AuditWriteRequest::new(stage)
                    .with_source(source)
                    .with_severity(severity);
                request.conversation_id = conversation_id;
                request.trace_id = trace_id;
                if !metadata.is_empty() {
                    request = request.with_extra_map(metadata);
                }
                self.service.publish_request(request).await
            }
        }
    }
}

fn positive_or_default(value: Option<u32>, default: u32) -> u32 {
    match value {
        Some(v) if v > 0 => v,
        _ => default,
    }
}

/// Compute the retry/dead-letter resolution for a failed row
///
/// The backoff exponent is the post-increment retry count: a row's first
/// recorded failure waits `min(2^1, cap)` seconds, its Nth `min(2^N, cap)`.
pub(crate) fn failure_disposition(
    record: &OutboxRecord,
    error: &str,
    max_retry_delay_seconds: u64,
) -> FailureDisposition {
    let next_retry_count = record.retry_count.saturating_add(1);
    let max_retries = if record.max_retries > 0 {
        record.max_retries
    } else {
        DEFAULT_MAX_RETRIES
    };
    let dead_letter = next_retry_count >= max_retries;

    let exponent = next_retry_count.clamp(0, 63) as u32;
    let delay_seconds = (1_u64 << exponent).min(max_retry_delay_seconds);

    FailureDisposition {
        status: if dead_letter {
            OutboxStatus::DeadLetter
        } else {
            OutboxStatus::Pending
        },
        retry_count: next_retry_count,
        delay_seconds,
        error: truncate_chars(error, MAX_ERROR_CHARS),
    }
}

fn truncate_chars(value: &str, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((byte_index, _)) => value[..byte_index].to_string(),
        None => value.to_string(),
    }
}
