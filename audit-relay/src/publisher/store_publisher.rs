//! Store-backed publisher
//!
//! Persists envelopes through an [`AuditEventStore`], deduplicating on the
//! idempotency key. Two dedup paths cover the race between the existence
//! check and the insert: a pre-insert lookup, and a swallow of the
//! unique-constraint violation raised by a concurrent duplicate insert.

use async_trait::async_trait;
use std::sync::Arc;

use super::AuditPublisher;
use crate::config::ConnectorConfig;
use crate::envelope::CanonicalEnvelope;
use crate::error::{Error, Result};
use crate::idempotency::IdempotencyKeyFactory;
use crate::store::{AuditEventRecord, AuditEventStore};

/// Publisher that delivers envelopes to the durable store
#[derive(Clone)]
pub struct StorePublisher {
    store: Arc<dyn AuditEventStore>,
    keys: IdempotencyKeyFactory,
    enabled: bool,
    enforce_idempotency: bool,
    async_publish: bool,
}

impl StorePublisher {
    pub fn new(store: Arc<dyn AuditEventStore>, config: &ConnectorConfig) -> Self {
        Self {
            store,
            keys: IdempotencyKeyFactory::new(),
            enabled: config.enabled,
            enforce_idempotency: config.enforce_idempotency,
            async_publish: config.store.async_publish,
        }
    }

    async fn deliver(&self, envelope: CanonicalEnvelope) -> Result<()> {
        envelope.validate()?;

        let enriched = self.keys.enrich(envelope, self.enforce_idempotency);

        if self.enforce_idempotency {
            let key = enriched.idempotency_key.as_deref().unwrap_or("");
            if self.store.exists_by_key(key).await? {
                tracing::debug!(
                    event_id = %enriched.event_id,
                    idempotency_key = key,
                    "Skipping duplicate audit event"
                );
                return Ok(());
            }
        }

        let record = AuditEventRecord::from_envelope(&enriched)?;
        match self.store.insert(&record).await {
            Ok(()) => Ok(()),
            Err(Error::DuplicateKey(detail)) if self.enforce_idempotency => {
                tracing::debug!(
                    event_id = %enriched.event_id,
                    "Concurrent duplicate insert swallowed: {}",
                    detail
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl AuditPublisher for StorePublisher {
    async fn publish(&self, envelope: CanonicalEnvelope) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        if self.async_publish {
            let this = self.clone();
            tokio::spawn(async move {
                let event_id = envelope.event_id;
                if let Err(e) = this.deliver(envelope).await {
                    tracing::error!(event_id = %event_id, "Background store publish failed: {}", e);
                }
            });
            return Ok(());
        }

        self.deliver(envelope).await
    }
}
