//! Bus-backed publisher
//!
//! Serializes the full envelope to JSON and sends it to the configured
//! subject with a routing key chosen by the message-key policy.

use async_trait::async_trait;
use std::sync::Arc;

use super::AuditPublisher;
use crate::bus::EventBus;
use crate::config::{ConnectorConfig, MessageKeyPolicy};
use crate::envelope::{is_blank, CanonicalEnvelope};
use crate::error::{Error, Result};
use crate::idempotency::IdempotencyKeyFactory;

/// Publisher that delivers envelopes to the message bus
#[derive(Clone)]
pub struct BusPublisher {
    bus: Arc<dyn EventBus>,
    keys: IdempotencyKeyFactory,
    enabled: bool,
    enforce_idempotency: bool,
    async_publish: bool,
    subject: String,
    key_policy: MessageKeyPolicy,
}

impl BusPublisher {
    pub fn new(bus: Arc<dyn EventBus>, config: &ConnectorConfig) -> Self {
        Self {
            bus,
            keys: IdempotencyKeyFactory::new(),
            enabled: config.enabled,
            enforce_idempotency: config.enforce_idempotency,
            async_publish: config.bus.async_publish,
            subject: config.bus.subject.clone(),
            key_policy: config.bus.message_key,
        }
    }

    /// Routing key per the configured policy, with event id as the fallback
    /// for blank conversation or idempotency keys
    fn message_key(&self, envelope: &CanonicalEnvelope) -> String {
        match self.key_policy {
            MessageKeyPolicy::EventId => envelope.event_id.to_string(),
            MessageKeyPolicy::ConversationId => {
                if is_blank(&envelope.conversation_id) {
                    envelope.event_id.to_string()
                } else {
                    envelope.conversation_id.clone().unwrap_or_default()
                }
            }
            MessageKeyPolicy::IdempotencyKey => {
                if is_blank(&envelope.idempotency_key) {
                    envelope.event_id.to_string()
                } else {
                    envelope.idempotency_key.clone().unwrap_or_default()
                }
            }
        }
    }

    async fn deliver(&self, envelope: CanonicalEnvelope) -> Result<()> {
        envelope.validate()?;

        let enriched = self.keys.enrich(envelope, self.enforce_idempotency);
        let key = self.message_key(&enriched);
        let payload = serde_json::to_vec(&enriched).map_err(|e| {
            Error::Serialization(format!("Failed to serialize audit envelope: {}", e))
        })?;

        self.bus.send(&self.subject, &key, payload).await
    }
}

#[async_trait]
impl AuditPublisher for BusPublisher {
    async fn publish(&self, envelope: CanonicalEnvelope) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        if self.async_publish {
            let this = self.clone();
            tokio::spawn(async move {
                let event_id = envelope.event_id;
                if let Err(e) = this.deliver(envelope).await {
                    tracing::error!(event_id = %event_id, "Background bus publish failed: {}", e);
                }
            });
            return Ok(());
        }

        self.deliver(envelope).await
    }
}
