//! Idempotent publish capability
//!
//! `AuditPublisher` is a single capability interface with interchangeable
//! backend implementations, selected by configuration. Both variants run
//! validate → enrich → deliver, and both support an async mode that hands
//! delivery to a background task and returns immediately.

use async_trait::async_trait;
use std::sync::Arc;

use crate::bus::{self, NatsEventBus};
use crate::config::{Config, PublisherBackend};
use crate::envelope::CanonicalEnvelope;
use crate::error::{Error, Result};
use crate::store::{self, PgAuditEventStore};

pub mod bus_publisher;
pub mod store_publisher;

pub use bus_publisher::BusPublisher;
pub use store_publisher::StorePublisher;

/// Capability to deliver one envelope to one backend, durably or with a
/// failed result
#[async_trait]
pub trait AuditPublisher: Send + Sync {
    /// Deliver the envelope
    ///
    /// In async mode this only confirms the hand-off to a background task;
    /// delivery failures are then observable through logs alone.
    async fn publish(&self, envelope: CanonicalEnvelope) -> Result<()>;
}

/// Construct the configured publisher, connecting its backend
///
/// Selection is a configuration concern: `connector.publisher = "store"`
/// builds a Postgres-backed publisher, `"bus"` a NATS-backed one.
pub async fn build(config: &Config) -> Result<Arc<dyn AuditPublisher>> {
    match config.connector.publisher {
        PublisherBackend::Store => {
            let db = config.database.as_ref().ok_or_else(|| {
                Error::Storage("store publisher requires a [database] configuration".into())
            })?;
            let pool = store::create_pool(db).await?;
            let store = PgAuditEventStore::new(pool);
            store.initialize().await?;
            Ok(Arc::new(StorePublisher::new(
                Arc::new(store),
                &config.connector,
            )))
        }
        PublisherBackend::Bus => {
            let nats = config.nats.as_ref().ok_or_else(|| {
                Error::Transport("bus publisher requires a [nats] configuration".into())
            })?;
            let client = bus::create_client(nats).await?;
            Ok(Arc::new(BusPublisher::new(
                Arc::new(NatsEventBus::new(client)),
                &config.connector,
            )))
        }
    }
}
