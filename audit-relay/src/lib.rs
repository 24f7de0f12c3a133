//! # audit-relay
//!
//! At-least-once delivery of audit events to a durable sink (Postgres store
//! or NATS bus), with application-level deduplication of retries and
//! logically identical re-submissions.
//!
//! The core is the outbox drain engine — a claim/retry/dead-letter state
//! machine over a durable queue table — together with the idempotent-publish
//! abstraction: every envelope carries a deterministic SHA-256 key over its
//! identity fields, so duplicate deliveries collapse into one durable record
//! regardless of which publish path produced them.
//!
//! ## Example
//!
//! ```rust,no_run
//! use audit_relay::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config)?;
//!
//!     // Build the configured publisher (store- or bus-backed) and the
//!     // service facade callers publish through.
//!     let publisher = audit_relay::publisher::build(&config).await?;
//!     let service = AuditService::new(publisher);
//!
//!     service
//!         .publish_stage("order.created", "6e9a6f0e-8f8a-4f7b-9a65-b43a0be2d1c1", None)
//!         .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! Guaranteed delivery goes through the outbox instead: an external writer
//! inserts PENDING rows, and [`OutboxDrainEngine::drain`](outbox::OutboxDrainEngine::drain)
//! claims and dispatches them under `FOR UPDATE SKIP LOCKED`, retrying with
//! capped exponential backoff until SENT or DEAD_LETTER.

pub mod bus;
pub mod config;
pub mod envelope;
pub mod error;
pub mod http;
pub mod idempotency;
pub mod observability;
pub mod outbox;
pub mod publisher;
pub mod service;
pub mod store;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{Config, MessageKeyPolicy, OutboxConfig, PublisherBackend};
    pub use crate::envelope::{
        AuditSeverity, AuditSource, AuditWriteRequest, CanonicalEnvelope,
    };
    pub use crate::error::{Error, Result};
    pub use crate::idempotency::IdempotencyKeyFactory;
    pub use crate::observability::init_tracing;
    pub use crate::outbox::{DrainSummary, OutboxDrainEngine, OutboxStatus};
    pub use crate::publisher::{AuditPublisher, BusPublisher, StorePublisher};
    pub use crate::service::AuditService;
}
