//! Outbox drain engine
//!
//! An independent consumer of the outbox table: rows arrive PENDING from an
//! external writer, get claimed in batches under database-level locking,
//! dispatched through the audit service, and resolved to SENT, a backed-off
//! retry, or DEAD_LETTER.

pub mod drain;
pub mod queue;
pub mod record;

pub use drain::{DrainSummary, OutboxDrainEngine};
pub use queue::{FailureDisposition, OutboxQueue, PgOutboxQueue};
pub use record::{OutboxPayload, OutboxRecord, OutboxStatus};
