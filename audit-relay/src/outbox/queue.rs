//! Outbox queue operations
//!
//! `OutboxQueue` is the seam between the drain engine and the durable
//! queue table. The Postgres implementation provides the claim step as a
//! single conditional statement using `FOR UPDATE SKIP LOCKED`, so
//! exclusivity holds across independent processes, not just threads.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::PgPool;

use super::record::{OutboxRecord, OutboxStatus};
use crate::error::{Error, Result};

static TABLE_NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new("^[a-zA-Z0-9_]+$").expect("static pattern"));

/// Check an outbox table name against the identifier pattern
///
/// The table name is a configured value interpolated into query text rather
/// than a bound parameter, so anything outside `[a-zA-Z0-9_]+` is a fatal
/// configuration error.
pub fn validate_table_name(table: &str) -> Result<&str> {
    if TABLE_NAME_PATTERN.is_match(table) {
        Ok(table)
    } else {
        Err(Error::InvalidTableName(table.to_string()))
    }
}

/// Resolution the drain engine computed for a failed row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureDisposition {
    /// `Pending` for a retry, `DeadLetter` once the retry budget is spent
    pub status: OutboxStatus,
    /// The incremented retry count to store
    pub retry_count: i32,
    /// Backoff before the row becomes eligible again, in seconds
    pub delay_seconds: u64,
    /// Truncated error message for the `last_error` column
    pub error: String,
}

/// Trait for outbox queue backends
#[async_trait]
pub trait OutboxQueue: Send + Sync {
    /// Atomically claim up to `batch_size` eligible rows
    ///
    /// Eligible rows are `PENDING` with `next_retry_at <= now()`, taken
    /// oldest-created-first. Claimed rows transition to `PROCESSING` with
    /// `worker_id` and `locked_at` stamped; rows locked by a concurrent
    /// claim are skipped, never double-claimed.
    async fn claim_batch(&self, batch_size: u32, worker_id: &str) -> Result<Vec<OutboxRecord>>;

    /// Resolve a row as delivered
    async fn mark_sent(&self, id: i64) -> Result<()>;

    /// Apply a failure disposition to a row
    async fn mark_failed(&self, id: i64, disposition: &FailureDisposition) -> Result<()>;
}

/// Postgres-backed outbox queue
pub struct PgOutboxQueue {
    pool: PgPool,
    table: String,
}

impl PgOutboxQueue {
    /// Create a queue over the given table
    ///
    /// Fails fast on an invalid table name, before any statement is built.
    pub fn new(pool: PgPool, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        validate_table_name(&table)?;
        Ok(Self { pool, table })
    }
}

#[async_trait]
impl OutboxQueue for PgOutboxQueue {
    async fn claim_batch(&self, batch_size: u32, worker_id: &str) -> Result<Vec<OutboxRecord>> {
        let table = validate_table_name(&self.table)?;

        let sql = format!(
            r#"
            WITH picked AS (
                SELECT id
                FROM {table}
                WHERE status = 'PENDING'
                  AND next_retry_at <= now()
                ORDER BY created_at
                FOR UPDATE SKIP LOCKED
                LIMIT $1
            )
            UPDATE {table} o
            SET status = 'PROCESSING',
                worker_id = $2,
                locked_at = now(),
                updated_at = now()
            FROM picked
            WHERE o.id = picked.id
            RETURNING o.id, o.stage, o.conversation_id, o.trace_id, o.source, o.severity,
                      o.metadata, o.audit_write_request, o.canonical_envelope,
                      o.retry_count, o.max_retries
            "#
        );

        let records = sqlx::query_as::<_, OutboxRecord>(&sql)
            .bind(batch_size as i64)
            .bind(worker_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(records)
    }

    async fn mark_sent(&self, id: i64) -> Result<()> {
        let table = validate_table_name(&self.table)?;

        let sql = format!(
            r#"
            UPDATE {table}
            SET status = 'SENT',
                processed_at = now(),
                last_error = NULL,
                updated_at = now()
            WHERE id = $1
            "#
        );

        sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        Ok(())
    }

    async fn mark_failed(&self, id: i64, disposition: &FailureDisposition) -> Result<()> {
        let table = validate_table_name(&self.table)?;

        let sql = format!(
            r#"
            UPDATE {table}
            SET status = $1,
                retry_count = $2,
                next_retry_at = now() + make_interval(secs => $3),
                last_error = $4,
                updated_at = now()
            WHERE id = $5
            "#
        );

        sqlx::query(&sql)
            .bind(disposition.status.as_str())
            .bind(disposition.retry_count)
            .bind(disposition.delay_seconds as f64)
            .bind(&disposition.error)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_table_names() {
        assert!(validate_table_name("audit_outbox").is_ok());
        assert!(validate_table_name("Outbox2").is_ok());
        assert!(validate_table_name("_x").is_ok());
    }

    #[test]
    fn test_invalid_table_names_are_rejected() {
        for name in ["", "audit outbox", "outbox;drop table x", "a.b", "a-b", "a\"b"] {
            assert!(
                matches!(validate_table_name(name), Err(Error::InvalidTableName(_))),
                "{name:?} should be rejected"
            );
        }
    }
}
