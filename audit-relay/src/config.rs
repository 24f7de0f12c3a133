//! Configuration management using Figment
//!
//! Configuration is loaded from multiple sources with the following
//! precedence (highest to lowest):
//! 1. Environment variables (prefix: AUDIT_, sections split on `__`)
//! 2. ./audit-relay.toml
//! 3. Default values

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Service identity
    #[serde(default)]
    pub service: ServiceConfig,

    /// Publisher behaviour
    #[serde(default)]
    pub connector: ConnectorConfig,

    /// Database configuration (required for the store backend and the
    /// outbox drain)
    #[serde(default)]
    pub database: Option<DatabaseConfig>,

    /// NATS configuration (required for the bus backend)
    #[serde(default)]
    pub nats: Option<NatsConfig>,

    /// Outbox drain configuration
    #[serde(default)]
    pub outbox: OutboxConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Environment (dev, staging, production)
    #[serde(default = "default_environment")]
    pub environment: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            environment: default_environment(),
        }
    }
}

/// Which backend a publisher delivers to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PublisherBackend {
    /// Durable store (Postgres)
    #[default]
    Store,
    /// Message bus (NATS)
    Bus,
}

/// Routing key policy for bus publishes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageKeyPolicy {
    /// Always the event id
    EventId,
    /// Conversation id, falling back to the event id when blank
    ConversationId,
    /// Idempotency key, falling back to the event id when blank
    #[default]
    IdempotencyKey,
}

/// Publisher behaviour configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// Master switch; publishers are no-ops when disabled
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Derive and enforce idempotency keys for deduplication
    #[serde(default = "default_true")]
    pub enforce_idempotency: bool,

    /// Backend the configured publisher delivers to
    #[serde(default)]
    pub publisher: PublisherBackend,

    /// Store backend settings
    #[serde(default)]
    pub store: StorePublisherConfig,

    /// Bus backend settings
    #[serde(default)]
    pub bus: BusPublisherConfig,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            enforce_idempotency: true,
            publisher: PublisherBackend::default(),
            store: StorePublisherConfig::default(),
            bus: BusPublisherConfig::default(),
        }
    }
}

/// Store-backed publisher settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorePublisherConfig {
    /// Hand the insert to a background task and return immediately.
    /// Errors are then only observable through logs.
    #[serde(default = "default_true")]
    pub async_publish: bool,
}

impl Default for StorePublisherConfig {
    fn default() -> Self {
        Self { async_publish: true }
    }
}

/// Bus-backed publisher settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusPublisherConfig {
    /// Hand the send to a background task and return immediately
    #[serde(default = "default_true")]
    pub async_publish: bool,

    /// Destination subject
    #[serde(default = "default_bus_subject")]
    pub subject: String,

    /// Routing key policy
    #[serde(default)]
    pub message_key: MessageKeyPolicy,
}

impl Default for BusPublisherConfig {
    fn default() -> Self {
        Self {
            async_publish: true,
            subject: default_bus_subject(),
            message_key: MessageKeyPolicy::default(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum idle connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_secs: u64,

    /// Maximum retry attempts for establishing the connection
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay between retry attempts in seconds
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
}

/// NATS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,

    /// Connection name
    #[serde(default)]
    pub name: Option<String>,

    /// Max reconnection attempts
    #[serde(default = "default_max_reconnects")]
    pub max_reconnects: usize,

    /// Maximum retry attempts for the initial connection
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay between retry attempts in seconds
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
}

/// Outbox drain configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxConfig {
    /// Enable the drain engine
    #[serde(default)]
    pub enabled: bool,

    /// Outbox table name; restricted to `[a-zA-Z0-9_]+` because it is
    /// interpolated into query text
    #[serde(default = "default_outbox_table")]
    pub table: String,

    /// Rows claimed per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Batches processed per drain invocation
    #[serde(default = "default_max_batches")]
    pub max_batches_per_call: u32,

    /// Cap on the exponential retry backoff, in seconds
    #[serde(default = "default_max_retry_delay")]
    pub max_retry_delay_seconds: u64,

    /// Worker id stamped on claimed rows
    #[serde(default = "default_worker_id")]
    pub worker_id: String,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            table: default_outbox_table(),
            batch_size: default_batch_size(),
            max_batches_per_call: default_max_batches(),
            max_retry_delay_seconds: default_max_retry_delay(),
            worker_id: default_worker_id(),
        }
    }
}

// Default value functions
fn default_service_name() -> String {
    "audit-relay".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_environment() -> String {
    "dev".to_string()
}

fn default_true() -> bool {
    true
}

fn default_bus_subject() -> String {
    "audit.events".to_string()
}

fn default_max_connections() -> u32 {
    50
}

fn default_min_connections() -> u32 {
    5
}

fn default_connection_timeout() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_delay() -> u64 {
    2
}

fn default_max_reconnects() -> usize {
    10
}

fn default_outbox_table() -> String {
    "audit_outbox".to_string()
}

fn default_batch_size() -> u32 {
    100
}

fn default_max_batches() -> u32 {
    5
}

fn default_max_retry_delay() -> u64 {
    300
}

fn default_worker_id() -> String {
    "audit-relay-drainer".to_string()
}

impl Config {
    /// Load configuration from all sources
    pub fn load() -> Result<Self> {
        Self::load_from("audit-relay.toml")
    }

    /// Load configuration from a specific file
    ///
    /// Environment variables (AUDIT_ prefix) override file values.
    pub fn load_from(path: &str) -> Result<Self> {
        let config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("AUDIT_").split("__"))
            .extract()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.connector.enabled);
        assert!(config.connector.enforce_idempotency);
        assert_eq!(config.connector.publisher, PublisherBackend::Store);
        assert!(config.connector.store.async_publish);
        assert_eq!(config.connector.bus.subject, "audit.events");
        assert_eq!(
            config.connector.bus.message_key,
            MessageKeyPolicy::IdempotencyKey
        );
        assert!(config.database.is_none());
        assert!(config.nats.is_none());
    }

    #[test]
    fn test_default_outbox_config() {
        let outbox = OutboxConfig::default();
        assert!(!outbox.enabled);
        assert_eq!(outbox.table, "audit_outbox");
        assert_eq!(outbox.batch_size, 100);
        assert_eq!(outbox.max_batches_per_call, 5);
        assert_eq!(outbox.max_retry_delay_seconds, 300);
        assert_eq!(outbox.worker_id, "audit-relay-drainer");
    }

    #[test]
    fn test_backend_and_key_policy_serde_names() {
        assert_eq!(
            serde_json::to_value(PublisherBackend::Bus).unwrap(),
            serde_json::json!("bus")
        );
        assert_eq!(
            serde_json::to_value(MessageKeyPolicy::ConversationId).unwrap(),
            serde_json::json!("conversation-id")
        );
        let policy: MessageKeyPolicy =
            serde_json::from_value(serde_json::json!("idempotency-key")).unwrap();
        assert_eq!(policy, MessageKeyPolicy::IdempotencyKey);
    }
}
