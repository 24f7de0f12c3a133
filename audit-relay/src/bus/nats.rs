//! NATS event bus backend

use async_nats::{Client, HeaderMap};
use async_trait::async_trait;
use std::time::Duration;

use super::EventBus;
use crate::config::NatsConfig;
use crate::error::{Error, Result};

/// Create a NATS client with retry logic
///
/// Uses an exponential backoff strategy between attempts.
pub async fn create_client(config: &NatsConfig) -> Result<Client> {
    let mut attempt = 0;
    let base_delay = Duration::from_secs(config.retry_delay_secs);

    loop {
        match try_create_client(config).await {
            Ok(client) => {
                if attempt > 0 {
                    tracing::info!("NATS connection established after {} attempt(s)", attempt + 1);
                } else {
                    tracing::info!("NATS client connected to {}", config.url);
                }
                return Ok(client);
            }
            Err(e) => {
                attempt += 1;

                if attempt > config.max_retries {
                    tracing::error!(
                        "Failed to connect to NATS after {} attempts: {}",
                        config.max_retries + 1,
                        e
                    );
                    return Err(e);
                }

                let delay = base_delay * 2_u32.pow(attempt.saturating_sub(1));
                tracing::warn!(
                    "NATS connection attempt {} failed: {}. Retrying in {:?}...",
                    attempt,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

async fn try_create_client(config: &NatsConfig) -> Result<Client> {
    let mut opts = async_nats::ConnectOptions::new();

    if let Some(name) = &config.name {
        opts = opts.name(name);
    }

    opts = opts.max_reconnects(Some(config.max_reconnects));

    opts.connect(&config.url).await.map_err(|e| {
        Error::Transport(format!(
            "Failed to connect to NATS server at '{}': {}",
            config.url, e
        ))
    })
}

/// NATS-backed event bus
///
/// The routing key travels as the `Nats-Msg-Id` header, so a JetStream
/// destination with a dedup window collapses duplicate sends server-side.
pub struct NatsEventBus {
    client: Client,
}

impl NatsEventBus {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EventBus for NatsEventBus {
    async fn send(&self, subject: &str, key: &str, payload: Vec<u8>) -> Result<()> {
        let mut headers = HeaderMap::new();
        headers.insert("Nats-Msg-Id", key);

        self.client
            .publish_with_headers(subject.to_string(), headers, payload.into())
            .await
            .map_err(|e| Error::Transport(format!("Failed to publish to {}: {}", subject, e)))?;

        Ok(())
    }
}
