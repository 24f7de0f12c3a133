//! Message bus seam
//!
//! The bus-backed publisher dispatches through `EventBus`: one send of a
//! serialized envelope to a destination subject, carrying a routing key.

use async_trait::async_trait;

use crate::error::Result;

pub mod nats;

pub use nats::{create_client, NatsEventBus};

/// Trait for message bus backends
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Send one payload to the destination subject
    ///
    /// `key` is the routing/deduplication key chosen by the publisher's
    /// message-key policy. Fails with
    /// [`Error::Transport`](crate::error::Error::Transport) when the send
    /// does not reach the bus.
    async fn send(&self, subject: &str, key: &str, payload: Vec<u8>) -> Result<()>;
}
