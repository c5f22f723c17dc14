//! NATS-backed message bus.
//!
//! Publishes canonical message bodies to the subject named by the message
//! topic. The `async-nats` client multiplexes concurrent publishes over one
//! connection without corrupting framing, so no additional locking happens
//! here.
//!
//! Core NATS does not acknowledge individual publishes with an identifier,
//! so the bus mints a UUID per delivery and returns it after the client has
//! flushed the message to the server.

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::types::{CanonicalMessage, MessageId};

use super::error::BusError;
use super::MessageBus;

/// Message bus backed by a NATS connection.
#[derive(Clone)]
pub struct NatsBus {
    client: async_nats::Client,
}

impl NatsBus {
    /// Connects to the broker at the given URL.
    pub async fn connect(url: &str) -> Result<Self, BusError> {
        let client = async_nats::connect(url)
            .await
            .map_err(|e| BusError::transient(format!("connect to {url} failed"), e))?;
        Ok(NatsBus { client })
    }

    /// Wraps an already-connected client.
    pub fn from_client(client: async_nats::Client) -> Self {
        NatsBus { client }
    }
}

#[async_trait]
impl MessageBus for NatsBus {
    async fn publish(&self, message: &CanonicalMessage) -> Result<MessageId, BusError> {
        // A body that cannot serialize will never succeed, no matter how
        // often it is retried.
        let bytes = serde_json::to_vec(&message.body)
            .map_err(|e| BusError::permanent("message body failed to serialize", e))?;

        self.client
            .publish(message.topic.clone(), bytes.into())
            .await
            .map_err(|e| BusError::transient("publish failed", e))?;

        // Publishes are buffered client-side; flush before claiming delivery.
        self.client
            .flush()
            .await
            .map_err(|e| BusError::transient("flush failed", e))?;

        let message_id = MessageId::new(Uuid::new_v4().to_string());
        debug!(topic = %message.topic, message_id = %message_id, "message delivered");
        Ok(message_id)
    }
}
