//! The message bus port and its publish-with-retry wrapper.
//!
//! [`MessageBus`] is the seam to the external broker: it accepts a topic and
//! body (as a [`CanonicalMessage`]) and returns a durable message identifier
//! or a classified error. [`Publisher`] adds the bounded retry policy on
//! top; [`NatsBus`] is the production implementation.

pub mod error;
pub mod nats;
pub mod publisher;
pub mod retry;

use async_trait::async_trait;

use crate::types::{CanonicalMessage, MessageId};

pub use error::{BusError, BusErrorKind, PublishError};
pub use nats::NatsBus;
pub use publisher::Publisher;
pub use retry::{RetryConfig, Sleep, TokioSleep};

/// A pub/sub broker that durably accepts published messages.
///
/// Implementations must tolerate concurrent publish calls from multiple
/// in-flight requests; the relay adds no serialization of its own.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publishes one message, returning the broker-assigned identifier.
    async fn publish(&self, message: &CanonicalMessage) -> Result<MessageId, BusError>;
}
