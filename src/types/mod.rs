//! Core domain types for the relay.

pub mod ids;
pub mod message;
pub mod service;

pub use ids::{MessageId, ServiceId};
pub use message::{CanonicalMessage, MessageBody};
pub use service::{ProviderKind, ServiceCredential};
