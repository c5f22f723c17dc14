//! forge-relay - relays forge (GitHub, Forgejo) webhooks onto a message bus.
//!
//! The pipeline: authenticate each inbound webhook against its service's
//! shared secret, normalize the provider payload into a canonical message
//! envelope, best-effort resolve the acting user to a canonical account
//! name, and publish the envelope to the message bus with bounded retry.

pub mod bus;
pub mod config;
pub mod directory;
pub mod ingest;
pub mod resolver;
pub mod server;
pub mod types;
pub mod webhooks;
