//! Webhook authentication and normalization.
//!
//! This module provides:
//! - Signature verification for webhook payloads (HMAC-SHA256)
//! - Per-provider adapters turning raw headers/body into a canonical topic
//!   and event metadata

pub mod adapter;
pub mod forgejo;
pub mod github;
pub mod signature;

pub use adapter::{decode_body, normalize_headers, NormalizeError, ProviderAdapter};
pub use signature::{compute_signature, format_signature_header, verify, SignatureError};
