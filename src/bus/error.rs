//! Message bus error types.
//!
//! This module defines error types that distinguish between transient and
//! permanent bus failures. The distinction is critical for retry logic:
//!
//! - **Transient** errors are retriable (connection failures, timed-out or
//!   refused publishes)
//! - **Permanent** errors must not be retried (malformed message, a broker
//!   that rejected the payload outright)

use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

/// The kind of bus error, categorized for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusErrorKind {
    /// Transient error - safe to retry with backoff.
    ///
    /// Examples: the broker connection dropped, the publish timed out, the
    /// broker is briefly unavailable.
    Transient,

    /// Permanent error - retrying the same message cannot succeed.
    ///
    /// Examples: the message failed to serialize, the broker rejected the
    /// payload as invalid.
    Permanent,
}

impl BusErrorKind {
    /// Returns true if this error is retriable.
    pub fn is_retriable(&self) -> bool {
        matches!(self, BusErrorKind::Transient)
    }
}

/// A message bus error with categorization for retry decisions.
///
/// The underlying client error is kept as a source for logs, but its native
/// representation is never surfaced to HTTP callers — only the classified
/// reason is.
#[derive(Debug, Error)]
pub struct BusError {
    /// The kind of error (transient or permanent).
    pub kind: BusErrorKind,

    /// A human-readable description of the error.
    pub message: String,

    /// The underlying client error, if available.
    #[source]
    pub source: Option<Box<dyn StdError + Send + Sync>>,
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bus error: {}", self.message)
    }
}

impl BusError {
    /// Creates a transient error wrapping a client error.
    pub fn transient(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind: BusErrorKind::Transient,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a permanent error wrapping a client error.
    pub fn permanent(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind: BusErrorKind::Permanent,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a transient error without an underlying source.
    pub fn transient_without_source(message: impl Into<String>) -> Self {
        Self {
            kind: BusErrorKind::Transient,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a permanent error without an underlying source.
    pub fn permanent_without_source(message: impl Into<String>) -> Self {
        Self {
            kind: BusErrorKind::Permanent,
            message: message.into(),
            source: None,
        }
    }
}

/// Terminal outcome of a publish, after retry handling.
#[derive(Debug, Error)]
pub enum PublishError {
    /// All attempts failed with transient errors.
    ///
    /// Carries the last underlying cause and the number of attempts made.
    /// The orchestrator maps this to a gateway-type failure because the
    /// fault is on the broker side, not the caller's.
    #[error("publish exhausted after {attempts} attempts: {last_error}")]
    Exhausted {
        last_error: BusError,
        attempts: u32,
    },

    /// The bus rejected the message with a permanent error; no retries were
    /// attempted.
    #[error("publish rejected: {0}")]
    Rejected(BusError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_retriable() {
        assert!(BusErrorKind::Transient.is_retriable());
        assert!(!BusErrorKind::Permanent.is_retriable());
    }

    #[test]
    fn display_carries_classified_message_only() {
        let err = BusError::transient(
            "connection lost",
            std::io::Error::new(std::io::ErrorKind::ConnectionReset, "rst"),
        );
        assert_eq!(err.to_string(), "bus error: connection lost");
    }

    #[test]
    fn exhausted_display_includes_attempts() {
        let err = PublishError::Exhausted {
            last_error: BusError::transient_without_source("broker down"),
            attempts: 3,
        };
        assert!(err.to_string().contains("3 attempts"));
    }
}
