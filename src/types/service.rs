//! Service records as read from the Service Directory.
//!
//! A service is a registered webhook source (a repository or organisation on
//! a given forge) with its own shared secret and provider kind. Records are
//! created, rotated, and disabled entirely outside this process; the relay
//! only reads a snapshot per request.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The forge provider a service belongs to.
///
/// This set is closed at the type level: a registry entry naming any other
/// kind fails to deserialize, so unknown providers are rejected when the
/// service is registered rather than when a request arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    GitHub,
    Forgejo,
}

impl ProviderKind {
    /// The provider's topic prefix (e.g. `github` in `github.push`).
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::GitHub => "github",
            ProviderKind::Forgejo => "forgejo",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A read-only snapshot of one registered service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceCredential {
    /// The provider this service receives webhooks from.
    pub kind: ProviderKind,

    /// Shared secret used for HMAC signature verification.
    ///
    /// An empty secret means the service is deliberately unauthenticated and
    /// signature verification is skipped for it.
    #[serde(default)]
    pub secret: String,

    /// Disabled services must be refused as if they did not exist.
    #[serde(default)]
    pub disabled: bool,
}

impl ServiceCredential {
    /// Returns the secret as bytes, or `None` for the unauthenticated mode.
    pub fn secret_bytes(&self) -> Option<&[u8]> {
        if self.secret.is_empty() {
            None
        } else {
            Some(self.secret.as_bytes())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_kind_topic_prefixes() {
        assert_eq!(ProviderKind::GitHub.as_str(), "github");
        assert_eq!(ProviderKind::Forgejo.as_str(), "forgejo");
    }

    #[test]
    fn provider_kind_deserializes_lowercase() {
        let kind: ProviderKind = serde_json::from_str("\"github\"").unwrap();
        assert_eq!(kind, ProviderKind::GitHub);
        let kind: ProviderKind = serde_json::from_str("\"forgejo\"").unwrap();
        assert_eq!(kind, ProviderKind::Forgejo);
    }

    #[test]
    fn unknown_provider_kind_is_rejected() {
        let result: Result<ProviderKind, _> = serde_json::from_str("\"gitlab\"");
        assert!(result.is_err());
    }

    #[test]
    fn empty_secret_means_unauthenticated() {
        let cred = ServiceCredential {
            kind: ProviderKind::GitHub,
            secret: String::new(),
            disabled: false,
        };
        assert!(cred.secret_bytes().is_none());

        let cred = ServiceCredential {
            secret: "hunter2".to_string(),
            ..cred
        };
        assert_eq!(cred.secret_bytes(), Some(b"hunter2".as_ref()));
    }
}
