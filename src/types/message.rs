//! The canonical message envelope handed to the message bus.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::service::ProviderKind;

/// The normalized envelope produced by the provider adapters.
///
/// A `CanonicalMessage` is independent of the source provider's wire format:
/// the topic is a dot-delimited, provider-prefixed string (e.g. `github.push`)
/// and the body carries the original payload, the normalized (lowercased)
/// request headers, and the resolved agent. The message has no identity of
/// its own; the bus assigns one on publish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalMessage {
    /// Dot-delimited topic, `<provider>.<event>`.
    pub topic: String,

    /// Structured body published to the bus.
    pub body: MessageBody,
}

/// The body of a canonical message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageBody {
    /// The original webhook payload, passed through unmodified.
    pub body: serde_json::Value,

    /// Request headers with lowercased names.
    pub headers: HashMap<String, String>,

    /// The canonical account name of the actor, when resolution succeeded.
    pub agent: Option<String>,
}

impl CanonicalMessage {
    /// Builds a message for the given provider and event name.
    pub fn new(
        provider: ProviderKind,
        event: &str,
        body: serde_json::Value,
        headers: HashMap<String, String>,
        agent: Option<String>,
    ) -> Self {
        CanonicalMessage {
            topic: format!("{}.{}", provider, event),
            body: MessageBody {
                body,
                headers,
                agent,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn topic_is_provider_prefixed() {
        let message = CanonicalMessage::new(
            ProviderKind::GitHub,
            "push",
            json!({}),
            HashMap::new(),
            None,
        );
        assert_eq!(message.topic, "github.push");
    }

    #[test]
    fn body_serializes_with_null_agent() {
        let message = CanonicalMessage::new(
            ProviderKind::Forgejo,
            "issues",
            json!({"sender": {"login": "alice"}}),
            HashMap::new(),
            None,
        );
        let value = serde_json::to_value(&message.body).unwrap();
        assert_eq!(value["agent"], serde_json::Value::Null);
        assert_eq!(value["body"]["sender"]["login"], "alice");
    }
}
