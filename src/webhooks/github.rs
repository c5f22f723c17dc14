//! GitHub webhook conventions.
//!
//! Header names and payload extraction rules for webhooks delivered by
//! GitHub. See
//! <https://docs.github.com/en/webhooks/webhook-events-and-payloads>.

use serde_json::Value;

/// Header carrying the HMAC signature of the payload.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Header carrying the event name (e.g. `push`, `pull_request`).
pub const EVENT_HEADER: &str = "x-github-event";

/// JSON path of the actor's provider-side username, for diagnostics.
pub const AGENT_FIELD: &str = "sender.login";

/// Extracts the acting user's GitHub login from the payload.
///
/// Every GitHub event payload carries a top-level `sender` object describing
/// the user or bot that triggered the event.
pub fn agent_key(body: &Value) -> Option<&str> {
    body.get("sender")?.get("login")?.as_str()
}
