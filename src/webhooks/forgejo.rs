//! Forgejo webhook conventions.
//!
//! Forgejo signs payloads the same way GitHub does (`x-hub-signature-256`)
//! but announces the event name under its own header.

use serde_json::Value;

/// Header carrying the HMAC signature of the payload.
pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

/// Header carrying the event name (e.g. `push`, `issues`).
pub const EVENT_HEADER: &str = "x-forgejo-event";

/// JSON path of the actor's provider-side username, for diagnostics.
pub const AGENT_FIELD: &str = "sender.login";

/// Extracts the acting user's Forgejo login from the payload.
pub fn agent_key(body: &Value) -> Option<&str> {
    body.get("sender")?.get("login")?.as_str()
}
