//! The ingestion pipeline for one inbound webhook.
//!
//! [`Ingestor::ingest`] sequences the stages for a single request:
//!
//! ```text
//! Received -> ServiceResolved -> Authenticated -> Normalized
//!          -> AgentResolved -> Published -> Done
//! ```
//!
//! with an error exit at every transition. The stages are explicit calls in
//! order — not wrapped decorators — so the retry and error boundaries are
//! visible in one place. Per-request state lives entirely on the stack;
//! nothing is shared across in-flight requests except the injected port
//! handles.
//!
//! Failure classification:
//!
//! | Stage | Failure | Classification |
//! |---|---|---|
//! | directory lookup | not found / disabled | `ServiceNotFound` |
//! | validate | signature header absent | `MalformedRequest` |
//! | validate | digest mismatch | `SignatureMismatch` |
//! | validate | unknown algorithm tag | `UnsupportedAlgorithm` |
//! | decode / normalize | bad JSON, missing header/field | `MalformedPayload` |
//! | publish | terminal failure | `UpstreamUnavailable` |
//!
//! Agent resolution is absent from the table: its failures are absorbed and
//! the message is published with `agent: null`.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::bus::Publisher;
use crate::directory::{DirectoryError, ServiceDirectory};
use crate::resolver::AgentResolver;
use crate::types::{CanonicalMessage, MessageId, ServiceId};
use crate::webhooks::{decode_body, NormalizeError, ProviderAdapter, SignatureError};

/// One inbound webhook, request-scoped.
///
/// Header names must already be lowercased (see
/// [`crate::webhooks::normalize_headers`]); the body is the exact raw bytes
/// received, since the signature covers them byte-for-byte.
#[derive(Debug, Clone)]
pub struct InboundWebhook {
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

/// Classified pipeline failures, in the order the stages can produce them.
///
/// Variants carry a short human-readable reason; underlying client errors
/// never leak their native representation past this boundary.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Unknown or disabled service identifier.
    #[error("service with the requested identifier '{0}' was not found")]
    ServiceNotFound(ServiceId),

    /// The request is structurally unusable (e.g. signature header absent).
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// The signature did not match the payload.
    #[error("signature could not be matched")]
    SignatureMismatch,

    /// The signature header declared an algorithm the relay does not support.
    #[error("unsupported signature algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The payload could not be decoded or is missing required fields.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The message bus could not accept the message.
    #[error("message could not be published: {0}")]
    UpstreamUnavailable(String),
}

impl From<NormalizeError> for IngestError {
    fn from(err: NormalizeError) -> Self {
        match err {
            NormalizeError::MissingSignature(header) => {
                IngestError::MalformedRequest(format!("missing required header: {header}"))
            }
            NormalizeError::Signature(SignatureError::UnsupportedAlgorithm(name)) => {
                IngestError::UnsupportedAlgorithm(name)
            }
            NormalizeError::Signature(SignatureError::Mismatch) => IngestError::SignatureMismatch,
            NormalizeError::InvalidJson(e) => {
                IngestError::MalformedPayload(format!("invalid JSON body: {e}"))
            }
            NormalizeError::MissingEventHeader(header) => {
                IngestError::MalformedPayload(format!("missing required header: {header}"))
            }
            NormalizeError::MissingAgentField(field) => {
                IngestError::MalformedPayload(format!("missing required field: {field}"))
            }
        }
    }
}

/// Sequences the ingestion stages for inbound webhooks.
///
/// All collaborators are injected once at startup and shared by reference;
/// the ingestor holds no per-request state.
#[derive(Clone)]
pub struct Ingestor {
    directory: Arc<dyn ServiceDirectory>,
    resolver: Arc<dyn AgentResolver>,
    publisher: Publisher,
}

impl Ingestor {
    pub fn new(
        directory: Arc<dyn ServiceDirectory>,
        resolver: Arc<dyn AgentResolver>,
        publisher: Publisher,
    ) -> Self {
        Ingestor {
            directory,
            resolver,
            publisher,
        }
    }

    /// Runs the full pipeline for one webhook.
    ///
    /// On success, returns the broker-assigned message identifier and bumps
    /// the service's delivered counter exactly once. Failed requests never
    /// touch the counter.
    pub async fn ingest(
        &self,
        service_id: &ServiceId,
        webhook: InboundWebhook,
    ) -> Result<MessageId, IngestError> {
        // Received -> ServiceResolved
        let credential = match self.directory.lookup(service_id).await {
            Ok(credential) => credential,
            Err(DirectoryError::NotFound(id)) => return Err(IngestError::ServiceNotFound(id)),
        };
        if credential.disabled {
            debug!(service = %service_id, "request for disabled service refused");
            return Err(IngestError::ServiceNotFound(service_id.clone()));
        }

        let adapter = ProviderAdapter::from(credential.kind);

        // ServiceResolved -> Authenticated. Verification runs over the raw
        // body bytes before anything is parsed.
        adapter.validate(&webhook.headers, &webhook.body, credential.secret_bytes())?;

        // Authenticated -> Normalized
        let body = decode_body(&webhook.body)?;
        let event = adapter.event(&webhook.headers)?.to_string();
        let agent_key = adapter.agent_key(&body)?.to_string();

        // Normalized -> AgentResolved (best-effort, never fails the request)
        let agent = self.resolver.resolve(credential.kind, &agent_key).await;

        let message = CanonicalMessage::new(
            credential.kind,
            &event,
            body,
            webhook.headers,
            agent,
        );

        debug!(
            service = %service_id,
            topic = %message.topic,
            agent_key,
            agent_resolved = message.body.agent.is_some(),
            "webhook normalized"
        );

        // AgentResolved -> Published -> Done. The tail runs on its own task:
        // a client disconnect drops this future, but a broker delivery
        // already dispatched must be allowed to finish, and the counter must
        // stay consistent with it.
        let publisher = self.publisher.clone();
        let directory = Arc::clone(&self.directory);
        let id = service_id.clone();
        let outcome = tokio::spawn(async move {
            let topic = message.topic.clone();
            match publisher.publish(&message).await {
                Ok(message_id) => {
                    directory.record_delivered(&id).await;
                    info!(service = %id, topic = %topic, message_id = %message_id, "message published");
                    Ok(message_id)
                }
                Err(e) => Err(e),
            }
        })
        .await;

        match outcome {
            Ok(Ok(message_id)) => Ok(message_id),
            Ok(Err(e)) => Err(IngestError::UpstreamUnavailable(e.to_string())),
            Err(join_error) => {
                warn!(service = %service_id, error = %join_error, "publish task did not complete");
                Err(IngestError::UpstreamUnavailable(
                    "publish task did not complete".to_string(),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{BusError, MessageBus, RetryConfig};
    use crate::directory::StaticDirectory;
    use crate::types::{ProviderKind, ServiceCredential};
    use crate::webhooks::{compute_signature, format_signature_header, normalize_headers};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Bus stub that records published messages and mints sequential ids.
    #[derive(Default)]
    struct RecordingBus {
        published: Mutex<Vec<CanonicalMessage>>,
    }

    impl RecordingBus {
        fn published(&self) -> Vec<CanonicalMessage> {
            self.published.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MessageBus for RecordingBus {
        async fn publish(&self, message: &CanonicalMessage) -> Result<MessageId, BusError> {
            let mut published = self.published.lock().unwrap();
            published.push(message.clone());
            Ok(MessageId::new(format!("msg-{}", published.len())))
        }
    }

    /// Bus stub that always fails with a transient error.
    #[derive(Default)]
    struct DownBus {
        calls: AtomicU32,
    }

    #[async_trait]
    impl MessageBus for DownBus {
        async fn publish(&self, _message: &CanonicalMessage) -> Result<MessageId, BusError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(BusError::transient_without_source("connection refused"))
        }
    }

    /// Resolver stub that knows exactly one agent.
    struct OneUserResolver;

    #[async_trait]
    impl AgentResolver for OneUserResolver {
        async fn resolve(&self, _kind: ProviderKind, agent_key: &str) -> Option<String> {
            (agent_key == "alice").then(|| "alice-canonical".to_string())
        }
    }

    /// Resolver stub simulating a resolver outage.
    struct DownResolver;

    #[async_trait]
    impl AgentResolver for DownResolver {
        async fn resolve(&self, _kind: ProviderKind, _agent_key: &str) -> Option<String> {
            // An unreachable resolver surfaces as an unresolved agent.
            None
        }
    }

    const SECRET: &[u8] = b"test-secret";

    fn directory() -> Arc<StaticDirectory> {
        let mut services = HashMap::new();
        services.insert(
            ServiceId::new("gh"),
            ServiceCredential {
                kind: ProviderKind::GitHub,
                secret: String::from_utf8(SECRET.to_vec()).unwrap(),
                disabled: false,
            },
        );
        services.insert(
            ServiceId::new("fj"),
            ServiceCredential {
                kind: ProviderKind::Forgejo,
                secret: String::from_utf8(SECRET.to_vec()).unwrap(),
                disabled: false,
            },
        );
        services.insert(
            ServiceId::new("off"),
            ServiceCredential {
                kind: ProviderKind::GitHub,
                secret: String::from_utf8(SECRET.to_vec()).unwrap(),
                disabled: true,
            },
        );
        services.insert(
            ServiceId::new("open"),
            ServiceCredential {
                kind: ProviderKind::GitHub,
                secret: String::new(),
                disabled: false,
            },
        );
        Arc::new(StaticDirectory::new(services))
    }

    fn ingestor_with(
        directory: Arc<StaticDirectory>,
        bus: Arc<dyn MessageBus>,
        resolver: Arc<dyn AgentResolver>,
    ) -> Ingestor {
        // Zero-delay retries keep the exhaustion tests fast.
        let config = RetryConfig::new(
            3,
            std::time::Duration::ZERO,
            std::time::Duration::ZERO,
            2.0,
        );
        Ingestor::new(directory, resolver, Publisher::new(bus, config))
    }

    fn signed_webhook(event_header: &str, event: &str, body: serde_json::Value) -> InboundWebhook {
        let raw = serde_json::to_vec(&body).unwrap();
        let signature = format_signature_header(&compute_signature(&raw, SECRET));
        let headers = normalize_headers(vec![
            (event_header, event),
            ("x-hub-signature-256", signature.as_str()),
            ("content-type", "application/json"),
        ]);
        InboundWebhook { headers, body: raw }
    }

    #[tokio::test]
    async fn full_pipeline_publishes_and_counts() {
        let directory = self::directory();
        let bus = Arc::new(RecordingBus::default());
        let ingestor = ingestor_with(directory.clone(), bus.clone(), Arc::new(OneUserResolver));

        let webhook = signed_webhook(
            "x-github-event",
            "push",
            json!({"sender": {"login": "alice"}}),
        );
        let id = ingestor
            .ingest(&ServiceId::new("gh"), webhook)
            .await
            .unwrap();

        assert_eq!(id, MessageId::new("msg-1"));
        assert_eq!(directory.delivered_count(&ServiceId::new("gh")), 1);

        let published = bus.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].topic, "github.push");
        assert_eq!(published[0].body.agent.as_deref(), Some("alice-canonical"));
        assert_eq!(published[0].body.body["sender"]["login"], "alice");
        assert_eq!(
            published[0].body.headers.get("x-github-event").map(String::as_str),
            Some("push")
        );
    }

    #[tokio::test]
    async fn forgejo_event_header_builds_forgejo_topic() {
        let bus = Arc::new(RecordingBus::default());
        let ingestor = ingestor_with(directory(), bus.clone(), Arc::new(OneUserResolver));

        let webhook = signed_webhook(
            "x-forgejo-event",
            "issues",
            json!({"sender": {"login": "bob"}}),
        );
        ingestor
            .ingest(&ServiceId::new("fj"), webhook)
            .await
            .unwrap();

        assert_eq!(bus.published()[0].topic, "forgejo.issues");
    }

    #[tokio::test]
    async fn unknown_service_never_reaches_the_bus() {
        let bus = Arc::new(RecordingBus::default());
        let ingestor = ingestor_with(directory(), bus.clone(), Arc::new(OneUserResolver));

        let webhook = signed_webhook(
            "x-github-event",
            "push",
            json!({"sender": {"login": "alice"}}),
        );
        let err = ingestor
            .ingest(&ServiceId::new("nope"), webhook)
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::ServiceNotFound(_)));
        assert!(bus.published().is_empty());
    }

    #[tokio::test]
    async fn disabled_service_is_refused_before_verification() {
        let directory = self::directory();
        let bus = Arc::new(RecordingBus::default());
        let ingestor = ingestor_with(directory.clone(), bus.clone(), Arc::new(OneUserResolver));

        let webhook = signed_webhook(
            "x-github-event",
            "push",
            json!({"sender": {"login": "alice"}}),
        );
        let err = ingestor
            .ingest(&ServiceId::new("off"), webhook)
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::ServiceNotFound(_)));
        assert!(bus.published().is_empty());
        assert_eq!(directory.delivered_count(&ServiceId::new("off")), 0);
    }

    #[tokio::test]
    async fn tampered_signature_never_reaches_the_bus() {
        let bus = Arc::new(RecordingBus::default());
        let ingestor = ingestor_with(directory(), bus.clone(), Arc::new(OneUserResolver));

        let mut webhook = signed_webhook(
            "x-github-event",
            "push",
            json!({"sender": {"login": "alice"}}),
        );
        webhook.body.push(b' ');

        let err = ingestor
            .ingest(&ServiceId::new("gh"), webhook)
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::SignatureMismatch));
        assert!(bus.published().is_empty());
    }

    #[tokio::test]
    async fn missing_signature_header_is_malformed_request() {
        let bus = Arc::new(RecordingBus::default());
        let ingestor = ingestor_with(directory(), bus.clone(), Arc::new(OneUserResolver));

        let mut webhook = signed_webhook(
            "x-github-event",
            "push",
            json!({"sender": {"login": "alice"}}),
        );
        webhook.headers.remove("x-hub-signature-256");

        let err = ingestor
            .ingest(&ServiceId::new("gh"), webhook)
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::MalformedRequest(_)));
    }

    #[tokio::test]
    async fn unsupported_algorithm_is_classified() {
        let bus = Arc::new(RecordingBus::default());
        let ingestor = ingestor_with(directory(), bus.clone(), Arc::new(OneUserResolver));

        let mut webhook = signed_webhook(
            "x-github-event",
            "push",
            json!({"sender": {"login": "alice"}}),
        );
        webhook
            .headers
            .insert("x-hub-signature-256".to_string(), "sha1=abcd".to_string());

        let err = ingestor
            .ingest(&ServiceId::new("gh"), webhook)
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::UnsupportedAlgorithm(_)));
    }

    #[tokio::test]
    async fn unauthenticated_service_skips_verification() {
        let bus = Arc::new(RecordingBus::default());
        let ingestor = ingestor_with(directory(), bus.clone(), Arc::new(OneUserResolver));

        // No signature header at all.
        let body = json!({"sender": {"login": "alice"}});
        let raw = serde_json::to_vec(&body).unwrap();
        let webhook = InboundWebhook {
            headers: normalize_headers(vec![("x-github-event", "push")]),
            body: raw,
        };

        let id = ingestor.ingest(&ServiceId::new("open"), webhook).await;
        assert!(id.is_ok());
        assert_eq!(bus.published().len(), 1);
    }

    #[tokio::test]
    async fn invalid_json_is_malformed_payload() {
        let bus = Arc::new(RecordingBus::default());
        let ingestor = ingestor_with(directory(), bus.clone(), Arc::new(OneUserResolver));

        let raw = b"not json at all".to_vec();
        let signature = format_signature_header(&compute_signature(&raw, SECRET));
        let webhook = InboundWebhook {
            headers: normalize_headers(vec![
                ("x-github-event", "push"),
                ("x-hub-signature-256", signature.as_str()),
            ]),
            body: raw,
        };

        let err = ingestor
            .ingest(&ServiceId::new("gh"), webhook)
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::MalformedPayload(_)));
        assert!(bus.published().is_empty());
    }

    #[tokio::test]
    async fn missing_event_header_is_malformed_payload() {
        let bus = Arc::new(RecordingBus::default());
        let ingestor = ingestor_with(directory(), bus.clone(), Arc::new(OneUserResolver));

        let mut webhook = signed_webhook(
            "x-github-event",
            "push",
            json!({"sender": {"login": "alice"}}),
        );
        webhook.headers.remove("x-github-event");

        let err = ingestor
            .ingest(&ServiceId::new("gh"), webhook)
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::MalformedPayload(_)));
    }

    #[tokio::test]
    async fn missing_sender_is_malformed_payload() {
        let bus = Arc::new(RecordingBus::default());
        let ingestor = ingestor_with(directory(), bus.clone(), Arc::new(OneUserResolver));

        let webhook = signed_webhook("x-github-event", "push", json!({"action": "opened"}));
        let err = ingestor
            .ingest(&ServiceId::new("gh"), webhook)
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::MalformedPayload(_)));
    }

    #[tokio::test]
    async fn resolver_outage_degrades_to_null_agent() {
        let bus = Arc::new(RecordingBus::default());
        let ingestor = ingestor_with(directory(), bus.clone(), Arc::new(DownResolver));

        let webhook = signed_webhook(
            "x-github-event",
            "push",
            json!({"sender": {"login": "alice"}}),
        );
        let result = ingestor.ingest(&ServiceId::new("gh"), webhook).await;

        assert!(result.is_ok());
        assert_eq!(bus.published()[0].body.agent, None);
    }

    #[tokio::test]
    async fn exhausted_publish_is_upstream_unavailable_and_uncounted() {
        let directory = self::directory();
        let bus = Arc::new(DownBus::default());
        let ingestor = ingestor_with(directory.clone(), bus.clone(), Arc::new(OneUserResolver));

        let webhook = signed_webhook(
            "x-github-event",
            "push",
            json!({"sender": {"login": "alice"}}),
        );
        let err = ingestor
            .ingest(&ServiceId::new("gh"), webhook)
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::UpstreamUnavailable(_)));
        assert_eq!(bus.calls.load(Ordering::SeqCst), 3);
        assert_eq!(directory.delivered_count(&ServiceId::new("gh")), 0);
    }
}
