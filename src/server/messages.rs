//! Message ingestion endpoint handler.
//!
//! Accepts webhook deliveries addressed to a registered service, runs the
//! ingestion pipeline, and maps the outcome onto the HTTP contract:
//!
//! - 202 Accepted with `{"data": {"message_id": "<broker id>"}}`
//! - 422 for a blank service identifier
//! - 404 for an unknown or disabled service
//! - 400 for signature or payload problems
//! - 502 when the bus could not accept the message

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use super::AppState;
use crate::ingest::{InboundWebhook, IngestError};
use crate::types::{MessageId, ServiceId};
use crate::webhooks::normalize_headers;

/// Errors surfaced by the messages endpoint.
#[derive(Debug, Error)]
pub enum MessageError {
    /// The path's service identifier is empty or whitespace.
    #[error("no service identifier provided")]
    BlankServiceId,

    /// A classified pipeline failure.
    #[error(transparent)]
    Ingest(#[from] IngestError),
}

impl IntoResponse for MessageError {
    fn into_response(self) -> Response {
        let status = match &self {
            MessageError::BlankServiceId => StatusCode::UNPROCESSABLE_ENTITY,
            MessageError::Ingest(IngestError::ServiceNotFound(_)) => StatusCode::NOT_FOUND,
            MessageError::Ingest(IngestError::MalformedRequest(_))
            | MessageError::Ingest(IngestError::SignatureMismatch)
            | MessageError::Ingest(IngestError::UnsupportedAlgorithm(_))
            | MessageError::Ingest(IngestError::MalformedPayload(_)) => StatusCode::BAD_REQUEST,
            MessageError::Ingest(IngestError::UpstreamUnavailable(_)) => StatusCode::BAD_GATEWAY,
        };

        // Only the classified reason crosses this boundary; broker client
        // internals stay in the logs.
        (status, self.to_string()).into_response()
    }
}

/// Success body: `{"data": {"message_id": "..."}}`.
#[derive(Debug, Serialize)]
pub struct MessageResult {
    pub data: MessageData,
}

#[derive(Debug, Serialize)]
pub struct MessageData {
    pub message_id: MessageId,
}

/// Message creation handler.
///
/// # Request
///
/// - Method: POST `/api/v1/messages/{service_id}`
/// - Required headers:
///   - the provider's event header (`x-github-event` / `x-forgejo-event`)
///   - `x-hub-signature-256: sha256=<hex>` unless the service is
///     unauthenticated
/// - Body: the provider's JSON payload, raw
///
/// # Response
///
/// - 202 Accepted: message published, body carries the broker id
/// - 400/404/422/502 per the pipeline's failure classification
pub async fn create_message_handler(
    State(app_state): State<AppState>,
    Path(service_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<MessageResult>), MessageError> {
    let service_id = ServiceId::new(service_id);
    if service_id.is_blank() {
        return Err(MessageError::BlankServiceId);
    }

    debug!(service = %service_id, bytes = body.len(), "received webhook delivery");

    let webhook = InboundWebhook {
        headers: extract_headers(&headers),
        body: body.to_vec(),
    };

    let message_id = app_state.ingestor().ingest(&service_id, webhook).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResult {
            data: MessageData { message_id },
        }),
    ))
}

/// Lowercases HTTP headers into the map the pipeline and the published
/// envelope use. Headers with non-UTF-8 values are dropped.
fn extract_headers(headers: &HeaderMap) -> std::collections::HashMap<String, String> {
    normalize_headers(
        headers
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v))),
    )
}
