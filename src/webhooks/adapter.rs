//! Provider adapter dispatch.
//!
//! Each forge provider gets one adapter variant that knows the provider's
//! header conventions and payload layout. The set is a closed enum rather
//! than a runtime string→handler map: adapters are selected infallibly from
//! the service's [`ProviderKind`], so an unknown provider cannot reach the
//! request path at all — it is rejected when the service registry is loaded.
//!
//! The adapter exposes the three capabilities the orchestrator sequences as
//! explicit named stages:
//!
//! 1. [`ProviderAdapter::validate`] — signature verification against the
//!    service secret (skipped entirely for unauthenticated services)
//! 2. [`ProviderAdapter::event`] — event name from the provider's event
//!    header, forming the topic `<provider>.<event>`
//! 3. [`ProviderAdapter::agent_key`] — the provider-side username used for
//!    agent resolution

use std::collections::HashMap;

use serde_json::Value;
use thiserror::Error;

use crate::types::ProviderKind;

use super::signature::{verify, SignatureError};
use super::{forgejo, github};

/// Errors produced while authenticating and normalizing a webhook.
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// The provider's signature header is absent.
    ///
    /// Distinct from a verification failure: this is malformed traffic, not a
    /// forged request.
    #[error("missing required header: {0}")]
    MissingSignature(&'static str),

    /// Signature verification failed (mismatch or unsupported algorithm).
    #[error(transparent)]
    Signature(#[from] SignatureError),

    /// The body was not valid UTF-8 JSON.
    #[error("invalid JSON body: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The provider's event header is absent.
    #[error("missing required header: {0}")]
    MissingEventHeader(&'static str),

    /// The payload is missing the actor field.
    #[error("missing required field: {0}")]
    MissingAgentField(&'static str),
}

/// A closed set of per-provider adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderAdapter {
    GitHub,
    Forgejo,
}

impl From<ProviderKind> for ProviderAdapter {
    fn from(kind: ProviderKind) -> Self {
        match kind {
            ProviderKind::GitHub => ProviderAdapter::GitHub,
            ProviderKind::Forgejo => ProviderAdapter::Forgejo,
        }
    }
}

impl ProviderAdapter {
    /// The header this provider delivers the payload signature in.
    pub fn signature_header(&self) -> &'static str {
        match self {
            ProviderAdapter::GitHub => github::SIGNATURE_HEADER,
            ProviderAdapter::Forgejo => forgejo::SIGNATURE_HEADER,
        }
    }

    /// The header this provider delivers the event name in.
    pub fn event_header(&self) -> &'static str {
        match self {
            ProviderAdapter::GitHub => github::EVENT_HEADER,
            ProviderAdapter::Forgejo => forgejo::EVENT_HEADER,
        }
    }

    /// Verifies the request signature against the service secret.
    ///
    /// `secret` is `None` for unauthenticated services (empty secret in the
    /// directory), in which case verification is skipped entirely and the
    /// signature header is neither required nor inspected.
    pub fn validate(
        &self,
        headers: &HashMap<String, String>,
        raw_body: &[u8],
        secret: Option<&[u8]>,
    ) -> Result<(), NormalizeError> {
        let Some(secret) = secret else {
            return Ok(());
        };

        let header = headers
            .get(self.signature_header())
            .ok_or(NormalizeError::MissingSignature(self.signature_header()))?;

        verify(secret, header, raw_body)?;
        Ok(())
    }

    /// Reads the event name from the provider's event header.
    pub fn event<'h>(&self, headers: &'h HashMap<String, String>) -> Result<&'h str, NormalizeError> {
        headers
            .get(self.event_header())
            .map(String::as_str)
            .ok_or(NormalizeError::MissingEventHeader(self.event_header()))
    }

    /// Extracts the provider-side actor username used for agent resolution.
    pub fn agent_key<'b>(&self, body: &'b Value) -> Result<&'b str, NormalizeError> {
        match self {
            ProviderAdapter::GitHub => {
                github::agent_key(body).ok_or(NormalizeError::MissingAgentField(github::AGENT_FIELD))
            }
            ProviderAdapter::Forgejo => forgejo::agent_key(body)
                .ok_or(NormalizeError::MissingAgentField(forgejo::AGENT_FIELD)),
        }
    }
}

/// Decodes the raw body as UTF-8 JSON.
///
/// A decode failure is a payload error, distinct from signature errors: the
/// request authenticated correctly but its content is unusable.
pub fn decode_body(raw_body: &[u8]) -> Result<Value, NormalizeError> {
    Ok(serde_json::from_slice(raw_body)?)
}

/// Lowercases header names into the case-insensitive map the adapters and
/// the published envelope use.
pub fn normalize_headers<'a, I>(headers: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    headers
        .into_iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.to_string()))
        .collect()
}
