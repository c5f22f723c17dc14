//! Webhook signature verification using HMAC-SHA256.
//!
//! Both GitHub and Forgejo sign webhook payloads with HMAC over the raw
//! request body, using the service's shared secret as the key. The signature
//! arrives in a header of the form `<algorithm>=<hex-digest>` (e.g.
//! `sha256=abc123...`).
//!
//! Verification is the first step in webhook processing; requests with an
//! invalid signature are rejected before the body is parsed. The digest
//! comparison is constant-time, and unsupported algorithm names fail closed
//! before any HMAC work is done.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Errors from signature verification.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    /// The header declared an algorithm this relay does not support.
    ///
    /// Only `sha256` is accepted. Fail-closed: an unknown algorithm name is
    /// rejected without attempting any digest computation.
    #[error("unsupported signature algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The declared digest did not match the payload, or the header value
    /// was malformed (no `=` separator, invalid hex).
    #[error("signature could not be matched")]
    Mismatch,
}

/// Verifies a signature header against the raw payload bytes.
///
/// The header value must have the form `<algorithm>=<hex-digest>`. The HMAC
/// is computed over the exact bytes of `payload` — never a re-serialized
/// form — with `secret` as the key, and compared against the declared digest
/// in constant time (no early return on a partial match).
///
/// Callers handle the two cases this function deliberately does not:
/// a missing header (malformed traffic, reported separately) and an empty
/// secret (verification skipped entirely).
///
/// # Examples
///
/// ```
/// use forge_relay::webhooks::{compute_signature, format_signature_header, verify};
///
/// let payload = b"Hello, World!";
/// let secret = b"It's a Secret to Everybody";
///
/// let header = format_signature_header(&compute_signature(payload, secret));
/// assert!(verify(secret, &header, payload).is_ok());
/// assert!(verify(b"wrong-secret", &header, payload).is_err());
/// ```
pub fn verify(secret: &[u8], signature_header: &str, payload: &[u8]) -> Result<(), SignatureError> {
    let (algorithm, hex_digest) = signature_header
        .split_once('=')
        .ok_or(SignatureError::Mismatch)?;

    if algorithm != "sha256" {
        return Err(SignatureError::UnsupportedAlgorithm(algorithm.to_string()));
    }

    let declared = hex::decode(hex_digest).map_err(|_| SignatureError::Mismatch)?;

    let mut mac =
        HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(payload);

    // Constant-time comparison via the HMAC library
    mac.verify_slice(&declared)
        .map_err(|_| SignatureError::Mismatch)
}

/// Computes the HMAC-SHA256 signature of a payload using the given secret.
///
/// This is useful for testing purposes (generating expected signatures).
pub fn compute_signature(payload: &[u8], secret: &[u8]) -> Vec<u8> {
    let mut mac =
        HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

/// Formats a signature as a `sha256=<hex>` header value.
pub fn format_signature_header(signature: &[u8]) -> String {
    format!("sha256={}", hex::encode(signature))
}
