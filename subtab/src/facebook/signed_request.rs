//! Parsing and verification of Facebook `signed_request` payloads.
//!
//! Facebook passes page-tab context (and deauthorization notices) as
//! `base64url(signature) + "." + base64url(json)`, where the signature is an
//! HMAC-SHA256 of the encoded payload keyed with the app secret.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error)]
pub enum SignedRequestError {
    #[error("signed_request is not in <signature>.<payload> form")]
    Malformed,

    #[error("signed_request signature does not verify")]
    BadSignature,

    #[error("unsupported signed_request algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("signed_request payload is not valid JSON: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Decoded signed_request payload. Fields not used by the app are dropped.
#[derive(Debug, Clone, Deserialize)]
pub struct SignedRequest {
    pub algorithm: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub oauth_token: Option<String>,
    #[serde(default)]
    pub page: Option<PageContext>,
}

/// The embedding page-tab context.
#[derive(Debug, Clone, Deserialize)]
pub struct PageContext {
    pub id: String,
    #[serde(default)]
    pub liked: bool,
    #[serde(default)]
    pub admin: bool,
}

/// Verify and decode a signed_request with the app secret.
pub fn parse(raw: &str, secret: &str) -> Result<SignedRequest, SignedRequestError> {
    let (encoded_sig, encoded_payload) = raw.split_once('.').ok_or(SignedRequestError::Malformed)?;

    let signature = URL_SAFE_NO_PAD
        .decode(encoded_sig.trim_end_matches('='))
        .map_err(|_| SignedRequestError::Malformed)?;

    // The HMAC covers the still-encoded payload, not the decoded JSON
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(encoded_payload.as_bytes());
    let expected = mac.finalize().into_bytes();

    if !constant_time_eq(&signature, &expected) {
        return Err(SignedRequestError::BadSignature);
    }

    let payload = URL_SAFE_NO_PAD
        .decode(encoded_payload.trim_end_matches('='))
        .map_err(|_| SignedRequestError::Malformed)?;

    let request: SignedRequest = serde_json::from_slice(&payload)?;
    if !request.algorithm.eq_ignore_ascii_case("HMAC-SHA256") {
        return Err(SignedRequestError::UnsupportedAlgorithm(request.algorithm));
    }

    Ok(request)
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// Encode a payload the way Facebook would. Test-only counterpart of [`parse`].
#[cfg(test)]
pub(crate) fn encode(payload: &serde_json::Value, secret: &str) -> String {
    let encoded_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload).unwrap());

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(encoded_payload.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    format!("{signature}.{encoded_payload}")
}
