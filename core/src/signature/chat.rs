//! 飞书事件回调签名：sha1(timestamp + nonce + encrypt_key + body) 的十六进制摘要

use sha1::{Digest, Sha1};
use subtle::ConstantTimeEq;

use super::{SignatureError, WebhookHeaders};

pub const HEADER_TIMESTAMP: &str = "X-Lark-Request-Timestamp";
pub const HEADER_NONCE: &str = "X-Lark-Request-Nonce";
pub const HEADER_SIGNATURE: &str = "X-Lark-Signature";

/// Lowercase hex SHA-1 over the concatenated inputs.
pub fn compute_signature(timestamp: &str, nonce: &str, encrypt_key: &str, body: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(timestamp.as_bytes());
    hasher.update(nonce.as_bytes());
    hasher.update(encrypt_key.as_bytes());
    hasher.update(body);
    hex::encode(hasher.finalize())
}

pub fn verify(
    body: &[u8],
    headers: &WebhookHeaders,
    encrypt_key: Option<&str>,
) -> Result<(), SignatureError> {
    let (Some(timestamp), Some(nonce), Some(received)) = (
        headers.get(HEADER_TIMESTAMP),
        headers.get(HEADER_NONCE),
        headers.get(HEADER_SIGNATURE),
    ) else {
        return Err(SignatureError::IncompleteHeaders);
    };

    let expected = compute_signature(timestamp, nonce, encrypt_key.unwrap_or_default(), body);

    // NOTE: the platform's reference check is a plain string equality. The
    // comparison here keeps exact (case-sensitive) equality semantics but runs
    // in constant time.
    if bool::from(expected.as_bytes().ct_eq(received.as_bytes())) {
        Ok(())
    } else {
        tracing::warn!(target: "taskbot.signature", "chat signature mismatch");
        Err(SignatureError::Mismatch)
    }
}
