//! Inbound webhook authenticity checks for the chat platform and the CI provider.
//!
//! Both schemes are pure functions of (body, headers, secret). Callers that need
//! a plain yes/no can use [`is_valid`].

pub mod chat;
pub mod ci;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// Feishu / Lark event callbacks.
    Chat,
    /// GitHub-style `algo=hexdigest` HMAC webhooks.
    Ci,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("incomplete signature headers")]
    IncompleteHeaders,
    #[error("missing signature header {0}")]
    MissingHeader(&'static str),
    #[error("malformed signature header: {0}")]
    Malformed(String),
    #[error("unsupported signature algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("signature mismatch")]
    Mismatch,
}

/// Case-insensitive header view decoupled from any HTTP framework.
#[derive(Debug, Clone, Default)]
pub struct WebhookHeaders {
    entries: Vec<(String, String)>,
}

impl WebhookHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// First value whose name matches case-insensitively; blank values count as absent.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.trim())
            .filter(|v| !v.is_empty())
    }
}

impl<K, V> FromIterator<(K, V)> for WebhookHeaders
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Verify a webhook request. `secret` is the encrypt key for [`Provider::Chat`]
/// and the HMAC webhook secret for [`Provider::Ci`].
pub fn verify(
    provider: Provider,
    body: &[u8],
    headers: &WebhookHeaders,
    secret: Option<&str>,
) -> Result<(), SignatureError> {
    match provider {
        Provider::Chat => chat::verify(body, headers, secret),
        Provider::Ci => ci::verify(body, headers, secret),
    }
}

pub fn is_valid(
    provider: Provider,
    body: &[u8],
    headers: &WebhookHeaders,
    secret: Option<&str>,
) -> bool {
    verify(provider, body, headers, secret).is_ok()
}
