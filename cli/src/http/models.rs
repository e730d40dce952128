//! HTTP 请求/响应模型与错误映射

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============= Health =============

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub name: String,
    pub version: String,
    pub uptime_seconds: f64,
    pub requests_handled: u64,
    pub errors: u64,
    pub timestamp: String,
}

// ============= Chat events =============

/// Decoded chat callback envelope. Schema 2.0 carries the type in
/// `header.event_type`; the legacy schema puts it in `event.type`.
#[derive(Debug, Clone, PartialEq)]
pub struct EventEnvelope {
    pub event_type: String,
    pub event: Value,
}

impl EventEnvelope {
    pub fn from_payload(payload: &Value) -> Self {
        let event = payload.get("event").cloned().unwrap_or(Value::Null);
        let event_type = payload
            .pointer("/header/event_type")
            .or_else(|| event.get("type"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Self { event_type, event }
    }
}

/// `Some(challenge)` for a URL verification request.
pub fn challenge_of(payload: &Value) -> Option<&str> {
    let kind = payload
        .get("type")
        .or_else(|| payload.pointer("/header/event_type"))
        .and_then(Value::as_str)?;
    if kind != "url_verification" {
        return None;
    }
    Some(
        payload
            .get("challenge")
            .and_then(Value::as_str)
            .unwrap_or_default(),
    )
}

/// Verification token carried by a callback, top level or in the 2.0 header.
pub fn token_of(payload: &Value) -> Option<&str> {
    payload
        .get("token")
        .or_else(|| payload.pointer("/header/token"))
        .and_then(Value::as_str)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatReply {
    Challenge(String),
    Accepted,
}

impl IntoResponse for ChatReply {
    fn into_response(self) -> Response {
        match self {
            Self::Challenge(challenge) => {
                Json(serde_json::json!({ "challenge": challenge })).into_response()
            }
            Self::Accepted => Json(serde_json::json!({ "msg": "success" })).into_response(),
        }
    }
}

// ============= CI webhook =============

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CiReply {
    /// Nothing changed; 200 with a short reason.
    Skipped(String),
    /// Status persisted; 204.
    Processed,
}

impl IntoResponse for CiReply {
    fn into_response(self) -> Response {
        match self {
            Self::Skipped(reason) => (StatusCode::OK, reason).into_response(),
            Self::Processed => StatusCode::NO_CONTENT.into_response(),
        }
    }
}

// ============= Error Handling =============

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Malformed or unresolvable input.
    Validation(String),
    /// Signature or verification token rejected.
    Auth(String),
    /// A collaborator failed; the caller still gets a success-shaped reply.
    Upstream(String),
    UnknownEvent(String),
}

impl DispatchError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Auth(_) => StatusCode::FORBIDDEN,
            Self::Upstream(_) | Self::UnknownEvent(_) => StatusCode::OK,
        }
    }
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(msg) | Self::Auth(msg) | Self::Upstream(msg) => f.write_str(msg),
            Self::UnknownEvent(event) => write!(f, "Ignoring event: {event}"),
        }
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dispatch_error_status() {
        assert_eq!(
            DispatchError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(DispatchError::Auth("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(DispatchError::Upstream("x".into()).status(), StatusCode::OK);
        assert_eq!(
            DispatchError::UnknownEvent("ping".into()).to_string(),
            "Ignoring event: ping"
        );
    }

    #[test]
    fn test_challenge_detection() {
        let legacy = json!({"type": "url_verification", "challenge": "c1", "token": "t"});
        assert_eq!(challenge_of(&legacy), Some("c1"));
        assert_eq!(token_of(&legacy), Some("t"));

        let v2 = json!({"schema": "2.0", "header": {"event_type": "url_verification", "token": "t2"}, "challenge": "c2"});
        assert_eq!(challenge_of(&v2), Some("c2"));
        assert_eq!(token_of(&v2), Some("t2"));

        let event = json!({"schema": "2.0", "header": {"event_type": "im.message.receive_v1"}});
        assert_eq!(challenge_of(&event), None);
    }

    #[test]
    fn test_envelope_both_schemas() {
        let v2 = json!({"header": {"event_type": "card.action.trigger"}, "event": {"a": 1}});
        let env = EventEnvelope::from_payload(&v2);
        assert_eq!(env.event_type, "card.action.trigger");
        assert_eq!(env.event, json!({"a": 1}));

        let legacy = json!({"type": "event_callback", "event": {"type": "message"}});
        assert_eq!(EventEnvelope::from_payload(&legacy).event_type, "message");

        assert_eq!(EventEnvelope::from_payload(&json!({})).event_type, "");
    }
}
