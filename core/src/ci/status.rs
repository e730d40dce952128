//! CI 状态归一化：把 workflow_run / check_suite / status 三种事件映射为 CIState

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CIState {
    Unknown,
    Pending,
    Green,
    Red,
}

impl CIState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Pending => "Pending",
            Self::Green => "Green",
            Self::Red => "Red",
        }
    }

    /// Green and Red are verdicts; Pending and Unknown are not.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Green | Self::Red)
    }

    /// Map one upstream status/conclusion string (case-sensitive).
    pub fn from_upstream(value: &str) -> Self {
        match value {
            "success" => Self::Green,
            "failure" | "cancelled" | "timed_out" | "error" => Self::Red,
            "waiting" | "queued" | "in_progress" | "pending" => Self::Pending,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for CIState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalize a loosely-typed CI event body. `workflow_run` wins over
/// `check_suite`, which wins over a bare status event.
pub fn normalize(payload: &Value) -> CIState {
    let state = if let Some(run) = payload.get("workflow_run") {
        run_state(run)
    } else if let Some(suite) = payload.get("check_suite") {
        run_state(suite)
    } else {
        bare_state(payload)
    };

    if state == CIState::Unknown {
        let action = payload.get("action").and_then(Value::as_str).unwrap_or("");
        tracing::debug!(
            target: "taskbot.ci",
            action,
            "unrecognized CI event or status"
        );
    }
    state
}

/// In-flight runs carry `conclusion: null` and report progress via `status`.
fn run_state(obj: &Value) -> CIState {
    let value = non_empty_str(obj, "conclusion").or_else(|| non_empty_str(obj, "status"));
    value.map(CIState::from_upstream).unwrap_or(CIState::Unknown)
}

fn bare_state(payload: &Value) -> CIState {
    let value = non_empty_str(payload, "state").or_else(|| non_empty_str(payload, "status"));
    value.map(CIState::from_upstream).unwrap_or(CIState::Unknown)
}

fn non_empty_str<'a>(obj: &'a Value, key: &str) -> Option<&'a str> {
    obj.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}
