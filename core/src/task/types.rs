//! 任务 / 人员记录及其与多维表字段的互转

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::ci::CIState;

/// Bitable column names for the task table.
pub mod fields {
    pub const TITLE: &str = "title";
    pub const DESCRIPTION: &str = "desc";
    pub const SKILL_TAGS: &str = "skill_tags";
    pub const DEADLINE: &str = "deadline";
    pub const ASSIGNEE_ID: &str = "assignee_id";
    pub const CHAT_ID: &str = "child_chat_id";
    pub const STATUS: &str = "status";
    pub const CI_STATE: &str = "ci_state";
    pub const COMMIT_SHA: &str = "ci_commit_sha";
    pub const SCORE: &str = "ai_score";
    pub const SUBMISSION_URL: &str = "submission_url";
    pub const CREATED_AT: &str = "created_at";
    pub const ASSIGNED_AT: &str = "assigned_at";
    pub const DONE_AT: &str = "done_at";
    pub const LAST_MODIFIED: &str = "last_modified_time";

    pub const USER_ID: &str = "user_id";
    pub const NAME: &str = "name";
    pub const HOURS_AVAILABLE: &str = "hours_available";
    pub const PERFORMANCE: &str = "performance";
    pub const LAST_DONE_AT: &str = "last_done_at";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    Draft,
    Assigned,
    InProgress,
    Returned,
    Done,
    Archived,
    #[serde(rename = "CI Pass")]
    CIPass,
    #[serde(rename = "CI Fail")]
    CIFail,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown task status: {0}")]
pub struct UnknownStatus(pub String);

impl TaskStatus {
    pub const ALL: [TaskStatus; 8] = [
        Self::Draft,
        Self::Assigned,
        Self::InProgress,
        Self::Returned,
        Self::Done,
        Self::Archived,
        Self::CIPass,
        Self::CIFail,
    ];

    /// Name as stored in the backend.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Assigned => "Assigned",
            Self::InProgress => "InProgress",
            Self::Returned => "Returned",
            Self::Done => "Done",
            Self::Archived => "Archived",
            Self::CIPass => "CI Pass",
            Self::CIFail => "CI Fail",
        }
    }

    /// Work is underway: reminders apply and CI verdicts are accepted.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Assigned | Self::InProgress)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for TaskStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.wire_name() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub record_id: String,
    pub title: String,
    pub description: String,
    pub skill_tags: String,
    pub deadline: String,
    pub assignee_id: Option<String>,
    pub chat_id: Option<String>,
    /// `None` when the stored value is missing or not a known status.
    pub status: Option<TaskStatus>,
    pub ci_state: Option<CIState>,
    pub commit_sha: Option<String>,
    pub score: Option<f64>,
    pub submission_url: Option<String>,
    /// epoch millis
    pub created_at: Option<i64>,
    pub assigned_at: Option<i64>,
    pub done_at: Option<i64>,
    pub last_modified: Option<i64>,
}

impl Task {
    /// Build from a Bitable record. Unknown or malformed values become `None`.
    pub fn from_fields(record_id: impl Into<String>, f: &Map<String, Value>) -> Self {
        let record_id = record_id.into();
        let status = text_field(f, fields::STATUS).and_then(|s| match s.parse() {
            Ok(status) => Some(status),
            Err(err) => {
                tracing::warn!(target: "taskbot.task", record_id = %record_id, error = %err, "ignoring stored status");
                None
            }
        });
        let ci_state = text_field(f, fields::CI_STATE).and_then(|s| match s.as_str() {
            "Green" => Some(CIState::Green),
            "Red" => Some(CIState::Red),
            "Pending" => Some(CIState::Pending),
            "Unknown" => Some(CIState::Unknown),
            _ => None,
        });

        Self {
            title: text_field(f, fields::TITLE).unwrap_or_default(),
            description: text_field(f, fields::DESCRIPTION).unwrap_or_default(),
            skill_tags: text_field(f, fields::SKILL_TAGS).unwrap_or_default(),
            deadline: text_field(f, fields::DEADLINE).unwrap_or_default(),
            assignee_id: text_field(f, fields::ASSIGNEE_ID),
            chat_id: text_field(f, fields::CHAT_ID),
            status,
            ci_state,
            commit_sha: text_field(f, fields::COMMIT_SHA),
            score: number_field(f, fields::SCORE),
            submission_url: text_field(f, fields::SUBMISSION_URL),
            created_at: millis_field(f, fields::CREATED_AT),
            assigned_at: millis_field(f, fields::ASSIGNED_AT),
            done_at: millis_field(f, fields::DONE_AT),
            last_modified: millis_field(f, fields::LAST_MODIFIED),
            record_id,
        }
    }

    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            "未命名"
        } else {
            &self.title
        }
    }
}

/// Fields for a freshly created task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub skill_tags: String,
    pub deadline: String,
    pub description: String,
}

impl NewTask {
    pub fn to_fields(&self, created_at: i64) -> Map<String, Value> {
        let mut m = Map::new();
        m.insert(fields::TITLE.into(), Value::from(self.title.clone()));
        m.insert(fields::SKILL_TAGS.into(), Value::from(self.skill_tags.clone()));
        m.insert(fields::DEADLINE.into(), Value::from(self.deadline.clone()));
        m.insert(fields::DESCRIPTION.into(), Value::from(self.description.clone()));
        m.insert(fields::STATUS.into(), Value::from(TaskStatus::Draft.wire_name()));
        m.insert(fields::CREATED_AT.into(), Value::from(created_at));
        m
    }
}

/// Partial update; only `Some` fields are written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskUpdate {
    pub status: Option<TaskStatus>,
    pub ci_state: Option<CIState>,
    pub commit_sha: Option<String>,
    pub assignee_id: Option<String>,
    pub chat_id: Option<String>,
    pub score: Option<f64>,
    pub submission_url: Option<String>,
    pub assigned_at: Option<i64>,
    pub done_at: Option<i64>,
}

impl TaskUpdate {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_fields().is_empty()
    }

    pub fn to_fields(&self) -> Map<String, Value> {
        let mut m = Map::new();
        if let Some(s) = self.status {
            m.insert(fields::STATUS.into(), Value::from(s.wire_name()));
        }
        if let Some(s) = self.ci_state {
            m.insert(fields::CI_STATE.into(), Value::from(s.as_str()));
        }
        let text = [
            (fields::COMMIT_SHA, &self.commit_sha),
            (fields::ASSIGNEE_ID, &self.assignee_id),
            (fields::CHAT_ID, &self.chat_id),
            (fields::SUBMISSION_URL, &self.submission_url),
        ];
        for (key, value) in text {
            if let Some(v) = value {
                m.insert(key.into(), Value::from(v.clone()));
            }
        }
        if let Some(score) = self.score {
            m.insert(fields::SCORE.into(), Value::from(score));
        }
        if let Some(ts) = self.assigned_at {
            m.insert(fields::ASSIGNED_AT.into(), Value::from(ts));
        }
        if let Some(ts) = self.done_at {
            m.insert(fields::DONE_AT.into(), Value::from(ts));
        }
        m
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub record_id: String,
    pub user_id: String,
    pub name: String,
    pub skill_tags: String,
    /// hours per week
    pub hours_available: f64,
    pub performance: f64,
    pub last_done_at: Option<i64>,
}

impl Person {
    pub fn from_fields(record_id: impl Into<String>, f: &Map<String, Value>) -> Self {
        Self {
            record_id: record_id.into(),
            user_id: text_field(f, fields::USER_ID).unwrap_or_default(),
            name: text_field(f, fields::NAME).unwrap_or_else(|| "未知人员".to_string()),
            skill_tags: text_field(f, fields::SKILL_TAGS).unwrap_or_default(),
            hours_available: number_field(f, fields::HOURS_AVAILABLE).unwrap_or(0.0),
            performance: number_field(f, fields::PERFORMANCE).unwrap_or(0.0),
            last_done_at: millis_field(f, fields::LAST_DONE_AT),
        }
    }
}

/// Text cells arrive as plain strings, rich-text segment arrays
/// (`[{"text": .., "type": "text"}]`) or multi-select string arrays.
pub fn text_field(f: &Map<String, Value>, key: &str) -> Option<String> {
    let text = match f.get(key)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Object(o) => o.get("text").and_then(Value::as_str).map(str::to_string),
                    _ => None,
                })
                .collect();
            let rich = items.iter().all(Value::is_object);
            parts.join(if rich { "" } else { "," }).trim().to_string()
        }
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

pub fn number_field(f: &Map<String, Value>, key: &str) -> Option<f64> {
    match f.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn millis_field(f: &Map<String, Value>, key: &str) -> Option<i64> {
    number_field(f, key).map(|v| v as i64)
}
