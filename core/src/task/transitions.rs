//! 任务状态转换规则与 CI 结果处理

use serde::{Deserialize, Serialize};

use super::types::{Task, TaskStatus};
use crate::ci::{short_sha, CIState, CommitInfo};

impl TaskStatus {
    /// 验证状态转换是否合法
    pub fn can_transition(from: TaskStatus, to: TaskStatus) -> bool {
        use TaskStatus::*;

        // 终态不能转换
        if from == Archived {
            return false;
        }

        match (from, to) {
            (_, Archived) => true,
            (Draft, Assigned) => true,
            (Assigned, InProgress) => true,
            (Assigned | InProgress, Returned | Done | CIPass | CIFail) => true,
            (Returned, InProgress | Assigned) => true,
            // same verdict again is a no-op
            (CIPass, CIPass) | (CIFail, CIFail) => true,
            (CIPass | CIFail, InProgress | Done) => true,
            _ => false,
        }
    }

    fn accepts_ci(self) -> bool {
        matches!(
            self,
            Self::Assigned | Self::InProgress | Self::CIPass | Self::CIFail
        )
    }
}

/// A chat message to post after a status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub chat_id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CiOutcome {
    /// Non-terminal CI state; nothing to do.
    Ignored,
    /// The task cannot take this verdict.
    Rejected { reason: String },
    Transition {
        status: TaskStatus,
        notification: Option<Notification>,
    },
}

/// Decide what a CI verdict does to a task. Pure: equal inputs give equal outcomes.
pub fn apply_ci_result(task: &Task, ci_state: CIState, commit: &CommitInfo) -> CiOutcome {
    let target = match ci_state {
        CIState::Green => TaskStatus::CIPass,
        CIState::Red => TaskStatus::CIFail,
        CIState::Pending | CIState::Unknown => return CiOutcome::Ignored,
    };

    let Some(current) = task.status else {
        return CiOutcome::Rejected {
            reason: "task has no known status".to_string(),
        };
    };
    if !current.accepts_ci() || !TaskStatus::can_transition(current, target) {
        return CiOutcome::Rejected {
            reason: format!("status {current} does not accept CI results"),
        };
    }

    if let Some(tracked) = task.commit_sha.as_deref().filter(|s| !s.is_empty()) {
        if !commit.sha.is_empty() && tracked != commit.sha {
            return CiOutcome::Rejected {
                reason: format!(
                    "commit {} does not match tracked {}",
                    short_sha(&commit.sha),
                    short_sha(tracked)
                ),
            };
        }
    }

    let notification = task
        .chat_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .map(|chat_id| Notification {
            chat_id: chat_id.to_string(),
            text: ci_message(ci_state, commit),
        });

    CiOutcome::Transition {
        status: target,
        notification,
    }
}

pub fn ci_message(ci_state: CIState, commit: &CommitInfo) -> String {
    let repo = if commit.repo.is_empty() {
        "unknown"
    } else {
        commit.repo.as_str()
    };
    match ci_state {
        CIState::Green => format!("✅ CI/CD 成功: {} at {}", repo, commit.short_sha()),
        _ => format!("❌ CI/CD 失败: {} at {}", repo, commit.short_sha()),
    }
}
