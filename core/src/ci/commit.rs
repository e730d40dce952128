use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Commit metadata pulled from a CI event. Empty strings mean "absent".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub sha: String,
    pub message: String,
    pub url: String,
    pub branch: String,
    pub repo: String,
}

impl CommitInfo {
    /// First seven characters of the SHA, as shown in chat notifications.
    pub fn short_sha(&self) -> &str {
        short_sha(&self.sha)
    }

    pub fn has_sha(&self) -> bool {
        !self.sha.trim().is_empty()
    }
}

pub fn short_sha(sha: &str) -> &str {
    match sha.char_indices().nth(7) {
        Some((idx, _)) => &sha[..idx],
        None => sha,
    }
}

/// Extract commit metadata. Each field keeps the first non-empty value it sees.
pub fn extract_commit(payload: &Value) -> CommitInfo {
    let mut info = CommitInfo::default();

    fill(&mut info.repo, str_at(payload, &["repository", "full_name"]));

    if let Some(run) = payload.get("workflow_run") {
        fill(&mut info.sha, str_at(run, &["head_sha"]));
        fill(&mut info.url, str_at(run, &["html_url"]));
        fill(&mut info.branch, str_at(run, &["head_branch"]));
        fill(&mut info.message, str_at(run, &["head_commit", "message"]));
    } else if let Some(suite) = payload.get("check_suite") {
        fill(&mut info.sha, str_at(suite, &["head_sha"]));
        fill(&mut info.url, str_at(suite, &["html_url"]));
        fill(&mut info.url, str_at(suite, &["url"]));
        fill(&mut info.branch, str_at(suite, &["head_branch"]));
        fill(&mut info.message, str_at(suite, &["head_commit", "message"]));
    } else if payload.get("state").is_some() || payload.get("status").is_some() {
        fill(&mut info.sha, str_at(payload, &["sha"]));
        fill(&mut info.url, str_at(payload, &["commit", "html_url"]));
        fill(&mut info.message, str_at(payload, &["commit", "commit", "message"]));
        fill(&mut info.message, str_at(payload, &["commit", "message"]));
        fill(
            &mut info.branch,
            payload
                .get("branches")
                .and_then(|b| b.get(0))
                .and_then(|b| str_at(b, &["name"])),
        );
    }

    if let Some(first) = payload
        .get("commits")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
    {
        fill(&mut info.sha, str_at(first, &["id"]));
        fill(&mut info.message, str_at(first, &["message"]));
        fill(&mut info.url, str_at(first, &["url"]));
    }

    info
}

fn str_at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    path.iter()
        .try_fold(value, |v, key| v.get(key))
        .and_then(Value::as_str)
}

fn fill(slot: &mut String, value: Option<&str>) {
    if !slot.is_empty() {
        return;
    }
    if let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) {
        *slot = v.to_string();
    }
}
