//! Webhook 分发：飞书事件回调与 CI 状态回写

use axum::http::HeaderMap;
use serde_json::Value;
use taskbot_core::api::{
    apply_ci_result, extract_commit, normalize, short_sha, verify, CiOutcome, Provider,
    TaskUpdate, WebhookHeaders,
};

use super::chat;
use super::models::{challenge_of, token_of, ChatReply, CiReply, DispatchError, EventEnvelope};
use super::state::AppState;

pub const HEADER_EVENT: &str = "X-GitHub-Event";
pub const HEADER_EVENT_ALIAS: &str = "X-Event-Type";
/// The only CI event that moves task state.
pub const CI_EVENT: &str = "check_suite";

pub const EVENT_MESSAGE: &str = "im.message.receive_v1";
pub const EVENT_CARD_ACTION: &str = "card.action.trigger";

pub fn webhook_headers(headers: &HeaderMap) -> WebhookHeaders {
    headers
        .iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str(), v)))
        .collect()
}

/// Chat callback: challenge, signature, then event routing. Handler work is
/// spawned so it outlives the request.
pub async fn handle_chat_event(
    state: &AppState,
    headers: &WebhookHeaders,
    body: &[u8],
) -> Result<ChatReply, DispatchError> {
    let payload: Option<Value> = serde_json::from_slice(body).ok();

    if let Some(challenge) = payload.as_ref().and_then(challenge_of) {
        let expected = state
            .config
            .feishu
            .verification_token
            .as_deref()
            .filter(|t| !t.is_empty());
        if let Some(expected) = expected {
            if payload.as_ref().and_then(token_of) != Some(expected) {
                tracing::warn!(target: "taskbot.http", "challenge token mismatch");
                return Err(DispatchError::Auth("Verification token mismatch".into()));
            }
        }
        tracing::info!(target: "taskbot.http", "answering url verification challenge");
        return Ok(ChatReply::Challenge(challenge.to_string()));
    }

    verify(
        Provider::Chat,
        body,
        headers,
        state.config.feishu.encrypt_key.as_deref(),
    )
    .map_err(|e| {
        tracing::warn!(target: "taskbot.http", error = %e, "chat signature rejected");
        DispatchError::Auth("Signature verification failed".into())
    })?;

    let payload = payload.ok_or_else(|| DispatchError::Validation("Malformed JSON body".into()))?;
    let envelope = EventEnvelope::from_payload(&payload);
    tracing::info!(target: "taskbot.http", event_type = %envelope.event_type, "chat event received");

    match envelope.event_type.as_str() {
        EVENT_MESSAGE => {
            let state = state.clone();
            tokio::spawn(async move {
                if let Err(e) = chat::handle_message(&state, &envelope.event).await {
                    tracing::error!(target: "taskbot.http", error = %e, "message handler failed");
                }
            });
            Ok(ChatReply::Accepted)
        }
        EVENT_CARD_ACTION => {
            let state = state.clone();
            tokio::spawn(async move {
                if let Err(e) = chat::handle_card_action(&state, &envelope.event).await {
                    tracing::error!(target: "taskbot.http", error = %e, "card action handler failed");
                }
            });
            Ok(ChatReply::Accepted)
        }
        other => Err(DispatchError::UnknownEvent(other.to_string())),
    }
}

/// CI webhook: verify, filter by event, resolve the task by commit SHA and
/// apply the verdict.
pub async fn handle_ci_webhook(
    state: &AppState,
    headers: &WebhookHeaders,
    body: &[u8],
) -> Result<CiReply, DispatchError> {
    verify(
        Provider::Ci,
        body,
        headers,
        state.config.ci.webhook_secret.as_deref(),
    )
    .map_err(|e| {
        tracing::warn!(target: "taskbot.ci", error = %e, "ci signature rejected");
        DispatchError::Auth("Signature verification failed".into())
    })?;

    let event = headers
        .get(HEADER_EVENT)
        .or_else(|| headers.get(HEADER_EVENT_ALIAS))
        .ok_or_else(|| DispatchError::Validation("Missing event header".into()))?;
    if event != CI_EVENT {
        tracing::info!(target: "taskbot.ci", event, "ignoring ci event");
        return Err(DispatchError::UnknownEvent(event.to_string()));
    }

    let payload: Value = serde_json::from_slice(body)
        .map_err(|e| DispatchError::Validation(format!("Malformed JSON body: {e}")))?;
    let ci_state = normalize(&payload);
    let commit = extract_commit(&payload);
    if !commit.has_sha() {
        return Err(DispatchError::Validation(
            "Could not extract commit SHA".into(),
        ));
    }
    tracing::info!(
        target: "taskbot.ci",
        sha = %commit.sha,
        repo = %commit.repo,
        ci_state = %ci_state,
        "ci verdict received"
    );

    let store = state.services.store.as_ref();
    let task = match store.find_task_by_commit(&commit.sha).await {
        Ok(Some(task)) => task,
        Ok(None) => {
            tracing::info!(target: "taskbot.ci", sha = %commit.sha, "no task found for commit");
            return Err(DispatchError::Validation(
                "No task found for commit SHA".into(),
            ));
        }
        Err(e) => {
            tracing::error!(target: "taskbot.ci", sha = %commit.sha, error = %e, "task lookup failed");
            state.record_error();
            return Err(DispatchError::Upstream("Task lookup failed".into()));
        }
    };

    match apply_ci_result(&task, ci_state, &commit) {
        CiOutcome::Ignored => Ok(CiReply::Skipped(
            "Ignoring pending or unknown status".into(),
        )),
        CiOutcome::Rejected { reason } => {
            tracing::info!(target: "taskbot.ci", task_id = %task.record_id, reason = %reason, "ci verdict rejected");
            Ok(CiReply::Skipped(reason))
        }
        CiOutcome::Transition {
            status,
            notification,
        } => {
            let update = TaskUpdate {
                status: Some(status),
                ci_state: Some(ci_state),
                ..TaskUpdate::default()
            };
            if let Err(e) = store.update_task(&task.record_id, update).await {
                tracing::error!(target: "taskbot.ci", task_id = %task.record_id, error = %e, "status update failed");
                state.record_error();
                return Err(DispatchError::Upstream("Status update failed".into()));
            }
            tracing::info!(
                target: "taskbot.ci",
                task_id = %task.record_id,
                status = %status,
                sha = short_sha(&commit.sha),
                "task status updated"
            );

            if let Some(note) = notification {
                let fresh = state
                    .ledger
                    .as_ref()
                    .map_or(true, |l| l.first_delivery(&commit.sha, status));
                if !fresh {
                    tracing::info!(target: "taskbot.ci", task_id = %task.record_id, "duplicate notification suppressed");
                } else if let Err(e) = state.services.chat.send_text(&note.chat_id, &note.text).await {
                    // status stays committed
                    tracing::warn!(target: "taskbot.ci", chat_id = %note.chat_id, error = %e, "ci notification failed");
                    state.record_error();
                }
            }
            Ok(CiReply::Processed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::test_support::{
        ci_headers, sample_task, state_with, TestDoubles, CI_SECRET,
    };
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use taskbot_core::api::{CIState, TaskStatus};

    const SHA: &str = "a1b2c3d4e5f60718293a4b5c6d7e8f9012345678";

    fn check_suite(conclusion: &str) -> Vec<u8> {
        json!({
            "action": "completed",
            "check_suite": {"head_sha": SHA, "conclusion": conclusion, "head_branch": "main"},
            "repository": {"full_name": "acme/widgets"}
        })
        .to_string()
        .into_bytes()
    }

    #[tokio::test]
    async fn test_red_verdict_moves_to_ci_fail() {
        let doubles = TestDoubles::with_tasks(vec![sample_task(SHA, Some("oc_child"))]);
        let state = state_with(&doubles, |_| {});
        let body = check_suite("failure");

        let reply = handle_ci_webhook(&state, &ci_headers("check_suite", &body), &body)
            .await
            .unwrap();
        assert_eq!(reply, CiReply::Processed);

        let task = doubles.store.task("rec_1").unwrap();
        assert_eq!(task.status, Some(TaskStatus::CIFail));
        assert_eq!(task.ci_state, Some(CIState::Red));
        assert_eq!(
            doubles.chat.texts(),
            vec![(
                "oc_child".to_string(),
                "❌ CI/CD 失败: acme/widgets at a1b2c3d".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_pending_is_skipped_without_update() {
        let doubles = TestDoubles::with_tasks(vec![sample_task(SHA, Some("oc_child"))]);
        let state = state_with(&doubles, |_| {});
        let body = json!({
            "check_suite": {"head_sha": SHA, "status": "queued", "conclusion": null}
        })
        .to_string()
        .into_bytes();

        let reply = handle_ci_webhook(&state, &ci_headers("check_suite", &body), &body)
            .await
            .unwrap();
        assert!(matches!(reply, CiReply::Skipped(_)));
        assert!(doubles.store.updates().is_empty());
        assert!(doubles.chat.texts().is_empty());
    }

    #[tokio::test]
    async fn test_archived_task_rejects_verdict() {
        let mut task = sample_task(SHA, Some("oc_child"));
        task.status = Some(TaskStatus::Archived);
        let doubles = TestDoubles::with_tasks(vec![task]);
        let state = state_with(&doubles, |_| {});
        let body = check_suite("success");

        let reply = handle_ci_webhook(&state, &ci_headers("check_suite", &body), &body)
            .await
            .unwrap();
        assert!(matches!(reply, CiReply::Skipped(_)));
        assert!(doubles.store.updates().is_empty());
    }

    #[tokio::test]
    async fn test_event_alias_header() {
        let doubles = TestDoubles::with_tasks(vec![sample_task(SHA, None)]);
        let state = state_with(&doubles, |_| {});
        let body = check_suite("success");
        let mut headers = ci_headers("", &body);
        headers.insert(HEADER_EVENT_ALIAS, "check_suite");

        let reply = handle_ci_webhook(&state, &headers, &body).await.unwrap();
        assert_eq!(reply, CiReply::Processed);
        // no linked chat, no message
        assert!(doubles.chat.texts().is_empty());
    }

    #[tokio::test]
    async fn test_missing_event_header_is_validation() {
        let doubles = TestDoubles::default();
        let state = state_with(&doubles, |_| {});
        let body = check_suite("success");
        let err = handle_ci_webhook(&state, &ci_headers("", &body), &body)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Validation(_)));
    }

    #[tokio::test]
    async fn test_malformed_json_and_missing_sha() {
        let doubles = TestDoubles::default();
        let state = state_with(&doubles, |_| {});

        let body = b"{not json".to_vec();
        let err = handle_ci_webhook(&state, &ci_headers("check_suite", &body), &body)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Validation(_)));

        let body = json!({"check_suite": {"conclusion": "success"}}).to_string().into_bytes();
        let err = handle_ci_webhook(&state, &ci_headers("check_suite", &body), &body)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DispatchError::Validation("Could not extract commit SHA".into())
        );
        assert_eq!(doubles.store.lookups(), 0);
    }

    #[tokio::test]
    async fn test_lookup_failure_is_upstream() {
        let doubles = TestDoubles::default();
        doubles.store.fail_lookups();
        let state = state_with(&doubles, |_| {});
        let body = check_suite("success");

        let err = handle_ci_webhook(&state, &ci_headers("check_suite", &body), &body)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Upstream(_)));
        assert_eq!(err.status(), axum::http::StatusCode::OK);
    }

    #[tokio::test]
    async fn test_update_failure_sends_nothing() {
        let doubles = TestDoubles::with_tasks(vec![sample_task(SHA, Some("oc_child"))]);
        doubles.store.fail_updates();
        let state = state_with(&doubles, |_| {});
        let body = check_suite("success");

        let err = handle_ci_webhook(&state, &ci_headers("check_suite", &body), &body)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Upstream(_)));
        assert!(doubles.chat.texts().is_empty());
    }

    #[tokio::test]
    async fn test_notification_failure_keeps_status() {
        let doubles = TestDoubles::with_tasks(vec![sample_task(SHA, Some("oc_child"))]);
        doubles.chat.fail_for("oc_child");
        let state = state_with(&doubles, |_| {});
        let body = check_suite("success");

        let reply = handle_ci_webhook(&state, &ci_headers("check_suite", &body), &body)
            .await
            .unwrap();
        assert_eq!(reply, CiReply::Processed);
        assert_eq!(
            doubles.store.task("rec_1").unwrap().status,
            Some(TaskStatus::CIPass)
        );
        assert_eq!(state.stats().errors_total, 1);
    }

    #[tokio::test]
    async fn test_dedup_suppresses_repeat_notification() {
        let doubles = TestDoubles::with_tasks(vec![sample_task(SHA, Some("oc_child"))]);
        let state = state_with(&doubles, |cfg| cfg.ci.dedup_notifications = true);
        let body = check_suite("success");
        let headers = ci_headers("check_suite", &body);

        for _ in 0..2 {
            let reply = handle_ci_webhook(&state, &headers, &body).await.unwrap();
            assert_eq!(reply, CiReply::Processed);
        }
        assert_eq!(doubles.store.updates().len(), 2);
        assert_eq!(doubles.chat.texts().len(), 1);
    }

    #[tokio::test]
    async fn test_wrong_secret_is_auth() {
        let doubles = TestDoubles::default();
        let state = state_with(&doubles, |cfg| {
            cfg.ci.webhook_secret = Some(format!("{CI_SECRET}-rotated"))
        });
        let body = check_suite("success");
        let err = handle_ci_webhook(&state, &ci_headers("check_suite", &body), &body)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Auth(_)));
    }
}
