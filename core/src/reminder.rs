//! 48 小时无更新任务提醒

use chrono::{DateTime, Duration, TimeZone, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::chat::{mention, ChatClient};
use crate::task::{Task, TaskStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub task_id: String,
    pub chat_id: String,
    pub assignee_id: String,
    pub text: String,
}

pub fn reminder_text(title: &str, assignee_id: &str, threshold: Duration) -> String {
    format!(
        "滴滴！请注意，任务「{}」已超过{}小时无更新，请及时处理。\n\n{}",
        title,
        threshold.num_hours(),
        mention(assignee_id)
    )
}

/// Active tasks whose last modification is older than `threshold`.
/// Tasks without a chat, an assignee, or a timestamp are skipped.
pub fn find_stale(tasks: &[Task], now: DateTime<Utc>, threshold: Duration) -> Vec<Reminder> {
    tasks
        .iter()
        .filter(|t| t.status.is_some_and(|s| s.is_active()))
        .filter_map(|t| {
            let modified = Utc.timestamp_millis_opt(t.last_modified?).single()?;
            if now - modified <= threshold {
                return None;
            }
            let chat_id = t.chat_id.as_deref().filter(|s| !s.is_empty())?;
            let assignee_id = t.assignee_id.as_deref().filter(|s| !s.is_empty())?;
            Some(Reminder {
                task_id: t.record_id.clone(),
                chat_id: chat_id.to_string(),
                assignee_id: assignee_id.to_string(),
                text: reminder_text(t.display_title(), assignee_id, threshold),
            })
        })
        .collect()
}

/// One sweep: list tasks, remind stale ones, return how many messages went out.
/// Individual send failures are logged and skipped.
pub async fn run_sweep(
    store: &dyn TaskStore,
    chat: &dyn ChatClient,
    now: DateTime<Utc>,
    threshold: Duration,
) -> anyhow::Result<usize> {
    tracing::info!(target: "taskbot.sweep", store = store.name(), "checking inactive tasks");
    let tasks = store.list_tasks().await?;
    let reminders = find_stale(&tasks, now, threshold);

    let sends = reminders.iter().map(|r| async move {
        tracing::info!(target: "taskbot.sweep", task_id = %r.task_id, "task is inactive, sending reminder");
        match chat.send_text(&r.chat_id, &r.text).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(
                    target: "taskbot.sweep",
                    task_id = %r.task_id,
                    chat_id = %r.chat_id,
                    error = %e,
                    "reminder send failed"
                );
                false
            }
        }
    });
    let sent = join_all(sends).await.into_iter().filter(|ok| *ok).count();

    tracing::info!(
        target: "taskbot.sweep",
        total = tasks.len(),
        stale = reminders.len(),
        sent,
        "sweep finished"
    );
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskStatus;
    use crate::testing::{MemoryChat, MemoryStore};
    use pretty_assertions::assert_eq;

    const HOUR_MS: i64 = 3_600_000;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()
    }

    fn task(id: &str, status: TaskStatus, hours_ago: i64) -> Task {
        Task {
            record_id: id.into(),
            title: format!("task {id}"),
            status: Some(status),
            chat_id: Some(format!("oc_{id}")),
            assignee_id: Some(format!("ou_{id}")),
            last_modified: Some(now().timestamp_millis() - hours_ago * HOUR_MS),
            ..Task::default()
        }
    }

    #[test]
    fn test_find_stale_filters() {
        let mut no_chat = task("c", TaskStatus::InProgress, 100);
        no_chat.chat_id = None;
        let mut no_ts = task("d", TaskStatus::InProgress, 100);
        no_ts.last_modified = None;

        let tasks = vec![
            task("a", TaskStatus::Assigned, 49),
            task("b", TaskStatus::InProgress, 47),
            no_chat,
            no_ts,
            task("e", TaskStatus::Done, 100),
            task("f", TaskStatus::InProgress, 48),
        ];
        let stale = find_stale(&tasks, now(), Duration::hours(48));
        assert_eq!(
            stale.iter().map(|r| r.task_id.as_str()).collect::<Vec<_>>(),
            vec!["a"]
        );
        assert_eq!(
            stale[0].text,
            "滴滴！请注意，任务「task a」已超过48小时无更新，请及时处理。\n\n<at user_id=\"ou_a\"></at>"
        );
    }

    #[tokio::test]
    async fn test_run_sweep_counts_successful_sends() {
        let store = MemoryStore::with_tasks(vec![
            task("a", TaskStatus::Assigned, 72),
            task("b", TaskStatus::InProgress, 60),
            task("c", TaskStatus::InProgress, 1),
        ]);
        let chat = MemoryChat::default();
        chat.fail_for("oc_b");

        let sent = run_sweep(&store, &chat, now(), Duration::hours(48))
            .await
            .unwrap();
        assert_eq!(sent, 1);
        let texts = chat.texts();
        assert_eq!(texts.len(), 1);
        assert_eq!(texts[0].0, "oc_a");
    }
}
