//! 群聊指令处理：新任务、选择候选人、提交评审

use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{json, Value};
use taskbot_core::api::{
    candidate_card, evaluate_submission, match_candidates, mention, NewTask, Task, TaskStatus,
    TaskUpdate, ACTION_SELECT_CANDIDATE,
};

use super::state::AppState;

lazy_static! {
    static ref MENTION_PLACEHOLDER: Option<Regex> = Regex::new(r"@_user_\d+").ok();
}

pub const NEW_TASK_USAGE: &str =
    "格式：新任务 标题 | 技能标签 | 截止时间 | 描述\n例如：新任务 登录页重构 | React, TypeScript | 2024-06-30 | 按新设计稿实现";
pub const SUBMIT_USAGE: &str = "格式：提交 <链接>";
pub const NO_CANDIDATES: &str = "暂无可匹配的人选，请先在人员表中补充信息。";
pub const NO_LINKED_TASK: &str = "当前群未关联任务，无法提交。";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    NewTask(NewTask),
    Submit(String),
    /// Recognized keyword with unusable arguments; reply with this hint.
    Usage(&'static str),
}

/// Remove `@_user_N` placeholders and surrounding whitespace.
pub fn strip_mentions(text: &str) -> String {
    match MENTION_PLACEHOLDER.as_ref() {
        Some(re) => re.replace_all(text, "").trim().to_string(),
        None => text.trim().to_string(),
    }
}

/// Keyword must be followed by whitespace or end the text.
fn strip_keyword<'a>(text: &'a str, keywords: &[&str]) -> Option<&'a str> {
    keywords.iter().find_map(|kw| {
        let head = text.get(..kw.len())?;
        let rest = &text[kw.len()..];
        let bounded = rest.chars().next().map_or(true, char::is_whitespace);
        (head.eq_ignore_ascii_case(kw) && bounded).then_some(rest)
    })
}

/// `None` for ordinary chatter.
pub fn parse_command(text: &str) -> Option<Command> {
    let text = strip_mentions(text);

    if let Some(rest) = strip_keyword(&text, &["新任务", "new task"]) {
        let parts: Vec<&str> = rest.splitn(4, '|').map(str::trim).collect();
        return Some(match parts.as_slice() {
            [title, skills, deadline, desc] if !title.is_empty() => Command::NewTask(NewTask {
                title: title.to_string(),
                skill_tags: skills.to_string(),
                deadline: deadline.to_string(),
                description: desc.to_string(),
            }),
            _ => Command::Usage(NEW_TASK_USAGE),
        });
    }

    if let Some(rest) = strip_keyword(&text, &["提交", "submit"]) {
        let url = rest.trim();
        return Some(if url.is_empty() {
            Command::Usage(SUBMIT_USAGE)
        } else {
            Command::Submit(url.to_string())
        });
    }

    None
}

/// Text of an `im.message.receive_v1` event; non-text messages yield `None`.
fn message_text(event: &Value) -> Option<String> {
    let message = event.get("message")?;
    if message.get("message_type").and_then(Value::as_str) != Some("text") {
        return None;
    }
    let content: Value = serde_json::from_str(message.get("content")?.as_str()?).ok()?;
    content.get("text").and_then(Value::as_str).map(str::to_string)
}

pub async fn handle_message(state: &AppState, event: &Value) -> anyhow::Result<()> {
    let Some(chat_id) = event.pointer("/message/chat_id").and_then(Value::as_str) else {
        anyhow::bail!("message event without chat_id");
    };
    let Some(text) = message_text(event) else {
        tracing::debug!(target: "taskbot.http", chat_id, "ignoring non-text message");
        return Ok(());
    };

    match parse_command(&text) {
        None => Ok(()),
        Some(Command::Usage(hint)) => {
            state.services.chat.send_text(chat_id, hint).await?;
            Ok(())
        }
        Some(Command::NewTask(new_task)) => create_and_match(state, chat_id, new_task).await,
        Some(Command::Submit(url)) => submit(state, chat_id, &url).await,
    }
}

async fn create_and_match(state: &AppState, chat_id: &str, new_task: NewTask) -> anyhow::Result<()> {
    let services = &state.services;
    let task = services.store.create_task(new_task).await?;
    tracing::info!(target: "taskbot.http", task_id = %task.record_id, title = %task.title, "task created");

    let persons = services.store.list_persons().await?;
    let mut candidates = match_candidates(
        services.llm(),
        &task,
        &persons,
        &state.config.matching.weights,
        Utc::now(),
    )
    .await;
    candidates.truncate(state.config.matching.top_n);

    if candidates.is_empty() {
        services.chat.send_text(chat_id, NO_CANDIDATES).await?;
        return Ok(());
    }
    services
        .chat
        .send_card(chat_id, &candidate_card(&task.record_id, &candidates))
        .await?;
    Ok(())
}

async fn submit(state: &AppState, chat_id: &str, url: &str) -> anyhow::Result<()> {
    let services = &state.services;
    let Some(task) = services.store.find_task_by_chat(chat_id).await? else {
        services.chat.send_text(chat_id, NO_LINKED_TASK).await?;
        return Ok(());
    };

    services
        .store
        .update_task(
            &task.record_id,
            TaskUpdate {
                submission_url: Some(url.to_string()),
                ..TaskUpdate::default()
            },
        )
        .await?;

    let evaluation = evaluate_submission(services.llm(), &task, url).await;
    let passed = evaluation.passed(state.config.matching.pass_score);
    let target = if passed {
        TaskStatus::Done
    } else {
        TaskStatus::Returned
    };

    let mut update = TaskUpdate {
        score: Some(evaluation.score),
        ..TaskUpdate::default()
    };
    match task.status {
        Some(current) if !TaskStatus::can_transition(current, target) => {
            tracing::warn!(
                target: "taskbot.http",
                task_id = %task.record_id,
                from = %current,
                to = %target,
                "submission result does not change status"
            );
        }
        _ => {
            update.status = Some(target);
            if passed {
                update.done_at = Some(Utc::now().timestamp_millis());
            }
        }
    }
    services.store.update_task(&task.record_id, update).await?;
    tracing::info!(
        target: "taskbot.http",
        task_id = %task.record_id,
        score = evaluation.score,
        passed,
        "submission evaluated"
    );

    services
        .chat
        .send_text(chat_id, &evaluation_text(&task, evaluation.score, passed, &evaluation.failed_reasons))
        .await?;
    Ok(())
}

pub fn evaluation_text(task: &Task, score: f64, passed: bool, reasons: &[String]) -> String {
    let mut text = format!(
        "📋 任务「{}」评审结果\n得分：{}\n结论：{}",
        task.display_title(),
        score,
        if passed { "✅ 通过" } else { "❌ 未通过，请修改后重新提交" }
    );
    if !reasons.is_empty() {
        text.push_str("\n问题：");
        for reason in reasons {
            text.push_str("\n- ");
            text.push_str(reason);
        }
    }
    text
}

/// Button value of a card callback; older clients send it as a JSON string.
fn action_value(event: &Value) -> Option<Value> {
    match event.pointer("/action/value")? {
        Value::String(s) => serde_json::from_str(s).ok(),
        v @ Value::Object(_) => Some(v.clone()),
        _ => None,
    }
}

pub async fn handle_card_action(state: &AppState, event: &Value) -> anyhow::Result<()> {
    let Some(value) = action_value(event) else {
        anyhow::bail!("card action without value");
    };
    let field = |key: &str| value.get(key).and_then(Value::as_str).unwrap_or_default();
    if field("action") != ACTION_SELECT_CANDIDATE {
        tracing::debug!(target: "taskbot.http", action = field("action"), "ignoring card action");
        return Ok(());
    }
    let (task_id, user_id, user_name) = (field("task_id"), field("user_id"), field("user_name"));
    if task_id.is_empty() || user_id.is_empty() {
        anyhow::bail!("select_candidate without task_id or user_id");
    }
    let origin_chat = event
        .pointer("/context/open_chat_id")
        .and_then(Value::as_str);

    let services = &state.services;
    let tasks = services.store.list_tasks().await?;
    let Some(task) = tasks.into_iter().find(|t| t.record_id == task_id) else {
        anyhow::bail!("task {task_id} not found");
    };
    if let Some(current) = task.status {
        if !TaskStatus::can_transition(current, TaskStatus::Assigned) {
            tracing::warn!(target: "taskbot.http", task_id, status = %current, "task cannot be assigned");
            if let Some(origin) = origin_chat {
                let text = format!("任务「{}」当前状态为 {}，无法分配。", task.display_title(), current);
                services.chat.send_text(origin, &text).await?;
            }
            return Ok(());
        }
    }

    let child_chat = services
        .chat
        .create_chat(
            &format!("任务：{}", task.display_title()),
            &task.description,
            &[user_id.to_string()],
        )
        .await?;
    services
        .store
        .update_task(
            task_id,
            TaskUpdate {
                status: Some(TaskStatus::Assigned),
                assignee_id: Some(user_id.to_string()),
                chat_id: Some(child_chat.clone()),
                assigned_at: Some(Utc::now().timestamp_millis()),
                ..TaskUpdate::default()
            },
        )
        .await?;
    tracing::info!(target: "taskbot.http", task_id, user_id, chat_id = %child_chat, "task assigned");

    services
        .chat
        .send_text(&child_chat, &assignment_text(&task, user_id))
        .await?;

    if let Some(message_id) = event
        .pointer("/context/open_message_id")
        .and_then(Value::as_str)
    {
        // the card is cosmetic; assignment already stands
        if let Err(e) = services
            .chat
            .update_card(message_id, &assigned_card(&task, user_name))
            .await
        {
            tracing::warn!(target: "taskbot.http", message_id, error = %e, "card update failed");
        }
    }
    Ok(())
}

pub fn assignment_text(task: &Task, user_id: &str) -> String {
    let deadline = if task.deadline.is_empty() {
        "尽快"
    } else {
        task.deadline.as_str()
    };
    format!(
        "{} 你已被指派任务「{}」\n截止时间：{}\n{}\n完成后请在本群发送「提交 <链接>」。",
        mention(user_id),
        task.display_title(),
        deadline,
        task.description
    )
}

fn assigned_card(task: &Task, user_name: &str) -> Value {
    json!({
        "config": {"wide_screen_mode": true},
        "header": {
            "title": {"tag": "plain_text", "content": format!("任务已分配：{}", task.display_title())},
            "template": "green"
        },
        "elements": [{
            "tag": "div",
            "text": {"tag": "lark_md", "content": format!("负责人：**{}**", user_name)}
        }]
    })
}
