//! Shared fixtures for handler and router tests.

use std::sync::Arc;
use std::time::Duration;

use taskbot_core::api::{AppConfig, Services, Task, TaskStatus, WebhookHeaders};
use taskbot_core::signature::{chat, ci};
use taskbot_core::testing::{MemoryChat, MemoryStore, ScriptedLlm};
use tokio::sync::broadcast;

use super::state::AppState;

pub const CI_SECRET: &str = "ci-secret";
pub const ENCRYPT_KEY: &str = "encrypt-key";

#[derive(Default)]
pub struct TestDoubles {
    pub store: Arc<MemoryStore>,
    pub chat: Arc<MemoryChat>,
    pub llm: Option<Arc<ScriptedLlm>>,
}

impl TestDoubles {
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        Self {
            store: Arc::new(MemoryStore::with_tasks(tasks)),
            ..Self::default()
        }
    }
}

pub fn services(doubles: &TestDoubles) -> Services {
    Services {
        store: doubles.store.clone(),
        chat: doubles.chat.clone(),
        llm: doubles
            .llm
            .clone()
            .map(|l| l as Arc<dyn taskbot_core::api::LlmProvider>),
    }
}

pub fn test_config() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.ci.enabled = true;
    cfg.ci.webhook_secret = Some(CI_SECRET.to_string());
    cfg.feishu.encrypt_key = Some(ENCRYPT_KEY.to_string());
    cfg.scheduler.enabled = false;
    cfg
}

pub fn state_with(doubles: &TestDoubles, tweak: impl FnOnce(&mut AppConfig)) -> AppState {
    let mut cfg = test_config();
    tweak(&mut cfg);
    let (tx, _) = broadcast::channel(1);
    AppState::new(cfg, services(doubles), tx)
}

pub fn sample_task(sha: &str, chat_id: Option<&str>) -> Task {
    Task {
        record_id: "rec_1".into(),
        title: "Add retry to uploader".into(),
        status: Some(TaskStatus::InProgress),
        commit_sha: Some(sha.to_string()),
        assignee_id: Some("ou_dev".into()),
        chat_id: chat_id.map(str::to_string),
        ..Task::default()
    }
}

pub fn ci_headers(event: &str, body: &[u8]) -> WebhookHeaders {
    [
        (ci::HEADER_SIGNATURE_256, ci::sign(ci::Algorithm::Sha256, CI_SECRET, body)),
        ("X-GitHub-Event", event.to_string()),
    ]
    .into_iter()
    .collect()
}

pub fn chat_headers(body: &[u8]) -> WebhookHeaders {
    let (ts, nonce) = ("1700000000", "n0nce");
    [
        (chat::HEADER_TIMESTAMP, ts.to_string()),
        (chat::HEADER_NONCE, nonce.to_string()),
        (
            chat::HEADER_SIGNATURE,
            chat::compute_signature(ts, nonce, ENCRYPT_KEY, body),
        ),
    ]
    .into_iter()
    .collect()
}

/// Polls `cond` until it holds; spawned handlers finish asynchronously.
pub async fn wait_until(cond: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}
