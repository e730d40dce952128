//! In-memory doubles for [`TaskStore`], [`ChatClient`] and [`LlmProvider`].

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::chat::ChatClient;
use crate::matching::{ChatMessage, LlmProvider};
use crate::task::{NewTask, Person, Task, TaskStore, TaskUpdate};

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match m.lock() {
        Ok(g) => g,
        Err(p) => p.into_inner(),
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tasks: Mutex<Vec<Task>>,
    persons: Mutex<Vec<Person>>,
    updates: Mutex<Vec<(String, TaskUpdate)>>,
    lookups: AtomicUsize,
    fail_lookups: Mutex<bool>,
    fail_updates: Mutex<bool>,
}

impl MemoryStore {
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let store = Self::default();
        *lock(&store.tasks) = tasks;
        store
    }

    pub fn with_persons(self, persons: Vec<Person>) -> Self {
        *lock(&self.persons) = persons;
        self
    }

    pub fn fail_lookups(&self) {
        *lock(&self.fail_lookups) = true;
    }

    pub fn fail_updates(&self) {
        *lock(&self.fail_updates) = true;
    }

    pub fn task(&self, record_id: &str) -> Option<Task> {
        lock(&self.tasks)
            .iter()
            .find(|t| t.record_id == record_id)
            .cloned()
    }

    pub fn tasks(&self) -> Vec<Task> {
        lock(&self.tasks).clone()
    }

    pub fn updates(&self) -> Vec<(String, TaskUpdate)> {
        lock(&self.updates).clone()
    }

    /// Number of find-by-commit / find-by-chat calls.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    fn find(&self, pred: impl Fn(&Task) -> bool) -> anyhow::Result<Option<Task>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if *lock(&self.fail_lookups) {
            anyhow::bail!("lookup failed");
        }
        Ok(lock(&self.tasks).iter().find(|t| pred(t)).cloned())
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list_tasks(&self) -> anyhow::Result<Vec<Task>> {
        Ok(self.tasks())
    }

    async fn list_persons(&self) -> anyhow::Result<Vec<Person>> {
        Ok(lock(&self.persons).clone())
    }

    async fn find_task_by_commit(&self, sha: &str) -> anyhow::Result<Option<Task>> {
        self.find(|t| t.commit_sha.as_deref() == Some(sha))
    }

    async fn find_task_by_chat(&self, chat_id: &str) -> anyhow::Result<Option<Task>> {
        self.find(|t| t.chat_id.as_deref() == Some(chat_id))
    }

    async fn create_task(&self, new: NewTask) -> anyhow::Result<Task> {
        let mut tasks = lock(&self.tasks);
        let task = Task::from_fields(
            format!("rec_{}", tasks.len() + 1),
            &new.to_fields(chrono::Utc::now().timestamp_millis()),
        );
        tasks.push(task.clone());
        Ok(task)
    }

    async fn update_task(&self, record_id: &str, update: TaskUpdate) -> anyhow::Result<()> {
        if *lock(&self.fail_updates) {
            anyhow::bail!("update failed");
        }
        let mut tasks = lock(&self.tasks);
        let task = tasks
            .iter_mut()
            .find(|t| t.record_id == record_id)
            .ok_or_else(|| anyhow::anyhow!("record {record_id} not found"))?;
        if let Some(v) = update.status {
            task.status = Some(v);
        }
        if let Some(v) = update.ci_state {
            task.ci_state = Some(v);
        }
        if let Some(v) = &update.commit_sha {
            task.commit_sha = Some(v.clone());
        }
        if let Some(v) = &update.assignee_id {
            task.assignee_id = Some(v.clone());
        }
        if let Some(v) = &update.chat_id {
            task.chat_id = Some(v.clone());
        }
        if let Some(v) = update.score {
            task.score = Some(v);
        }
        if let Some(v) = &update.submission_url {
            task.submission_url = Some(v.clone());
        }
        if let Some(v) = update.assigned_at {
            task.assigned_at = Some(v);
        }
        if let Some(v) = update.done_at {
            task.done_at = Some(v);
        }
        drop(tasks);
        lock(&self.updates).push((record_id.to_string(), update));
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryChat {
    texts: Mutex<Vec<(String, String)>>,
    cards: Mutex<Vec<(String, Value)>>,
    chats: Mutex<Vec<(String, Vec<String>)>>,
    failing: Mutex<HashSet<String>>,
}

impl MemoryChat {
    /// Sends to `chat_id` will error.
    pub fn fail_for(&self, chat_id: &str) {
        lock(&self.failing).insert(chat_id.to_string());
    }

    pub fn texts(&self) -> Vec<(String, String)> {
        lock(&self.texts).clone()
    }

    pub fn cards(&self) -> Vec<(String, Value)> {
        lock(&self.cards).clone()
    }

    pub fn created_chats(&self) -> Vec<(String, Vec<String>)> {
        lock(&self.chats).clone()
    }

    fn check(&self, chat_id: &str) -> anyhow::Result<()> {
        if lock(&self.failing).contains(chat_id) {
            anyhow::bail!("send to {chat_id} failed");
        }
        Ok(())
    }
}

#[async_trait]
impl ChatClient for MemoryChat {
    fn name(&self) -> &str {
        "memory"
    }

    async fn send_text(&self, chat_id: &str, text: &str) -> anyhow::Result<String> {
        self.check(chat_id)?;
        let mut texts = lock(&self.texts);
        texts.push((chat_id.to_string(), text.to_string()));
        Ok(format!("om_{}", texts.len()))
    }

    async fn send_card(&self, chat_id: &str, card: &Value) -> anyhow::Result<String> {
        self.check(chat_id)?;
        let mut cards = lock(&self.cards);
        cards.push((chat_id.to_string(), card.clone()));
        Ok(format!("om_card_{}", cards.len()))
    }

    async fn update_card(&self, message_id: &str, card: &Value) -> anyhow::Result<()> {
        lock(&self.cards).push((message_id.to_string(), card.clone()));
        Ok(())
    }

    async fn create_chat(
        &self,
        name: &str,
        _description: &str,
        user_ids: &[String],
    ) -> anyhow::Result<String> {
        let mut chats = lock(&self.chats);
        chats.push((name.to_string(), user_ids.to_vec()));
        Ok(format!("oc_new_{}", chats.len()))
    }
}

/// Replies with queued responses in order; errors once the queue is empty.
#[derive(Default)]
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedLlm {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            prompts: Mutex::default(),
        }
    }

    pub fn prompts(&self) -> Vec<Vec<ChatMessage>> {
        lock(&self.prompts).clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat(&self, messages: &[ChatMessage], _temperature: f32) -> anyhow::Result<String> {
        lock(&self.prompts).push(messages.to_vec());
        lock(&self.replies)
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("no scripted reply left"))
    }
}
