use async_trait::async_trait;

use super::types::{NewTask, Person, Task, TaskStatus, TaskUpdate};

/// Record backend for tasks and people.
#[async_trait]
pub trait TaskStore: Send + Sync {
    fn name(&self) -> &str;
    async fn list_tasks(&self) -> anyhow::Result<Vec<Task>>;
    async fn list_persons(&self) -> anyhow::Result<Vec<Person>>;
    async fn find_task_by_commit(&self, sha: &str) -> anyhow::Result<Option<Task>>;
    async fn find_task_by_chat(&self, chat_id: &str) -> anyhow::Result<Option<Task>>;
    async fn create_task(&self, task: NewTask) -> anyhow::Result<Task>;
    async fn update_task(&self, record_id: &str, update: TaskUpdate) -> anyhow::Result<()>;

    async fn update_status(&self, record_id: &str, status: TaskStatus) -> anyhow::Result<()> {
        self.update_task(record_id, TaskUpdate::status(status)).await
    }
}
