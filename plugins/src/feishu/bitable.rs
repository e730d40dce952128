//! 多维表任务存储：分页列表、按字段过滤、新建与批量更新

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Map, Value};

use taskbot_core::config::BitableConfig;
use taskbot_core::task::{fields, NewTask, Person, Task, TaskStore, TaskUpdate};

use super::client::FeishuClient;
use crate::http::HttpError;

const PAGE_SIZE: u32 = 100;

/// A raw record: id plus its field map.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub record_id: String,
    pub fields: Map<String, Value>,
}

pub struct BitableStore {
    client: Arc<FeishuClient>,
    app_token: String,
    task_table_id: String,
    person_table_id: String,
}

impl BitableStore {
    pub fn new(client: Arc<FeishuClient>, cfg: &BitableConfig) -> Self {
        Self {
            client,
            app_token: cfg.app_token.clone(),
            task_table_id: cfg.task_table_id.clone(),
            person_table_id: cfg.person_table_id.clone(),
        }
    }

    fn records_path(&self, table_id: &str) -> String {
        format!("bitable/v1/apps/{}/tables/{}/records", self.app_token, table_id)
    }

    /// Every record of a table, following `page_token` until `has_more` is false.
    pub async fn list_records(
        &self,
        table_id: &str,
        filter: Option<&str>,
    ) -> anyhow::Result<Vec<Record>> {
        let path = self.records_path(table_id);
        let mut records = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![("page_size", PAGE_SIZE.to_string())];
            if let Some(token) = &page_token {
                query.push(("page_token", token.clone()));
            }
            if let Some(filter) = filter {
                query.push(("filter", filter.to_string()));
            }

            let data = self.client.call(Method::GET, &path, &query, None).await?;
            if let Some(items) = data.get("items").and_then(Value::as_array) {
                records.extend(items.iter().filter_map(parse_record));
            }

            let has_more = data.get("has_more").and_then(Value::as_bool).unwrap_or(false);
            page_token = data
                .get("page_token")
                .and_then(Value::as_str)
                .filter(|t| !t.is_empty())
                .map(str::to_string);
            if !has_more || page_token.is_none() {
                break;
            }
        }

        tracing::debug!(
            target: "taskbot.feishu",
            stage = "bitable.list.out",
            table_id,
            filtered = filter.is_some(),
            records = records.len()
        );
        Ok(records)
    }

    pub async fn create_record(
        &self,
        table_id: &str,
        fields: Map<String, Value>,
    ) -> anyhow::Result<Record> {
        let path = self.records_path(table_id);
        let data = self
            .client
            .call(Method::POST, &path, &[], Some(&json!({ "fields": fields })))
            .await?;
        let record = data
            .get("record")
            .and_then(parse_record)
            .ok_or_else(|| HttpError::shape_error(self.client.url(&path), "record missing"))?;
        tracing::info!(target: "taskbot.feishu", table_id, record_id = %record.record_id, "record created");
        Ok(record)
    }

    pub async fn update_record(
        &self,
        table_id: &str,
        record_id: &str,
        fields: Map<String, Value>,
    ) -> anyhow::Result<()> {
        let path = format!("{}/batch_update", self.records_path(table_id));
        let body = json!({ "records": [{ "record_id": record_id, "fields": fields }] });
        self.client
            .call(Method::POST, &path, &[], Some(&body))
            .await?;
        tracing::info!(target: "taskbot.feishu", table_id, record_id, "record updated");
        Ok(())
    }

    async fn find_task_by(&self, field: &str, value: &str) -> anyhow::Result<Option<Task>> {
        let filter = field_equals(field, value);
        let records = self.list_records(&self.task_table_id, Some(&filter)).await?;
        Ok(records
            .into_iter()
            .next()
            .map(|r| Task::from_fields(r.record_id, &r.fields)))
    }
}

fn parse_record(item: &Value) -> Option<Record> {
    let record_id = item.get("record_id").and_then(Value::as_str)?.to_string();
    let fields = item
        .get("fields")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    Some(Record { record_id, fields })
}

/// `CurrentValue.[field]="value"` with embedded quotes escaped.
pub fn field_equals(field: &str, value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("CurrentValue.[{field}]=\"{escaped}\"")
}

#[async_trait]
impl TaskStore for BitableStore {
    fn name(&self) -> &str {
        "bitable"
    }

    async fn list_tasks(&self) -> anyhow::Result<Vec<Task>> {
        let records = self.list_records(&self.task_table_id, None).await?;
        Ok(records
            .into_iter()
            .map(|r| Task::from_fields(r.record_id, &r.fields))
            .collect())
    }

    async fn list_persons(&self) -> anyhow::Result<Vec<Person>> {
        let records = self.list_records(&self.person_table_id, None).await?;
        Ok(records
            .into_iter()
            .map(|r| Person::from_fields(r.record_id, &r.fields))
            .collect())
    }

    async fn find_task_by_commit(&self, sha: &str) -> anyhow::Result<Option<Task>> {
        self.find_task_by(fields::COMMIT_SHA, sha).await
    }

    async fn find_task_by_chat(&self, chat_id: &str) -> anyhow::Result<Option<Task>> {
        self.find_task_by(fields::CHAT_ID, chat_id).await
    }

    async fn create_task(&self, task: NewTask) -> anyhow::Result<Task> {
        let now = chrono::Utc::now().timestamp_millis();
        let record = self
            .create_record(&self.task_table_id, task.to_fields(now))
            .await?;
        Ok(Task::from_fields(record.record_id, &record.fields))
    }

    async fn update_task(&self, record_id: &str, update: TaskUpdate) -> anyhow::Result<()> {
        if update.is_empty() {
            return Ok(());
        }
        self.update_record(&self.task_table_id, record_id, update.to_fields())
            .await
    }
}
