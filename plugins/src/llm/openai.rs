//! OpenAI 兼容的 chat/completions 接口（OpenAI、DeepSeek）

use async_trait::async_trait;
use serde_json::{json, Value};

use taskbot_core::config::LlmProviderConfig;
use taskbot_core::matching::{ChatMessage, LlmProvider};

use crate::http::{build_client, parse_json_response, HttpError};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com/v1";

pub struct OpenAiCompatProvider {
    name: String,
    model: String,
    api_key: String,
    http: reqwest::Client,
    url_chat: String,
}

impl OpenAiCompatProvider {
    pub fn new(name: &str, cfg: &LlmProviderConfig, default_base: &str) -> anyhow::Result<Self> {
        let base = cfg
            .base_url
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(default_base)
            .trim_end_matches('/');
        Ok(Self {
            name: name.to_string(),
            model: cfg.model.clone(),
            api_key: cfg.api_key.clone().unwrap_or_default(),
            http: build_client(cfg.timeout_ms)?,
            url_chat: format!("{}/chat/completions", base),
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(&self, messages: &[ChatMessage], temperature: f32) -> anyhow::Result<String> {
        let url = &self.url_chat;
        tracing::debug!(
            target: "taskbot.llm",
            stage = "llm.chat.in",
            provider = %self.name,
            model = %self.model,
            messages = messages.len()
        );
        let body = json!({
            "model": self.model,
            "temperature": temperature,
            "messages": messages,
        });
        let resp = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| HttpError::from_reqwest(err, url.clone()))?;
        let value = parse_json_response(resp).await?;

        let content = value
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| HttpError::shape_error(url.clone(), "choices[0].message.content missing"))?;
        tracing::debug!(
            target: "taskbot.llm",
            stage = "llm.chat.out",
            provider = %self.name,
            reply_len = content.len()
        );
        Ok(content.to_string())
    }
}
