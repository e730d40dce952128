use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSON_INSTRUCTION: &str = "请返回有效的JSON格式数据。";
pub const JSON_TEMPERATURE: f32 = 0.1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Chat-completion style model backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn chat(&self, messages: &[ChatMessage], temperature: f32) -> anyhow::Result<String>;

    async fn generate(
        &self,
        prompt: &str,
        system: Option<&str>,
        temperature: f32,
    ) -> anyhow::Result<String> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system.filter(|s| !s.is_empty()) {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(prompt));
        self.chat(&messages, temperature).await
    }
}

/// Ask for JSON and decode the reply, tolerating a fenced code block.
pub async fn parse_json(
    provider: &dyn LlmProvider,
    prompt: &str,
    system: Option<&str>,
) -> anyhow::Result<Value> {
    let system = match system {
        Some(s) if !s.is_empty() => format!("{s}\n{JSON_INSTRUCTION}"),
        _ => JSON_INSTRUCTION.to_string(),
    };
    let reply = provider
        .generate(prompt, Some(&system), JSON_TEMPERATURE)
        .await?;
    let body = strip_json_fence(&reply);
    serde_json::from_str(body).map_err(|e| {
        tracing::error!(
            target: "taskbot.llm",
            provider = provider.name(),
            error = %e,
            reply = %body,
            "model reply is not valid JSON"
        );
        anyhow::anyhow!("invalid JSON from {}: {e}", provider.name())
    })
}

/// Strip a leading ```json / ``` fence and anything after the closing fence.
pub fn strip_json_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let inner = if let Some(rest) = trimmed.strip_prefix("```json") {
        rest
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        rest
    } else {
        return trimmed;
    };
    inner.split("```").next().unwrap_or(inner).trim()
}
