use async_trait::async_trait;
use serde_json::{json, Value};

use taskbot_core::config::LlmProviderConfig;
use taskbot_core::matching::{ChatMessage, LlmProvider};

use crate::http::{build_client, parse_json_response, HttpError};

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiProvider {
    model: String,
    http: reqwest::Client,
    url_generate: String,
}

impl GeminiProvider {
    pub fn new(cfg: &LlmProviderConfig) -> anyhow::Result<Self> {
        let base = cfg
            .base_url
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(GEMINI_BASE_URL)
            .trim_end_matches('/');
        Ok(Self {
            model: cfg.model.clone(),
            http: build_client(cfg.timeout_ms)?,
            url_generate: format!(
                "{}/models/{}:generateContent?key={}",
                base,
                cfg.model,
                cfg.api_key.as_deref().unwrap_or_default()
            ),
        })
    }
}

/// System messages go to `systemInstruction`; `assistant` becomes `model`.
fn request_body(messages: &[ChatMessage], temperature: f32) -> Value {
    let system: Vec<Value> = messages
        .iter()
        .filter(|m| m.role == "system")
        .map(|m| json!({ "text": m.content }))
        .collect();
    let contents: Vec<Value> = messages
        .iter()
        .filter(|m| m.role != "system")
        .map(|m| {
            let role = if m.role == "assistant" { "model" } else { "user" };
            json!({ "role": role, "parts": [{ "text": m.content }] })
        })
        .collect();

    let mut body = json!({
        "contents": contents,
        "generationConfig": { "temperature": temperature },
    });
    if !system.is_empty() {
        body["systemInstruction"] = json!({ "parts": system });
    }
    body
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn chat(&self, messages: &[ChatMessage], temperature: f32) -> anyhow::Result<String> {
        let url = &self.url_generate;
        tracing::debug!(
            target: "taskbot.llm",
            stage = "llm.chat.in",
            provider = "gemini",
            model = %self.model,
            messages = messages.len()
        );
        let resp = self
            .http
            .post(url)
            .json(&request_body(messages, temperature))
            .send()
            .await
            .map_err(|err| HttpError::from_reqwest(err, url.clone()))?;
        let value = parse_json_response(resp).await?;

        let text = value
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
            .ok_or_else(|| HttpError::shape_error(url.clone(), "candidates[0] text missing"))?;
        tracing::debug!(target: "taskbot.llm", stage = "llm.chat.out", provider = "gemini", reply_len = text.len());
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_request_body_roles() {
        let body = request_body(
            &[
                ChatMessage::system("sys"),
                ChatMessage::user("q"),
                ChatMessage::assistant("a"),
            ],
            0.1,
        );
        assert_eq!(body["systemInstruction"], json!({"parts": [{"text": "sys"}]}));
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["contents"].as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn test_generate_content() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/models/gemini-pro:generateContent")
            .match_query(Matcher::UrlEncoded("key".into(), "g-key".into()))
            .with_status(200)
            .with_body(r#"{"candidates":[{"content":{"parts":[{"text":"{\"score\":88}"}]}}]}"#)
            .create_async()
            .await;

        let provider = GeminiProvider::new(&LlmProviderConfig {
            api_key: Some("g-key".into()),
            model: "gemini-pro".into(),
            base_url: Some(server.url()),
            timeout_ms: 1_000,
        })
        .unwrap();
        let reply = provider.generate("p", None, 0.1).await.unwrap();
        assert_eq!(reply, "{\"score\":88}");
        m.assert_async().await;
    }
}
