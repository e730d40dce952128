use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};

use taskbot_core::chat::ChatClient;

use super::client::FeishuClient;
use crate::http::HttpError;

const MESSAGES_PATH: &str = "im/v1/messages";
const CHATS_PATH: &str = "im/v1/chats";

pub struct FeishuChat {
    client: Arc<FeishuClient>,
}

impl FeishuChat {
    pub fn new(client: Arc<FeishuClient>) -> Self {
        Self { client }
    }

    async fn create_message(&self, chat_id: &str, msg_type: &str, content: String) -> anyhow::Result<String> {
        let body = json!({
            "receive_id": chat_id,
            "msg_type": msg_type,
            "content": content,
        });
        let data = self
            .client
            .call(
                Method::POST,
                MESSAGES_PATH,
                &[("receive_id_type", "chat_id".to_string())],
                Some(&body),
            )
            .await?;
        let message_id = string_at(&data, "message_id", &self.client.url(MESSAGES_PATH))?;
        tracing::info!(target: "taskbot.feishu", chat_id, msg_type, message_id = %message_id, "message sent");
        Ok(message_id)
    }
}

fn string_at(data: &Value, key: &str, url: &str) -> anyhow::Result<String> {
    data.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| HttpError::shape_error(url.to_string(), &format!("{key} missing")).into())
}

#[async_trait]
impl ChatClient for FeishuChat {
    fn name(&self) -> &str {
        "feishu"
    }

    async fn send_text(&self, chat_id: &str, text: &str) -> anyhow::Result<String> {
        self.create_message(chat_id, "text", json!({ "text": text }).to_string())
            .await
    }

    async fn send_card(&self, chat_id: &str, card: &Value) -> anyhow::Result<String> {
        self.create_message(chat_id, "interactive", card.to_string())
            .await
    }

    async fn update_card(&self, message_id: &str, card: &Value) -> anyhow::Result<()> {
        let path = format!("{MESSAGES_PATH}/{message_id}");
        self.client
            .call(
                Method::PATCH,
                &path,
                &[],
                Some(&json!({ "content": card.to_string() })),
            )
            .await?;
        tracing::info!(target: "taskbot.feishu", message_id, "card updated");
        Ok(())
    }

    async fn create_chat(
        &self,
        name: &str,
        description: &str,
        user_ids: &[String],
    ) -> anyhow::Result<String> {
        let body = json!({
            "name": name,
            "description": description,
            "user_id_list": user_ids,
        });
        let data = self
            .client
            .call(Method::POST, CHATS_PATH, &[], Some(&body))
            .await?;
        let chat_id = string_at(&data, "chat_id", &self.client.url(CHATS_PATH))?;
        tracing::info!(target: "taskbot.feishu", chat_id = %chat_id, members = user_ids.len(), "group created");
        Ok(chat_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feishu::client::tests::{config, mock_token};
    use mockito::{Matcher, Server};

    #[tokio::test]
    async fn test_send_text_wraps_content() {
        let mut server = Server::new_async().await;
        let _token = mock_token(&mut server, 1).await;
        let m = server
            .mock("POST", "/im/v1/messages")
            .match_query(Matcher::UrlEncoded("receive_id_type".into(), "chat_id".into()))
            .match_header("authorization", "Bearer t-abc")
            .match_body(Matcher::Json(json!({
                "receive_id": "oc_1",
                "msg_type": "text",
                "content": "{\"text\":\"hello\"}"
            })))
            .with_status(200)
            .with_body(r#"{"code":0,"data":{"message_id":"om_1"}}"#)
            .create_async()
            .await;

        let chat = FeishuChat::new(Arc::new(FeishuClient::new(&config(server.url())).unwrap()));
        assert_eq!(chat.send_text("oc_1", "hello").await.unwrap(), "om_1");
        m.assert_async().await;
    }

    #[tokio::test]
    async fn test_send_card_is_interactive() {
        let mut server = Server::new_async().await;
        let _token = mock_token(&mut server, 1).await;
        let _m = server
            .mock("POST", "/im/v1/messages")
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(json!({"msg_type": "interactive"})))
            .with_status(200)
            .with_body(r#"{"code":0,"data":{"message_id":"om_card"}}"#)
            .create_async()
            .await;

        let chat = FeishuChat::new(Arc::new(FeishuClient::new(&config(server.url())).unwrap()));
        let id = chat.send_card("oc_1", &json!({"elements": []})).await.unwrap();
        assert_eq!(id, "om_card");
    }

    #[tokio::test]
    async fn test_update_card_patches_message() {
        let mut server = Server::new_async().await;
        let _token = mock_token(&mut server, 1).await;
        let m = server
            .mock("PATCH", "/im/v1/messages/om_9")
            .match_body(Matcher::Json(json!({"content": "{\"a\":1}"})))
            .with_status(200)
            .with_body(r#"{"code":0,"msg":"success"}"#)
            .create_async()
            .await;

        let chat = FeishuChat::new(Arc::new(FeishuClient::new(&config(server.url())).unwrap()));
        chat.update_card("om_9", &json!({"a": 1})).await.unwrap();
        m.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_chat_returns_id() {
        let mut server = Server::new_async().await;
        let _token = mock_token(&mut server, 1).await;
        let _m = server
            .mock("POST", "/im/v1/chats")
            .match_body(Matcher::PartialJson(json!({"user_id_list": ["ou_1"]})))
            .with_status(200)
            .with_body(r#"{"code":0,"data":{"chat_id":"oc_new"}}"#)
            .create_async()
            .await;

        let chat = FeishuChat::new(Arc::new(FeishuClient::new(&config(server.url())).unwrap()));
        let id = chat
            .create_chat("任务: t", "desc", &["ou_1".to_string()])
            .await
            .unwrap();
        assert_eq!(id, "oc_new");
    }

    #[tokio::test]
    async fn test_missing_message_id_is_error() {
        let mut server = Server::new_async().await;
        let _token = mock_token(&mut server, 1).await;
        let _m = server
            .mock("POST", "/im/v1/messages")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"code":0,"data":{}}"#)
            .create_async()
            .await;

        let chat = FeishuChat::new(Arc::new(FeishuClient::new(&config(server.url())).unwrap()));
        assert!(chat.send_text("oc_1", "x").await.is_err());
    }
}
