use async_trait::async_trait;
use serde_json::Value;

/// Outbound chat platform. Ids are the platform's opaque strings.
#[async_trait]
pub trait ChatClient: Send + Sync {
    fn name(&self) -> &str;
    /// Post a plain-text message to a group; returns the message id.
    async fn send_text(&self, chat_id: &str, text: &str) -> anyhow::Result<String>;
    /// Post an interactive card to a group; returns the message id.
    async fn send_card(&self, chat_id: &str, card: &Value) -> anyhow::Result<String>;
    async fn update_card(&self, message_id: &str, card: &Value) -> anyhow::Result<()>;
    /// Create a group containing `user_ids`; returns the new chat id.
    async fn create_chat(
        &self,
        name: &str,
        description: &str,
        user_ids: &[String],
    ) -> anyhow::Result<String>;
}

/// `<at>` mention markup understood by the chat platform.
pub fn mention(user_id: &str) -> String {
    format!("<at user_id=\"{user_id}\"></at>")
}
