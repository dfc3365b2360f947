use async_trait::async_trait;
use crate::application::errors::BotError;

/// Bot trait - abstraction for messaging platform adapters
#[async_trait]
pub trait Bot: Send + Sync {
    /// Send a text message to a chat, returning the transport message id
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<String, BotError>;

    /// Send a file to a chat as a document attachment
    async fn send_document(
        &self,
        chat_id: &str,
        filename: &str,
        data: Vec<u8>,
    ) -> Result<String, BotError>;

    /// Get bot info
    fn bot_info(&self) -> BotInfo;
}

/// Bot information
#[derive(Debug, Clone)]
pub struct BotInfo {
    pub id: String,
    pub name: String,
    pub username: String,
}
