//! Chat history stored as a JSON file

use std::path::PathBuf;

use async_trait::async_trait;
use mediaref_core::{ChatHistoryReader, ChatMessage, Result};
use tracing::debug;

/// Reads a JSON array of chat messages. The chat id is ignored: one file
/// holds one conversation.
pub struct JsonHistoryFile {
    path: PathBuf,
}

impl JsonHistoryFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ChatHistoryReader for JsonHistoryFile {
    async fn fetch(&self, chat_id: &str) -> Result<Vec<ChatMessage>> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        let messages: Vec<ChatMessage> = serde_json::from_str(&raw)?;
        debug!(chat_id, messages = messages.len(), "Loaded history from {:?}", self.path);
        Ok(messages)
    }
}
