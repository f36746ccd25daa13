//! Chat history ingestion

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::{ResolveError, Result};
use crate::media::{AuthorRole, ChatMessage, MediaItem};

/// Source of chat history, owned by the embedding application
#[async_trait]
pub trait ChatHistoryReader: Send + Sync {
    /// Messages of a chat, oldest first
    async fn fetch(&self, chat_id: &str) -> Result<Vec<ChatMessage>>;
}

/// In-memory history, keyed by chat id
#[derive(Debug, Clone, Default)]
pub struct StaticHistory {
    chats: HashMap<String, Vec<ChatMessage>>,
}

impl StaticHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chat(mut self, chat_id: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        self.chats.insert(chat_id.into(), messages);
        self
    }
}

#[async_trait]
impl ChatHistoryReader for StaticHistory {
    async fn fetch(&self, chat_id: &str) -> Result<Vec<ChatMessage>> {
        self.chats
            .get(chat_id)
            .cloned()
            .ok_or_else(|| ResolveError::history(format!("unknown chat '{}'", chat_id)))
    }
}

/// Turn chat messages into media items.
///
/// Malformed attachments are skipped. Each item is captioned with its
/// message text; assistant messages without text borrow the preceding user
/// message (the prompt that produced them).
pub fn collect_media_items(messages: &[ChatMessage]) -> Vec<MediaItem> {
    let mut items = Vec::new();
    let mut last_user_text: Option<&str> = None;
    let mut skipped = 0usize;

    for message in messages {
        let text = message
            .text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());

        let caption = match (message.role, text) {
            (_, Some(text)) => Some(text),
            (AuthorRole::Assistant, None) => last_user_text,
            (AuthorRole::User, None) => None,
        };

        for attachment in &message.attachments {
            let Some((url, kind)) = attachment.usable() else {
                skipped += 1;
                continue;
            };
            let mut item = MediaItem::new(url, kind, message.role, message.timestamp)
                .with_position(items.len());
            item.id = attachment.id.clone();
            item.caption = caption.map(str::to_string);
            if let Some(name) = &attachment.name {
                item.metadata
                    .insert("name".to_string(), Value::String(name.clone()));
            }
            items.push(item);
        }

        if message.role == AuthorRole::User && text.is_some() {
            last_user_text = text;
        }
    }

    if skipped > 0 {
        debug!(skipped, "Skipped malformed attachments");
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{Attachment, MediaKind};
    use chrono::{Duration, TimeZone, Utc};

    fn message(
        role: AuthorRole,
        minutes: i64,
        text: Option<&str>,
        attachments: Vec<Attachment>,
    ) -> ChatMessage {
        ChatMessage {
            role,
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
                + Duration::minutes(minutes),
            text: text.map(str::to_string),
            attachments,
        }
    }

    #[test]
    fn test_collect_assigns_positions_and_captions() {
        let messages = vec![
            message(
                AuthorRole::User,
                0,
                Some("draw a cat on a sofa"),
                vec![Attachment::new("https://cdn/ref.png", "image/png").with_name("ref.png")],
            ),
            message(
                AuthorRole::Assistant,
                1,
                None,
                vec![
                    Attachment::new("https://cdn/cat.png", "image/png").with_id("gen-1"),
                    Attachment {
                        url: Some("https://cdn/broken".to_string()),
                        ..Default::default()
                    },
                    Attachment::new("https://cdn/cat.mp4", "video/mp4"),
                ],
            ),
        ];

        let items = collect_media_items(&messages);
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].metadata["name"], "ref.png");
        assert_eq!(items[1].id.as_deref(), Some("gen-1"));
        assert_eq!(items[1].role, AuthorRole::Assistant);
        assert_eq!(items[1].caption.as_deref(), Some("draw a cat on a sofa"));
        assert_eq!(items[2].kind, MediaKind::Video);
        assert_eq!(
            items.iter().map(|i| i.position).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn test_own_text_beats_previous_prompt() {
        let messages = vec![
            message(AuthorRole::User, 0, Some("make a sunset"), vec![]),
            message(
                AuthorRole::Assistant,
                1,
                Some("Here is a beach at dusk"),
                vec![Attachment::new("https://cdn/a.png", "image/png")],
            ),
            message(
                AuthorRole::User,
                2,
                None,
                vec![Attachment::new("https://cdn/b.png", "image/png")],
            ),
        ];
        let items = collect_media_items(&messages);
        assert_eq!(items[0].caption.as_deref(), Some("Here is a beach at dusk"));
        assert_eq!(items[1].caption, None);
    }

    #[tokio::test]
    async fn test_static_history_unknown_chat_is_error() {
        let history = StaticHistory::new().with_chat("c1", vec![]);
        assert!(history.fetch("c1").await.unwrap().is_empty());
        assert!(matches!(
            history.fetch("nope").await,
            Err(ResolveError::History(_))
        ));
    }
}
