//! Media data model

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of media a request can refer to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Document,
}

impl MediaKind {
    pub const ALL: [MediaKind; 4] = [Self::Image, Self::Video, Self::Audio, Self::Document];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Document => "document",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image" | "img" | "photo" => Some(Self::Image),
            "video" => Some(Self::Video),
            "audio" | "sound" => Some(Self::Audio),
            "document" | "doc" | "file" => Some(Self::Document),
            _ => None,
        }
    }

    /// Map a MIME content type onto a media kind
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let ct = content_type.trim().to_ascii_lowercase();
        let essence = ct.split(';').next().unwrap_or("").trim();
        if essence.starts_with("image/") {
            Some(Self::Image)
        } else if essence.starts_with("video/") {
            Some(Self::Video)
        } else if essence.starts_with("audio/") {
            Some(Self::Audio)
        } else if essence.starts_with("text/")
            || essence == "application/pdf"
            || essence == "application/msword"
            || essence == "application/rtf"
            || essence.starts_with("application/vnd.openxmlformats-officedocument")
            || essence.starts_with("application/vnd.oasis.opendocument")
        {
            Some(Self::Document)
        } else {
            None
        }
    }

    /// Whether a content type belongs to this kind
    pub fn matches_content_type(&self, content_type: &str) -> bool {
        Self::from_content_type(content_type) == Some(*self)
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who put the item into the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorRole {
    User,
    Assistant,
}

impl AuthorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A media reference known to the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub url: String,
    #[serde(default)]
    pub id: Option<String>,
    pub role: AuthorRole,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub caption: Option<String>,
    /// Position of the item in the conversation (0-based)
    #[serde(default)]
    pub position: usize,
    pub kind: MediaKind,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl MediaItem {
    pub fn new(
        url: impl Into<String>,
        kind: MediaKind,
        role: AuthorRole,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            url: url.into(),
            id: None,
            role,
            timestamp,
            caption: None,
            position: 0,
            kind,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    pub fn with_position(mut self, position: usize) -> Self {
        self.position = position;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Identity of the item: its id, or the url when no id is known
    pub fn key(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.url)
    }
}

/// An attachment on a chat message, as delivered by the chat layer.
///
/// Every field is optional because upstream payloads are not trusted;
/// attachments without a url or content type are skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

impl Attachment {
    pub fn new(url: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            content_type: Some(content_type.into()),
            name: None,
            id: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Url and kind, or None for a malformed attachment
    pub fn usable(&self) -> Option<(&str, MediaKind)> {
        let url = self.url.as_deref().filter(|u| !u.trim().is_empty())?;
        let kind = MediaKind::from_content_type(self.content_type.as_deref()?)?;
        Some((url, kind))
    }

    /// Stable descriptor used when hashing requests
    pub fn descriptor(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.content_type.as_deref().unwrap_or(""),
            self.url.as_deref().unwrap_or(""),
            self.name.as_deref().unwrap_or(""),
            self.id.as_deref().unwrap_or("")
        )
    }
}

/// One message of chat history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub role: AuthorRole,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// Three-tier certainty tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }

    /// Map a numeric score onto a tier
    pub fn from_score(score: f32) -> Self {
        if score >= 0.7 {
            Self::High
        } else if score >= 0.4 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which step of the pipeline produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    DirectAttachment,
    NoCandidates,
    Pattern,
    Semantic,
    Temporal,
    Heuristic,
    Default,
    Assistant,
    Preference,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DirectAttachment => "direct_attachment",
            Self::NoCandidates => "no_candidates",
            Self::Pattern => "pattern",
            Self::Semantic => "semantic",
            Self::Temporal => "temporal",
            Self::Heuristic => "heuristic",
            Self::Default => "default",
            Self::Assistant => "assistant",
            Self::Preference => "preference",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionResult {
    pub source_url: Option<String>,
    pub source_id: Option<String>,
    pub confidence: Confidence,
    pub reasoning: String,
    pub strategy: Strategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, Value>>,
}

impl ResolutionResult {
    /// Result pointing at a known media item
    pub fn from_item(
        item: &MediaItem,
        confidence: Confidence,
        strategy: Strategy,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            source_url: Some(item.url.clone()),
            source_id: item.id.clone(),
            confidence,
            reasoning: reasoning.into(),
            strategy,
            metadata: None,
        }
    }

    /// Result without a source
    pub fn empty(strategy: Strategy, reasoning: impl Into<String>) -> Self {
        Self {
            source_url: None,
            source_id: None,
            confidence: Confidence::Low,
            reasoning: reasoning.into(),
            strategy,
            metadata: None,
        }
    }

    pub fn has_source(&self) -> bool {
        self.source_url.is_some()
    }

    /// Insert a metadata entry, creating the bag on first use
    pub fn insert_metadata(&mut self, key: impl Into<String>, value: Value) {
        self.metadata
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value);
    }

    /// Whether this result points at the given item
    pub fn refers_to(&self, item: &MediaItem) -> bool {
        match (&self.source_id, &item.id) {
            (Some(a), Some(b)) => a == b,
            _ => self.source_url.as_deref() == Some(item.url.as_str()),
        }
    }
}
