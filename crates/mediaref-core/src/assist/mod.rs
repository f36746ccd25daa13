//! Optional language-model assisted resolution
//!
//! - `client` - HTTP completion client (Anthropic or OpenAI wire format)
//! - `llm` - prompt building and reply parsing
//!
//! An assistant either returns a confident result or defers; the
//! deterministic pipeline handles everything it defers on.

mod client;
mod llm;

pub use client::{extract_text, ApiFormat, HttpCompletionClient};
pub use llm::{first_json_object, parse_reply, AssistantReply, LlmAssistant};

use async_trait::async_trait;

use crate::error::Result;
use crate::media::{MediaItem, MediaKind, ResolutionResult};

/// Plain text completion: system prompt + user prompt in, text out
#[async_trait]
pub trait TextCompletion: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

/// What the assistant is asked to decide
#[derive(Debug, Clone)]
pub struct AssessmentRequest {
    pub kind: MediaKind,
    pub message: String,
    /// Kind-filtered candidates, oldest first
    pub candidates: Vec<MediaItem>,
}

/// Assistant verdict
#[derive(Debug, Clone, PartialEq)]
pub enum Assessment {
    Confident(ResolutionResult),
    Defer,
}

/// Strategy that may consult an external model
#[async_trait]
pub trait ReferenceAssistant: Send + Sync {
    async fn assess(&self, request: &AssessmentRequest) -> Result<Assessment>;
}
