//! Language-model backed reference assistant

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{Assessment, AssessmentRequest, ReferenceAssistant, TextCompletion};
use crate::error::Result;
use crate::media::{Confidence, ResolutionResult, Strategy};

const SYSTEM_PROMPT: &str = "You decide whether a chat request refers to one of the media items \
already in the conversation. Answer with a single JSON object and nothing else: \
{\"isReferencing\": bool, \"mediaNumber\": number or null, \"confidence\": \"high\" | \"medium\" | \"low\", \
\"reasoning\": string, \"intent\": string, \"intentDescription\": string}. \
mediaNumber is the 1-based number of the item in the list.";

/// Structured part of the model's reply
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssistantReply {
    pub is_referencing: bool,
    pub media_number: Option<i64>,
    pub confidence: Option<String>,
    pub reasoning: Option<String>,
    pub intent: Option<String>,
    pub intent_description: Option<String>,
}

/// [`ReferenceAssistant`] that asks a [`TextCompletion`] model
pub struct LlmAssistant<C: TextCompletion> {
    completion: C,
}

impl<C: TextCompletion> LlmAssistant<C> {
    pub fn new(completion: C) -> Self {
        Self { completion }
    }

    /// Numbered candidate listing followed by the request
    pub fn build_prompt(&self, request: &AssessmentRequest) -> String {
        let mut prompt = format!("Media items of kind {} (oldest first):\n", request.kind);
        for (i, item) in request.candidates.iter().enumerate() {
            prompt.push_str(&format!(
                "{}. [{}] {} {}",
                i + 1,
                item.role.as_str(),
                item.timestamp.to_rfc3339(),
                item.url
            ));
            if let Some(caption) = &item.caption {
                prompt.push_str(&format!(" - \"{}\"", caption));
            }
            prompt.push('\n');
        }
        prompt.push_str(&format!("\nRequest: {}", request.message));
        prompt
    }
}

#[async_trait]
impl<C: TextCompletion> ReferenceAssistant for LlmAssistant<C> {
    async fn assess(&self, request: &AssessmentRequest) -> Result<Assessment> {
        let prompt = self.build_prompt(request);
        let raw = self.completion.complete(SYSTEM_PROMPT, &prompt).await?;

        let Some(reply) = parse_reply(&raw) else {
            warn!("Assistant reply had no usable JSON object");
            return Ok(Assessment::Defer);
        };
        Ok(decide(&reply, request))
    }
}

/// Parse the first JSON object embedded in free text
pub fn parse_reply(raw: &str) -> Option<AssistantReply> {
    let object = first_json_object(raw)?;
    serde_json::from_str(object).ok()
}

/// Slice of the first balanced `{...}` in `text`, ignoring braces in strings
pub fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn decide(reply: &AssistantReply, request: &AssessmentRequest) -> Assessment {
    if !reply.is_referencing {
        return Assessment::Defer;
    }
    let item = reply
        .media_number
        .filter(|n| *n >= 1)
        .and_then(|n| request.candidates.get((n - 1) as usize));
    let Some(item) = item else {
        debug!(number = ?reply.media_number, "Assistant picked a number outside the list");
        return Assessment::Defer;
    };

    let confidence = reply
        .confidence
        .as_deref()
        .and_then(Confidence::parse)
        .unwrap_or(Confidence::Medium);
    if confidence == Confidence::Low {
        return Assessment::Defer;
    }

    let mut result = ResolutionResult::from_item(
        item,
        confidence,
        Strategy::Assistant,
        format!(
            "Assistant: {}",
            reply.reasoning.as_deref().unwrap_or("selected by language model")
        ),
    );
    if let Some(intent) = &reply.intent {
        result.insert_metadata("intent", serde_json::json!(intent));
    }
    if let Some(description) = &reply.intent_description {
        result.insert_metadata("intentDescription", serde_json::json!(description));
    }
    Assessment::Confident(result)
}
