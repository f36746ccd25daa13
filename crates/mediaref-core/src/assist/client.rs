//! HTTP text completion client
//!
//! Non-streaming calls in either the Anthropic messages format or the OpenAI
//! chat completions format.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::TextCompletion;
use crate::config::AssistantConfig;
use crate::error::{ResolveError, Result};

const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";
const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Wire format of the completion endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiFormat {
    #[default]
    Anthropic,
    #[serde(rename = "openai")]
    OpenAi,
}

impl ApiFormat {
    pub fn default_url(&self) -> &'static str {
        match self {
            Self::Anthropic => ANTHROPIC_URL,
            Self::OpenAi => OPENAI_URL,
        }
    }
}

/// reqwest-backed [`TextCompletion`]
#[derive(Debug, Clone)]
pub struct HttpCompletionClient {
    http: reqwest::Client,
    format: ApiFormat,
    url: String,
    api_key: String,
    model: String,
    max_tokens: usize,
}

impl HttpCompletionClient {
    pub fn new(format: ApiFormat, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            format,
            url: format.default_url().to_string(),
            api_key: api_key.into(),
            model: model.into(),
            max_tokens: 300,
        }
    }

    /// Client configured from `[assistant]`, reading the key from the
    /// configured environment variable
    pub fn from_config(config: &AssistantConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            ResolveError::completion(format!("{} is not set", config.api_key_env))
        })?;
        let mut client = Self::new(config.format, api_key, config.model.clone())
            .with_max_tokens(config.max_tokens);
        if let Some(url) = &config.api_url {
            client = client.with_url(url.clone());
        }
        Ok(client)
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn format(&self) -> ApiFormat {
        self.format
    }

    /// JSON request body for the configured format
    pub fn request_body(&self, system: &str, user: &str) -> Value {
        match self.format {
            ApiFormat::Anthropic => serde_json::json!({
                "model": self.model,
                "max_tokens": self.max_tokens,
                "messages": [{
                    "role": "user",
                    "content": user
                }],
                "system": system
            }),
            ApiFormat::OpenAi => serde_json::json!({
                "model": self.model,
                "max_tokens": self.max_tokens,
                "messages": [
                    {"role": "system", "content": system},
                    {"role": "user", "content": user}
                ]
            }),
        }
    }

    fn build_request(&self) -> reqwest::RequestBuilder {
        let request = self
            .http
            .post(&self.url)
            .header("content-type", "application/json");
        match self.format {
            ApiFormat::Anthropic => request
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION),
            ApiFormat::OpenAi => request.bearer_auth(&self.api_key),
        }
    }
}

#[async_trait]
impl TextCompletion for HttpCompletionClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let body = self.request_body(system, user);
        debug!(model = %self.model, format = ?self.format, "Completion request");

        let response = self.build_request().json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let snippet: String = text.chars().take(200).collect();
            return Err(ResolveError::completion(format!(
                "API error {}: {}",
                status, snippet
            )));
        }

        let json: Value = response.json().await?;
        extract_text(self.format, &json)
            .ok_or_else(|| ResolveError::completion("response contained no text"))
    }
}

/// Text of the first content block / choice, trimmed
pub fn extract_text(format: ApiFormat, json: &Value) -> Option<String> {
    let text = match format {
        ApiFormat::Anthropic => json
            .get("content")
            .and_then(|c| c.as_array())
            .and_then(|blocks| {
                blocks
                    .iter()
                    .find(|block| block.get("type").and_then(|t| t.as_str()) == Some("text"))
                    .or_else(|| blocks.first())
            })
            .and_then(|block| block.get("text"))
            .and_then(|t| t.as_str()),
        ApiFormat::OpenAi => json
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|arr| arr.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|msg| msg.get("content"))
            .and_then(|t| t.as_str()),
    }?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_anthropic_text() {
        let response = json!({
            "content": [
                {"type": "thinking", "thinking": "hmm"},
                {"type": "text", "text": "  {\"isReferencing\": false}  "}
            ]
        });
        assert_eq!(
            extract_text(ApiFormat::Anthropic, &response).as_deref(),
            Some("{\"isReferencing\": false}")
        );
    }

    #[test]
    fn test_extract_openai_text() {
        let response = json!({
            "choices": [{"message": {"role": "assistant", "content": "hello"}}]
        });
        assert_eq!(
            extract_text(ApiFormat::OpenAi, &response).as_deref(),
            Some("hello")
        );
        assert_eq!(extract_text(ApiFormat::OpenAi, &json!({"choices": []})), None);
    }

    #[test]
    fn test_request_bodies() {
        let anthropic = HttpCompletionClient::new(ApiFormat::Anthropic, "k", "m");
        let body = anthropic.request_body("sys", "hi");
        assert_eq!(body["system"], "sys");
        assert_eq!(body["messages"][0]["content"], "hi");

        let openai = HttpCompletionClient::new(ApiFormat::OpenAi, "k", "m").with_max_tokens(50);
        let body = openai.request_body("sys", "hi");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["max_tokens"], 50);
    }

    #[test]
    fn test_format_serde_names() {
        assert_eq!(serde_json::to_value(ApiFormat::OpenAi).unwrap(), "openai");
        let parsed: ApiFormat = serde_json::from_value(json!("anthropic")).unwrap();
        assert_eq!(parsed, ApiFormat::Anthropic);
    }
}
