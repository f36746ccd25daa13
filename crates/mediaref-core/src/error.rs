//! Error types
//!
//! Resolution itself never fails; these errors surface from configuration
//! loading and from the external collaborators (history reader, language model).

use std::time::Duration;

use thiserror::Error;

/// Errors raised by fallible mediaref operations
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Filesystem failure while reading configuration
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// JSON serialization / deserialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A pattern rule failed to compile
    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),

    /// Chat history could not be fetched
    #[error("History error: {0}")]
    History(String),

    /// Language model call failed
    #[error("Completion error: {0}")]
    Completion(String),

    /// Language model call exceeded its time budget
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// HTTP transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ResolveError {
    pub fn history(message: impl Into<String>) -> Self {
        Self::History(message.into())
    }

    pub fn completion(message: impl Into<String>) -> Self {
        Self::Completion(message.into())
    }
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, ResolveError>;
