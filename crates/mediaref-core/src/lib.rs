//! mediaref core
//!
//! Decides which media item in a chat history a natural-language request
//! refers to ("edit the first picture", "измени фото с солнцем").
//!
//! Key components:
//! - `resolver` - orchestrator running the precedence pipeline
//! - `patterns` - weighted regex rules (English and Russian)
//! - `semantic` - keyword index with synonym and root matching
//! - `temporal` - relative-time phrases ("5 minutes ago", "вчера")
//! - `heuristics` - edit/style intent fallback
//! - `preferences` - per-user learned choices
//! - `cache` - TTL result cache keyed per chat
//! - `assist` - optional language-model strategy
//! - `history` - chat history reading and media extraction

pub mod assist;
pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod heuristics;
pub mod history;
pub mod kinds;
pub mod media;
pub mod patterns;
pub mod preferences;
pub mod resolver;
pub mod semantic;
pub mod strategy;
pub mod temporal;

pub use cache::{CacheKey, CacheStats, ResultCache};
pub use config::ResolverConfig;
pub use error::{ResolveError, Result};
pub use events::{EventSink, MemorySink, ResolutionEvent, TracingSink};
pub use history::{collect_media_items, ChatHistoryReader, StaticHistory};
pub use kinds::{KindConfig, KindRegistry};
pub use media::{
    Attachment, AuthorRole, ChatMessage, Confidence, MediaItem, MediaKind, ResolutionResult,
    Strategy,
};
pub use preferences::PreferenceLearner;
pub use resolver::{MediaReferenceResolver, ResolveRequest, ResolverBuilder};
pub use semantic::SemanticIndex;
pub use strategy::ReferenceStrategy;
pub use temporal::TemporalAnalyzer;
