//! Resolution orchestrator
//!
//! Strict precedence, first satisfied step wins:
//!
//! 1. a current attachment of the requested kind
//! 2. no candidates of the kind (low confidence, no source)
//! 3. pattern rules
//! 4. semantic search
//! 5. registered extra strategies
//! 6. heuristic fallback
//! 7. most recent item (low confidence)
//!
//! Steps 3-7 are cached per chat and request digest. Learned preferences
//! post-process their outcome when a user id is given.

mod builder;

pub use builder::ResolverBuilder;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use serde_json::json;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::assist::{Assessment, AssessmentRequest, ReferenceAssistant};
use crate::cache::{CacheKey, ResultCache};
use crate::config::ResolverConfig;
use crate::error::ResolveError;
use crate::events::{EventSink, ResolutionEvent};
use crate::history::{collect_media_items, ChatHistoryReader};
use crate::kinds::{KindConfig, KindRegistry};
use crate::media::{
    candidates_for, Attachment, Confidence, MediaItem, MediaKind, ResolutionResult, Strategy,
};
use crate::preferences::PreferenceLearner;
use crate::semantic::{SemanticIndex, SemanticStrategy};
use crate::strategy::ReferenceStrategy;

/// Inputs of one resolution
#[derive(Debug, Clone, Copy)]
pub struct ResolveRequest<'a> {
    pub kind: MediaKind,
    pub message: &'a str,
    pub items: &'a [MediaItem],
    pub attachments: &'a [Attachment],
    pub chat_id: Option<&'a str>,
    pub user_id: Option<&'a str>,
}

impl<'a> ResolveRequest<'a> {
    pub fn new(kind: MediaKind, message: &'a str, items: &'a [MediaItem]) -> Self {
        Self {
            kind,
            message,
            items,
            attachments: &[],
            chat_id: None,
            user_id: None,
        }
    }

    pub fn with_attachments(mut self, attachments: &'a [Attachment]) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn with_chat(mut self, chat_id: &'a str) -> Self {
        self.chat_id = Some(chat_id);
        self
    }

    pub fn with_user(mut self, user_id: Option<&'a str>) -> Self {
        self.user_id = user_id;
        self
    }
}

/// The media reference resolver
pub struct MediaReferenceResolver {
    config: ResolverConfig,
    registry: KindRegistry,
    index: Arc<SemanticIndex>,
    semantic: SemanticStrategy,
    cache: Arc<ResultCache>,
    learner: Arc<PreferenceLearner>,
    sink: Arc<dyn EventSink>,
    strategies: Vec<Arc<dyn ReferenceStrategy>>,
    assistant: Option<Arc<dyn ReferenceAssistant>>,
    history: Option<Arc<dyn ChatHistoryReader>>,
    /// chat id -> keys of items already ingested
    known_items: DashMap<String, HashSet<String>>,
}

impl Default for MediaReferenceResolver {
    fn default() -> Self {
        Self::new(ResolverConfig::default())
    }
}

impl MediaReferenceResolver {
    /// Resolver with default services built from `config`
    pub fn new(config: ResolverConfig) -> Self {
        ResolverBuilder::new(config).build()
    }

    pub fn builder(config: ResolverConfig) -> ResolverBuilder {
        ResolverBuilder::new(config)
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn registry(&self) -> &KindRegistry {
        &self.registry
    }

    pub fn index(&self) -> &Arc<SemanticIndex> {
        &self.index
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub fn learner(&self) -> &Arc<PreferenceLearner> {
        &self.learner
    }

    /// Start the periodic cache sweep; stops when `cancel` fires
    pub fn spawn_cache_sweeper(&self, cancel: CancellationToken) -> JoinHandle<()> {
        Arc::clone(&self.cache).spawn_sweeper(cancel)
    }

    /// Resolve which item the request refers to. Never fails.
    pub fn resolve(&self, request: &ResolveRequest<'_>) -> ResolutionResult {
        let started = Instant::now();
        let (result, cache_hit, candidate_count) = self.resolve_inner(request);
        self.emit(request.kind, &result, cache_hit, candidate_count, started);
        result
    }

    fn resolve_inner(&self, request: &ResolveRequest<'_>) -> (ResolutionResult, bool, usize) {
        if let Some(result) = direct_attachment(request.kind, request.attachments) {
            return (result, false, 0);
        }

        let candidates = candidates_for(request.kind, request.items);
        if candidates.is_empty() {
            let result = ResolutionResult::empty(
                Strategy::NoCandidates,
                format!("No {} items in this conversation", request.kind),
            );
            return (result, false, 0);
        }

        let cache_key = self.cache_key(request);
        // Only the user-independent pipeline outcome is cached
        let cached = cache_key.as_ref().and_then(|key| self.cache.get(key));
        let cache_hit = cached.is_some();
        let kind_config = self.registry.get(request.kind);
        let mut result = match cached {
            Some(hit) => {
                debug!(strategy = hit.strategy.as_str(), "Cache hit");
                hit
            }
            None => {
                self.index.ensure_indexed(&candidates);
                let result = self.run_pipeline(kind_config, request, &candidates);
                if let Some(key) = cache_key {
                    self.cache.set(key, result.clone());
                }
                result
            }
        };

        if let Some(user) = request.user_id {
            if self.learner.is_enabled() {
                result = self
                    .learner
                    .apply_preferences(user, request.message, &candidates, result);
            }
        }

        if let Some(config) = kind_config {
            attach_item_metadata(config, &candidates, &mut result);
        }
        (result, cache_hit, candidates.len())
    }

    fn cache_key(&self, request: &ResolveRequest<'_>) -> Option<CacheKey> {
        let chat = request.chat_id?;
        if !self.cache.should_cache(request.message, request.attachments, Some(chat)) {
            return None;
        }
        Some(CacheKey::new(chat, request.kind, request.message, request.attachments))
    }

    fn run_pipeline(
        &self,
        kind_config: Option<&KindConfig>,
        request: &ResolveRequest<'_>,
        candidates: &[MediaItem],
    ) -> ResolutionResult {
        let mut steps: Vec<&dyn ReferenceStrategy> = Vec::new();
        if let Some(config) = kind_config {
            steps.push(&config.patterns);
        }
        steps.push(&self.semantic);
        steps.extend(self.strategies.iter().map(|s| s.as_ref()));
        if let Some(config) = kind_config {
            steps.push(&config.heuristics);
        }

        for step in steps {
            if let Some(result) = step.resolve(request.message, candidates) {
                debug!(
                    step = step.name(),
                    confidence = result.confidence.as_str(),
                    "Strategy resolved reference"
                );
                return result;
            }
        }

        // Non-empty, checked by the caller
        match candidates.last() {
            Some(latest) => ResolutionResult::from_item(
                latest,
                Confidence::Low,
                Strategy::Default,
                format!(
                    "No explicit reference found, using the most recent {}",
                    request.kind
                ),
            ),
            None => ResolutionResult::empty(Strategy::NoCandidates, "No candidates"),
        }
    }

    fn emit(
        &self,
        kind: MediaKind,
        result: &ResolutionResult,
        cache_hit: bool,
        candidate_count: usize,
        started: Instant,
    ) {
        self.sink.emit(&ResolutionEvent {
            kind,
            strategy: result.strategy,
            confidence: result.confidence,
            cache_hit,
            duration_ms: started.elapsed().as_millis() as u64,
            candidate_count,
        });
    }

    /// Index a chat's items. The chat's cached results are dropped when it
    /// gains items it did not have before. Returns the number of new items.
    pub fn ingest(&self, chat_id: &str, items: &[MediaItem]) -> usize {
        let mut known = self.known_items.entry(chat_id.to_string()).or_default();
        let fresh: Vec<&MediaItem> = items
            .iter()
            .filter(|item| known.insert(item.key().to_string()))
            .collect();
        drop(known);

        if fresh.is_empty() {
            return 0;
        }
        for item in &fresh {
            self.index.add_item(item);
        }
        let cleared = self.cache.clear_for_chat(chat_id);
        info!(chat_id, new_items = fresh.len(), cleared, "Ingested chat media");
        fresh.len()
    }

    /// Forget everything cached about a chat
    pub fn forget_chat(&self, chat_id: &str) {
        if let Some((_, keys)) = self.known_items.remove(chat_id) {
            for key in keys {
                self.index.remove_item(&key);
            }
        }
        self.cache.clear_for_chat(chat_id);
    }

    /// Fetch the chat's history, ingest it and resolve.
    ///
    /// A failing or missing history reader is treated as an empty history.
    pub async fn resolve_for_chat(
        &self,
        kind: MediaKind,
        message: &str,
        attachments: &[Attachment],
        chat_id: &str,
        user_id: Option<&str>,
    ) -> ResolutionResult {
        let messages = match &self.history {
            Some(reader) => match reader.fetch(chat_id).await {
                Ok(messages) => messages,
                Err(e) => {
                    warn!(chat_id, "History fetch failed: {}", e);
                    Vec::new()
                }
            },
            None => {
                warn!("No history reader configured");
                Vec::new()
            }
        };

        let items = collect_media_items(&messages);
        self.ingest(chat_id, &items);
        let request = ResolveRequest::new(kind, message, &items)
            .with_attachments(attachments)
            .with_chat(chat_id)
            .with_user(user_id);
        self.resolve(&request)
    }

    /// Ask the configured assistant first, bounded by the assistant timeout.
    ///
    /// Direct attachments and empty histories never reach the assistant. A
    /// deferral, an error or a timeout falls back to [`Self::resolve`].
    pub async fn resolve_assisted(&self, request: &ResolveRequest<'_>) -> ResolutionResult {
        let Some(assistant) = &self.assistant else {
            return self.resolve(request);
        };
        if direct_attachment(request.kind, request.attachments).is_some() {
            return self.resolve(request);
        }
        let candidates = candidates_for(request.kind, request.items);
        if candidates.is_empty() {
            return self.resolve(request);
        }

        let started = Instant::now();
        let assessment_request = AssessmentRequest {
            kind: request.kind,
            message: request.message.to_string(),
            candidates,
        };
        let timeout = self.config.assistant.timeout();
        let outcome = tokio::time::timeout(timeout, assistant.assess(&assessment_request))
            .await
            .unwrap_or_else(|_| Err(ResolveError::Timeout(timeout)));
        match outcome {
            Ok(Assessment::Confident(mut result)) => {
                if let Some(config) = self.registry.get(request.kind) {
                    attach_item_metadata(config, &assessment_request.candidates, &mut result);
                }
                self.emit(
                    request.kind,
                    &result,
                    false,
                    assessment_request.candidates.len(),
                    started,
                );
                return result;
            }
            Ok(Assessment::Defer) => debug!("Assistant deferred"),
            Err(e) => warn!("Assistant failed, using the deterministic pipeline: {}", e),
        }
        self.resolve(request)
    }

    /// Resolve a request that may produce one kind from an item of another
    /// ("make a video from this image").
    ///
    /// When a source kind is detected the request is resolved against it and
    /// the result is tagged with `crossKind`, `sourceKind` and `targetKind`.
    pub fn resolve_cross_kind(&self, request: &ResolveRequest<'_>) -> ResolutionResult {
        let target = request.kind;
        let source = match self.registry.detect_cross_kind(target, request.message) {
            Some(source) if source != target => source,
            _ => return self.resolve(request),
        };
        debug!(
            source = source.as_str(),
            target = target.as_str(),
            "Cross-kind request"
        );

        let source_request = ResolveRequest {
            kind: source,
            ..*request
        };
        let mut result = self.resolve(&source_request);
        result.insert_metadata("crossKind", json!(true));
        result.insert_metadata("sourceKind", json!(source.as_str()));
        result.insert_metadata("targetKind", json!(target.as_str()));
        result
    }

    /// Feed an accepted resolution back into the preference learner
    pub fn record_choice(
        &self,
        user_id: &str,
        message: &str,
        chosen: &MediaItem,
        candidates: &[MediaItem],
    ) {
        self.learner.record_choice(user_id, message, chosen, candidates);
    }
}

/// First usable attachment of `kind`
fn direct_attachment(kind: MediaKind, attachments: &[Attachment]) -> Option<ResolutionResult> {
    attachments.iter().find_map(|attachment| {
        let (url, attachment_kind) = attachment.usable()?;
        if attachment_kind != kind {
            return None;
        }
        let mut result = ResolutionResult {
            source_url: Some(url.to_string()),
            source_id: attachment.id.clone(),
            confidence: Confidence::High,
            reasoning: format!("Using the {} attached to this message", kind),
            strategy: Strategy::DirectAttachment,
            metadata: None,
        };
        if let Some(name) = &attachment.name {
            result.insert_metadata("name", json!(name));
        }
        Some(result)
    })
}

/// Merge the kind's extracted metadata for the chosen item, keeping any keys
/// the strategy already set
fn attach_item_metadata(
    config: &KindConfig,
    candidates: &[MediaItem],
    result: &mut ResolutionResult,
) {
    let Some(item) = candidates.iter().find(|item| result.refers_to(item)) else {
        return;
    };
    for (key, value) in config.extract_metadata(item) {
        let exists = result
            .metadata
            .as_ref()
            .is_some_and(|metadata| metadata.contains_key(&key));
        if !exists {
            result.insert_metadata(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemorySink;
    use crate::media::AuthorRole;
    use chrono::{Duration, TimeZone, Utc};

    fn items() -> Vec<MediaItem> {
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        vec![
            MediaItem::new("a", MediaKind::Image, AuthorRole::Assistant, base)
                .with_caption("closeup portrait")
                .with_metadata("width", json!(512)),
            MediaItem::new(
                "b",
                MediaKind::Image,
                AuthorRole::Assistant,
                base + Duration::minutes(1),
            )
            .with_caption("sunset beach with bright sun")
            .with_position(1),
        ]
    }

    #[test]
    fn test_direct_attachment_wins() {
        let resolver = MediaReferenceResolver::default();
        let history = items();
        let attachments = [
            Attachment::new("https://cdn/doc.pdf", "application/pdf"),
            Attachment::new("https://cdn/new.png", "image/png").with_name("new.png"),
        ];
        let request = ResolveRequest::new(MediaKind::Image, "the first image", &history)
            .with_attachments(&attachments);
        let result = resolver.resolve(&request);
        assert_eq!(result.source_url.as_deref(), Some("https://cdn/new.png"));
        assert_eq!(result.strategy, Strategy::DirectAttachment);
        assert_eq!(result.confidence, Confidence::High);
    }

    #[test]
    fn test_pipeline_order_and_metadata() {
        let resolver = MediaReferenceResolver::default();
        let history = items();

        let pattern =
            resolver.resolve(&ResolveRequest::new(MediaKind::Image, "first image", &history));
        assert_eq!(pattern.strategy, Strategy::Pattern);
        assert_eq!(pattern.source_url.as_deref(), Some("a"));
        assert_eq!(pattern.metadata.unwrap()["width"], 512);

        let fallback =
            resolver.resolve(&ResolveRequest::new(MediaKind::Image, "qwerty zxcv", &history));
        assert_eq!(fallback.strategy, Strategy::Default);
        assert_eq!(fallback.source_url.as_deref(), Some("b"));
        assert_eq!(fallback.confidence, Confidence::Low);
    }

    #[test]
    fn test_cache_hit_is_reported() {
        let sink = Arc::new(MemorySink::new());
        let resolver = MediaReferenceResolver::builder(ResolverConfig::default())
            .with_event_sink(sink.clone())
            .build();
        let history = items();
        let request =
            ResolveRequest::new(MediaKind::Image, "the last image", &history).with_chat("chat-1");

        let first = resolver.resolve(&request);
        let second = resolver.resolve(&request);
        assert_eq!(first, second);

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(!events[0].cache_hit);
        assert!(events[1].cache_hit);
        assert_eq!(events[1].candidate_count, 2);
    }

    #[test]
    fn test_ingest_clears_cache_only_for_new_items() {
        let resolver = MediaReferenceResolver::default();
        let history = items();
        assert_eq!(resolver.ingest("chat-1", &history), 2);
        let request =
            ResolveRequest::new(MediaKind::Image, "the last image", &history).with_chat("chat-1");
        resolver.resolve(&request);
        assert_eq!(resolver.cache().len(), 1);

        assert_eq!(resolver.ingest("chat-1", &history), 0);
        assert_eq!(resolver.cache().len(), 1);

        let mut grown = history.clone();
        grown.push(
            MediaItem::new("c", MediaKind::Image, AuthorRole::User, Utc::now()).with_position(2),
        );
        assert_eq!(resolver.ingest("chat-1", &grown), 1);
        assert!(resolver.cache().is_empty());

        resolver.forget_chat("chat-1");
        assert!(resolver.index().is_empty());
        assert_eq!(resolver.ingest("chat-1", &grown), 3);
    }

    #[test]
    fn test_cross_kind_tags_result() {
        let resolver = MediaReferenceResolver::default();
        let history = items();
        let request =
            ResolveRequest::new(MediaKind::Video, "make a video from this image", &history);
        let result = resolver.resolve_cross_kind(&request);
        assert_eq!(result.source_url.as_deref(), Some("b"));
        let metadata = result.metadata.unwrap();
        assert_eq!(metadata["crossKind"], true);
        assert_eq!(metadata["sourceKind"], "image");
        assert_eq!(metadata["targetKind"], "video");

        let plain = resolver.resolve_cross_kind(&ResolveRequest::new(
            MediaKind::Video,
            "make it longer",
            &history,
        ));
        assert_eq!(plain.strategy, Strategy::NoCandidates);
    }
}
