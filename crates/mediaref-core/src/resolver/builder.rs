//! Resolver construction

use std::sync::Arc;

use dashmap::DashMap;

use super::MediaReferenceResolver;
use crate::assist::ReferenceAssistant;
use crate::cache::ResultCache;
use crate::config::ResolverConfig;
use crate::events::{EventSink, TracingSink};
use crate::history::ChatHistoryReader;
use crate::kinds::KindRegistry;
use crate::preferences::PreferenceLearner;
use crate::semantic::{SemanticIndex, SemanticStrategy};
use crate::strategy::ReferenceStrategy;

/// Builder for [`MediaReferenceResolver`].
///
/// Services not supplied explicitly are created from the config, so two
/// resolvers only share state when they are handed the same `Arc`s.
pub struct ResolverBuilder {
    config: ResolverConfig,
    registry: Option<KindRegistry>,
    index: Option<Arc<SemanticIndex>>,
    cache: Option<Arc<ResultCache>>,
    learner: Option<Arc<PreferenceLearner>>,
    sink: Option<Arc<dyn EventSink>>,
    strategies: Vec<Arc<dyn ReferenceStrategy>>,
    assistant: Option<Arc<dyn ReferenceAssistant>>,
    history: Option<Arc<dyn ChatHistoryReader>>,
}

impl Default for ResolverBuilder {
    fn default() -> Self {
        Self::new(ResolverConfig::default())
    }
}

impl ResolverBuilder {
    pub fn new(config: ResolverConfig) -> Self {
        Self {
            config,
            registry: None,
            index: None,
            cache: None,
            learner: None,
            sink: None,
            strategies: Vec::new(),
            assistant: None,
            history: None,
        }
    }

    pub fn with_registry(mut self, registry: KindRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_index(mut self, index: Arc<SemanticIndex>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_cache(mut self, cache: Arc<ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_learner(mut self, learner: Arc<PreferenceLearner>) -> Self {
        self.learner = Some(learner);
        self
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Add a strategy that runs after semantic search and before the
    /// heuristic fallback, in registration order
    pub fn with_strategy(mut self, strategy: Arc<dyn ReferenceStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    pub fn with_assistant(mut self, assistant: Arc<dyn ReferenceAssistant>) -> Self {
        self.assistant = Some(assistant);
        self
    }

    pub fn with_history_reader(mut self, history: Arc<dyn ChatHistoryReader>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn build(self) -> MediaReferenceResolver {
        let config = self.config;
        let index = self
            .index
            .unwrap_or_else(|| Arc::new(SemanticIndex::new(config.semantic.clone())));
        MediaReferenceResolver {
            registry: self.registry.unwrap_or_else(|| KindRegistry::new(&config)),
            semantic: SemanticStrategy::new(Arc::clone(&index)),
            index,
            cache: self
                .cache
                .unwrap_or_else(|| Arc::new(ResultCache::new(config.cache.clone()))),
            learner: self
                .learner
                .unwrap_or_else(|| Arc::new(PreferenceLearner::new(config.preferences.clone()))),
            sink: self.sink.unwrap_or_else(|| Arc::new(TracingSink)),
            strategies: self.strategies,
            assistant: self.assistant,
            history: self.history,
            known_items: DashMap::new(),
            config,
        }
    }
}
