//! Resolution events
//!
//! One event per resolution, delivered to a pluggable sink. Sinks are pure
//! observers; nothing in the pipeline reads them back.

use parking_lot::Mutex;
use serde::Serialize;

use crate::media::{Confidence, MediaKind, Strategy};

/// Outcome summary of one resolution
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionEvent {
    pub kind: MediaKind,
    pub strategy: Strategy,
    pub confidence: Confidence,
    pub cache_hit: bool,
    pub duration_ms: u64,
    pub candidate_count: usize,
}

/// Receiver of resolution events
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &ResolutionEvent);
}

/// Logs every event at debug level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &ResolutionEvent) {
        tracing::debug!(
            kind = event.kind.as_str(),
            strategy = event.strategy.as_str(),
            confidence = event.confidence.as_str(),
            cache_hit = event.cache_hit,
            duration_ms = event.duration_ms,
            candidates = event.candidate_count,
            "Resolution event"
        );
    }
}

/// Collects events in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<ResolutionEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ResolutionEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Take all collected events, leaving the sink empty
    pub fn drain(&self) -> Vec<ResolutionEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: &ResolutionEvent) {
        self.events.lock().push(event.clone());
    }
}
