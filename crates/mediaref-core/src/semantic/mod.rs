//! Content-based lookup
//!
//! - `keywords` - the tokenizer shared by indexing and querying
//! - `lexicon` - curated root families and synonym groups
//! - `index` - inverted index and scoring

mod index;
mod keywords;
mod lexicon;

use std::sync::Arc;

pub use index::{KeywordHit, MatchKind, SemanticIndex, SemanticMatch};
pub use keywords::{extract_keywords, is_stop_word, normalize_message};
pub use lexicon::{are_synonyms, root_of, share_root};

use crate::media::{Confidence, MediaItem, ResolutionResult, Strategy};
use crate::strategy::ReferenceStrategy;

/// Marker every semantic result's reasoning starts with
pub const SEMANTIC_REASONING_MARKER: &str = "Semantic match";

/// Strategy wrapper around a shared [`SemanticIndex`]
pub struct SemanticStrategy {
    index: Arc<SemanticIndex>,
}

impl SemanticStrategy {
    pub fn new(index: Arc<SemanticIndex>) -> Self {
        Self { index }
    }
}

impl ReferenceStrategy for SemanticStrategy {
    fn name(&self) -> &'static str {
        "semantic"
    }

    fn resolve(&self, message: &str, candidates: &[MediaItem]) -> Option<ResolutionResult> {
        let best = self.index.best_match(message, candidates)?;
        let mut result = ResolutionResult::from_item(
            &best.item,
            Confidence::High,
            Strategy::Semantic,
            format!(
                "{} (score {:.2}): {}",
                SEMANTIC_REASONING_MARKER,
                best.score,
                best.describe_hits()
            ),
        );
        result.insert_metadata("semanticScore", serde_json::json!(best.score));
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{AuthorRole, MediaKind};
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_strategy_reports_marker() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let items = vec![
            MediaItem::new("a", MediaKind::Image, AuthorRole::Assistant, ts)
                .with_caption("closeup portrait"),
            MediaItem::new("b", MediaKind::Image, AuthorRole::Assistant, ts)
                .with_caption("sunset beach with bright sun")
                .with_position(1),
        ];
        let strategy = SemanticStrategy::new(Arc::new(SemanticIndex::default()));

        let result = strategy.resolve("измени фото с солнцем", &items).unwrap();
        assert_eq!(result.source_url.as_deref(), Some("b"));
        assert_eq!(result.confidence, Confidence::High);
        assert!(result.reasoning.contains(SEMANTIC_REASONING_MARKER));
    }

    #[test]
    fn test_strategy_passes_without_match() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let items = vec![MediaItem::new("a", MediaKind::Image, AuthorRole::User, ts)
            .with_caption("mountain lake")];
        let strategy = SemanticStrategy::new(Arc::new(SemanticIndex::default()));
        assert!(strategy.resolve("xyzzy plugh", &items).is_none());
    }
}
