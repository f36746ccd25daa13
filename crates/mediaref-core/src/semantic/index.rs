//! Inverted keyword index over media captions

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use tracing::debug;

use super::keywords::extract_keywords;
use super::lexicon::{are_synonyms, share_root};
use crate::config::SemanticConfig;
use crate::media::MediaItem;

/// How a query keyword matched an item keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchKind {
    Synonym,
    Partial,
    Exact,
}

impl MatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Partial => "partial",
            Self::Synonym => "synonym",
        }
    }

    fn weight(&self, config: &SemanticConfig) -> f32 {
        match self {
            Self::Exact => config.exact_weight,
            Self::Partial => config.partial_weight,
            Self::Synonym => config.synonym_weight,
        }
    }
}

/// One matched query keyword
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordHit {
    pub query: String,
    pub matched: String,
    pub kind: MatchKind,
}

/// A scored candidate
#[derive(Debug, Clone)]
pub struct SemanticMatch {
    pub item: MediaItem,
    pub score: f32,
    pub hits: Vec<KeywordHit>,
}

impl SemanticMatch {
    /// Human readable list of `query->matched (kind)` pairs
    pub fn describe_hits(&self) -> String {
        self.hits
            .iter()
            .map(|hit| {
                if hit.query == hit.matched {
                    format!("{} ({})", hit.query, hit.kind.as_str())
                } else {
                    format!("{}->{} ({})", hit.query, hit.matched, hit.kind.as_str())
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Default)]
struct IndexState {
    /// item key -> ordered, deduplicated keywords
    entries: HashMap<String, Vec<String>>,
    /// keyword -> item keys, in insertion order
    inverted: HashMap<String, Vec<String>>,
}

impl IndexState {
    fn unlink(&mut self, key: &str) {
        let Some(previous) = self.entries.remove(key) else {
            return;
        };
        for keyword in previous {
            if let Some(keys) = self.inverted.get_mut(&keyword) {
                keys.retain(|k| k != key);
                if keys.is_empty() {
                    self.inverted.remove(&keyword);
                }
            }
        }
    }
}

/// Keyword index shared across chats.
///
/// Entries and the inverted map are updated under one write lock so a reader
/// never observes an entry without its postings.
pub struct SemanticIndex {
    state: RwLock<IndexState>,
    config: SemanticConfig,
}

impl Default for SemanticIndex {
    fn default() -> Self {
        Self::new(SemanticConfig::default())
    }
}

impl SemanticIndex {
    pub fn new(config: SemanticConfig) -> Self {
        Self {
            state: RwLock::new(IndexState::default()),
            config,
        }
    }

    pub fn config(&self) -> &SemanticConfig {
        &self.config
    }

    /// Index an item's caption. Returns false when there was nothing to index.
    pub fn add_item(&self, item: &MediaItem) -> bool {
        let Some(caption) = item.caption.as_deref() else {
            return false;
        };
        let keywords = extract_keywords(caption);
        let key = item.key().to_string();

        let mut state = self.state.write();
        state.unlink(&key);
        if keywords.is_empty() {
            return false;
        }
        for keyword in &keywords {
            let keys = state.inverted.entry(keyword.clone()).or_default();
            if !keys.contains(&key) {
                keys.push(key.clone());
            }
        }
        state.entries.insert(key, keywords);
        true
    }

    /// Index every item not already present; returns how many were added
    pub fn ensure_indexed(&self, items: &[MediaItem]) -> usize {
        let missing: Vec<&MediaItem> = {
            let state = self.state.read();
            items
                .iter()
                .filter(|item| item.caption.is_some() && !state.entries.contains_key(item.key()))
                .collect()
        };
        missing.into_iter().filter(|item| self.add_item(item)).count()
    }

    pub fn remove_item(&self, key: &str) {
        self.state.write().unlink(key);
    }

    /// Keywords stored for an item
    pub fn keywords(&self, key: &str) -> Option<Vec<String>> {
        self.state.read().entries.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Score `items` against `query`, best first.
    ///
    /// Exact keyword hits from the inverted index are used when any exist;
    /// otherwise every candidate is scanned for partial/root and synonym
    /// matches. Items without any match are left out.
    pub fn search(&self, query: &str, items: &[MediaItem]) -> Vec<SemanticMatch> {
        let query_keywords = extract_keywords(query);
        if query_keywords.is_empty() || items.is_empty() {
            return Vec::new();
        }

        let state = self.state.read();
        let item_keywords: Vec<Vec<String>> = items
            .iter()
            .map(|item| match state.entries.get(item.key()) {
                Some(keywords) => keywords.clone(),
                None => item
                    .caption
                    .as_deref()
                    .map(extract_keywords)
                    .unwrap_or_default(),
            })
            .collect();

        let exact_keys: HashSet<&str> = query_keywords
            .iter()
            .filter_map(|kw| state.inverted.get(kw))
            .flatten()
            .map(String::as_str)
            .collect();
        let has_exact = items.iter().zip(&item_keywords).any(|(item, keywords)| {
            exact_keys.contains(item.key())
                || query_keywords.iter().any(|q| keywords.contains(q))
        });

        let mut matches = Vec::new();
        for (item, keywords) in items.iter().zip(&item_keywords) {
            let hits: Vec<KeywordHit> = query_keywords
                .iter()
                .filter_map(|q| {
                    if has_exact {
                        exact_hit(q, keywords)
                    } else {
                        broad_hit(q, keywords)
                    }
                })
                .collect();
            if hits.is_empty() {
                continue;
            }
            let total: f32 = hits.iter().map(|hit| hit.kind.weight(&self.config)).sum();
            let score = (total / hits.len() as f32).max(self.config.score_floor);
            matches.push(SemanticMatch {
                item: item.clone(),
                score,
                hits,
            });
        }
        drop(state);

        // Stable sort keeps original order among equal scores
        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        debug!(
            query_keywords = query_keywords.len(),
            exact_phase = has_exact,
            matched = matches.len(),
            "Semantic search complete"
        );
        matches
    }

    /// Best match, if its score is usable
    pub fn best_match(&self, query: &str, items: &[MediaItem]) -> Option<SemanticMatch> {
        self.search(query, items)
            .into_iter()
            .next()
            .filter(|m| m.score > self.config.min_usable_score)
    }
}

fn exact_hit(query: &str, keywords: &[String]) -> Option<KeywordHit> {
    keywords.iter().find(|k| *k == query).map(|k| KeywordHit {
        query: query.to_string(),
        matched: k.clone(),
        kind: MatchKind::Exact,
    })
}

/// Best partial/root or synonym match of `query` among `keywords`
fn broad_hit(query: &str, keywords: &[String]) -> Option<KeywordHit> {
    let mut best: Option<KeywordHit> = None;
    for keyword in keywords {
        let kind = if keyword == query {
            Some(MatchKind::Exact)
        } else if is_partial(query, keyword) {
            Some(MatchKind::Partial)
        } else if are_synonyms(query, keyword) {
            Some(MatchKind::Synonym)
        } else {
            None
        };
        if let Some(kind) = kind {
            if best.as_ref().map_or(true, |b| kind > b.kind) {
                best = Some(KeywordHit {
                    query: query.to_string(),
                    matched: keyword.clone(),
                    kind,
                });
            }
        }
    }
    best
}

/// Containment (shorter side at least three characters) or a shared root
fn is_partial(a: &str, b: &str) -> bool {
    let (short, long) = if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    };
    (short.chars().count() >= 3 && long.contains(short)) || share_root(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{AuthorRole, MediaKind};
    use chrono::{Duration, TimeZone, Utc};

    fn item(url: &str, caption: Option<&str>, minutes: i64) -> MediaItem {
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut item = MediaItem::new(
            url,
            MediaKind::Image,
            AuthorRole::Assistant,
            base + Duration::minutes(minutes),
        );
        item.caption = caption.map(str::to_string);
        item
    }

    #[test]
    fn test_add_item_skips_missing_caption() {
        let index = SemanticIndex::default();
        assert!(!index.add_item(&item("a", None, 0)));
        assert!(!index.add_item(&item("b", Some("the of and"), 0)));
        assert!(index.add_item(&item("c", Some("red car"), 0)));
        assert_eq!(index.len(), 1);
        assert_eq!(index.keywords("c"), Some(vec!["red".to_string(), "car".to_string()]));
    }

    #[test]
    fn test_reindex_replaces_postings() {
        let index = SemanticIndex::default();
        index.add_item(&item("a", Some("red car"), 0));
        index.add_item(&item("a", Some("blue boat"), 0));

        let items = vec![item("a", Some("blue boat"), 0)];
        assert!(index.search("red", &items).is_empty());
        assert_eq!(index.search("boat", &items).len(), 1);
    }

    #[test]
    fn test_exact_hits_take_precedence_over_broad_scan() {
        let index = SemanticIndex::default();
        let items = vec![
            item("a", Some("sunny meadow"), 0),
            item("b", Some("sun over hills"), 1),
        ];
        index.ensure_indexed(&items);

        let results = index.search("sun", &items);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].item.url, "b");
        assert_eq!(results[0].score, 1.0);
        assert_eq!(results[0].hits[0].kind, MatchKind::Exact);
    }

    #[test]
    fn test_partial_and_synonym_scores() {
        let index = SemanticIndex::default();
        let items = vec![
            item("portrait", Some("closeup portrait"), 0),
            item("beach", Some("sunset beach with bright sun"), 1),
        ];
        index.ensure_indexed(&items);

        let partial = index.search("portraits", &items);
        assert_eq!(partial[0].item.url, "portrait");
        assert!((partial[0].score - 0.7).abs() < 1e-6);

        let synonym = index.search("солнцем", &items);
        assert_eq!(synonym.len(), 1);
        assert_eq!(synonym[0].item.url, "beach");
        assert!((synonym[0].score - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_score_normalized_by_matched_keywords() {
        let index = SemanticIndex::default();
        let items = vec![item("a", Some("red vintage car"), 0)];
        index.ensure_indexed(&items);

        // "cars" partial (0.7) + "crimson" synonym (0.5) over two matches
        let results = index.search("crimson cars", &items);
        assert!((results[0].score - 0.6).abs() < 1e-6);
        assert_eq!(results[0].hits.len(), 2);
    }

    #[test]
    fn test_ties_keep_original_order() {
        let index = SemanticIndex::default();
        let items = vec![
            item("first", Some("dog park"), 0),
            item("second", Some("dog beach"), 1),
        ];
        index.ensure_indexed(&items);

        let results = index.search("dog", &items);
        assert_eq!(results[0].item.url, "first");
        assert_eq!(results[1].item.url, "second");
    }

    #[test]
    fn test_unindexed_candidates_are_scored_from_caption() {
        let index = SemanticIndex::default();
        let items = vec![item("a", Some("mountain lake"), 0)];
        let best = index.best_match("lake", &items).unwrap();
        assert_eq!(best.item.url, "a");
    }

    #[test]
    fn test_best_match_requires_usable_score() {
        let config = SemanticConfig {
            min_usable_score: 0.6,
            ..SemanticConfig::default()
        };
        let index = SemanticIndex::new(config);
        let items = vec![item("a", Some("sun"), 0)];
        assert!(index.best_match("солнце", &items).is_none());
        assert!(index.best_match("sun", &items).is_some());
    }
}
