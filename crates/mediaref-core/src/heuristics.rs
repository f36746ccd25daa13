//! Intent-keyword fallback
//!
//! Runs after pattern and semantic matching. Checks, in order: same-subject
//! phrases, edit-intent words, style/quality words.

use tracing::debug;

use crate::media::{last_by_role, AuthorRole, Confidence, MediaItem, ResolutionResult, Strategy};
use crate::semantic::normalize_message;
use crate::strategy::ReferenceStrategy;

/// Edit-intent words shared by every kind
pub const EDIT_WORDS: &[&str] = &[
    "edit", "change", "modify", "adjust", "fix ", "improve", "enhance", "make it", "remove",
    "add ", "replace", "update", "tweak", "redo", "rework", "измени", "изменить", "поменяй",
    "отредактируй", "исправь", "улучши", "убери", "добавь", "замени", "переделай", "подправь",
    "доработай", "сделай его", "сделай ее",
];

/// Style and quality words shared by every kind
pub const STYLE_WORDS: &[&str] = &[
    "style", "quality", "resolution", "sharper", "realistic", "cartoon", "anime", "vintage",
    "стиль", "стиле", "качеств", "разрешени", "четче", "реалистичн", "мульт", "аниме",
];

pub const SAME_SUBJECT_PHRASES: &[&str] = &[
    "same subject", "same character", "same person", "same scene", "same object", "same one",
    "тот же", "та же", "то же", "тем же", "того же", "такой же", "такую же", "таким же",
];

/// Which check fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeuristicIntent {
    SameSubject,
    Edit,
    Style,
}

impl HeuristicIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SameSubject => "same_subject",
            Self::Edit => "edit",
            Self::Style => "style",
        }
    }
}

/// Word lists for one kind
#[derive(Debug, Clone)]
pub struct HeuristicResolver {
    pub edit_words: Vec<&'static str>,
    pub style_words: Vec<&'static str>,
    pub same_subject_phrases: Vec<&'static str>,
}

impl Default for HeuristicResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl HeuristicResolver {
    /// Resolver with the shared word lists
    pub fn new() -> Self {
        Self {
            edit_words: EDIT_WORDS.to_vec(),
            style_words: STYLE_WORDS.to_vec(),
            same_subject_phrases: SAME_SUBJECT_PHRASES.to_vec(),
        }
    }

    /// Every intent the message expresses, in check order
    pub fn intents(&self, message: &str) -> Vec<HeuristicIntent> {
        let text = normalize_message(message);
        let mut intents = Vec::new();
        if contains_any_word(&text, &self.same_subject_phrases) {
            intents.push(HeuristicIntent::SameSubject);
        }
        if contains_any(&text, &self.edit_words) {
            intents.push(HeuristicIntent::Edit);
        }
        if contains_any(&text, &self.style_words) {
            intents.push(HeuristicIntent::Style);
        }
        intents
    }

    /// First intent the message expresses; `None` when no list matches
    pub fn intent(&self, message: &str) -> Option<HeuristicIntent> {
        self.intents(message).first().copied()
    }

    /// Candidate for an intent; `candidates` are sorted oldest first
    pub fn select<'a>(
        &self,
        intent: HeuristicIntent,
        candidates: &'a [MediaItem],
    ) -> Option<&'a MediaItem> {
        match intent {
            HeuristicIntent::SameSubject => last_by_role(candidates, AuthorRole::Assistant),
            HeuristicIntent::Edit => last_by_role(candidates, AuthorRole::Assistant)
                .or_else(|| last_by_role(candidates, AuthorRole::User))
                .or_else(|| candidates.last()),
            HeuristicIntent::Style => candidates.last(),
        }
    }
}

impl ReferenceStrategy for HeuristicResolver {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    fn resolve(&self, message: &str, candidates: &[MediaItem]) -> Option<ResolutionResult> {
        // An intent with no eligible item defers to the next one
        let (intent, item) = self
            .intents(message)
            .into_iter()
            .find_map(|intent| Some((intent, self.select(intent, candidates)?)))?;
        debug!(intent = intent.as_str(), "Heuristic fallback selected");
        let mut result = ResolutionResult::from_item(
            item,
            Confidence::Medium,
            Strategy::Heuristic,
            format!(
                "Heuristic: {} intent, using most recent {} item",
                intent.as_str(),
                item.role.as_str()
            ),
        );
        result.insert_metadata("intent", serde_json::json!(intent.as_str()));
        Some(result)
    }
}

/// Whether any phrase occurs in `text` starting at a word boundary.
///
/// Phrases may be stems ("качеств"), so the end is left open.
pub fn contains_any(text: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|phrase| occurs(text, phrase, false))
}

/// Whether any phrase occurs in `text` as whole words
pub fn contains_any_word(text: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|phrase| occurs(text, phrase, true))
}

fn occurs(text: &str, phrase: &str, whole_word: bool) -> bool {
    let is_word_char = |c: char| c.is_alphanumeric() || c == '_';
    text.match_indices(phrase).any(|(start, _)| {
        let end = start + phrase.len();
        let starts_word = text[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !is_word_char(c));
        let ends_word =
            !whole_word || text[end..].chars().next().map_or(true, |c| !is_word_char(c));
        starts_word && ends_word
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaKind;
    use chrono::{Duration, TimeZone, Utc};

    fn item(url: &str, role: AuthorRole, minutes: i64) -> MediaItem {
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        MediaItem::new(url, MediaKind::Image, role, base + Duration::minutes(minutes))
    }

    #[test]
    fn test_intent_order() {
        let heuristics = HeuristicResolver::new();
        assert_eq!(
            heuristics.intent("Change it to the same character"),
            Some(HeuristicIntent::SameSubject)
        );
        assert_eq!(heuristics.intent("please edit it"), Some(HeuristicIntent::Edit));
        assert_eq!(heuristics.intent("в стиле аниме"), Some(HeuristicIntent::Style));
        assert_eq!(heuristics.intent("hello there"), None);
    }

    #[test]
    fn test_edit_prefers_assistant_then_user() {
        let heuristics = HeuristicResolver::new();
        let mixed = vec![
            item("gen", AuthorRole::Assistant, 0),
            item("upload", AuthorRole::User, 1),
        ];
        let result = heuristics.resolve("измени цвет", &mixed).unwrap();
        assert_eq!(result.source_url.as_deref(), Some("gen"));
        assert_eq!(result.confidence, Confidence::Medium);
        assert_eq!(result.strategy, Strategy::Heuristic);

        let uploads = vec![item("upload", AuthorRole::User, 1)];
        let result = heuristics.resolve("edit this", &uploads).unwrap();
        assert_eq!(result.source_url.as_deref(), Some("upload"));
    }

    #[test]
    fn test_style_takes_latest_overall() {
        let heuristics = HeuristicResolver::new();
        let items = vec![
            item("gen", AuthorRole::Assistant, 0),
            item("upload", AuthorRole::User, 1),
        ];
        let result = heuristics.resolve("higher quality", &items).unwrap();
        assert_eq!(result.source_url.as_deref(), Some("upload"));
    }

    #[test]
    fn test_phrases_match_on_word_boundaries() {
        let heuristics = HeuristicResolver::new();
        assert_eq!(heuristics.intent("ну что же, измени цвет"), Some(HeuristicIntent::Edit));
        assert_eq!(heuristics.intent("то же самое"), Some(HeuristicIntent::SameSubject));
        assert_eq!(heuristics.intent("give me credit"), None);
        assert!(contains_any("в хорошем качестве", &["качеств"]));
        assert!(!contains_any_word("что же", &["то же"]));
    }

    #[test]
    fn test_same_subject_without_assistant_item_falls_through_to_edit() {
        let heuristics = HeuristicResolver::new();
        let uploads = vec![item("upload", AuthorRole::User, 0)];
        assert_eq!(
            heuristics.intents("the same character, but change the color"),
            vec![HeuristicIntent::SameSubject, HeuristicIntent::Edit]
        );
        let result = heuristics
            .resolve("the same character, but change the color", &uploads)
            .unwrap();
        assert_eq!(result.source_url.as_deref(), Some("upload"));
        assert_eq!(result.metadata.unwrap()["intent"], "edit");

        let result = heuristics.resolve("ну что же, измени цвет", &uploads).unwrap();
        assert_eq!(result.confidence, Confidence::Medium);
    }

    #[test]
    fn test_same_subject_needs_assistant_item() {
        let heuristics = HeuristicResolver::new();
        let uploads = vec![item("upload", AuthorRole::User, 0)];
        assert!(heuristics.resolve("same character please", &uploads).is_none());
    }
}
