//! Media model and candidate selection
//!
//! - `types` - items, attachments, messages and resolution results
//!
//! Candidate lists handed to strategies are always filtered to one kind and
//! sorted oldest first, so "most recent" is the last element.

mod types;

pub use types::{
    Attachment, AuthorRole, ChatMessage, Confidence, MediaItem, MediaKind, ResolutionResult,
    Strategy,
};

/// Filter `items` to `kind` and sort by (timestamp, position), oldest first.
///
/// The sort is stable, so items with identical timestamps and positions keep
/// their ingestion order.
pub fn candidates_for(kind: MediaKind, items: &[MediaItem]) -> Vec<MediaItem> {
    let mut candidates: Vec<MediaItem> = items.iter().filter(|i| i.kind == kind).cloned().collect();
    candidates.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.position.cmp(&b.position))
    });
    candidates
}

/// Most recent candidate authored by `role`
pub fn last_by_role(candidates: &[MediaItem], role: AuthorRole) -> Option<&MediaItem> {
    candidates.iter().rev().find(|item| item.role == role)
}

/// Rank of a candidate counted from the newest (0 = newest)
pub fn recency_rank(candidates: &[MediaItem], item: &MediaItem) -> Option<usize> {
    candidates
        .iter()
        .rev()
        .position(|candidate| candidate.key() == item.key())
}
