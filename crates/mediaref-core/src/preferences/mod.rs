//! Per-user preference learning
//!
//! Every accepted resolution is recorded under a set of signatures (each
//! message keyword plus the whole normalized message). Later requests whose
//! text contains a known signature get their candidates re-scored with the
//! learned kind, role, recency and keyword preferences.

mod record;

pub use record::{RecencyWindow, UserPreferenceRecord};

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::{debug, info};

use crate::config::PreferenceConfig;
use crate::media::{
    candidates_for, recency_rank, Confidence, MediaItem, ResolutionResult, Strategy,
};
use crate::semantic::{are_synonyms, extract_keywords, normalize_message, share_root};

/// Learned preferences keyed by user, then signature
pub struct PreferenceLearner {
    users: DashMap<String, BTreeMap<String, UserPreferenceRecord>>,
    config: PreferenceConfig,
}

impl Default for PreferenceLearner {
    fn default() -> Self {
        Self::new(PreferenceConfig::default())
    }
}

impl PreferenceLearner {
    pub fn new(config: PreferenceConfig) -> Self {
        Self {
            users: DashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &PreferenceConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Record that `user` meant `chosen` by `message`
    pub fn record_choice(
        &self,
        user: &str,
        message: &str,
        chosen: &MediaItem,
        candidates: &[MediaItem],
    ) {
        self.record_choice_at(user, message, chosen, candidates, Utc::now());
    }

    pub fn record_choice_at(
        &self,
        user: &str,
        message: &str,
        chosen: &MediaItem,
        candidates: &[MediaItem],
        now: DateTime<Utc>,
    ) {
        if !self.config.enabled {
            return;
        }
        let keywords = extract_keywords(message);
        let whole = normalize_message(message);
        if whole.is_empty() {
            return;
        }

        let sorted = candidates_for(chosen.kind, candidates);
        let window = RecencyWindow::from_rank(recency_rank(&sorted, chosen).unwrap_or(0));
        let chosen_keywords = chosen
            .caption
            .as_deref()
            .map(extract_keywords)
            .unwrap_or_default();

        let mut signatures = keywords.clone();
        if !signatures.contains(&whole) {
            signatures.push(whole);
        }

        let mut records = self.users.entry(user.to_string()).or_default();
        if let Some(max_age) = self.max_age() {
            let before = records.len();
            records.retain(|_, record| now - record.last_used <= max_age);
            let removed = before - records.len();
            if removed > 0 {
                debug!(user, removed, "Dropped stale preference records");
            }
        }
        for signature in signatures {
            let record = records
                .entry(signature.clone())
                .or_insert_with(|| UserPreferenceRecord::new(signature, now));

            record.preferred_kinds.insert(chosen.kind);
            record.preferred_roles.insert(chosen.role);
            record.preferred_windows.insert(window);
            for keyword in &keywords {
                let observation = if describes(keyword, &chosen_keywords) {
                    1.0
                } else {
                    0.0
                };
                record.observe_keyword(keyword, observation);
            }
            record.usage_count = record.usage_count.saturating_add(1);
            record.last_used = now;
            record.accuracy = record.accuracy_at(now, &self.config);
        }

        debug!(
            user,
            keywords = keywords.len(),
            window = window.as_str(),
            "Recorded preference"
        );
    }

    /// Re-score candidates with learned preferences, overriding `base` when
    /// any candidate earns a positive score
    pub fn apply_preferences(
        &self,
        user: &str,
        message: &str,
        candidates: &[MediaItem],
        base: ResolutionResult,
    ) -> ResolutionResult {
        self.apply_preferences_at(user, message, candidates, base, Utc::now())
    }

    /// `candidates` are sorted oldest first
    pub fn apply_preferences_at(
        &self,
        user: &str,
        message: &str,
        candidates: &[MediaItem],
        base: ResolutionResult,
        now: DateTime<Utc>,
    ) -> ResolutionResult {
        if !self.config.enabled || candidates.is_empty() {
            return base;
        }
        let Some(records) = self.users.get(user) else {
            return base;
        };
        let text = normalize_message(message);
        let matching: Vec<&UserPreferenceRecord> = records
            .values()
            .filter(|r| !r.signature.is_empty() && text.contains(r.signature.as_str()))
            .collect();
        if matching.is_empty() {
            return base;
        }

        let mut best: Option<(&MediaItem, f32)> = None;
        for (index, candidate) in candidates.iter().enumerate() {
            let rank = candidates.len() - 1 - index;
            let score = self.score(candidate, rank, &matching, now);
            // `>=` lets later (more recent) candidates win ties
            if score > 0.0 && best.map_or(true, |(_, s)| score >= s) {
                best = Some((candidate, score));
            }
        }

        let Some((item, score)) = best else {
            return base;
        };
        debug!(user, score, records = matching.len(), "Preferences override");

        let mut result = ResolutionResult::from_item(
            item,
            Confidence::High,
            Strategy::Preference,
            format!(
                "{}; adjusted by learned preferences ({} record(s), score {:.2})",
                base.reasoning,
                matching.len(),
                score
            ),
        );
        result.metadata = base.metadata;
        result.insert_metadata("preferenceScore", serde_json::json!(score));
        result.insert_metadata("baseStrategy", serde_json::json!(base.strategy.as_str()));
        result
    }

    fn score(
        &self,
        candidate: &MediaItem,
        rank: usize,
        records: &[&UserPreferenceRecord],
        now: DateTime<Utc>,
    ) -> f32 {
        let window = RecencyWindow::from_rank(rank);
        let caption_keywords = candidate
            .caption
            .as_deref()
            .map(extract_keywords)
            .unwrap_or_default();

        records
            .iter()
            .map(|record| {
                let accuracy = record.accuracy_at(now, &self.config);
                let mut score = 0.0;
                if record.preferred_kinds.contains(&candidate.kind) {
                    score += self.config.kind_bonus * accuracy;
                }
                if record.preferred_roles.contains(&candidate.role) {
                    score += self.config.role_bonus * accuracy;
                }
                if record.preferred_windows.contains(&window) {
                    score += self.config.recency_bonus * accuracy;
                }
                for (keyword, weight) in &record.keyword_weights {
                    if caption_keywords.contains(keyword) {
                        score += self.config.keyword_bonus * weight * accuracy;
                    }
                }
                score
            })
            .sum()
    }

    /// Configured record lifetime; `None` disables age pruning
    fn max_age(&self) -> Option<Duration> {
        if self.config.max_age_days <= 0 {
            return None;
        }
        Duration::try_days(self.config.max_age_days)
    }

    /// Drop every user's records older than the configured maximum age
    pub fn prune_expired(&self) -> usize {
        self.prune_expired_at(Utc::now())
    }

    pub fn prune_expired_at(&self, now: DateTime<Utc>) -> usize {
        match self.max_age() {
            Some(max_age) => self.prune_at(max_age, now),
            None => 0,
        }
    }

    /// Drop records unused for longer than `max_age`; returns how many went
    pub fn prune(&self, max_age: Duration) -> usize {
        self.prune_at(max_age, Utc::now())
    }

    pub fn prune_at(&self, max_age: Duration, now: DateTime<Utc>) -> usize {
        let mut removed = 0;
        for mut entry in self.users.iter_mut() {
            let before = entry.len();
            entry.retain(|_, record| now - record.last_used <= max_age);
            removed += before - entry.len();
        }
        self.users.retain(|_, records| !records.is_empty());
        if removed > 0 {
            info!("Pruned {} stale preference records", removed);
        }
        removed
    }

    /// Records of one user, ordered by signature
    pub fn snapshot(&self, user: &str) -> Vec<UserPreferenceRecord> {
        self.users
            .get(user)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Replace one user's records
    pub fn restore(&self, user: &str, records: Vec<UserPreferenceRecord>) {
        let map: BTreeMap<String, UserPreferenceRecord> = records
            .into_iter()
            .map(|record| (record.signature.clone(), record))
            .collect();
        if map.is_empty() {
            self.users.remove(user);
        } else {
            self.users.insert(user.to_string(), map);
        }
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }
}

/// Whether a message keyword describes an item with the given caption keywords
fn describes(keyword: &str, caption_keywords: &[String]) -> bool {
    caption_keywords
        .iter()
        .any(|k| k == keyword || share_root(k, keyword) || are_synonyms(k, keyword))
}
