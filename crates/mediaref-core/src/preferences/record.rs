//! Learned preference records

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::PreferenceConfig;
use crate::media::{AuthorRole, MediaKind};

/// Rank bucket of a chosen item among its candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecencyWindow {
    /// Newest candidate
    Latest,
    /// Second or third newest
    Recent,
    Older,
}

impl RecencyWindow {
    /// Window for a rank counted from the newest (0 = newest)
    pub fn from_rank(rank: usize) -> Self {
        match rank {
            0 => Self::Latest,
            1 | 2 => Self::Recent,
            _ => Self::Older,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Latest => "latest",
            Self::Recent => "recent",
            Self::Older => "older",
        }
    }
}

/// What one user tends to mean by one signature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferenceRecord {
    pub signature: String,
    #[serde(default)]
    pub preferred_kinds: BTreeSet<MediaKind>,
    #[serde(default)]
    pub preferred_roles: BTreeSet<AuthorRole>,
    #[serde(default)]
    pub preferred_windows: BTreeSet<RecencyWindow>,
    /// Running average of how often each keyword described the chosen item
    #[serde(default)]
    pub keyword_weights: BTreeMap<String, f32>,
    pub usage_count: u32,
    pub last_used: DateTime<Utc>,
    /// Accuracy as of `last_used`
    pub accuracy: f32,
}

impl UserPreferenceRecord {
    pub fn new(signature: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            signature: signature.into(),
            preferred_kinds: BTreeSet::new(),
            preferred_roles: BTreeSet::new(),
            preferred_windows: BTreeSet::new(),
            keyword_weights: BTreeMap::new(),
            usage_count: 0,
            last_used: now,
            accuracy: 0.0,
        }
    }

    /// Fold one observation into the running average for `keyword`.
    ///
    /// Must be called before `usage_count` is bumped for this choice.
    pub fn observe_keyword(&mut self, keyword: &str, observation: f32) {
        let n = self.usage_count as f32;
        self.keyword_weights
            .entry(keyword.to_string())
            .and_modify(|w| *w = (*w * n + observation) / (n + 1.0))
            .or_insert(observation);
    }

    /// Time decay: 1.0 when just used, linearly down to the floor
    pub fn decay(&self, now: DateTime<Utc>, config: &PreferenceConfig) -> f32 {
        let floor = config.decay_floor.clamp(0.0, 1.0);
        let window = config.decay_days.max(f32::EPSILON);
        let age_days = (now - self.last_used).num_seconds().max(0) as f32 / 86_400.0;
        (1.0 - (1.0 - floor) * age_days / window).max(floor)
    }

    /// min(usage / saturation, 1) scaled by time decay
    pub fn accuracy_at(&self, now: DateTime<Utc>, config: &PreferenceConfig) -> f32 {
        let saturation = config.usage_saturation.max(1) as f32;
        let usage = (self.usage_count as f32 / saturation).min(1.0);
        usage * self.decay(now, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_window_from_rank() {
        assert_eq!(RecencyWindow::from_rank(0), RecencyWindow::Latest);
        assert_eq!(RecencyWindow::from_rank(2), RecencyWindow::Recent);
        assert_eq!(RecencyWindow::from_rank(3), RecencyWindow::Older);
    }

    #[test]
    fn test_keyword_running_average() {
        let mut record = UserPreferenceRecord::new("sunset", now());
        record.observe_keyword("sunset", 1.0);
        record.usage_count += 1;
        record.observe_keyword("sunset", 0.0);
        record.usage_count += 1;
        assert!((record.keyword_weights["sunset"] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_accuracy_saturates_and_decays() {
        let config = PreferenceConfig::default();
        let mut record = UserPreferenceRecord::new("x", now());
        record.usage_count = 5;
        assert!((record.accuracy_at(now(), &config) - 0.5).abs() < 1e-6);

        record.usage_count = 40;
        assert!((record.accuracy_at(now(), &config) - 1.0).abs() < 1e-6);
        let month_later = now() + Duration::days(30);
        assert!((record.accuracy_at(month_later, &config) - 0.5).abs() < 1e-6);
        let year_later = now() + Duration::days(365);
        assert!((record.accuracy_at(year_later, &config) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = UserPreferenceRecord::new("sunset", now());
        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("usageCount").is_some());
        assert!(json.get("keywordWeights").is_some());
    }
}
