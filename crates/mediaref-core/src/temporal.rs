//! Relative-time references
//!
//! Maps phrases like "2 hours ago" or "вчера" onto a target instant (or an
//! hour-of-day bucket) and picks the closest candidate. Scores decay with the
//! age of the chosen item. Not part of the default pipeline; register it on
//! the resolver builder to enable it.

use chrono::{DateTime, Duration, FixedOffset, Offset, Timelike, Utc};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::debug;

use crate::config::TemporalConfig;
use crate::media::{Confidence, MediaItem, ResolutionResult, Strategy};
use crate::semantic::normalize_message;
use crate::strategy::ReferenceStrategy;

/// What a temporal phrase points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TemporalTarget {
    JustNow,
    MinutesAgo,
    HoursAgo,
    DaysAgo(i64),
    CountedDaysAgo,
    LastWeek,
    Recently,
    LongAgo,
    /// Local hours `[start, end)`; wraps past midnight when start > end
    DayPart(u32, u32),
    Oldest,
    Newest,
}

struct TemporalRule {
    regex: Regex,
    weight: f32,
    description: &'static str,
    target: TemporalTarget,
}

fn rule(
    pattern: &str,
    weight: f32,
    description: &'static str,
    target: TemporalTarget,
) -> TemporalRule {
    TemporalRule {
        regex: Regex::new(pattern).unwrap(),
        weight,
        description,
        target,
    }
}

/// Checked in order; the first rule that matches and selects an item wins
static RULES: Lazy<Vec<TemporalRule>> = Lazy::new(|| {
    use TemporalTarget::*;
    vec![
        rule(
            r"\b(?:just\s+now|a\s+moment\s+ago)\b|только\s+что",
            0.9,
            "just now",
            JustNow,
        ),
        rule(
            r"\b(?P<n>\d+|an?|one|a\s+few|a\s+couple\s+of)\s+min(?:ute)?s?\s+ago\b|(?:^|[^\w])(?P<ru>\d+|пару|несколько)?\s*минут\w*\s+назад",
            0.85,
            "minutes ago",
            MinutesAgo,
        ),
        rule(
            r"\b(?P<n>\d+|an?|one|a\s+few|a\s+couple\s+of)\s+hours?\s+ago\b|(?:^|[^\w])(?P<ru>\d+|пару|несколько)?\s*час\w*\s+назад",
            0.85,
            "hours ago",
            HoursAgo,
        ),
        rule(
            r"\bday\s+before\s+yesterday\b|позавчера",
            0.85,
            "day before yesterday",
            DaysAgo(2),
        ),
        rule(r"\byesterday\b|(?:^|[^\w])вчера", 0.85, "yesterday", DaysAgo(1)),
        rule(
            r"\b(?P<n>\d+|a\s+few|a\s+couple\s+of|two|three)\s+days?\s+ago\b|(?:^|[^\w])(?P<ru>\d+|пару|несколько)?\s*(?:дня|дней|день)\s+назад",
            0.8,
            "days ago",
            CountedDaysAgo,
        ),
        rule(
            r"\blast\s+week\b|\ba\s+week\s+ago\b|на\s+прошлой\s+неделе|неделю\s+назад",
            0.75,
            "last week",
            LastWeek,
        ),
        rule(
            r"\b(?:the\s+)?very\s+first\b|\bthe\s+earliest\b|\boldest\b|сам(?:ое|ую|ый|ая)\s+(?:перв|ранн)\w*",
            0.8,
            "earliest",
            Oldest,
        ),
        rule(
            r"\bthe\s+latest\b|\bnewest\b|\bmost\s+recent\b|сам(?:ое|ую|ый|ая)\s+(?:свеж|нов|последн)\w*",
            0.8,
            "latest",
            Newest,
        ),
        rule(r"\brecent(?:ly)?\b|\blately\b|недавн\w*", 0.7, "recently", Recently),
        rule(
            r"\blong\s+(?:time\s+)?ago\b|\ba\s+while\s+(?:back|ago)\b|(?:^|[^\w])давно",
            0.6,
            "long ago",
            LongAgo,
        ),
        rule(r"\bmorning\b|(?:^|[^\w])утр\w*", 0.65, "morning", DayPart(5, 12)),
        rule(r"\bafternoon\b|(?:^|[^\w])днем", 0.65, "afternoon", DayPart(12, 17)),
        rule(
            r"\bevening\b|\btonight\b|(?:^|[^\w])вечер\w*",
            0.65,
            "evening",
            DayPart(17, 23),
        ),
        rule(
            r"\bat\s+night\b|\blast\s+night\b|(?:^|[^\w])ночь\w*|(?:^|[^\w])ночн\w*",
            0.65,
            "night",
            DayPart(23, 5),
        ),
    ]
});

/// Count in a relative phrase; words and missing counts default sensibly
fn parse_count(captures: &Captures<'_>) -> i64 {
    let raw = captures
        .name("n")
        .or_else(|| captures.name("ru"))
        .map(|m| m.as_str().trim().to_string());
    match raw.as_deref() {
        None => 1,
        Some(s) => s.parse().unwrap_or(match s {
            "two" | "пару" => 2,
            "three" => 3,
            s if s.starts_with("a couple") => 2,
            s if s.starts_with("a few") || s == "несколько" => 3,
            _ => 1,
        }),
    }
}

/// A temporal decision
#[derive(Debug, Clone)]
pub struct TemporalMatch<'a> {
    pub item: &'a MediaItem,
    pub score: f32,
    pub description: &'static str,
}

/// Relative-time strategy
#[derive(Debug, Clone)]
pub struct TemporalAnalyzer {
    config: TemporalConfig,
    now: Option<DateTime<Utc>>,
    offset: FixedOffset,
}

impl Default for TemporalAnalyzer {
    fn default() -> Self {
        Self::new(TemporalConfig::default())
    }
}

impl TemporalAnalyzer {
    pub fn new(config: TemporalConfig) -> Self {
        Self {
            config,
            now: None,
            offset: Utc.fix(),
        }
    }

    /// Pin "now" instead of reading the clock
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    /// Offset used for day-part buckets ("this morning")
    pub fn with_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    /// Linear decay from 1.0 at zero age to the floor at the decay window
    pub fn decay(&self, age: Duration) -> f32 {
        let floor = self.config.decay_floor.clamp(0.0, 1.0);
        let window = self.config.decay_window_days.max(f32::EPSILON);
        let age_days = age.num_seconds().max(0) as f32 / 86_400.0;
        (1.0 - (1.0 - floor) * age_days / window).max(floor)
    }

    /// Resolve against an explicit `now`; `candidates` are sorted oldest first
    pub fn analyze<'a>(
        &self,
        message: &str,
        candidates: &'a [MediaItem],
        now: DateTime<Utc>,
    ) -> Option<TemporalMatch<'a>> {
        if candidates.is_empty() {
            return None;
        }
        let text = normalize_message(message);
        RULES.iter().find_map(|rule| {
            let captures = rule.regex.captures(&text)?;
            let item = self.select(rule.target, &captures, candidates, now)?;
            let score = rule.weight * self.decay(now - item.timestamp);
            debug!(rule = rule.description, score, "Temporal rule selected");
            Some(TemporalMatch {
                item,
                score,
                description: rule.description,
            })
        })
    }

    fn select<'a>(
        &self,
        target: TemporalTarget,
        captures: &Captures<'_>,
        candidates: &'a [MediaItem],
        now: DateTime<Utc>,
    ) -> Option<&'a MediaItem> {
        match target {
            TemporalTarget::JustNow => closest_to(candidates, now),
            TemporalTarget::MinutesAgo => {
                closest_to(candidates, before(now, Duration::try_minutes(parse_count(captures)))?)
            }
            TemporalTarget::HoursAgo => {
                closest_to(candidates, before(now, Duration::try_hours(parse_count(captures)))?)
            }
            TemporalTarget::DaysAgo(days) => {
                closest_to(candidates, before(now, Duration::try_days(days))?)
            }
            TemporalTarget::CountedDaysAgo => {
                closest_to(candidates, before(now, Duration::try_days(parse_count(captures)))?)
            }
            TemporalTarget::LastWeek => {
                closest_to(candidates, before(now, Duration::try_weeks(1))?)
            }
            TemporalTarget::Recently => {
                let window = Duration::try_minutes(self.config.recent_window_minutes)?;
                candidates
                    .iter()
                    .rev()
                    .find(|item| now - item.timestamp <= window)
                    .or_else(|| candidates.last())
            }
            TemporalTarget::LongAgo | TemporalTarget::Oldest => candidates.first(),
            TemporalTarget::Newest => candidates.last(),
            TemporalTarget::DayPart(start, end) => candidates.iter().rev().find(|item| {
                let hour = item.timestamp.with_timezone(&self.offset).hour();
                if start <= end {
                    (start..end).contains(&hour)
                } else {
                    hour >= start || hour < end
                }
            }),
        }
    }
}

/// `now - offset`; `None` when either overflows the representable range
fn before(now: DateTime<Utc>, offset: Option<Duration>) -> Option<DateTime<Utc>> {
    now.checked_sub_signed(offset?)
}

/// Candidate with minimal distance to `target`; later items win ties
fn closest_to(candidates: &[MediaItem], target: DateTime<Utc>) -> Option<&MediaItem> {
    candidates
        .iter()
        .rev()
        .min_by_key(|item| (item.timestamp - target).num_seconds().abs())
}

impl ReferenceStrategy for TemporalAnalyzer {
    fn name(&self) -> &'static str {
        "temporal"
    }

    fn resolve(&self, message: &str, candidates: &[MediaItem]) -> Option<ResolutionResult> {
        let now = self.now.unwrap_or_else(Utc::now);
        let found = self.analyze(message, candidates, now)?;
        let mut result = ResolutionResult::from_item(
            found.item,
            Confidence::from_score(found.score),
            Strategy::Temporal,
            format!("Temporal match: {} (score {:.2})", found.description, found.score),
        );
        result.insert_metadata("temporalScore", serde_json::json!(found.score));
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{AuthorRole, MediaKind};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap()
    }

    fn history() -> Vec<MediaItem> {
        let at = |url: &str, ts: DateTime<Utc>| {
            MediaItem::new(url, MediaKind::Image, AuthorRole::Assistant, ts)
        };
        vec![
            at("three-days", now() - Duration::days(3)),
            at("yesterday-morning", Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()),
            at("two-hours", now() - Duration::hours(2)),
            at("five-minutes", now() - Duration::minutes(5)),
        ]
    }

    fn pick(message: &str) -> Option<String> {
        let items = history();
        TemporalAnalyzer::default()
            .analyze(message, &items, now())
            .map(|m| m.item.url.clone())
    }

    #[test]
    fn test_relative_phrases() {
        assert_eq!(pick("the one from just now").as_deref(), Some("five-minutes"));
        assert_eq!(pick("только что").as_deref(), Some("five-minutes"));
        assert_eq!(pick("2 hours ago").as_deref(), Some("two-hours"));
        assert_eq!(pick("2 часа назад").as_deref(), Some("two-hours"));
        assert_eq!(pick("a couple of hours ago").as_deref(), Some("two-hours"));
        // 11:55 is closer to "an hour ago" than 10:00
        assert_eq!(pick("an hour ago").as_deref(), Some("five-minutes"));
        assert_eq!(pick("10 minutes ago").as_deref(), Some("five-minutes"));
        assert_eq!(pick("yesterday").as_deref(), Some("yesterday-morning"));
        assert_eq!(pick("вчерашнюю, вчера").as_deref(), Some("yesterday-morning"));
        assert_eq!(pick("3 дня назад").as_deref(), Some("three-days"));
        assert_eq!(pick("last week").as_deref(), Some("three-days"));
    }

    #[test]
    fn test_buckets_and_extremes() {
        assert_eq!(pick("recently").as_deref(), Some("five-minutes"));
        assert_eq!(pick("недавно").as_deref(), Some("five-minutes"));
        assert_eq!(pick("давно").as_deref(), Some("three-days"));
        assert_eq!(pick("the very first one").as_deref(), Some("three-days"));
        assert_eq!(pick("самое свежее").as_deref(), Some("five-minutes"));
        assert_eq!(pick("this morning").as_deref(), Some("five-minutes"));
        assert_eq!(pick("in the evening"), None);
        assert_eq!(pick("no time words here"), None);
    }

    #[test]
    fn test_decay_is_linear_with_floor() {
        let analyzer = TemporalAnalyzer::default();
        assert!((analyzer.decay(Duration::zero()) - 1.0).abs() < 1e-6);
        assert!((analyzer.decay(Duration::days(7)) - 0.3).abs() < 1e-6);
        assert!((analyzer.decay(Duration::days(30)) - 0.3).abs() < 1e-6);
        let mid = analyzer.decay(Duration::hours(84));
        assert!((mid - 0.65).abs() < 1e-4);
    }

    #[test]
    fn test_strategy_confidence_follows_score() {
        let items = history();
        let analyzer = TemporalAnalyzer::default().with_now(now());

        let fresh = analyzer.resolve("just now", &items).unwrap();
        assert_eq!(fresh.confidence, Confidence::High);
        assert_eq!(fresh.strategy, Strategy::Temporal);

        // 0.6 * (1 - 0.7 * 3/7) = 0.42
        let old = analyzer.resolve("long ago", &items).unwrap();
        assert_eq!(old.confidence, Confidence::Medium);
    }

    #[test]
    fn test_day_parts_respect_offset() {
        let items = history();
        // At +03:00 every item falls between 12:00 and 15:00 local time
        let analyzer = TemporalAnalyzer::default()
            .with_utc_offset(FixedOffset::east_opt(3 * 3600).unwrap());
        assert!(analyzer.analyze("утром", &items, now()).is_none());
        let found = analyzer.analyze("днем", &items, now()).unwrap();
        assert_eq!(found.item.url, "five-minutes");
    }

    #[test]
    fn test_out_of_range_counts_select_nothing() {
        // Overflows the duration type, then the date range
        assert_eq!(pick("the one from 9999999999999 days ago"), None);
        assert_eq!(pick("qq 999999999999999999 minutes ago"), None);
        assert_eq!(pick("100000000000 days ago"), None);
        assert_eq!(pick("99999999999 hours ago"), None);
    }

    #[test]
    fn test_out_of_range_recent_window() {
        let analyzer = TemporalAnalyzer::new(TemporalConfig {
            recent_window_minutes: i64::MAX,
            ..TemporalConfig::default()
        });
        assert!(analyzer.analyze("recently", &history(), now()).is_none());
    }
}
