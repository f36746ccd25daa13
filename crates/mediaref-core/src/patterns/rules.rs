//! Pattern rules and their resolver policies
//!
//! Rules are data: a compiled regex, a weight and a tagged resolver. Per-kind
//! rule lists are composed from the templates below by substituting the kind's
//! nouns for `{noun}`.

use regex::{Captures, Regex};
use tracing::warn;

use crate::error::Result;
use crate::media::{last_by_role, AuthorRole, MediaItem};

/// How a matched rule picks a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleResolver {
    /// Most recent item
    Demonstrative,
    /// Ordinal word in the `ord` capture group
    Ordinal,
    /// 1-based number in the `num` capture group
    Numbered,
    /// "last" or "previous" word in the `rec` capture group
    Recency,
    /// Most recent assistant-authored item
    LastAssistant,
    /// Most recent user-authored item
    LastUser,
}

impl RuleResolver {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Demonstrative => "demonstrative",
            Self::Ordinal => "ordinal",
            Self::Numbered => "numbered",
            Self::Recency => "recency",
            Self::LastAssistant => "last_assistant",
            Self::LastUser => "last_user",
        }
    }

    /// Pick a candidate (sorted oldest first) for a successful match
    pub fn select<'a>(
        &self,
        captures: &Captures<'_>,
        candidates: &'a [MediaItem],
    ) -> Option<&'a MediaItem> {
        match self {
            Self::Demonstrative => candidates.last(),
            Self::Ordinal => {
                let word = captures.name("ord")?.as_str();
                match parse_ordinal(word)? {
                    OrdinalPosition::FromStart(n) => candidates.get(n.checked_sub(1)?),
                    OrdinalPosition::FromEnd(n) => candidates.iter().rev().nth(n),
                }
            }
            Self::Numbered => {
                let n: usize = captures.name("num")?.as_str().parse().ok()?;
                candidates.get(n.checked_sub(1)?)
            }
            Self::Recency => {
                let word = captures.name("rec")?.as_str();
                if is_previous_word(word) {
                    candidates.iter().rev().nth(1)
                } else {
                    candidates.last()
                }
            }
            Self::LastAssistant => last_by_role(candidates, AuthorRole::Assistant),
            Self::LastUser => last_by_role(candidates, AuthorRole::User),
        }
    }
}

/// Where an ordinal word points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrdinalPosition {
    /// 1-based from the oldest item
    FromStart(usize),
    /// 0-based from the newest item
    FromEnd(usize),
}

/// Ordinal stems, checked in order. Russian entries are stems so every case
/// ending matches.
const ORDINAL_WORDS: &[(&str, usize)] = &[
    ("first", 1),
    ("second", 2),
    ("third", 3),
    ("fourth", 4),
    ("fifth", 5),
    ("sixth", 6),
    ("seventh", 7),
    ("eighth", 8),
    ("ninth", 9),
    ("tenth", 10),
    ("перв", 1),
    ("втор", 2),
    ("трет", 3),
    ("четверт", 4),
    ("пят", 5),
    ("шест", 6),
    ("седьм", 7),
    ("восьм", 8),
    ("девят", 9),
    ("десят", 10),
];

/// Parse an ordinal word ("first", "3rd", "второе", "second to last")
pub fn parse_ordinal(word: &str) -> Option<OrdinalPosition> {
    let word = word.trim().to_lowercase();
    if word.starts_with("предпоследн")
        || word.starts_with("penultimate")
        || word.ends_with("to last")
        || word.ends_with("to-last")
    {
        return Some(OrdinalPosition::FromEnd(1));
    }

    let digits: String = word.chars().take_while(|c| c.is_ascii_digit()).collect();
    if !digits.is_empty() {
        return digits
            .parse()
            .ok()
            .filter(|n| *n > 0)
            .map(OrdinalPosition::FromStart);
    }

    ORDINAL_WORDS
        .iter()
        .find(|(stem, _)| word.starts_with(stem))
        .map(|(_, n)| OrdinalPosition::FromStart(*n))
}

fn is_previous_word(word: &str) -> bool {
    let word = word.to_lowercase();
    ["previous", "prior", "preceding", "предыдущ", "прошл"]
        .iter()
        .any(|w| word.starts_with(w))
}

/// A weighted text matcher paired with a resolver
#[derive(Debug, Clone)]
pub struct PatternRule {
    pub regex: Regex,
    pub weight: f32,
    pub description: String,
    pub resolver: RuleResolver,
}

impl PatternRule {
    pub fn new(
        pattern: &str,
        weight: f32,
        description: impl Into<String>,
        resolver: RuleResolver,
    ) -> Result<Self> {
        Ok(Self {
            regex: Regex::new(pattern)?,
            weight: weight.clamp(0.0, 1.0),
            description: description.into(),
            resolver,
        })
    }

    /// Candidate selected by this rule, if the text matches and the resolver
    /// finds one
    pub fn apply<'a>(&self, text: &str, candidates: &'a [MediaItem]) -> Option<&'a MediaItem> {
        let captures = self.regex.captures(text)?;
        self.resolver.select(&captures, candidates)
    }
}

/// Noun alternations for one kind, as regex fragments
#[derive(Debug, Clone, Copy)]
pub struct KindNouns {
    pub english: &'static str,
    pub russian: &'static str,
}

/// Locale of a template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Locale {
    English,
    Russian,
}

struct RuleTemplate {
    locale: Locale,
    pattern: &'static str,
    weight: f32,
    description: &'static str,
    resolver: RuleResolver,
}

const EN_ORDINAL: &str = r"second[\s-]+to[\s-]+last|next[\s-]+to[\s-]+last|penultimate|first|second|third|fourth|fifth|sixth|seventh|eighth|ninth|tenth|\d{1,3}(?:st|nd|rd|th)";
const RU_ORDINAL: &str = r"предпоследн\w*|перв\w*|втор\w*|трет\w*|четверт\w*|пят\w*|шест\w*|седьм\w*|восьм\w*|девят\w*|десят\w*";

/// Declaration order is the tie-breaker between equally weighted rules
static TEMPLATES: &[RuleTemplate] = &[
    RuleTemplate {
        locale: Locale::English,
        pattern: r"\b(?:the\s+)?(?P<ord>{ordinal})\s+(?:{noun}|one)\b",
        weight: 0.95,
        description: "ordinal reference",
        resolver: RuleResolver::Ordinal,
    },
    RuleTemplate {
        locale: Locale::Russian,
        pattern: r"(?:^|[^\w])(?P<ord>{ordinal})\s+(?:{noun}|вариант\w*)",
        weight: 0.95,
        description: "ordinal reference (ru)",
        resolver: RuleResolver::Ordinal,
    },
    RuleTemplate {
        locale: Locale::English,
        pattern: r"\b(?:this|that|the\s+same)\s+(?:{noun})\b",
        weight: 0.9,
        description: "demonstrative reference",
        resolver: RuleResolver::Demonstrative,
    },
    RuleTemplate {
        locale: Locale::Russian,
        pattern: r"(?:^|[^\w])(?:это|этот|эта|эту|этой|этом|этого|тот|ту|той|том|того|то)\s+(?:{noun})",
        weight: 0.9,
        description: "demonstrative reference (ru)",
        resolver: RuleResolver::Demonstrative,
    },
    RuleTemplate {
        locale: Locale::English,
        pattern: r"\b(?:{noun})\s*(?:number\s*|no\.?\s*|#\s*)?(?P<num>\d{1,3})\b",
        weight: 0.85,
        description: "numbered reference",
        resolver: RuleResolver::Numbered,
    },
    RuleTemplate {
        locale: Locale::Russian,
        pattern: r"(?:{noun})\s*(?:номер\s*|№\s*|#\s*)?(?P<num>\d{1,3})\b",
        weight: 0.85,
        description: "numbered reference (ru)",
        resolver: RuleResolver::Numbered,
    },
    RuleTemplate {
        locale: Locale::English,
        pattern: r"(?:#|№|\bnumber\s+)(?P<num>\d{1,3})\b",
        weight: 0.85,
        description: "bare number reference",
        resolver: RuleResolver::Numbered,
    },
    RuleTemplate {
        locale: Locale::English,
        pattern: r"\b(?:the\s+)?(?P<rec>last|latest|most\s+recent|newest|previous|prior|preceding)\s+(?:{noun}|one)\b",
        weight: 0.8,
        description: "last/previous reference",
        resolver: RuleResolver::Recency,
    },
    RuleTemplate {
        locale: Locale::Russian,
        pattern: r"(?:^|[^\w])(?P<rec>последн\w*|предыдущ\w*|прошл\w*)\s+(?:{noun}|вариант\w*)",
        weight: 0.8,
        description: "last/previous reference (ru)",
        resolver: RuleResolver::Recency,
    },
    RuleTemplate {
        locale: Locale::English,
        pattern: r"\b(?:(?:i|i've|i\s+have|i\s+just)\s+(?:uploaded|attached|sent|shared)|(?:uploaded|attached)\s+(?:{noun}|one|file)|my\s+(?:own\s+)?(?:{noun}))\b",
        weight: 0.75,
        description: "uploaded reference",
        resolver: RuleResolver::LastUser,
    },
    RuleTemplate {
        locale: Locale::Russian,
        pattern: r"(?:^|[^\w])(?:загрузил\w*|загруженн\w*|прикрепил\w*|прикрепленн\w*|отправил\w*|скинул\w*|мо[йяеюи]\w*\s+(?:{noun}))",
        weight: 0.75,
        description: "uploaded reference (ru)",
        resolver: RuleResolver::LastUser,
    },
    RuleTemplate {
        locale: Locale::English,
        pattern: r"\b(?:you\s+(?:made|created|generated|drew|rendered)|(?:generated|created|rendered)\s+(?:{noun}|one)|(?:{noun})\s+you\s+(?:made|created|generated|drew))\b",
        weight: 0.7,
        description: "generated reference",
        resolver: RuleResolver::LastAssistant,
    },
    RuleTemplate {
        locale: Locale::Russian,
        pattern: r"(?:^|[^\w])(?:сгенерир\w*|созданн\w*|создал\w*|сделал\w*|сделанн\w*|нарисовал\w*|нарисованн\w*)",
        weight: 0.7,
        description: "generated reference (ru)",
        resolver: RuleResolver::LastAssistant,
    },
    RuleTemplate {
        locale: Locale::English,
        pattern: r"\b(?:this|that)\b",
        weight: 0.5,
        description: "bare demonstrative",
        resolver: RuleResolver::Demonstrative,
    },
    RuleTemplate {
        locale: Locale::Russian,
        pattern: r"(?:^|[^\w])(?:это|этот|эту|эта)(?:$|[^\w])",
        weight: 0.5,
        description: "bare demonstrative (ru)",
        resolver: RuleResolver::Demonstrative,
    },
];

/// Build the rule list for a kind from the shared templates.
///
/// Templates that fail to compile for a given noun set are logged and left
/// out rather than failing the whole registry.
pub fn compose_rules(nouns: &KindNouns) -> Vec<PatternRule> {
    TEMPLATES
        .iter()
        .filter_map(|template| {
            let (noun, ordinal) = match template.locale {
                Locale::English => (nouns.english, EN_ORDINAL),
                Locale::Russian => (nouns.russian, RU_ORDINAL),
            };
            let pattern = format!(
                "(?i){}",
                template
                    .pattern
                    .replace("{noun}", noun)
                    .replace("{ordinal}", ordinal)
            );
            let rule = PatternRule::new(
                &pattern,
                template.weight,
                template.description,
                template.resolver,
            );
            match rule {
                Ok(rule) => Some(rule),
                Err(e) => {
                    warn!("Skipping pattern rule '{}': {}", template.description, e);
                    None
                }
            }
        })
        .collect()
}
