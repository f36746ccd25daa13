//! Weighted pattern matching
//!
//! Every rule is evaluated against the normalized message. Among rules that
//! match *and* whose resolver yields a candidate, the highest weight wins and
//! declaration order breaks ties, so the outcome never depends on evaluation
//! order.

mod rules;

pub use rules::{
    compose_rules, parse_ordinal, KindNouns, OrdinalPosition, PatternRule, RuleResolver,
};

use tracing::debug;

use crate::config::PatternConfig;
use crate::media::{Confidence, MediaItem, ResolutionResult, Strategy};
use crate::semantic::normalize_message;
use crate::strategy::ReferenceStrategy;

/// Winning rule and the candidate it selected
#[derive(Debug, Clone, Copy)]
pub struct PatternMatch<'a> {
    pub rule_index: usize,
    pub rule: &'a PatternRule,
    pub item: &'a MediaItem,
}

/// Ordered rule list for one media kind
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    rules: Vec<PatternRule>,
    high_confidence_weight: f32,
}

impl PatternMatcher {
    pub fn new(rules: Vec<PatternRule>, config: &PatternConfig) -> Self {
        Self {
            rules,
            high_confidence_weight: config.high_confidence_weight,
        }
    }

    /// Matcher built from the shared templates for the given nouns
    pub fn for_nouns(nouns: &KindNouns, config: &PatternConfig) -> Self {
        Self::new(compose_rules(nouns), config)
    }

    /// Append a rule; it ranks after every existing rule of equal weight
    pub fn with_rule(mut self, rule: PatternRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[PatternRule] {
        &self.rules
    }

    /// Evaluate all rules and pick the winner
    pub fn evaluate<'a>(
        &'a self,
        message: &str,
        candidates: &'a [MediaItem],
    ) -> Option<PatternMatch<'a>> {
        if candidates.is_empty() {
            return None;
        }
        let text = normalize_message(message);

        let mut best: Option<PatternMatch<'a>> = None;
        for (rule_index, rule) in self.rules.iter().enumerate() {
            let Some(item) = rule.apply(&text, candidates) else {
                continue;
            };
            // Strictly greater keeps the earliest rule on ties
            if best.map_or(true, |b| rule.weight > b.rule.weight) {
                best = Some(PatternMatch {
                    rule_index,
                    rule,
                    item,
                });
            }
        }

        if let Some(found) = &best {
            debug!(
                rule = %found.rule.description,
                weight = found.rule.weight,
                resolver = found.rule.resolver.as_str(),
                "Pattern rule selected"
            );
        }
        best
    }

    /// Confidence tier for a rule weight
    pub fn confidence_for(&self, weight: f32) -> Confidence {
        if weight > self.high_confidence_weight {
            Confidence::High
        } else {
            Confidence::Medium
        }
    }
}

impl ReferenceStrategy for PatternMatcher {
    fn name(&self) -> &'static str {
        "pattern"
    }

    fn resolve(&self, message: &str, candidates: &[MediaItem]) -> Option<ResolutionResult> {
        let found = self.evaluate(message, candidates)?;
        let mut result = ResolutionResult::from_item(
            found.item,
            self.confidence_for(found.rule.weight),
            Strategy::Pattern,
            format!(
                "Pattern match: {} (weight {:.2})",
                found.rule.description, found.rule.weight
            ),
        );
        result.insert_metadata("patternWeight", serde_json::json!(found.rule.weight));
        Some(result)
    }
}
