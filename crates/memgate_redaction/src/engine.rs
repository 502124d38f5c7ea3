//! Single left-to-right pass over the ordered rule table, producing
//! cleaned text plus risk/confidence scoring.

use crate::rules::{default_rules, RedactionRule, Replacement, Severity};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Low,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedactionResult {
    pub cleaned_text: String,
    pub redaction_count: usize,
    pub per_pattern_counts: HashMap<String, usize>,
    pub risk_level: RiskLevel,
    pub confidence: Confidence,
    pub synthetic_map: HashMap<String, String>,
}

pub struct RedactionEngine {
    rules: Vec<RedactionRule>,
}

impl Default for RedactionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RedactionEngine {
    pub fn new() -> Self {
        Self { rules: default_rules() }
    }

    pub fn redact(&self, text: &str) -> RedactionResult {
        let mut current = text.to_string();
        let mut per_pattern_counts = HashMap::new();
        let mut synthetic_map = HashMap::new();

        for rule in &self.rules {
            let count = RefCell::new(0usize);
            let replaced = rule.regex.replace_all(&current, |caps: &regex::Captures| {
                *count.borrow_mut() += 1;
                let matched = caps.get(0).map(|m| m.as_str().to_string()).unwrap_or_default();
                let output = match &rule.replacement {
                    Replacement::Literal(s) => s.to_string(),
                    Replacement::Fn(f) => f(caps),
                };
                let placeholder = placeholder_tag(&output);
                synthetic_map.insert(matched, placeholder);
                output
            });
            current = replaced.into_owned();

            let hit_count = *count.borrow();
            if hit_count > 0 {
                per_pattern_counts.insert(rule.name.to_string(), hit_count);
            }
        }

        let redaction_count: usize = per_pattern_counts.values().sum();
        let any_high_severity_fired = self
            .rules
            .iter()
            .any(|r| r.severity == Severity::High && per_pattern_counts.contains_key(r.name));
        let risk_level = if any_high_severity_fired || redaction_count >= 5 {
            RiskLevel::High
        } else {
            RiskLevel::Low
        };

        let confidence = if has_unresolved_sensitive_shape(&current) {
            Confidence::Low
        } else {
            Confidence::High
        };

        RedactionResult {
            cleaned_text: current,
            redaction_count,
            per_pattern_counts,
            risk_level,
            confidence,
            synthetic_map,
        }
    }
}

/// Pull the bracketed `[REDACTED_...]` tag out of a (possibly
/// label-prefixed) replacement string, for the synthetic map.
fn placeholder_tag(replacement: &str) -> String {
    match (replacement.find('['), replacement.rfind(']')) {
        (Some(start), Some(end)) if end > start => replacement[start..=end].to_string(),
        _ => replacement.to_string(),
    }
}

/// Fail-safe re-scan: a leaked sensitive shape degrades confidence even if
/// no rule matched it in this pass (spec §4.3).
fn has_unresolved_sensitive_shape(cleaned: &str) -> bool {
    use regex::Regex;
    use std::sync::OnceLock;

    static SSN: OnceLock<Regex> = OnceLock::new();
    static CREDIT_CARD: OnceLock<Regex> = OnceLock::new();
    static AWS_KEY: OnceLock<Regex> = OnceLock::new();
    static LABELED_SECRET: OnceLock<Regex> = OnceLock::new();

    let ssn = SSN.get_or_init(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap());
    let credit_card = CREDIT_CARD.get_or_init(|| Regex::new(r"\b(?:\d[ -]?){13,16}\b").unwrap());
    let aws_key = AWS_KEY.get_or_init(|| Regex::new(r"\bAKIA[A-Z0-9]{16}\b").unwrap());
    let labeled_secret = LABELED_SECRET.get_or_init(|| {
        Regex::new(r"(?i)\b(api key|token|secret|password|pwd|access key)\b\s*[:=]\s*(\S{8,})").unwrap()
    });

    let unresolved_labeled_secret = labeled_secret
        .captures_iter(cleaned)
        .any(|caps| !caps.get(2).map(|m| m.as_str()).unwrap_or_default().starts_with("[REDACTED_"));

    ssn.is_match(cleaned) || credit_card.is_match(cleaned) || aws_key.is_match(cleaned) || unresolved_labeled_secret
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_redaction_matches_contract_example() {
        let engine = RedactionEngine::new();
        let result = engine.redact("My number is 9876543210.");
        assert_eq!(result.cleaned_text, "My number is [REDACTED_PHONE].");
        assert_eq!(result.redaction_count, 1);
        assert_eq!(result.risk_level, RiskLevel::Low);
        assert_eq!(result.confidence, Confidence::High);
    }

    #[test]
    fn high_risk_block_scenario_redacts_all_four_categories() {
        let engine = RedactionEngine::new();
        let text = "Phone: +1-555-123-4567, Email: john.doe@example.com, Credit Card: 4532-1234-5678-9010, Salary: $85,000";
        let result = engine.redact(text);

        assert!(result.cleaned_text.contains("[REDACTED_PHONE]"));
        assert!(result.cleaned_text.contains("[REDACTED_EMAIL]"));
        assert!(result.cleaned_text.contains("[REDACTED_CREDIT_CARD]"));
        assert!(result.cleaned_text.contains("[REDACTED_FINANCIAL_AMOUNT]"));
        assert!(!result.cleaned_text.contains("555-123-4567"));
        assert!(!result.cleaned_text.contains("john.doe@example.com"));
        assert!(!result.cleaned_text.contains("4532-1234-5678-9010"));
        assert_eq!(result.risk_level, RiskLevel::High);
    }

    #[test]
    fn labeled_secret_preserves_label_context() {
        let engine = RedactionEngine::new();
        let result = engine.redact("api key: abcdef1234567890");
        assert!(result.cleaned_text.contains("api key"));
        assert!(result.cleaned_text.contains("[REDACTED_API_KEY]"));
        assert!(!result.cleaned_text.contains("abcdef1234567890"));
    }

    #[test]
    fn redaction_is_deterministic_for_same_input() {
        let engine = RedactionEngine::new();
        let a = engine.redact("Contact me at jane@example.com or 9876543210.");
        let b = engine.redact("Contact me at jane@example.com or 9876543210.");
        assert_eq!(a.cleaned_text, b.cleaned_text);
        assert_eq!(a.redaction_count, b.redaction_count);
    }

    #[test]
    fn risk_is_high_when_redaction_count_reaches_five_even_without_high_severity() {
        let engine = RedactionEngine::new();
        let text = "a@b.com c@d.com e@f.com g@h.com i@j.com";
        let result = engine.redact(text);
        assert_eq!(result.redaction_count, 5);
        assert_eq!(result.risk_level, RiskLevel::High);
    }

    #[test]
    fn leak_rescan_flags_ssn_shape_standalone() {
        assert!(has_unresolved_sensitive_shape("123-45-6789"));
        assert!(!has_unresolved_sensitive_shape("[REDACTED_SSN]"));
    }

    #[test]
    fn ssn_is_redacted_and_confidence_stays_high() {
        let engine = RedactionEngine::new();
        let result = engine.redact("123-45-6789");
        assert_eq!(result.confidence, Confidence::High);
        assert!(!result.cleaned_text.contains("123-45-6789"));
    }

    #[test]
    fn labeled_secret_does_not_depress_its_own_confidence() {
        let engine = RedactionEngine::new();
        let result = engine.redact("password: hunter2xyz");
        assert_eq!(result.confidence, Confidence::High);
        assert_eq!(result.redaction_count, 1);
    }

    #[test]
    fn redacting_already_redacted_text_is_idempotent() {
        let engine = RedactionEngine::new();
        let once = engine.redact("password: hunter2xyz");
        let twice = engine.redact(&once.cleaned_text);
        assert_eq!(twice.redaction_count, 0);
        assert_eq!(twice.cleaned_text, once.cleaned_text);
    }
}
