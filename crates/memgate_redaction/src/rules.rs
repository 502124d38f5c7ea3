//! The ordered pattern table. Order matters: broader shapes (email, phone)
//! run before narrower structural ones (SSN, account numbers) that could
//! otherwise match a substring of something already handled.

use regex::{Captures, Regex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Low,
    Medium,
    High,
}

pub enum Replacement {
    Literal(&'static str),
    Fn(fn(&Captures) -> String),
}

pub struct RedactionRule {
    pub name: &'static str,
    pub regex: Regex,
    pub severity: Severity,
    pub replacement: Replacement,
}

fn label_aware_replacement(caps: &Captures) -> String {
    let label = caps.get(1).map(|m| m.as_str().to_lowercase()).unwrap_or_default();
    let placeholder = match label.as_str() {
        "password" | "pwd" => "[REDACTED_PASSWORD]",
        "api key" => "[REDACTED_API_KEY]",
        "access key" => "[REDACTED_ACCESS_KEY]",
        "token" => "[REDACTED_TOKEN]",
        _ => "[REDACTED_SECRET]",
    };
    let label_text = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    let sep = caps.get(2).map(|m| m.as_str()).unwrap_or(":");
    format!("{label_text}{sep}{placeholder}")
}

/// Build the required pattern set, in spec order.
pub fn default_rules() -> Vec<RedactionRule> {
    vec![
        RedactionRule {
            name: "email",
            regex: Regex::new(r"(?i)\b[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}\b").unwrap(),
            severity: Severity::Medium,
            replacement: Replacement::Literal("[REDACTED_EMAIL]"),
        },
        RedactionRule {
            name: "phone",
            regex: Regex::new(r"(?:\+\d{1,3}[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b").unwrap(),
            severity: Severity::Medium,
            replacement: Replacement::Literal("[REDACTED_PHONE]"),
        },
        RedactionRule {
            name: "ssn",
            regex: Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap(),
            severity: Severity::High,
            replacement: Replacement::Literal("[REDACTED_SSN]"),
        },
        RedactionRule {
            name: "credit_card",
            regex: Regex::new(r"\b(?:\d[ -]?){13,16}\b").unwrap(),
            severity: Severity::High,
            replacement: Replacement::Literal("[REDACTED_CREDIT_CARD]"),
        },
        RedactionRule {
            name: "financial_amount",
            regex: Regex::new(r"[$₹€£]\s?\d+(?:,\d{3})*(?:\.\d+)?\s?[kKmMbB]?\b").unwrap(),
            severity: Severity::Medium,
            replacement: Replacement::Literal("[REDACTED_FINANCIAL_AMOUNT]"),
        },
        RedactionRule {
            name: "provider_api_key",
            regex: Regex::new(r"\b(?:sk_live_|sk-|pk_test_)[A-Za-z0-9]{10,}\b").unwrap(),
            severity: Severity::High,
            replacement: Replacement::Literal("[REDACTED_API_KEY]"),
        },
        RedactionRule {
            name: "aws_access_key",
            regex: Regex::new(r"\bAKIA[A-Z0-9]{16}\b").unwrap(),
            severity: Severity::High,
            replacement: Replacement::Literal("[REDACTED_AWS_ACCESS_KEY]"),
        },
        RedactionRule {
            name: "jwt",
            regex: Regex::new(r"\beyJ[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\b").unwrap(),
            severity: Severity::High,
            replacement: Replacement::Literal("[REDACTED_JWT]"),
        },
        RedactionRule {
            name: "labeled_secret",
            regex: Regex::new(r"(?i)\b(api key|token|secret|password|pwd|access key)\b\s*([:=])\s*[^\s\[\]]{8,}").unwrap(),
            severity: Severity::High,
            replacement: Replacement::Fn(label_aware_replacement),
        },
        RedactionRule {
            name: "bank_account",
            regex: Regex::new(r"(?i)\baccount\b\s*[:=]\s*\d{7,}").unwrap(),
            severity: Severity::High,
            replacement: Replacement::Literal("[REDACTED_ACCOUNT_NUMBER]"),
        },
        RedactionRule {
            name: "project_code",
            regex: Regex::new(r"(?i)\bproject code\b\s*[:=]?\s*[A-Za-z]-\d{3,}").unwrap(),
            severity: Severity::High,
            replacement: Replacement::Literal("[REDACTED_PROJECT_CODE]"),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_order_matches_spec_sequence() {
        let names: Vec<&str> = default_rules().iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            vec![
                "email",
                "phone",
                "ssn",
                "credit_card",
                "financial_amount",
                "provider_api_key",
                "aws_access_key",
                "jwt",
                "labeled_secret",
                "bank_account",
                "project_code",
            ]
        );
    }
}
