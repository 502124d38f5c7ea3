//! Pure lexical helpers backing the search reranker: tokenization,
//! stopword filtering, light morphological expansion, phrase/keyword
//! scoring, and personal-intent shape detection.
//!
//! Kept dependency-free and side-effect-free so the guardrail behavior is
//! exhaustively unit-testable without touching a table or an embedder.

use std::collections::HashSet;

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "what", "my", "your", "of", "to", "in", "on",
    "for", "and", "or", "do", "does", "did", "it", "this", "that", "i", "you", "me", "be",
];

/// Lowercase, strip non-alphanumeric runs to single spaces, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_was_space = false;
    for ch in s.to_lowercase().chars() {
        if ch.is_alphanumeric() {
            out.push(ch);
            last_was_space = false;
        } else if !last_was_space {
            out.push(' ');
            last_was_space = true;
        }
    }
    out.trim().to_string()
}

/// Tokens of length >= 2 that aren't stopwords, deduplicated, in first-seen order.
pub fn query_tokens(query: &str) -> Vec<String> {
    let normalized = normalize_text(query);
    let mut seen = HashSet::new();
    let mut tokens = Vec::new();
    for word in normalized.split_whitespace() {
        if word.len() < 2 || STOPWORDS.contains(&word) {
            continue;
        }
        if seen.insert(word.to_string()) {
            tokens.push(word.to_string());
        }
    }
    tokens
}

/// Strip trailing `s`, `es`, `ies->y`, `ed`, `ing`, `ence(s)` — a light
/// morphological fold so "emails" matches "email" and "contacted" matches
/// "contact".
pub fn morphological_stem(word: &str) -> String {
    if let Some(stem) = word.strip_suffix("ences") {
        return format!("{stem}ence");
    }
    if let Some(stem) = word.strip_suffix("ence") {
        return stem.to_string();
    }
    if let Some(stem) = word.strip_suffix("ies") {
        return format!("{stem}y");
    }
    if let Some(stem) = word.strip_suffix("ing") {
        return stem.to_string();
    }
    if let Some(stem) = word.strip_suffix("ed") {
        return stem.to_string();
    }
    if let Some(stem) = word.strip_suffix("es") {
        return stem.to_string();
    }
    if let Some(stem) = word.strip_suffix('s') {
        return stem.to_string();
    }
    word.to_string()
}

fn tokens_match(query_token: &str, row_token: &str) -> bool {
    if query_token == row_token || row_token.starts_with(query_token) || query_token.starts_with(row_token) {
        return true;
    }
    let qs = morphological_stem(query_token);
    let rs = morphological_stem(row_token);
    qs == rs || rs.starts_with(&qs) || qs.starts_with(&rs)
}

/// Normalized concatenation of (text, category, source) searched for
/// phrase containment and keyword hits.
pub fn row_haystack(text: &str, category: Option<&str>, source: &str) -> String {
    let mut parts = vec![text.to_string()];
    if let Some(c) = category {
        parts.push(c.to_string());
    }
    parts.push(source.to_string());
    normalize_text(&parts.join(" "))
}

pub fn phrase_match(normalized_query: &str, haystack: &str) -> bool {
    !normalized_query.is_empty() && haystack.contains(normalized_query)
}

/// Count of distinct query tokens that match any haystack token via
/// prefix-or-equality, with morphological expansion.
pub fn keyword_hits(query_tokens: &[String], haystack: &str) -> usize {
    let haystack_tokens: Vec<&str> = haystack.split_whitespace().collect();
    query_tokens
        .iter()
        .filter(|qt| haystack_tokens.iter().any(|rt| tokens_match(qt, rt)))
        .count()
}

/// Distance multiplier from spec §4.2 step 5: phrase match beats keyword
/// hits; no match leaves distance untouched.
pub fn boost_multiplier(phrase_match: bool, hits: usize) -> f32 {
    if phrase_match {
        0.5
    } else if hits > 0 {
        (1.0 - 0.1 * hits as f32).max(0.6)
    } else {
        1.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersonalIntent {
    Name,
    Contact,
    Email,
}

/// Detects whether the query itself is asking about a name/contact/email,
/// independent of whether the stored text contains those literal words.
pub fn detect_personal_intent(normalized_query: &str) -> Option<PersonalIntent> {
    let words: Vec<&str> = normalized_query.split_whitespace().collect();
    if words.iter().any(|w| *w == "name") {
        return Some(PersonalIntent::Name);
    }
    if words.iter().any(|w| matches!(*w, "phone" | "mobile" | "contact")) {
        return Some(PersonalIntent::Contact);
    }
    if words.iter().any(|w| *w == "email") {
        return Some(PersonalIntent::Email);
    }
    None
}

/// Does the raw (non-normalized) row text have the shape implied by
/// `intent` — a title-case/all-caps multi-word name, a phone-like digit
/// run, or an email address?
pub fn matches_intent_shape(intent: PersonalIntent, raw_text: &str) -> bool {
    match intent {
        PersonalIntent::Name => looks_like_name(raw_text),
        PersonalIntent::Contact => looks_like_phone(raw_text),
        PersonalIntent::Email => looks_like_email(raw_text),
    }
}

fn looks_like_name(text: &str) -> bool {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() < 2 || words.len() > 4 {
        return false;
    }
    words.iter().all(|w| {
        let alpha: String = w.chars().filter(|c| c.is_alphabetic()).collect();
        if alpha.is_empty() || alpha.len() != w.len() {
            return false;
        }
        let all_caps = alpha.chars().all(|c| c.is_uppercase());
        let title_case = alpha.chars().next().map(|c| c.is_uppercase()).unwrap_or(false)
            && alpha.chars().skip(1).all(|c| c.is_lowercase());
        all_caps || title_case
    })
}

fn looks_like_phone(text: &str) -> bool {
    let digit_run: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if digit_run.len() < 7 {
        return false;
    }
    let allowed_punct = |c: char| c.is_ascii_digit() || matches!(c, '+' | '-' | '(' | ')' | ' ');
    text.chars().all(allowed_punct)
}

fn looks_like_email(text: &str) -> bool {
    match text.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    }
}
