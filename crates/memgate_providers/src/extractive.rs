//! Deterministic extractive selection: the fallback every generation mode
//! ultimately lands on when a remote answer can't be trusted.

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "what", "my", "your", "of", "to", "in", "on",
    "for", "and", "or", "do", "does", "did", "it", "this", "that", "i", "you", "me", "be",
];

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= 2 && !STOPWORDS.contains(w))
        .map(|w| w.to_string())
        .collect()
}

fn stem(word: &str) -> String {
    if let Some(s) = word.strip_suffix("ies") {
        return format!("{s}y");
    }
    if let Some(s) = word.strip_suffix("ing") {
        return s.to_string();
    }
    if let Some(s) = word.strip_suffix("ed") {
        return s.to_string();
    }
    if let Some(s) = word.strip_suffix("es") {
        return s.to_string();
    }
    if let Some(s) = word.strip_suffix('s') {
        return s.to_string();
    }
    word.to_string()
}

fn line_score(query_tokens: &[String], line: &str) -> usize {
    let line_tokens: Vec<String> = tokenize(line).iter().map(|t| stem(t)).collect();
    query_tokens
        .iter()
        .map(|t| stem(t))
        .filter(|qt| line_tokens.iter().any(|lt| lt == qt))
        .count()
}

fn expresses_name_intent(query: &str) -> bool {
    query.to_lowercase().split_whitespace().any(|w| w == "name")
}

fn is_line_index_tag(word: &str) -> bool {
    word.starts_with('[')
        && word.ends_with(']')
        && word.len() > 2
        && word[1..word.len() - 1].chars().all(|c| c.is_ascii_digit())
}

fn looks_like_name(line: &str) -> bool {
    let words: Vec<&str> = line.split_whitespace().skip_while(|w| is_line_index_tag(w)).collect();
    if words.len() < 2 || words.len() > 4 {
        return false;
    }
    words.iter().all(|w| {
        let alpha: String = w.chars().filter(|c| c.is_alphabetic()).collect();
        !alpha.is_empty()
            && alpha.len() == w.len()
            && (alpha.chars().all(|c| c.is_uppercase())
                || (alpha.chars().next().unwrap().is_uppercase()
                    && alpha.chars().skip(1).all(|c| c.is_lowercase())))
    })
}

/// Best matching line from `context_lines` by tokenized lexical overlap
/// with `query`, falling back to a name-shape heuristic when the query
/// itself expresses personal intent and nothing scored above zero.
pub fn select_extractive_line(context_lines: &[String], query: &str) -> Option<String> {
    let tokens = tokenize(query);
    if !tokens.is_empty() {
        if let Some(best) = context_lines
            .iter()
            .map(|line| (line_score(&tokens, line), line))
            .filter(|(score, _)| *score > 0)
            .max_by_key(|(score, _)| *score)
        {
            return Some(best.1.clone());
        }
    }

    if expresses_name_intent(query) {
        return context_lines.iter().find(|line| looks_like_name(line)).cloned();
    }

    None
}
