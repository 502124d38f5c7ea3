//! memgate_config
//!
//! Parses environment into a typed config and reports `{config, warnings,
//! errors}` without ever panicking or exiting — the bootstrap decides what
//! to do with the diagnostics, this crate only collects them.

use memgate_embedding::{looks_like_gateway_token, EmbeddingProviderKind};
use memgate_providers::{normalize_provider_alias, GroundingMode};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrievalScope {
    Hybrid,
    FactsOnly,
    DocumentsOnly,
}

#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    pub scope: RetrievalScope,
    pub strict_match: bool,
    pub top_k: usize,
    pub max_result_chars: usize,
    pub embedding_dim: usize,
}

#[derive(Debug, Clone)]
pub struct ConsentConfig {
    pub ttl_ms: u64,
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub extractive_mode: bool,
    pub grounding_mode: GroundingMode,
    pub provider_alias: String,
    pub base_url: String,
    pub profile_id: Option<String>,
    pub model_id: String,
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub retrieval: RetrievalConfig,
    pub privacy_debug: bool,
    pub consent: ConsentConfig,
    pub orchestrator: OrchestratorConfig,
    pub event_ring_capacity: usize,
    pub embedding_provider: Option<EmbeddingProviderKind>,
    pub gemini_key: Option<String>,
    pub openai_compatible_key: Option<String>,
}

#[derive(Debug)]
pub struct ConfigReport {
    pub config: RuntimeConfig,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

fn get<'a>(vars: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    vars.get(key).map(|s| s.as_str()).filter(|s| !s.is_empty())
}

fn get_bool(vars: &HashMap<String, String>, key: &str, default: bool) -> bool {
    match get(vars, key) {
        Some(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        None => default,
    }
}

fn get_usize_clamped(
    vars: &HashMap<String, String>,
    key: &str,
    default: usize,
    min: usize,
    max: usize,
    warnings: &mut Vec<String>,
) -> usize {
    let raw = get(vars, key).and_then(|v| v.parse::<i64>().ok());
    let value = raw.unwrap_or(default as i64);
    if value < min as i64 {
        warnings.push(format!("{key}={value} below minimum {min}, clamped"));
        min
    } else if value > max as i64 {
        warnings.push(format!("{key}={value} above maximum {max}, clamped"));
        max
    } else {
        value as usize
    }
}

/// Parse a runtime config from an arbitrary key/value source (tests pass a
/// literal map; [`from_process_env`] wraps `std::env::vars()`).
pub fn parse_config(vars: &HashMap<String, String>) -> ConfigReport {
    let mut warnings = Vec::new();
    let mut errors = Vec::new();

    let scope = match get(vars, "MEMGATE_RETRIEVAL_SCOPE") {
        Some("facts_only") => RetrievalScope::FactsOnly,
        Some("documents_only") => RetrievalScope::DocumentsOnly,
        Some("hybrid") | None => RetrievalScope::Hybrid,
        Some(other) => {
            warnings.push(format!("unrecognized MEMGATE_RETRIEVAL_SCOPE='{other}', defaulting to hybrid"));
            RetrievalScope::Hybrid
        }
    };

    let top_k = get_usize_clamped(vars, "MEMGATE_TOP_K", 5, 1, 10, &mut warnings);
    let max_result_chars = get_usize_clamped(vars, "MEMGATE_MAX_CHARS", 500, 120, 2000, &mut warnings);
    let embedding_dim = get_usize_clamped(vars, "MEMGATE_EMBEDDING_DIM", 256, 1, 4096, &mut warnings);
    let event_ring_capacity = get_usize_clamped(vars, "MEMGATE_EVENT_RING_CAPACITY", 200, 1, 100_000, &mut warnings);

    let retrieval = RetrievalConfig {
        scope,
        strict_match: get_bool(vars, "MEMGATE_STRICT_MATCH", true),
        top_k,
        max_result_chars,
        embedding_dim,
    };

    let consent = ConsentConfig {
        ttl_ms: get(vars, "MEMGATE_CONSENT_TTL_MS").and_then(|v| v.parse().ok()).unwrap_or(5 * 60 * 1000),
        enabled: get_bool(vars, "MEMGATE_CONSENT_ENABLED", true),
    };

    let grounding_mode = match get(vars, "MEMGATE_GROUNDING_MODE") {
        Some("exact") => GroundingMode::Exact,
        _ => GroundingMode::Excerpt,
    };

    let provider_alias_raw = get(vars, "MEMGATE_PROVIDER_ALIAS").unwrap_or("openai-compatible").to_string();
    let provider_alias = normalize_provider_alias(&provider_alias_raw).to_string();
    let base_url = get(vars, "MEMGATE_PROVIDER_BASE_URL").unwrap_or("").to_string();
    let profile_id = get(vars, "MEMGATE_PROVIDER_PROFILE_ID").map(|s| s.to_string());
    let model_id = get(vars, "MEMGATE_PROVIDER_MODEL_ID").unwrap_or("").to_string();

    let orchestrator = OrchestratorConfig {
        extractive_mode: get_bool(vars, "MEMGATE_EXTRACTIVE_MODE", true),
        grounding_mode,
        provider_alias: provider_alias.clone(),
        base_url: base_url.clone(),
        profile_id: profile_id.clone(),
        model_id,
    };

    let gemini_key = get(vars, "MEMGATE_GEMINI_API_KEY").map(|s| s.to_string());
    let openai_compatible_key = get(vars, "MEMGATE_OPENAI_COMPATIBLE_API_KEY").map(|s| s.to_string());
    let embedding_provider = match get(vars, "MEMGATE_EMBEDDING_PROVIDER") {
        Some("gemini") => Some(EmbeddingProviderKind::Gemini),
        Some("openai-compatible") => Some(EmbeddingProviderKind::OpenAiCompatible),
        Some("local") => Some(EmbeddingProviderKind::Local),
        Some(other) => {
            warnings.push(format!("unrecognized MEMGATE_EMBEDDING_PROVIDER='{other}', inferring from credentials"));
            None
        }
        None => None,
    };

    if !orchestrator.extractive_mode {
        if provider_alias == "gemini" {
            match &gemini_key {
                None => errors.push("remote generation configured for gemini but MEMGATE_GEMINI_API_KEY is unset".into()),
                Some(key) if looks_like_gateway_token(key) => {
                    errors.push("MEMGATE_GEMINI_API_KEY looks like a gateway token, not a direct provider key".into())
                }
                Some(_) => {}
            }
            let has_profile = profile_id.is_some() || base_url.to_lowercase().contains("profile");
            if !has_profile {
                warnings.push("gemini provider configured without a profile id (standalone or embedded in base URL)".into());
            }
        } else if openai_compatible_key.is_none() {
            warnings.push("remote generation configured for openai-compatible but MEMGATE_OPENAI_COMPATIBLE_API_KEY is unset".into());
        }
    }

    if let Some(EmbeddingProviderKind::Gemini) = embedding_provider {
        if gemini_key.is_none() {
            errors.push("MEMGATE_EMBEDDING_PROVIDER=gemini requires MEMGATE_GEMINI_API_KEY".into());
        }
    }
    if let Some(EmbeddingProviderKind::OpenAiCompatible) = embedding_provider {
        if openai_compatible_key.is_none() {
            errors.push("MEMGATE_EMBEDDING_PROVIDER=openai-compatible requires MEMGATE_OPENAI_COMPATIBLE_API_KEY".into());
        }
    }

    let config = RuntimeConfig {
        retrieval,
        privacy_debug: get_bool(vars, "MEMGATE_PRIVACY_DEBUG", false),
        consent,
        orchestrator,
        event_ring_capacity,
        embedding_provider,
        gemini_key,
        openai_compatible_key,
    };

    ConfigReport { config, warnings, errors }
}

pub fn from_process_env() -> ConfigReport {
    let vars: HashMap<String, String> = std::env::vars().collect();
    parse_config(&vars)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn defaults_are_sane_and_error_free() {
        let report = parse_config(&HashMap::new());
        assert!(report.errors.is_empty());
        assert_eq!(report.config.retrieval.top_k, 5);
        assert_eq!(report.config.retrieval.scope, RetrievalScope::Hybrid);
        assert!(report.config.orchestrator.extractive_mode);
    }

    #[test]
    fn top_k_out_of_range_is_clamped_with_warning() {
        let report = parse_config(&vars(&[("MEMGATE_TOP_K", "50")]));
        assert_eq!(report.config.retrieval.top_k, 10);
        assert!(!report.warnings.is_empty());
    }

    #[test]
    fn gemini_remote_mode_without_key_is_an_error() {
        let report = parse_config(&vars(&[
            ("MEMGATE_EXTRACTIVE_MODE", "false"),
            ("MEMGATE_PROVIDER_ALIAS", "google"),
        ]));
        assert!(report.errors.iter().any(|e| e.contains("MEMGATE_GEMINI_API_KEY")));
    }

    #[test]
    fn gateway_shaped_gemini_key_is_rejected() {
        let report = parse_config(&vars(&[
            ("MEMGATE_EXTRACTIVE_MODE", "false"),
            ("MEMGATE_PROVIDER_ALIAS", "gemini"),
            ("MEMGATE_GEMINI_API_KEY", "gw_abc123"),
            ("MEMGATE_PROVIDER_PROFILE_ID", "default"),
        ]));
        assert!(report.errors.iter().any(|e| e.contains("gateway token")));
    }

    #[test]
    fn embedding_provider_requires_matching_credential() {
        let report = parse_config(&vars(&[("MEMGATE_EMBEDDING_PROVIDER", "openai-compatible")]));
        assert!(report.errors.iter().any(|e| e.contains("MEMGATE_OPENAI_COMPATIBLE_API_KEY")));
    }
}
