//! memgate_providers
//!
//! Provider transport + the strict-grounding wrapper around it. No policy
//! beyond grounding lives here: redaction, consent, and telemetry are the
//! caller's job.

mod extractive;
mod gemini;
mod openai;

pub use gemini::{normalize_gemini_base_url, GeminiProvider, GEMINI_VERSION_SEGMENT};
pub use openai::OpenAiCompatProvider;

use async_trait::async_trait;
use memgate_redaction::RiskLevel;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// One HTTP-backed generator, normalized to (system prompt, user query) in,
/// plain text out. `OpenAiCompatProvider` and `GeminiProvider` both speak
/// this interface; routing between them happens in [`Orchestrator`].
#[async_trait]
pub trait Provider: Send + Sync {
    async fn generate(&self, system_prompt: &str, user_query: &str) -> Result<String, ProviderError>;
}

/// The fixed string a remote provider is instructed to return verbatim
/// when it cannot answer from context, and the string the orchestrator
/// itself returns when even extraction fails.
pub const FALLBACK_ANSWER: &str = "I don't have that information in my records.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationMode {
    Extractive,
    Remote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroundingMode {
    Exact,
    Excerpt,
}

pub struct GenerateParams<'a> {
    pub system_context: &'a str,
    pub user_query: &'a str,
    pub redaction_count: usize,
    pub risk_level: RiskLevel,
}

/// Normalize a configured provider alias to a canonical provider name.
pub fn normalize_provider_alias(alias: &str) -> &'static str {
    match alias.trim().to_lowercase().as_str() {
        "google" | "gemini" => "gemini",
        "chatgpt" | "claude" | "anthropic" | "openai-compatible" | "openai" => "openai-compatible",
        _ => "openai-compatible",
    }
}

fn system_prompt_for(params: &GenerateParams) -> String {
    format!(
        "Answer strictly and verbatim from the context below. If the answer is not present, reply exactly with: \"{FALLBACK_ANSWER}\"\n\nContext:\n{}",
        params.system_context
    )
}

fn normalize_for_grounding(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn context_lines(system_context: &str) -> Vec<String> {
    system_context.lines().map(|l| l.to_string()).collect()
}

fn is_grounded(candidate: &str, system_context: &str, mode: GroundingMode) -> bool {
    let normalized_candidate = normalize_for_grounding(candidate);
    if normalized_candidate.is_empty() {
        return false;
    }
    context_lines(system_context).iter().any(|line| {
        let normalized_line = normalize_for_grounding(line);
        match mode {
            GroundingMode::Exact => normalized_line == normalized_candidate,
            GroundingMode::Excerpt => normalized_line.contains(&normalized_candidate),
        }
    })
}

/// Wraps a provider with strict grounding and deterministic extractive
/// fallback. `generate` only returns `Err` on a real transport failure;
/// every other path (ungrounded answer, fixed fallback, no overlap at all)
/// resolves to `Ok` with either an extractive line or the fixed fallback.
pub struct Orchestrator {
    provider: Option<Box<dyn Provider>>,
    mode: GenerationMode,
    grounding_mode: GroundingMode,
}

impl Orchestrator {
    pub fn extractive() -> Self {
        Self { provider: None, mode: GenerationMode::Extractive, grounding_mode: GroundingMode::Excerpt }
    }

    pub fn remote(provider: Box<dyn Provider>, grounding_mode: GroundingMode) -> Self {
        Self { provider: Some(provider), mode: GenerationMode::Remote, grounding_mode }
    }

    pub async fn generate(&self, params: &GenerateParams<'_>) -> Result<String, ProviderError> {
        match self.mode {
            GenerationMode::Extractive => Ok(self.extractive_or_fallback(params)),
            GenerationMode::Remote => {
                let Some(provider) = &self.provider else {
                    return Ok(self.extractive_or_fallback(params));
                };
                let system_prompt = system_prompt_for(params);
                let answer = provider.generate(&system_prompt, params.user_query).await?;

                let is_fixed_fallback = normalize_for_grounding(&answer) == normalize_for_grounding(FALLBACK_ANSWER);
                if is_fixed_fallback || !is_grounded(&answer, params.system_context, self.grounding_mode) {
                    Ok(self.extractive_or_fallback(params))
                } else {
                    Ok(answer)
                }
            }
        }
    }

    fn extractive_or_fallback(&self, params: &GenerateParams) -> String {
        let lines = context_lines(params.system_context);
        extractive::select_extractive_line(&lines, params.user_query).unwrap_or_else(|| FALLBACK_ANSWER.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct StubProvider {
        reply: String,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Provider for StubProvider {
        async fn generate(&self, _system_prompt: &str, _user_query: &str) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.clone())
        }
    }

    #[test]
    fn provider_alias_normalization_matches_spec_table() {
        assert_eq!(normalize_provider_alias("google"), "gemini");
        assert_eq!(normalize_provider_alias("Claude"), "openai-compatible");
        assert_eq!(normalize_provider_alias("anthropic"), "openai-compatible");
        assert_eq!(normalize_provider_alias("chatgpt"), "openai-compatible");
    }

    #[tokio::test]
    async fn extractive_mode_returns_best_overlap_line() {
        let orchestrator = Orchestrator::extractive();
        let params = GenerateParams {
            system_context: "[1] User likes to drink Black Coffee.",
            user_query: "What coffee do I like?",
            redaction_count: 0,
            risk_level: RiskLevel::Low,
        };
        let answer = orchestrator.generate(&params).await.unwrap();
        assert_eq!(answer, "[1] User likes to drink Black Coffee.");
    }

    #[tokio::test]
    async fn ungrounded_remote_answer_falls_back_to_extraction() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = StubProvider { reply: "Something the context never said.".into(), calls: calls.clone() };
        let orchestrator = Orchestrator::remote(Box::new(provider), GroundingMode::Excerpt);

        let params = GenerateParams {
            system_context: "[1] User likes to drink Black Coffee.",
            user_query: "What coffee do I like?",
            redaction_count: 0,
            risk_level: RiskLevel::Low,
        };
        let answer = orchestrator.generate(&params).await.unwrap();
        assert_eq!(answer, "[1] User likes to drink Black Coffee.");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fixed_fallback_from_remote_also_falls_back_to_extraction() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = StubProvider { reply: FALLBACK_ANSWER.to_string(), calls };
        let orchestrator = Orchestrator::remote(Box::new(provider), GroundingMode::Excerpt);

        let params = GenerateParams {
            system_context: "[1] User likes to drink Black Coffee.",
            user_query: "What coffee do I like?",
            redaction_count: 0,
            risk_level: RiskLevel::Low,
        };
        let answer = orchestrator.generate(&params).await.unwrap();
        assert_eq!(answer, "[1] User likes to drink Black Coffee.");
    }

    #[tokio::test]
    async fn grounded_remote_answer_is_returned_verbatim() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = StubProvider { reply: "User likes to drink Black Coffee.".into(), calls };
        let orchestrator = Orchestrator::remote(Box::new(provider), GroundingMode::Excerpt);

        let params = GenerateParams {
            system_context: "[1] User likes to drink Black Coffee.",
            user_query: "What coffee do I like?",
            redaction_count: 0,
            risk_level: RiskLevel::Low,
        };
        let answer = orchestrator.generate(&params).await.unwrap();
        assert_eq!(answer, "User likes to drink Black Coffee.");
    }
}
