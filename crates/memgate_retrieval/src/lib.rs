//! memgate_retrieval
//!
//! The per-query state machine: retrieve → shrink-to-safe → publish →
//! gate → generate (optional) → return. Strictly sequential per call —
//! no stage begins before the previous one completes — though unrelated
//! calls may interleave freely on the shared stores underneath.

use memgate_consent::ConsentGate;
use memgate_events::{EventBus, EventKind};
use memgate_memory::MemoryRepository;
use memgate_providers::{GenerateParams, Orchestrator};
use memgate_redaction::{Confidence, RedactionEngine, RedactionResult, RiskLevel};
use serde_json::json;

const MIN_TOP_K: usize = 1;
const MAX_TOP_K: usize = 10;
const MIN_MAX_CHARS: usize = 120;
const MAX_MAX_CHARS: usize = 2000;

fn risk_str(risk: RiskLevel) -> &'static str {
    match risk {
        RiskLevel::Low => "LOW",
        RiskLevel::High => "HIGH",
    }
}

fn is_safe(result: &RedactionResult) -> bool {
    matches!(result.confidence, Confidence::High) && matches!(result.risk_level, RiskLevel::Low)
}

fn build_numbered_context(rows: &[String]) -> String {
    rows.iter().enumerate().map(|(i, row)| format!("[{}] {}", i + 1, row)).collect::<Vec<_>>().join("\n")
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}

pub struct RetrievalController {
    repository: MemoryRepository,
    redactor: RedactionEngine,
    consent: ConsentGate,
    orchestrator: Orchestrator,
    bus: EventBus,
    top_k: usize,
    max_result_chars: usize,
    consent_enabled: bool,
    privacy_debug: bool,
    generation_enabled: bool,
}

impl RetrievalController {
    pub fn new(
        repository: MemoryRepository,
        redactor: RedactionEngine,
        consent: ConsentGate,
        orchestrator: Orchestrator,
        bus: EventBus,
        top_k: usize,
        max_result_chars: usize,
        consent_enabled: bool,
        privacy_debug: bool,
        generation_enabled: bool,
    ) -> Self {
        Self {
            repository,
            redactor,
            consent,
            orchestrator,
            bus,
            top_k: top_k.clamp(MIN_TOP_K, MAX_TOP_K),
            max_result_chars: max_result_chars.clamp(MIN_MAX_CHARS, MAX_MAX_CHARS),
            consent_enabled,
            privacy_debug,
            generation_enabled,
        }
    }

    /// Direct access to the underlying store, for bootstrap-layer commands
    /// (manual ingestion, debugging) that sit outside the query/save tool
    /// surface.
    pub fn repository(&self) -> &MemoryRepository {
        &self.repository
    }

    /// Direct access to the consent gate, for a human-facing grant/deny
    /// surface outside the two MCP tools.
    pub fn consent(&self) -> &ConsentGate {
        &self.consent
    }

    /// The body of the `query_personal_memory` MCP tool.
    pub async fn handle_query(&self, topic: &str) -> String {
        self.bus.publish(EventKind::QueryReceived, json!({ "topic": topic })).await;

        let rows = match self.repository.search(topic, self.top_k).await {
            Ok(rows) => rows,
            Err(e) => return format!("ERROR: {e}"),
        };
        if rows.is_empty() {
            return "NO_CONTEXT_FOUND".to_string();
        }
        let rows: Vec<String> = rows.iter().map(|r| truncate_chars(r, self.max_result_chars)).collect();

        let chosen = self.shrink_to_safe(&rows);

        self.bus
            .publish(
                EventKind::PrivacyProcessed,
                json!({
                    "redaction_count": chosen.redaction_count,
                    "risk_level": risk_str(chosen.risk_level),
                    "confidence": format!("{:?}", chosen.confidence),
                    "cleaned_text": chosen.cleaned_text,
                    "raw_context": if self.privacy_debug { Some(build_numbered_context(&rows)) } else { None },
                }),
            )
            .await;

        if matches!(chosen.confidence, Confidence::Low) {
            self.bus.publish(EventKind::RiskBlocked, json!({ "reason": "low-confidence" })).await;
            return "NO_CONTEXT".to_string();
        }

        if matches!(chosen.risk_level, RiskLevel::High) {
            let granted = self.consent_enabled && self.consent.consume(topic).await;
            if !granted {
                self.bus
                    .publish(EventKind::ConsentRequired, json!({ "topic": topic, "cleaned_text": chosen.cleaned_text }))
                    .await;
                self.bus.publish(EventKind::RiskBlocked, json!({ "reason": "high-risk" })).await;
                return "NO_CONTEXT".to_string();
            }
            self.bus.publish(EventKind::ConsentDecision, json!({ "topic": topic, "decision": "granted" })).await;
        }

        if self.generation_enabled {
            self.bus
                .publish(EventKind::ArchestraRequest, json!({ "topic": topic, "context": chosen.cleaned_text }))
                .await;
            let params = GenerateParams {
                system_context: &chosen.cleaned_text,
                user_query: topic,
                redaction_count: chosen.redaction_count,
                risk_level: chosen.risk_level,
            };
            match self.orchestrator.generate(&params).await {
                Ok(answer) => {
                    self.bus.publish(EventKind::ArchestraResponse, json!({ "answer": answer })).await;
                    return answer;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "answer generation failed, falling through to sanitized context");
                    self.bus.publish(EventKind::ArchestraResponse, json!({ "error": e.to_string() })).await;
                }
            }
        }

        format!("SANITIZED_CONTEXT:\n{}\n\nRedactions: {}\nRisk: {}", chosen.cleaned_text, chosen.redaction_count, risk_str(chosen.risk_level))
    }

    /// Run the pipeline on the full context; if unsafe, try progressively
    /// shorter prefixes, accepting the first `confidence=HIGH ∧ risk=LOW`
    /// combination. Falls through to the full snapshot if none qualify.
    fn shrink_to_safe(&self, rows: &[String]) -> RedactionResult {
        let full_context = build_numbered_context(rows);
        let full_result = self.redactor.redact(&full_context);
        if is_safe(&full_result) {
            return full_result;
        }
        for n in 1..rows.len() {
            let prefix_context = build_numbered_context(&rows[..n]);
            let candidate = self.redactor.redact(&prefix_context);
            if is_safe(&candidate) {
                return candidate;
            }
        }
        full_result
    }

    /// The body of the `save_memory` MCP tool.
    pub async fn save_memory(&self, fact: &str, category: Option<&str>) -> String {
        if fact.trim().is_empty() {
            return "ERROR: 'fact' is required.".to_string();
        }
        match self.repository.save_user_fact(fact, category).await {
            Ok(()) => {
                self.bus.publish(EventKind::MemorySaved, json!({ "fact": fact, "category": category })).await;
                format!("MEMORY_SAVED: {fact}")
            }
            Err(e) => format!("ERROR: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use memgate_consent::ConsentGate;
    use memgate_embedding::{EmbeddingService, LocalProvider};
    use memgate_events::EventBus;
    use memgate_memory::SearchScope;
    use memgate_providers::{GroundingMode, Provider, ProviderError};
    use std::sync::Arc;
    use std::time::Duration;

    fn new_controller(
        tmp: &std::path::Path,
        orchestrator: Orchestrator,
        generation_enabled: bool,
        consent_enabled: bool,
    ) -> RetrievalController {
        let embedder = EmbeddingService::new(Arc::new(LocalProvider), 8, &tmp.join("cache.json"));
        let repository = MemoryRepository::open(embedder, tmp, SearchScope::Hybrid, true).unwrap();
        RetrievalController::new(
            repository,
            RedactionEngine::new(),
            ConsentGate::new(Duration::from_secs(60)),
            orchestrator,
            EventBus::new(200),
            5,
            2000,
            consent_enabled,
            false,
            generation_enabled,
        )
    }

    #[tokio::test]
    async fn empty_repository_returns_no_context_found() {
        let td = tempfile::tempdir().unwrap();
        let controller = new_controller(td.path(), Orchestrator::extractive(), false, true);

        let result = controller.handle_query("anything").await;
        assert_eq!(result, "NO_CONTEXT_FOUND");
    }

    #[tokio::test]
    async fn base_redaction_scenario() {
        let td = tempfile::tempdir().unwrap();
        let controller = new_controller(td.path(), Orchestrator::extractive(), false, true);
        controller.repository.save_document("My number is 9876543210.", "a.txt").await.unwrap();

        let result = controller.handle_query("number").await;
        assert!(result.starts_with("SANITIZED_CONTEXT:"));
        assert!(result.contains("[REDACTED_PHONE]"));
        assert!(result.contains("Risk: LOW"));
    }

    #[tokio::test]
    async fn high_risk_without_consent_returns_no_context() {
        let td = tempfile::tempdir().unwrap();
        let controller = new_controller(td.path(), Orchestrator::extractive(), false, true);
        controller
            .repository
            .save_document(
                "Phone: +1-555-123-4567, Email: john.doe@example.com, Credit Card: 4532-1234-5678-9010, Salary: $85,000",
                "a.txt",
            )
            .await
            .unwrap();

        let result = controller.handle_query("phone email credit card").await;
        assert_eq!(result, "NO_CONTEXT");
    }

    #[tokio::test]
    async fn consent_roundtrip_is_single_use() {
        let td = tempfile::tempdir().unwrap();
        let controller = new_controller(td.path(), Orchestrator::extractive(), false, true);
        controller
            .repository
            .save_document(
                "Phone: +1-555-123-4567, Email: john.doe@example.com, Credit Card: 4532-1234-5678-9010, Salary: $85,000",
                "a.txt",
            )
            .await
            .unwrap();

        let topic = "phone email credit card";
        assert_eq!(controller.handle_query(topic).await, "NO_CONTEXT");

        controller.consent.grant(topic).await;
        let granted = controller.handle_query(topic).await;
        assert!(granted.starts_with("SANITIZED_CONTEXT:"));

        assert_eq!(controller.handle_query(topic).await, "NO_CONTEXT");
    }

    #[tokio::test]
    async fn personal_intent_retrieval_scenario() {
        let td = tempfile::tempdir().unwrap();
        let controller = new_controller(td.path(), Orchestrator::extractive(), false, true);
        controller.repository.save_user_fact("JOHN DOE", None).await.unwrap();

        let result = controller.handle_query("what is my name").await;
        assert!(result.contains("JOHN DOE"));
    }

    #[tokio::test]
    async fn save_memory_requires_a_fact() {
        let td = tempfile::tempdir().unwrap();
        let controller = new_controller(td.path(), Orchestrator::extractive(), false, true);

        assert_eq!(controller.save_memory("", None).await, "ERROR: 'fact' is required.");
    }

    #[tokio::test]
    async fn save_memory_succeeds_and_is_then_retrievable() {
        let td = tempfile::tempdir().unwrap();
        let controller = new_controller(td.path(), Orchestrator::extractive(), false, true);

        let result = controller.save_memory("I like black coffee", None).await;
        assert_eq!(result, "MEMORY_SAVED: I like black coffee");

        let search = controller.handle_query("coffee").await;
        assert!(search.contains("black coffee") || search.contains("coffee"));
    }

    struct GroundedProvider;
    #[async_trait]
    impl Provider for GroundedProvider {
        async fn generate(&self, _system_prompt: &str, _user_query: &str) -> Result<String, ProviderError> {
            Ok("User likes to drink Black Coffee.".to_string())
        }
    }

    #[tokio::test]
    async fn grounded_generation_is_returned_verbatim() {
        let td = tempfile::tempdir().unwrap();
        let orchestrator = Orchestrator::remote(Box::new(GroundedProvider), GroundingMode::Excerpt);
        let controller = new_controller(td.path(), orchestrator, true, true);
        controller.repository.save_user_fact("User likes to drink Black Coffee.", None).await.unwrap();

        let result = controller.handle_query("What coffee do I like?").await;
        assert_eq!(result, "User likes to drink Black Coffee.");
    }
}
