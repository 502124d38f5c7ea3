//! `MemoryRepository`: the two-table store (`documents`, `user_facts`)
//! and the hybrid semantic+lexical search algorithm in front of it.

use crate::lexical::{
    boost_multiplier, detect_personal_intent, keyword_hits, matches_intent_shape, normalize_text,
    phrase_match, query_tokens, row_haystack,
};
use crate::record::{MemoryRecord, Source};
use crate::table::{TableError, VectorTable};
use memgate_common::normalize_whitespace;
use memgate_embedding::{EmbeddingError, EmbeddingService};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),
    #[error("table error: {0}")]
    Table(#[from] TableError),
}

/// Which tables a search considers (spec §4.2 step 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    Hybrid,
    FactsOnly,
    DocumentsOnly,
}

struct ScoredRow {
    distance: f32,
    record: MemoryRecord,
    lexical_hit: bool,
}

pub struct MemoryRepository {
    embedder: EmbeddingService,
    documents: Mutex<VectorTable>,
    user_facts: Mutex<VectorTable>,
    scope: SearchScope,
    strict_match: bool,
}

impl MemoryRepository {
    pub fn open(
        embedder: EmbeddingService,
        data_dir: &Path,
        scope: SearchScope,
        strict_match: bool,
    ) -> Result<Self, RepositoryError> {
        let documents = VectorTable::open(&data_dir.join("documents.json"))?;
        let user_facts = VectorTable::open(&data_dir.join("user_facts.json"))?;
        Ok(Self {
            embedder,
            documents: Mutex::new(documents),
            user_facts: Mutex::new(user_facts),
            scope,
            strict_match,
        })
    }

    /// Embed `text`; if empty, log and return without writing (spec §4.2 write path).
    pub async fn save_document(&self, text: &str, source_file: &str) -> Result<(), RepositoryError> {
        let normalized = normalize_whitespace(text);
        if normalized.is_empty() {
            tracing::warn!("save_document called with empty text, skipping write");
            return Ok(());
        }
        let vector = self.embedder.embed(&normalized).await?;
        if vector.is_empty() {
            tracing::warn!(source_file, "embedding produced empty vector, skipping write");
            return Ok(());
        }
        let record = MemoryRecord::new(normalized, vector, Some(basename(source_file)), Source::Document);
        let mut table = self.documents.lock().await;
        table.append(record)?;
        Ok(())
    }

    pub async fn save_user_fact(&self, fact: &str, category: Option<&str>) -> Result<(), RepositoryError> {
        let normalized = normalize_whitespace(fact);
        if normalized.is_empty() {
            tracing::warn!("save_user_fact called with empty text, skipping write");
            return Ok(());
        }
        let vector = self.embedder.embed(&normalized).await?;
        if vector.is_empty() {
            tracing::warn!("embedding produced empty vector, skipping write");
            return Ok(());
        }
        let record = MemoryRecord::new(normalized, vector, category.map(str::to_string), Source::UserFact);
        let mut table = self.user_facts.lock().await;
        table.append(record)?;
        Ok(())
    }

    /// The full search path: embed, per-table vector search, lexical
    /// scoring + boosts, the guardrail, dedup, top-k.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<String>, RepositoryError> {
        let query_vector = self.embedder.embed(query).await?;
        if query_vector.is_empty() {
            return Ok(Vec::new());
        }

        let mut rows = Vec::new();
        if matches!(self.scope, SearchScope::Hybrid | SearchScope::DocumentsOnly) {
            let table = self.documents.lock().await;
            rows.extend(table.search(&query_vector, k).into_iter().map(|(d, r)| (d, r.clone(), "documents")));
        }
        if matches!(self.scope, SearchScope::Hybrid | SearchScope::FactsOnly) {
            let table = self.user_facts.lock().await;
            rows.extend(table.search(&query_vector, k).into_iter().map(|(d, r)| (d, r.clone(), "user_facts")));
        }

        let tokens = query_tokens(query);
        let normalized_query = normalize_text(query);
        let intent = detect_personal_intent(&normalized_query);

        let mut scored: Vec<ScoredRow> = rows
            .into_iter()
            .map(|(distance, record, source_name)| {
                let haystack = row_haystack(&record.text, record.category.as_deref(), source_name);
                let pm = phrase_match(&normalized_query, &haystack);
                let hits = keyword_hits(&tokens, &haystack);
                let boosted = distance * boost_multiplier(pm, hits);
                let lexical_hit = pm || hits > 0;
                ScoredRow { distance: boosted, record, lexical_hit }
            })
            .collect();

        if !tokens.is_empty() {
            let any_lexical_hit = scored.iter().any(|r| r.lexical_hit);
            if any_lexical_hit {
                scored.retain(|r| r.lexical_hit);
            } else if let Some(intent) = intent {
                scored.retain(|r| matches_intent_shape(intent, &r.record.text));
            } else if self.strict_match {
                return Ok(Vec::new());
            }
        }

        scored.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal));

        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for row in scored {
            if seen.insert(row.record.text.clone()) {
                out.push(row.record.text);
            }
            if out.len() >= k {
                break;
            }
        }
        Ok(out)
    }

    pub async fn recent(&self, limit: usize) -> Vec<MemoryRecord> {
        let docs = self.documents.lock().await;
        let facts = self.user_facts.lock().await;
        let mut combined: Vec<MemoryRecord> =
            docs.recent(limit).into_iter().chain(facts.recent(limit).into_iter()).cloned().collect();
        combined.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        combined.truncate(limit);
        combined
    }

    /// Scoped to `documents`, matching category == basename(source_file).
    pub async fn delete_documents_by_source(&self, source_file: &str) -> Result<usize, RepositoryError> {
        let target = basename(source_file);
        let mut table = self.documents.lock().await;
        let removed = table.retain_and_count_removed(|r| r.category.as_deref() == Some(target.as_str()))?;
        Ok(removed)
    }

    pub async fn clear_documents(&self) -> Result<usize, RepositoryError> {
        let mut table = self.documents.lock().await;
        Ok(table.clear()?)
    }

    pub async fn clear_user_facts(&self) -> Result<usize, RepositoryError> {
        let mut table = self.user_facts.lock().await;
        Ok(table.clear()?)
    }
}

fn basename(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string())
}

#[allow(dead_code)]
fn data_dir_default() -> PathBuf {
    PathBuf::from("runtime/memory")
}
