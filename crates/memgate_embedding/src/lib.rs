//! memgate_embedding
//!
//! Maps text to a fixed-dimension unit vector via a pluggable provider, with
//! an on-disk best-effort cache. Providers never see un-normalized text: all
//! whitespace collapsing happens once, in [`EmbeddingService::embed`], before
//! any cache lookup or provider call.

mod cache;
mod local;
mod remote;

pub use cache::{CacheError, EmbeddingCache};
pub use local::LocalProvider;
pub use remote::{GeminiProvider, OpenAiCompatProvider};

use async_trait::async_trait;
use memgate_common::normalize_whitespace;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
    #[error("credential '{given}' does not match the expected prefix for provider '{provider}'")]
    WrongCredentialPrefix { provider: &'static str, given: String },
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
}

/// Which embedding backend produces a vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProviderKind {
    Gemini,
    OpenAiCompatible,
    Local,
}

impl EmbeddingProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingProviderKind::Gemini => "gemini",
            EmbeddingProviderKind::OpenAiCompatible => "openai-compatible",
            EmbeddingProviderKind::Local => "local",
        }
    }
}

/// Credentials available at startup, used to infer a provider when none is
/// explicitly configured. Explicit configuration always wins.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingCredentials {
    pub gemini_key: Option<String>,
    pub openai_compatible_key: Option<String>,
}

/// Resolve which provider to use for a single `embed` call: explicit
/// configuration wins; otherwise infer from which credential is present.
pub fn resolve_provider(
    configured: Option<EmbeddingProviderKind>,
    creds: &EmbeddingCredentials,
) -> EmbeddingProviderKind {
    if let Some(kind) = configured {
        return kind;
    }
    if creds.gemini_key.as_deref().is_some_and(|k| !k.is_empty()) {
        EmbeddingProviderKind::Gemini
    } else if creds
        .openai_compatible_key
        .as_deref()
        .is_some_and(|k| !k.is_empty())
    {
        EmbeddingProviderKind::OpenAiCompatible
    } else {
        EmbeddingProviderKind::Local
    }
}

/// A gateway personal access token shape that must never be accepted as a
/// direct provider key (spec §4.1: "reject credentials with the wrong
/// provider prefix").
pub fn looks_like_gateway_token(key: &str) -> bool {
    key.starts_with("gw_") || key.starts_with("gateway_")
}

/// Validate a credential against the expected shape for `provider`.
pub fn validate_credential_prefix(
    provider: EmbeddingProviderKind,
    key: &str,
) -> Result<(), EmbeddingError> {
    let ok = match provider {
        EmbeddingProviderKind::Gemini => !looks_like_gateway_token(key),
        EmbeddingProviderKind::OpenAiCompatible => !looks_like_gateway_token(key),
        EmbeddingProviderKind::Local => true,
    };
    if ok {
        Ok(())
    } else {
        Err(EmbeddingError::WrongCredentialPrefix {
            provider: provider.as_str(),
            given: key.to_string(),
        })
    }
}

/// Implemented once per backend. Providers receive already-normalized,
/// non-empty text and return a raw (possibly wrong-dimension) vector; the
/// service aligns it.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed_raw(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
    fn kind(&self) -> EmbeddingProviderKind;
    /// Model identifier folded into the cache key, so two models behind the
    /// same provider kind never collide in one cache file.
    fn model_id(&self) -> &str;
}

/// Truncate or zero-pad `v` to exactly `dim` entries.
pub fn align_dimension(mut v: Vec<f32>, dim: usize) -> Vec<f32> {
    if v.len() > dim {
        v.truncate(dim);
    } else if v.len() < dim {
        v.resize(dim, 0.0);
    }
    v
}

/// L2-normalize in place; leaves an all-zero vector untouched.
pub fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

pub struct EmbeddingService {
    provider: Arc<dyn EmbeddingProvider>,
    dim: usize,
    cache: Mutex<EmbeddingCache>,
}

impl EmbeddingService {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, dim: usize, cache_path: &Path) -> Self {
        Self {
            provider,
            dim,
            cache: Mutex::new(EmbeddingCache::load_or_empty(cache_path)),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dim
    }

    pub fn provider_kind(&self) -> EmbeddingProviderKind {
        self.provider.kind()
    }

    /// Trim/collapse whitespace, short-circuit on empty, check the cache,
    /// otherwise call the provider, align to `dim`, unit-normalize, and
    /// best-effort cache the result.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let normalized = normalize_whitespace(text);
        if normalized.is_empty() {
            return Ok(Vec::new());
        }

        let key = cache::cache_key(self.provider.kind(), self.provider.model_id(), &normalized);
        {
            let cache = self.cache.lock().await;
            if let Some(v) = cache.get(&key) {
                return Ok(v.clone());
            }
        }

        let raw = self.provider.embed_raw(&normalized).await?;

        let mut aligned = align_dimension(raw, self.dim);
        l2_normalize(&mut aligned);

        // Cache writes are best-effort: never let a cache failure break retrieval.
        {
            let mut cache = self.cache.lock().await;
            cache.put(key, aligned.clone());
            if let Err(e) = cache.flush() {
                tracing::warn!(error = %e, "embedding cache flush failed (non-fatal)");
            }
        }

        Ok(aligned)
    }
}
