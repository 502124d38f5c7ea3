//! On-disk embedding cache: `{hash: Vec<f32>}`, keyed by (provider, model,
//! normalized text). Best-effort by contract — [`EmbeddingService::embed`]
//! never fails because of a cache problem, it only logs one.

use crate::EmbeddingProviderKind;
use memgate_common::{canonical_json_bytes, sha256_bytes};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("canonical json error: {0}")]
    Canon(#[from] memgate_common::CanonError),
}

/// Composite cache key = sha256 of "provider|model|normalized_text", so two
/// models behind the same provider kind never collide in one cache file.
pub fn cache_key(provider: EmbeddingProviderKind, model: &str, normalized_text: &str) -> String {
    sha256_bytes(format!("{}|{}|{}", provider.as_str(), model, normalized_text).as_bytes())
}

pub struct EmbeddingCache {
    path: PathBuf,
    entries: HashMap<String, Vec<f32>>,
    dirty: bool,
}

impl EmbeddingCache {
    pub fn load_or_empty(path: &Path) -> Self {
        let entries = std::fs::read(path)
            .ok()
            .and_then(|bytes| serde_json::from_slice::<HashMap<String, Vec<f32>>>(&bytes).ok())
            .unwrap_or_default();
        Self { path: path.to_path_buf(), entries, dirty: false }
    }

    pub fn get(&self, key: &str) -> Option<&Vec<f32>> {
        self.entries.get(key)
    }

    pub fn put(&mut self, key: String, value: Vec<f32>) {
        self.entries.insert(key, value);
        self.dirty = true;
    }

    pub fn flush(&mut self) -> Result<(), CacheError> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let bytes = canonical_json_bytes(&self.entries)?;
        std::fs::write(&self.path, bytes)?;
        self.dirty = false;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_persists_across_reloads() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("embed_cache.json");

        let mut cache = EmbeddingCache::load_or_empty(&path);
        assert!(cache.is_empty());
        cache.put("k1".into(), vec![1.0, 2.0]);
        cache.flush().unwrap();

        let reloaded = EmbeddingCache::load_or_empty(&path);
        assert_eq!(reloaded.get("k1"), Some(&vec![1.0, 2.0]));
    }

    #[test]
    fn missing_file_yields_empty_cache_not_error() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("does_not_exist.json");
        let cache = EmbeddingCache::load_or_empty(&path);
        assert!(cache.is_empty());
    }

    #[test]
    fn different_models_do_not_collide_in_the_same_cache_key_space() {
        let a = cache_key(EmbeddingProviderKind::OpenAiCompatible, "text-embedding-3-small", "hello");
        let b = cache_key(EmbeddingProviderKind::OpenAiCompatible, "text-embedding-3-large", "hello");
        assert_ne!(a, b);
    }
}
