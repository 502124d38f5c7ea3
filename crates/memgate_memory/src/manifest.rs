//! Ingestion manifest: a contract-only record type plus a serialized
//! writer. Ingestion itself is out of scope (spec §1); this crate only
//! owns the shape the ingestor writes through and the single-writer
//! discipline that keeps concurrent writes from truncating each other,
//! mirrored on the teacher's episode-index rewrite-under-lock pattern.

use memgate_common::canonical_json_bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("canonical json error: {0}")]
    Canon(#[from] memgate_common::CanonError),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ManifestEntry {
    pub mtime_ms: u64,
    pub size: u64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct IngestManifest {
    entries: HashMap<String, ManifestEntry>,
}

impl IngestManifest {
    fn load_or_empty(path: &Path) -> Self {
        std::fs::read(path)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .unwrap_or_default()
    }

    /// Whether `entry` means the file is unchanged since the last recorded entry.
    pub fn is_unchanged(&self, abs_path: &str, entry: &ManifestEntry) -> bool {
        self.entries.get(abs_path) == Some(entry)
    }

    pub fn get(&self, abs_path: &str) -> Option<&ManifestEntry> {
        self.entries.get(abs_path)
    }

    pub fn set(&mut self, abs_path: String, entry: ManifestEntry) {
        self.entries.insert(abs_path, entry);
    }

    pub fn remove(&mut self, abs_path: &str) -> bool {
        self.entries.remove(abs_path).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Serializes reads/writes of the manifest file behind an async mutex so
/// concurrent ingestion tasks never interleave a read-modify-write and
/// truncate each other's update.
pub struct SerializedManifestWriter {
    path: PathBuf,
    state: Arc<Mutex<IngestManifest>>,
}

impl SerializedManifestWriter {
    pub fn open(path: &Path) -> Self {
        let state = IngestManifest::load_or_empty(path);
        Self { path: path.to_path_buf(), state: Arc::new(Mutex::new(state)) }
    }

    pub async fn record(&self, abs_path: String, entry: ManifestEntry) -> Result<(), ManifestError> {
        let mut guard = self.state.lock().await;
        guard.set(abs_path, entry);
        self.persist(&guard)
    }

    pub async fn forget(&self, abs_path: &str) -> Result<bool, ManifestError> {
        let mut guard = self.state.lock().await;
        let removed = guard.remove(abs_path);
        if removed {
            self.persist(&guard)?;
        }
        Ok(removed)
    }

    pub async fn is_unchanged(&self, abs_path: &str, entry: &ManifestEntry) -> bool {
        let guard = self.state.lock().await;
        guard.is_unchanged(abs_path, entry)
    }

    fn persist(&self, manifest: &IngestManifest) -> Result<(), ManifestError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let bytes = canonical_json_bytes(manifest)?;
        std::fs::write(&self.path, bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unchanged_file_is_recognized_by_size_and_mtime() {
        let td = tempfile::tempdir().unwrap();
        let writer = SerializedManifestWriter::open(&td.path().join("manifest.json"));
        let entry = ManifestEntry { mtime_ms: 1000, size: 42 };
        writer.record("/abs/file.txt".into(), entry).await.unwrap();

        assert!(writer.is_unchanged("/abs/file.txt", &entry).await);
        let changed = ManifestEntry { mtime_ms: 2000, size: 42 };
        assert!(!writer.is_unchanged("/abs/file.txt", &changed).await);
    }

    #[tokio::test]
    async fn forget_removes_and_persists() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("manifest.json");
        let writer = SerializedManifestWriter::open(&path);
        let entry = ManifestEntry { mtime_ms: 1, size: 1 };
        writer.record("/abs/a.txt".into(), entry).await.unwrap();

        assert!(writer.forget("/abs/a.txt").await.unwrap());
        assert!(!writer.forget("/abs/a.txt").await.unwrap());

        let reloaded = IngestManifest::load_or_empty(&path);
        assert!(reloaded.is_empty());
    }
}
