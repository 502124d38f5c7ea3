//! A single logical table (`documents` or `user_facts`): an in-memory
//! `Vec<MemoryRecord>` mirrored to a flat JSON file on disk, searched by
//! brute-force cosine similarity.
//!
//! This is the simplest vector index that satisfies spec §3's "opaque to
//! this spec, owned by the chosen vector index" contract — grounded on the
//! flat-file JSON + O(n·d) cosine search described for small corpora in
//! the retrieved `CortextAST` project, and the cosine-similarity session
//! store in the retrieved EchoVault embedding pipeline.

use crate::record::MemoryRecord;
use memgate_common::canonical_json_bytes;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("canonical json error: {0}")]
    Canon(#[from] memgate_common::CanonError),
}

pub struct VectorTable {
    path: PathBuf,
    records: Vec<MemoryRecord>,
}

impl VectorTable {
    /// Load from `path` if it exists (an empty/missing file is a fresh,
    /// not-yet-created table — spec §4.2: "If the target table does not
    /// yet exist, create it from this first record").
    pub fn open(path: &Path) -> Result<Self, TableError> {
        let records = if path.exists() {
            let bytes = std::fs::read(path)?;
            if bytes.is_empty() {
                Vec::new()
            } else {
                serde_json::from_slice(&bytes)?
            }
        } else {
            Vec::new()
        };
        Ok(Self { path: path.to_path_buf(), records })
    }

    fn persist(&self) -> Result<(), TableError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let bytes = canonical_json_bytes(&self.records)?;
        std::fs::write(&self.path, bytes)?;
        Ok(())
    }

    pub fn append(&mut self, record: MemoryRecord) -> Result<(), TableError> {
        self.records.push(record);
        self.persist()
    }

    pub fn all(&self) -> &[MemoryRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Brute-force cosine search. Returns up to `limit` rows ordered by
    /// ascending distance (`1 - cosine_similarity`, lower = closer).
    pub fn search(&self, query: &[f32], limit: usize) -> Vec<(f32, &MemoryRecord)> {
        let mut scored: Vec<(f32, &MemoryRecord)> = self
            .records
            .iter()
            .map(|r| (cosine_distance(query, &r.vector), r))
            .collect();
        scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        scored
    }

    /// Remove all records matching `predicate`; returns the count removed
    /// and persists the result.
    pub fn retain_and_count_removed(
        &mut self,
        predicate: impl Fn(&MemoryRecord) -> bool,
    ) -> Result<usize, TableError> {
        let before = self.records.len();
        self.records.retain(|r| !predicate(r));
        let removed = before - self.records.len();
        if removed > 0 {
            self.persist()?;
        }
        Ok(removed)
    }

    pub fn clear(&mut self) -> Result<usize, TableError> {
        let count = self.records.len();
        self.records.clear();
        if count > 0 {
            self.persist()?;
        }
        Ok(count)
    }

    pub fn recent(&self, limit: usize) -> Vec<&MemoryRecord> {
        let mut sorted: Vec<&MemoryRecord> = self.records.iter().collect();
        sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        sorted.truncate(limit);
        sorted
    }
}

pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return f32::MAX;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 1.0;
    }
    1.0 - (dot / (na * nb))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Source;

    #[test]
    fn cosine_distance_zero_for_identical_vectors() {
        let v = vec![1.0, 2.0, 3.0];
        assert!(cosine_distance(&v, &v) < 1e-6);
    }

    #[test]
    fn append_persists_and_reopen_sees_it() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("documents.json");

        {
            let mut table = VectorTable::open(&path).unwrap();
            assert!(table.is_empty());
            table
                .append(MemoryRecord::new("hello".into(), vec![1.0, 0.0], None, Source::Document))
                .unwrap();
        }

        let reopened = VectorTable::open(&path).unwrap();
        assert_eq!(reopened.all().len(), 1);
        assert_eq!(reopened.all()[0].text, "hello");
    }

    #[test]
    fn search_orders_by_ascending_distance() {
        let td = tempfile::tempdir().unwrap();
        let mut table = VectorTable::open(&td.path().join("t.json")).unwrap();
        table
            .append(MemoryRecord::new("far".into(), vec![0.0, 1.0], None, Source::Document))
            .unwrap();
        table
            .append(MemoryRecord::new("near".into(), vec![1.0, 0.0], None, Source::Document))
            .unwrap();

        let results = table.search(&[1.0, 0.0], 2);
        assert_eq!(results[0].1.text, "near");
        assert_eq!(results[1].1.text, "far");
    }

    #[test]
    fn clear_and_retain_scope_correctly() {
        let td = tempfile::tempdir().unwrap();
        let mut table = VectorTable::open(&td.path().join("t.json")).unwrap();
        table
            .append(MemoryRecord::new(
                "a".into(),
                vec![1.0],
                Some("foo.txt".into()),
                Source::Document,
            ))
            .unwrap();
        table
            .append(MemoryRecord::new(
                "b".into(),
                vec![1.0],
                Some("bar.txt".into()),
                Source::Document,
            ))
            .unwrap();

        let removed = table.retain_and_count_removed(|r| r.category.as_deref() == Some("foo.txt")).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(table.all().len(), 1);
        assert_eq!(table.all()[0].text, "b");
    }
}
