//! Deterministic, network-free embedding provider.
//!
//! Each output dimension is the xxh3 hash of `text` salted by its index,
//! folded into `[-0.5, 0.5)`. No tokenizer, no model weights, no I/O —
//! identical input always produces identical output, which is the only
//! property this provider promises (spec §4.1/§8).

use crate::{EmbeddingError, EmbeddingProvider, EmbeddingProviderKind};
use async_trait::async_trait;
use xxhash_rust::xxh3::xxh3_64_with_seed;

pub struct LocalProvider;

#[async_trait]
impl EmbeddingProvider for LocalProvider {
    async fn embed_raw(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(embed_local(text, DEFAULT_LOCAL_DIM))
    }

    fn kind(&self) -> EmbeddingProviderKind {
        EmbeddingProviderKind::Local
    }

    fn model_id(&self) -> &str {
        "local-xxh3"
    }
}

/// Default width for the raw local vector before the service aligns it to
/// the configured store dimension.
pub const DEFAULT_LOCAL_DIM: usize = 256;

pub fn embed_local(text: &str, dim: usize) -> Vec<f32> {
    let bytes = text.as_bytes();
    (0..dim)
        .map(|i| {
            let h = xxh3_64_with_seed(bytes, i as u64);
            // Fold the 64-bit hash into [-0.5, 0.5).
            ((h % 1_000_000) as f32 / 1_000_000.0) - 0.5
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_text_same_vector() {
        let a = embed_local("the quick brown fox", 32);
        let b = embed_local("the quick brown fox", 32);
        assert_eq!(a, b);
    }

    #[test]
    fn different_text_differs() {
        let a = embed_local("alpha", 32);
        let b = embed_local("beta", 32);
        assert_ne!(a, b);
    }
}
