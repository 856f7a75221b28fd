//! Deterministic hash pseudo-embedding (tier 3).
//!
//! Each dimension `i` is derived from the MD5 digest of `"{prefix}:{i}"`, where
//! `prefix` is the first 500 characters of the text. The vector is L2-normalized.
//! Identical (or identically-prefixed) texts map to identical vectors; anything
//! else is effectively uncorrelated, so this tier only supports duplicate detection.

use super::{EmbeddingProvider, EmbeddingTier, EMBEDDING_DIM};
use crate::error::Result;

/// Characters of input that participate in the hash.
const HASH_PREFIX_CHARS: usize = 500;

/// Always-available provider backed by [`hash_embedding`].
#[derive(Debug, Clone, Copy, Default)]
pub struct HashEmbeddingProvider;

impl EmbeddingProvider for HashEmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(hash_embedding(text))
    }

    fn tier(&self) -> EmbeddingTier {
        EmbeddingTier::Hash
    }
}

pub fn hash_embedding(text: &str) -> Vec<f32> {
    let prefix: String = text.chars().take(HASH_PREFIX_CHARS).collect();

    let raw: Vec<f64> = (0..EMBEDDING_DIM)
        .map(|i| {
            let digest = md5::compute(format!("{prefix}:{i}").as_bytes());
            // first 8 hex digits of the digest
            let word = u32::from_be_bytes([digest.0[0], digest.0[1], digest.0[2], digest.0[3]]);
            (word as f64 / u32::MAX as f64) * 2.0 - 1.0
        })
        .collect();

    let norm = raw.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm > 0.0 {
        raw.iter().map(|v| (v / norm) as f32).collect()
    } else {
        raw.iter().map(|v| *v as f32).collect()
    }
}
