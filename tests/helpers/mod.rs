#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use nexus_knowledge::embedding::{
    l2_normalize, to_bytes, Embedder, EmbeddingProvider, EmbeddingTier, EMBEDDING_DIM,
};
use nexus_knowledge::knowledge::{ChunkStore, KnowledgeSearch};
use nexus_knowledge::Result;

/// Fresh in-memory store.
pub fn test_store() -> Arc<ChunkStore> {
    Arc::new(ChunkStore::in_memory().unwrap())
}

/// Search over a fresh in-memory store with the given provider.
pub fn test_search(provider: impl EmbeddingProvider + 'static) -> KnowledgeSearch {
    KnowledgeSearch::new(test_store(), Arc::new(Embedder::with_provider(Box::new(provider))))
}

/// Unit vector with a spike at `index`.
pub fn unit(index: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; EMBEDDING_DIM];
    v[index % EMBEDDING_DIM] = 1.0;
    v
}

/// Unit vector whose cosine similarity to `unit(0)` is `similarity`.
pub fn at_similarity(similarity: f32) -> Vec<f32> {
    let mut v = vec![0.0f32; EMBEDDING_DIM];
    v[0] = similarity;
    v[1] = (1.0 - similarity * similarity).sqrt();
    v
}

pub fn blob(v: &[f32]) -> Vec<u8> {
    to_bytes(v).unwrap()
}

/// Bag-of-prefixes provider: every word contributes to a bucket chosen by its
/// first four letters. Vectors are non-negative, so cosine similarity is never
/// below zero, and texts sharing word stems score higher.
pub struct StemBucketProvider;

impl EmbeddingProvider for StemBucketProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = vec![0.0f32; EMBEDDING_DIM];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let stem: String = word.to_lowercase().chars().take(4).collect();
            let bucket = stem.bytes().fold(7usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize));
            v[bucket % EMBEDDING_DIM] += 1.0;
        }
        Ok(l2_normalize(&v))
    }

    fn tier(&self) -> EmbeddingTier {
        EmbeddingTier::TfIdf
    }
}

/// Provider with a fixed vector per exact text; unknown text maps to `unit(383)`.
pub struct FixedProvider {
    vectors: HashMap<String, Vec<f32>>,
}

impl FixedProvider {
    pub fn new<'a>(entries: impl IntoIterator<Item = (&'a str, Vec<f32>)>) -> Self {
        Self {
            vectors: entries
                .into_iter()
                .map(|(text, v)| (text.to_string(), v))
                .collect(),
        }
    }
}

impl EmbeddingProvider for FixedProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vectors.get(text).cloned().unwrap_or_else(|| unit(383)))
    }

    fn tier(&self) -> EmbeddingTier {
        EmbeddingTier::Onnx
    }
}
