//! Text-to-vector embedding pipeline.
//!
//! Three backends sit behind the [`EmbeddingProvider`] trait, from best to
//! always-available:
//!
//! 1. [`local::OnnxEmbeddingProvider`]: all-MiniLM-L6-v2 via ONNX Runtime
//! 2. [`tfidf::TfIdfVectorizer`]: term-frequency vectorizer over a fitted vocabulary
//! 3. [`hash::HashEmbeddingProvider`]: deterministic pseudo-embedding
//!
//! The [`Embedder`] picks one backend once and keeps it for its lifetime. It
//! never fails to produce a vector: a backend error degrades that call to tier 3.
//!
//! Vectors are persisted with [`to_bytes`] / [`from_bytes`]: exactly
//! [`EMBEDDING_DIM`] little-endian `f32` values.

pub mod domain;
pub mod hash;
pub mod local;
pub mod tfidf;

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::config::EmbeddingConfig;
use crate::error::{KnowledgeError, Result};

/// Number of dimensions in every stored vector.
pub const EMBEDDING_DIM: usize = 384;

/// Byte length of an encoded vector.
pub const EMBEDDING_BYTES: usize = EMBEDDING_DIM * std::mem::size_of::<f32>();

/// Which backend produced a vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingTier {
    Onnx,
    TfIdf,
    Hash,
}

impl EmbeddingTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Onnx => "transformer",
            Self::TfIdf => "tfidf",
            Self::Hash => "hash",
        }
    }
}

impl Serialize for EmbeddingTier {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl fmt::Display for EmbeddingTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmbeddingTier {
    type Err = KnowledgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "transformer" | "onnx" => Ok(Self::Onnx),
            "tfidf" => Ok(Self::TfIdf),
            "hash" => Ok(Self::Hash),
            other => Err(KnowledgeError::Embedding(format!(
                "unknown embedding tier: {other}"
            ))),
        }
    }
}

/// Trait for embedding text into vectors.
///
/// All methods are synchronous; callers in async contexts should use
/// `tokio::task::spawn_blocking`.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text string into a vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of text strings. Implementations may override for batched inference.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn tier(&self) -> EmbeddingTier;
}

/// Initialize-once embedding context.
///
/// Holds the selected backend for the lifetime of the process (or test). Share it
/// with `Arc<Embedder>`; it is read-only after construction.
pub struct Embedder {
    provider: Box<dyn EmbeddingProvider>,
}

impl Embedder {
    /// Select a backend from config.
    ///
    /// `auto` tries ONNX, then TF-IDF, then hash. An explicit `onnx` or `tfidf`
    /// tier that cannot be loaded is an error; `hash` always succeeds.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let cache_dir = config.resolved_cache_dir();
        let embedder = match config.tier.as_str() {
            "auto" => {
                match local::OnnxEmbeddingProvider::new(&cache_dir) {
                    Ok(provider) => Self::with_provider(Box::new(provider)),
                    Err(onnx_err) => {
                        tracing::debug!(error = %onnx_err, "ONNX tier unavailable");
                        match tfidf::TfIdfVectorizer::load(&cache_dir.join(tfidf::VOCABULARY_FILE)) {
                            Ok(vectorizer) if !vectorizer.is_empty() => {
                                Self::with_provider(Box::new(vectorizer))
                            }
                            Ok(_) => {
                                tracing::debug!("TF-IDF vocabulary is empty");
                                Self::hash()
                            }
                            Err(tfidf_err) => {
                                tracing::debug!(error = %tfidf_err, "TF-IDF tier unavailable");
                                Self::hash()
                            }
                        }
                    }
                }
            }
            other => match other.parse::<EmbeddingTier>()? {
                EmbeddingTier::Onnx => {
                    Self::with_provider(Box::new(local::OnnxEmbeddingProvider::new(&cache_dir)?))
                }
                EmbeddingTier::TfIdf => {
                    let vectorizer =
                        tfidf::TfIdfVectorizer::load(&cache_dir.join(tfidf::VOCABULARY_FILE))?;
                    if vectorizer.is_empty() {
                        return Err(KnowledgeError::Embedding(
                            "TF-IDF vocabulary is empty; run `nexus-kb model fit`".into(),
                        ));
                    }
                    Self::with_provider(Box::new(vectorizer))
                }
                EmbeddingTier::Hash => Self::hash(),
            },
        };

        if embedder.tier() == EmbeddingTier::Hash {
            tracing::warn!(
                "using hash embeddings: similarity only detects exact or near-duplicate text"
            );
        }
        tracing::info!(tier = %embedder.tier(), "embedding tier selected");
        Ok(embedder)
    }

    /// Tier 3 only.
    pub fn hash() -> Self {
        Self::with_provider(Box::new(hash::HashEmbeddingProvider))
    }

    /// Wrap an already-built provider.
    pub fn with_provider(provider: Box<dyn EmbeddingProvider>) -> Self {
        Self { provider }
    }

    pub fn tier(&self) -> EmbeddingTier {
        self.provider.tier()
    }

    /// Encode text into exactly [`EMBEDDING_DIM`] values.
    ///
    /// Provider output is truncated or zero-padded to the fixed width. Provider
    /// failures fall back to the hash embedding for this call only.
    pub fn encode(&self, text: &str) -> Vec<f32> {
        match self.provider.embed(text) {
            Ok(mut vec) => {
                vec.resize(EMBEDDING_DIM, 0.0);
                vec
            }
            Err(e) => {
                tracing::warn!(tier = %self.tier(), error = %e, "embedding failed, using hash fallback");
                hash::hash_embedding(text)
            }
        }
    }
}

/// Serialize a vector to its little-endian blob form.
pub fn to_bytes(vec: &[f32]) -> Result<Vec<u8>> {
    if vec.len() != EMBEDDING_DIM {
        return Err(KnowledgeError::DimensionMismatch {
            expected: EMBEDDING_DIM,
            actual: vec.len(),
        });
    }
    Ok(vec.iter().flat_map(|v| v.to_le_bytes()).collect())
}

/// Deserialize a blob produced by [`to_bytes`].
pub fn from_bytes(data: &[u8]) -> Result<Vec<f32>> {
    if data.len() != EMBEDDING_BYTES {
        return Err(KnowledgeError::BlobLength {
            expected: EMBEDDING_BYTES,
            actual: data.len(),
        });
    }
    Ok(data
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// Cosine similarity, accumulated in `f64`.
///
/// Returns 0.0 when either vector has zero norm or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }
    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// L2-normalize a vector. Returns the input unchanged if its norm is zero.
pub fn l2_normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingProvider;

    impl EmbeddingProvider for FailingProvider {
        fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(KnowledgeError::Embedding("model crashed".into()))
        }

        fn tier(&self) -> EmbeddingTier {
            EmbeddingTier::Onnx
        }
    }

    struct ShortProvider;

    impl EmbeddingProvider for ShortProvider {
        fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 2.0, 3.0])
        }

        fn tier(&self) -> EmbeddingTier {
            EmbeddingTier::TfIdf
        }
    }

    #[test]
    fn round_trip_is_bit_exact() {
        let v: Vec<f32> = (0..EMBEDDING_DIM)
            .map(|i| (i as f32 * 0.731).sin() * 1e-3 + f32::EPSILON * i as f32)
            .collect();
        let bytes = to_bytes(&v).unwrap();
        assert_eq!(bytes.len(), EMBEDDING_BYTES);
        let back = from_bytes(&bytes).unwrap();
        for (a, b) in v.iter().zip(&back) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn to_bytes_rejects_wrong_dimension() {
        let err = to_bytes(&vec![0.0; 383]).unwrap_err();
        assert!(matches!(
            err,
            KnowledgeError::DimensionMismatch { expected: 384, actual: 383 }
        ));
        assert!(to_bytes(&vec![0.0; 385]).is_err());
        assert!(to_bytes(&[]).is_err());
    }

    #[test]
    fn from_bytes_rejects_wrong_length() {
        assert!(matches!(
            from_bytes(&[0u8; 1535]).unwrap_err(),
            KnowledgeError::BlobLength { expected: 1536, actual: 1535 }
        ));
        assert!(from_bytes(&[0u8; 1540]).is_err());
    }

    #[test]
    fn byte_layout_is_little_endian() {
        let mut v = vec![0.0f32; EMBEDDING_DIM];
        v[0] = 1.0;
        let bytes = to_bytes(&v).unwrap();
        assert_eq!(&bytes[..4], &[0x00, 0x00, 0x80, 0x3f]);
    }

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![0.3, -0.2, 0.9];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn cosine_with_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 1.0], &[0.0, 0.0]), 0.0);
    }

    #[test]
    fn cosine_with_mismatched_lengths_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
    }

    #[test]
    fn test_l2_normalize() {
        let normalized = l2_normalize(&[3.0, 4.0]);
        assert!((normalized[0] - 0.6).abs() < 1e-6);
        assert!((normalized[1] - 0.8).abs() < 1e-6);
        assert_eq!(l2_normalize(&[0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn encode_falls_back_to_hash_on_provider_error() {
        let embedder = Embedder::with_provider(Box::new(FailingProvider));
        let v = embedder.encode("connection reset by peer");
        assert_eq!(v, hash::hash_embedding("connection reset by peer"));
    }

    #[test]
    fn encode_pads_short_output() {
        let embedder = Embedder::with_provider(Box::new(ShortProvider));
        let v = embedder.encode("anything");
        assert_eq!(v.len(), EMBEDDING_DIM);
        assert_eq!(&v[..3], &[1.0, 2.0, 3.0]);
        assert!(v[3..].iter().all(|x| *x == 0.0));
    }

    #[test]
    fn hash_config_selects_hash_tier() {
        let config = EmbeddingConfig {
            tier: "hash".into(),
            model: "all-MiniLM-L6-v2".into(),
            cache_dir: "/nonexistent/models".into(),
        };
        assert_eq!(Embedder::from_config(&config).unwrap().tier(), EmbeddingTier::Hash);
    }

    #[test]
    fn auto_without_models_degrades_to_hash() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = EmbeddingConfig {
            tier: "auto".into(),
            model: "all-MiniLM-L6-v2".into(),
            cache_dir: dir.path().to_string_lossy().into_owned(),
        };
        assert_eq!(Embedder::from_config(&config).unwrap().tier(), EmbeddingTier::Hash);
    }

    #[test]
    fn explicit_onnx_without_models_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = EmbeddingConfig {
            tier: "onnx".into(),
            model: "all-MiniLM-L6-v2".into(),
            cache_dir: dir.path().to_string_lossy().into_owned(),
        };
        assert!(Embedder::from_config(&config).is_err());
    }
}
