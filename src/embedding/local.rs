//! Local ONNX Runtime embedding provider (tier 1).
//!
//! Implements [`EmbeddingProvider`] using the all-MiniLM-L6-v2
//! model via `ort`. Handles tokenization, inference, mean pooling, and L2 normalization.

use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;

use super::{l2_normalize, EmbeddingProvider, EmbeddingTier, EMBEDDING_DIM};
use crate::error::{KnowledgeError, Result};

/// Maximum sequence length for all-MiniLM-L6-v2 (trained at 256).
const MAX_SEQ_LEN: usize = 256;

pub const MODEL_FILE: &str = "model.onnx";
pub const TOKENIZER_FILE: &str = "tokenizer.json";

fn backend_err(context: &str, e: impl std::fmt::Display) -> KnowledgeError {
    KnowledgeError::Embedding(format!("{context}: {e}"))
}

/// Sentence-transformer provider. Loading fails unless both model files are
/// present in the cache directory.
pub struct OnnxEmbeddingProvider {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
}

// Safety: Tokenizer is Send+Sync. Session is behind a Mutex.
// The Mutex guarantees exclusive access during run().
unsafe impl Send for OnnxEmbeddingProvider {}
unsafe impl Sync for OnnxEmbeddingProvider {}

impl OnnxEmbeddingProvider {
    pub fn new(cache_dir: &Path) -> Result<Self> {
        let model_path = cache_dir.join(MODEL_FILE);
        let tokenizer_path = cache_dir.join(TOKENIZER_FILE);

        if !model_path.exists() {
            return Err(KnowledgeError::Embedding(format!(
                "ONNX model not found at {}; run `nexus-kb model download`",
                model_path.display()
            )));
        }
        if !tokenizer_path.exists() {
            return Err(KnowledgeError::Embedding(format!(
                "tokenizer not found at {}; run `nexus-kb model download`",
                tokenizer_path.display()
            )));
        }

        let session = Session::builder()
            .map_err(|e| backend_err("failed to create ONNX session", e))?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)
            .map_err(|e| backend_err("failed to set optimization level", e))?
            .with_intra_threads(4)
            .map_err(|e| backend_err("failed to set thread count", e))?
            .commit_from_file(&model_path)
            .map_err(|e| backend_err("failed to load ONNX model", e))?;

        tracing::info!(model = %model_path.display(), "ONNX model loaded");

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| backend_err("failed to load tokenizer", e))?;

        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length: MAX_SEQ_LEN,
                ..Default::default()
            }))
            .map_err(|e| backend_err("failed to set truncation", e))?;

        tokenizer.with_padding(Some(tokenizers::PaddingParams {
            strategy: tokenizers::PaddingStrategy::BatchLongest,
            ..Default::default()
        }));

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
        })
    }
}

impl EmbeddingProvider for OnnxEmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| KnowledgeError::Embedding("model returned an empty batch".into()))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| backend_err("tokenization failed", e))?;

        let batch_size = encodings.len();
        let seq_len = encodings[0].get_ids().len();

        let mut input_ids = Vec::with_capacity(batch_size * seq_len);
        let mut attention_mask = Vec::with_capacity(batch_size * seq_len);
        for encoding in &encodings {
            input_ids.extend(encoding.get_ids().iter().map(|&id| id as i64));
            attention_mask.extend(encoding.get_attention_mask().iter().map(|&m| m as i64));
        }

        let shape = vec![batch_size as i64, seq_len as i64];
        let input_ids_tensor = Tensor::from_array((shape.clone(), input_ids.into_boxed_slice()))
            .map_err(|e| backend_err("failed to build input tensor", e))?;
        let attention_mask_tensor =
            Tensor::from_array((shape.clone(), attention_mask.clone().into_boxed_slice()))
                .map_err(|e| backend_err("failed to build mask tensor", e))?;
        // single segment
        let token_type_ids_tensor =
            Tensor::from_array((shape, vec![0i64; batch_size * seq_len].into_boxed_slice()))
                .map_err(|e| backend_err("failed to build segment tensor", e))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| backend_err("session lock poisoned", e))?;

        let outputs = session
            .run(ort::inputs! {
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_mask_tensor,
                "token_type_ids" => token_type_ids_tensor,
            })
            .map_err(|e| backend_err("inference failed", e))?;

        // Output name varies by export.
        let token_embeddings = outputs
            .get("token_embeddings")
            .or_else(|| outputs.get("last_hidden_state"))
            .unwrap_or_else(|| &outputs[0]);

        let (out_shape, data) = token_embeddings
            .try_extract_tensor::<f32>()
            .map_err(|e| backend_err("failed to extract token embeddings", e))?;

        let dims: &[i64] = &out_shape;
        if dims.len() != 3 {
            return Err(KnowledgeError::Embedding(format!(
                "unexpected token_embeddings shape: {dims:?}"
            )));
        }
        let out_seq_len = dims[1] as usize;
        let hidden_dim = dims[2] as usize;

        let mut results = Vec::with_capacity(batch_size);
        for b in 0..batch_size {
            let mut sum = vec![0.0f32; hidden_dim];
            let mut count = 0.0f32;

            for s in 0..out_seq_len.min(seq_len) {
                let mask = attention_mask[b * seq_len + s] as f32;
                if mask > 0.0 {
                    let offset = (b * out_seq_len + s) * hidden_dim;
                    for (d, acc) in sum.iter_mut().enumerate() {
                        *acc += data[offset + d] * mask;
                    }
                    count += mask;
                }
            }

            if count > 0.0 {
                sum.iter_mut().for_each(|x| *x /= count);
            }

            let mut pooled = l2_normalize(&sum);
            pooled.resize(EMBEDDING_DIM, 0.0);
            results.push(pooled);
        }

        Ok(results)
    }

    fn tier(&self) -> EmbeddingTier {
        EmbeddingTier::Onnx
    }
}
