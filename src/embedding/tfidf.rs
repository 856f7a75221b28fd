//! TF-IDF vectorizer (tier 2).
//!
//! A dense TF-IDF encoder with scikit-learn's defaults:
//! lowercase tokens of two or more word characters, a vocabulary capped at
//! [`EMBEDDING_DIM`] terms chosen by corpus frequency and indexed alphabetically,
//! smoothed idf, and L2-normalized output zero-padded to the fixed width.
//!
//! The vocabulary is fitted from stored chunks (`nexus-kb model fit`) and
//! persisted as JSON next to the ONNX model files.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{EmbeddingProvider, EmbeddingTier, EMBEDDING_DIM};
use crate::error::{KnowledgeError, Result};

/// File name of the persisted vocabulary inside the model cache directory.
pub const VOCABULARY_FILE: &str = "tfidf.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Term {
    pub term: String,
    pub idf: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TfIdfVectorizer {
    documents: usize,
    terms: Vec<Term>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl TfIdfVectorizer {
    /// Fit a vocabulary over `corpus`.
    pub fn fit<S: AsRef<str>>(corpus: &[S]) -> Self {
        let mut term_freq: HashMap<String, u64> = HashMap::new();
        let mut doc_freq: HashMap<String, u64> = HashMap::new();

        for doc in corpus {
            let tokens = tokenize(doc.as_ref());
            let mut seen = HashSet::new();
            for token in tokens {
                if seen.insert(token.clone()) {
                    *doc_freq.entry(token.clone()).or_default() += 1;
                }
                *term_freq.entry(token).or_default() += 1;
            }
        }

        let mut ranked: Vec<(String, u64)> = term_freq.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(EMBEDDING_DIM);

        let n = corpus.len() as f64;
        let mut selected: BTreeMap<String, f32> = BTreeMap::new();
        for (term, _) in ranked {
            let df = doc_freq.get(&term).copied().unwrap_or(0) as f64;
            let idf = ((1.0 + n) / (1.0 + df)).ln() + 1.0;
            selected.insert(term, idf as f32);
        }

        let terms = selected
            .into_iter()
            .map(|(term, idf)| Term { term, idf })
            .collect();
        Self::from_parts(corpus.len(), terms)
    }

    fn from_parts(documents: usize, terms: Vec<Term>) -> Self {
        let index = terms
            .iter()
            .enumerate()
            .map(|(i, t)| (t.term.clone(), i))
            .collect();
        Self {
            documents,
            terms,
            index,
        }
    }

    /// Load a persisted vocabulary.
    ///
    /// Rejects files with more than [`EMBEDDING_DIM`] terms or repeated terms,
    /// since each term owns one output slot.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let parsed: TfIdfVectorizer = serde_json::from_str(&contents).map_err(|e| {
            KnowledgeError::Embedding(format!("invalid vocabulary {}: {e}", path.display()))
        })?;
        if parsed.terms.len() > EMBEDDING_DIM {
            return Err(KnowledgeError::Embedding(format!(
                "vocabulary {} has {} terms, at most {EMBEDDING_DIM} allowed",
                path.display(),
                parsed.terms.len()
            )));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = parsed.terms.iter().find(|t| !seen.insert(t.term.as_str())) {
            return Err(KnowledgeError::Embedding(format!(
                "vocabulary {} repeats term {:?}",
                path.display(),
                dup.term
            )));
        }
        Ok(Self::from_parts(parsed.documents, parsed.terms))
    }

    /// Persist the vocabulary as JSON, creating the parent directory.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| KnowledgeError::Embedding(format!("failed to encode vocabulary: {e}")))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn documents(&self) -> usize {
        self.documents
    }

    pub fn transform(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; EMBEDDING_DIM];
        for token in tokenize(text) {
            if let Some(&i) = self.index.get(&token) {
                vec[i] += 1.0;
            }
        }
        for (value, term) in vec.iter_mut().zip(&self.terms) {
            *value *= term.idf;
        }
        super::l2_normalize(&vec)
    }
}

impl EmbeddingProvider for TfIdfVectorizer {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.transform(text))
    }

    fn tier(&self) -> EmbeddingTier {
        EmbeddingTier::TfIdf
    }
}

/// Lowercased runs of at least two word characters.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| t.chars().count() >= 2)
        .map(str::to_lowercase)
        .collect()
}
