//! Retrieval and ingestion.
//!
//! A query embeds its text once, pulls at most `candidate_limit` pre-filtered rows
//! from the [`ChunkStore`], scores each by cosine similarity, drops those below the
//! threshold, then ranks by `similarity × type weight × recency factor`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::KnowledgeConfig;
use crate::embedding::domain::classify_domain;
use crate::embedding::{cosine_similarity, from_bytes, to_bytes, Embedder, EmbeddingTier};
use crate::error::Result;
use crate::knowledge::store::{ChunkFilter, ChunkStore, NewChunk, DEFAULT_CANDIDATE_LIMIT};
use crate::knowledge::types::{ChunkType, Domain, Metadata, ScoredChunk, SearchMode};

pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_THRESHOLD: f64 = 0.35;

/// Age under which a chunk gets a recency boost.
const RECENCY_WINDOW_DAYS: f64 = 7.0;
/// Divisor giving at most +10% at age zero.
const RECENCY_SCALE: f64 = 70.0;

/// Ranking multiplier for a chunk type.
pub fn type_weight(chunk_type: ChunkType) -> f64 {
    chunk_type.weight()
}

/// `1 + max(0, (7 − age) / 70)`. Unknown age gets no boost; negative ages clamp to zero.
pub fn recency_factor(age_days: Option<f64>) -> f64 {
    match age_days {
        Some(age) => {
            let age = age.max(0.0);
            1.0 + ((RECENCY_WINDOW_DAYS - age) / RECENCY_SCALE).max(0.0)
        }
        None => 1.0,
    }
}

/// One retrieval request.
#[derive(Debug, Clone, Serialize)]
pub struct Query {
    pub text: String,
    pub mode: SearchMode,
    pub domain: Option<Domain>,
    /// Empty means all projects.
    pub project: String,
    pub top_k: usize,
    pub threshold: f64,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            mode: SearchMode::All,
            domain: None,
            project: String::new(),
            top_k: DEFAULT_TOP_K,
            threshold: DEFAULT_THRESHOLD,
        }
    }

    pub fn mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn domain(mut self, domain: Option<Domain>) -> Self {
        self.domain = domain;
        self
    }

    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.project = project.into();
        self
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }
}

/// Ranked results, in the same shape the server-backed search returns.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub mode: SearchMode,
    pub results: Vec<ScoredChunk>,
    pub count: usize,
}

impl SearchResponse {
    pub fn has_results(&self) -> bool {
        !self.results.is_empty()
    }

    pub fn top_match(&self) -> Option<&ScoredChunk> {
        self.results.first()
    }
}

/// A chunk to ingest. The domain is classified from content when not given.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub chunk_type: ChunkType,
    pub content: String,
    pub source_id: Option<String>,
    pub metadata: Metadata,
    pub domain: Option<Domain>,
    pub project: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl IngestRequest {
    pub fn new(chunk_type: ChunkType, content: impl Into<String>) -> Self {
        Self {
            chunk_type,
            content: content.into(),
            source_id: None,
            metadata: Metadata::new(),
            domain: None,
            project: String::new(),
            created_at: None,
        }
    }

    pub fn source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn domain(mut self, domain: Option<Domain>) -> Self {
        self.domain = domain;
        self
    }

    pub fn project(mut self, project: impl Into<String>) -> Self {
        self.project = project.into();
        self
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeStatus {
    pub total_chunks: u64,
    pub by_type: BTreeMap<ChunkType, u64>,
    pub ready: bool,
    pub tier: EmbeddingTier,
}

/// Query and ingestion front end over a shared store and embedder.
#[derive(Clone)]
pub struct KnowledgeSearch {
    store: Arc<ChunkStore>,
    embedder: Arc<Embedder>,
    candidate_limit: usize,
}

impl KnowledgeSearch {
    pub fn new(store: Arc<ChunkStore>, embedder: Arc<Embedder>) -> Self {
        Self {
            store,
            embedder,
            candidate_limit: DEFAULT_CANDIDATE_LIMIT,
        }
    }

    pub fn with_candidate_limit(mut self, limit: usize) -> Self {
        self.candidate_limit = limit;
        self
    }

    /// Open the configured store, select the embedding tier, and check that the
    /// stored vectors were produced by the same tier.
    pub fn open(config: &KnowledgeConfig) -> Result<Self> {
        let store = ChunkStore::from_config(config)?;
        let embedder = Embedder::from_config(&config.embedding)?;

        let running = embedder.tier();
        match store.embedding_tier()? {
            Some(stored) if stored != running.as_str() => {
                tracing::warn!(
                    stored = %stored,
                    running = %running,
                    "embedding tier differs from stored vectors; similarity scores will be unreliable until re-import"
                );
            }
            Some(_) => {}
            None => store.record_embedding_tier(running.as_str())?,
        }

        Ok(Self::new(Arc::new(store), Arc::new(embedder))
            .with_candidate_limit(config.retrieval.candidate_limit))
    }

    pub fn store(&self) -> &Arc<ChunkStore> {
        &self.store
    }

    pub fn embedder(&self) -> &Arc<Embedder> {
        &self.embedder
    }

    /// Ranked chunks at or above `query.threshold`, at most `query.top_k`.
    pub fn query(&self, query: &Query) -> Result<SearchResponse> {
        let started = Instant::now();
        let query_vec = self.embedder.encode(&query.text);

        let allowed = query.mode.allowed_types();
        let filter = ChunkFilter {
            chunk_type: match allowed {
                [only] => Some(*only),
                _ => None,
            },
            domain: query.domain,
            project: query.project.clone(),
            max_age_days: None,
            limit: self.candidate_limit,
        };
        let candidates = self.store.get_chunks_filtered(&filter)?;
        let scanned = candidates.len();

        let now = Utc::now();
        let mut results = Vec::new();
        for chunk in candidates {
            if !allowed.is_empty() && !allowed.contains(&chunk.chunk_type) {
                continue;
            }
            let vec = from_bytes(&chunk.embedding)?;
            let similarity = cosine_similarity(&query_vec, &vec);
            if similarity < query.threshold {
                continue;
            }
            let score = similarity
                * type_weight(chunk.chunk_type)
                * recency_factor(chunk.age_days(now));
            results.push(ScoredChunk { chunk, raw_similarity: similarity, score });
        }
        let matched = results.len();

        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(query.top_k);

        tracing::debug!(
            mode = %query.mode,
            scanned,
            matched,
            returned = results.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "knowledge query"
        );

        Ok(SearchResponse {
            query: query.text.clone(),
            mode: query.mode,
            count: results.len(),
            results,
        })
    }

    fn query_mode(
        &self,
        text: &str,
        mode: SearchMode,
        domain: Option<Domain>,
        top_k: usize,
    ) -> Result<SearchResponse> {
        self.query(&Query::new(text).mode(mode).domain(domain).top_k(top_k))
    }

    pub fn errors(&self, text: &str, domain: Option<Domain>, top_k: usize) -> Result<SearchResponse> {
        self.query_mode(text, SearchMode::Errors, domain, top_k)
    }

    pub fn tasks(&self, text: &str, domain: Option<Domain>, top_k: usize) -> Result<SearchResponse> {
        self.query_mode(text, SearchMode::Tasks, domain, top_k)
    }

    pub fn code_changes(
        &self,
        text: &str,
        domain: Option<Domain>,
        top_k: usize,
    ) -> Result<SearchResponse> {
        self.query_mode(text, SearchMode::Code, domain, top_k)
    }

    pub fn conversations(
        &self,
        text: &str,
        domain: Option<Domain>,
        top_k: usize,
    ) -> Result<SearchResponse> {
        self.query_mode(text, SearchMode::Conversations, domain, top_k)
    }

    /// Classify, embed, and store a chunk. Returns the effective `source_id`.
    pub fn ingest(&self, request: IngestRequest) -> Result<String> {
        let domain = request.domain.or_else(|| classify_domain(&request.content));
        let embedding = to_bytes(&self.embedder.encode(&request.content))?;

        let mut chunk = NewChunk::new(request.chunk_type, request.content, embedding)
            .metadata(request.metadata)
            .domain(domain)
            .project(request.project);
        if let Some(source_id) = request.source_id {
            chunk = chunk.source_id(source_id);
        }
        if let Some(created_at) = request.created_at {
            chunk = chunk.created_at(created_at);
        }
        self.store.store_chunk(chunk)
    }

    fn ingest_as(
        &self,
        chunk_type: ChunkType,
        content: &str,
        source_id: Option<&str>,
        project: &str,
    ) -> Result<String> {
        let mut request = IngestRequest::new(chunk_type, content).project(project);
        if let Some(id) = source_id {
            request = request.source_id(id);
        }
        self.ingest(request)
    }

    pub fn ingest_error(&self, content: &str, source_id: Option<&str>, project: &str) -> Result<String> {
        self.ingest_as(ChunkType::ErrorResolution, content, source_id, project)
    }

    pub fn ingest_task(&self, content: &str, source_id: Option<&str>, project: &str) -> Result<String> {
        self.ingest_as(ChunkType::TaskOutcome, content, source_id, project)
    }

    pub fn ingest_code_change(
        &self,
        content: &str,
        source_id: Option<&str>,
        project: &str,
    ) -> Result<String> {
        self.ingest_as(ChunkType::CodeChange, content, source_id, project)
    }

    pub fn ingest_conversation(
        &self,
        content: &str,
        source_id: Option<&str>,
        project: &str,
    ) -> Result<String> {
        self.ingest_as(ChunkType::Conversation, content, source_id, project)
    }

    pub fn ingest_directive(
        &self,
        content: &str,
        source_id: Option<&str>,
        project: &str,
    ) -> Result<String> {
        self.ingest_as(ChunkType::DirectiveSummary, content, source_id, project)
    }

    pub fn status(&self) -> Result<KnowledgeStatus> {
        let by_type = self.store.count_chunks(None)?;
        Ok(KnowledgeStatus {
            total_chunks: by_type.values().sum(),
            by_type,
            ready: true,
            tier: self.embedder.tier(),
        })
    }

    pub fn prune(&self) -> Result<u64> {
        self.store.prune_old_chunks()
    }

    pub fn delete_project(&self, project: &str) -> Result<u64> {
        self.store.delete_project(project)
    }

    pub fn close(&self) -> Result<()> {
        self.store.close()
    }
}
