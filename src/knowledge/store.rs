//! Durable chunk storage.
//!
//! [`ChunkStore`] owns the single SQLite connection. Writes (`store_chunk`,
//! `prune_old_chunks`, `delete_project`) hold the connection mutex across the
//! statement and its commit, so concurrent readers observe whole-row upserts
//! and deletions only.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, Row};

use crate::config::KnowledgeConfig;
use crate::db::{self, migrations, HealthReport};
use crate::embedding::EMBEDDING_BYTES;
use crate::error::{KnowledgeError, Result};
use crate::knowledge::types::{Chunk, ChunkType, Domain, Metadata};

/// Stored content is cut to this many characters.
pub const MAX_CONTENT_CHARS: usize = 4000;

/// Default cap on rows returned by [`ChunkStore::get_chunks_filtered`].
pub const DEFAULT_CANDIDATE_LIMIT: usize = 500;

const SECONDS_PER_DAY: f64 = 86_400.0;

const CHUNK_COLUMNS: &str =
    "chunk_type, source_id, content, embedding, metadata, domain_tag, project, created_at";

/// A chunk to be written. Build with [`NewChunk::new`] and the setters.
#[derive(Debug, Clone)]
pub struct NewChunk {
    chunk_type: ChunkType,
    content: String,
    embedding: Vec<u8>,
    source_id: Option<String>,
    metadata: Metadata,
    domain: Option<Domain>,
    project: String,
    created_at: Option<DateTime<Utc>>,
}

impl NewChunk {
    pub fn new(chunk_type: ChunkType, content: impl Into<String>, embedding: Vec<u8>) -> Self {
        Self {
            chunk_type,
            content: content.into(),
            embedding,
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

    /// Override the insertion timestamp (import, tests). Defaults to now.
    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }
}

/// AND-combined filters for [`ChunkStore::get_chunks_filtered`].
#[derive(Debug, Clone)]
pub struct ChunkFilter {
    pub chunk_type: Option<ChunkType>,
    pub domain: Option<Domain>,
    /// Empty string means no project filter.
    pub project: String,
    pub max_age_days: Option<f64>,
    pub limit: usize,
}

impl Default for ChunkFilter {
    fn default() -> Self {
        Self {
            chunk_type: None,
            domain: None,
            project: String::new(),
            max_age_days: None,
            limit: DEFAULT_CANDIDATE_LIMIT,
        }
    }
}

/// Content-derived natural key: `hash:` + 12 hex chars of MD5 over the first 500 chars.
pub fn derive_source_id(content: &str) -> String {
    let prefix: String = content.chars().take(500).collect();
    let digest = format!("{:x}", md5::compute(prefix.as_bytes()));
    format!("hash:{}", &digest[..12])
}

fn truncate_chars(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((idx, _)) => content[..idx].to_string(),
        None => content.to_string(),
    }
}

fn to_unix_seconds(ts: DateTime<Utc>) -> f64 {
    ts.timestamp_micros() as f64 / 1_000_000.0
}

fn from_unix_seconds(secs: f64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros((secs * 1_000_000.0).round() as i64)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Intermediate row; parsing of tags and metadata happens outside the rusqlite closure
/// so format errors keep their own error variants.
struct RawChunk {
    chunk_type: String,
    source_id: String,
    content: String,
    embedding: Vec<u8>,
    metadata: String,
    domain_tag: String,
    project: String,
    created_at: f64,
}

impl RawChunk {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            chunk_type: row.get(0)?,
            source_id: row.get(1)?,
            content: row.get(2)?,
            embedding: row.get(3)?,
            metadata: row.get(4)?,
            domain_tag: row.get(5)?,
            project: row.get(6)?,
            created_at: row.get(7)?,
        })
    }

    fn into_chunk(self) -> Result<Chunk> {
        Ok(Chunk {
            chunk_type: self.chunk_type.parse()?,
            source_id: self.source_id,
            content: self.content,
            embedding: self.embedding,
            domain_tag: Domain::from_tag(&self.domain_tag)?,
            project: self.project,
            metadata: serde_json::from_str(&self.metadata)?,
            created_at: from_unix_seconds(self.created_at),
        })
    }
}

/// Keyed chunk storage over one SQLite connection.
pub struct ChunkStore {
    /// `None` for a private in-memory database.
    path: Option<PathBuf>,
    busy_timeout: Duration,
    conn: Mutex<Option<Connection>>,
}

impl ChunkStore {
    /// Create an uninitialized store for `path`. Call [`init`](Self::init) before use.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            busy_timeout: db::DEFAULT_BUSY_TIMEOUT,
            conn: Mutex::new(None),
        }
    }

    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    /// `new` followed by `init`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::new(path);
        store.init()?;
        Ok(store)
    }

    /// Open the store described by the `[storage]` config section.
    pub fn from_config(config: &KnowledgeConfig) -> Result<Self> {
        let store = Self::new(config.resolved_db_path())
            .with_busy_timeout(Duration::from_millis(config.storage.busy_timeout_ms));
        store.init()?;
        Ok(store)
    }

    /// An initialized private in-memory store.
    pub fn in_memory() -> Result<Self> {
        let store = Self {
            path: None,
            busy_timeout: db::DEFAULT_BUSY_TIMEOUT,
            conn: Mutex::new(None),
        };
        store.init()?;
        Ok(store)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Open the connection and bring the schema up to date. A no-op when already open.
    pub fn init(&self) -> Result<()> {
        let mut guard = self.lock();
        if guard.is_some() {
            return Ok(());
        }
        let conn = match &self.path {
            Some(path) => db::open_database(path, self.busy_timeout)?,
            None => db::open_memory_database()?,
        };
        *guard = Some(conn);
        Ok(())
    }

    /// Release the connection. Idempotent.
    pub fn close(&self) -> Result<()> {
        let conn = self.lock().take();
        if let Some(conn) = conn {
            conn.close().map_err(|(_, e)| KnowledgeError::Database(e))?;
            tracing::debug!("chunk store closed");
        }
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Option<Connection>> {
        // A panic mid-statement leaves SQLite itself consistent; keep serving.
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut guard = self.lock();
        let conn = guard.as_mut().ok_or(KnowledgeError::NotInitialized)?;
        f(conn)
    }

    /// Upsert a chunk keyed on `source_id`; returns the effective `source_id`.
    ///
    /// A re-ingest replaces content, embedding, metadata, domain, project and
    /// timestamp in place.
    pub fn store_chunk(&self, chunk: NewChunk) -> Result<String> {
        if chunk.embedding.len() != EMBEDDING_BYTES {
            return Err(KnowledgeError::BlobLength {
                expected: EMBEDDING_BYTES,
                actual: chunk.embedding.len(),
            });
        }

        let content = truncate_chars(&chunk.content, MAX_CONTENT_CHARS);
        let source_id = match chunk.source_id {
            Some(id) if !id.is_empty() => id,
            _ => derive_source_id(&content),
        };
        let metadata = serde_json::to_string(&chunk.metadata)?;
        let domain_tag = chunk.domain.map(|d| d.as_str()).unwrap_or("");
        let created_at = to_unix_seconds(chunk.created_at.unwrap_or_else(Utc::now));

        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO knowledge_chunks
                     (chunk_type, source_id, content, embedding, metadata, domain_tag, project, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(source_id) DO UPDATE SET
                     chunk_type = excluded.chunk_type,
                     content = excluded.content,
                     embedding = excluded.embedding,
                     metadata = excluded.metadata,
                     domain_tag = excluded.domain_tag,
                     project = excluded.project,
                     created_at = excluded.created_at",
                params![
                    chunk.chunk_type.as_str(),
                    source_id,
                    content,
                    chunk.embedding,
                    metadata,
                    domain_tag,
                    chunk.project,
                    created_at,
                ],
            )?;
            tx.commit()?;
            Ok(())
        })?;

        tracing::debug!(source_id = %source_id, chunk_type = %chunk.chunk_type, "chunk stored");
        Ok(source_id)
    }

    /// Chunks matching every supplied filter, newest first, at most `filter.limit`.
    pub fn get_chunks_filtered(&self, filter: &ChunkFilter) -> Result<Vec<Chunk>> {
        let mut sql = format!("SELECT {CHUNK_COLUMNS} FROM knowledge_chunks WHERE 1=1");
        let mut values: Vec<rusqlite::types::Value> = Vec::new();

        if let Some(chunk_type) = filter.chunk_type {
            sql.push_str(" AND chunk_type = ?");
            values.push(chunk_type.as_str().to_string().into());
        }
        if let Some(domain) = filter.domain {
            sql.push_str(" AND domain_tag = ?");
            values.push(domain.as_str().to_string().into());
        }
        if !filter.project.is_empty() {
            sql.push_str(" AND project = ?");
            values.push(filter.project.clone().into());
        }
        if let Some(days) = filter.max_age_days {
            sql.push_str(" AND created_at >= ?");
            let cutoff = to_unix_seconds(Utc::now()) - days * SECONDS_PER_DAY;
            values.push(cutoff.into());
        }
        sql.push_str(" ORDER BY created_at DESC, id DESC LIMIT ?");
        values.push(i64::try_from(filter.limit).unwrap_or(i64::MAX).into());

        let raw = self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(values.iter()), RawChunk::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;

        raw.into_iter().map(RawChunk::into_chunk).collect()
    }

    /// Every chunk, oldest first.
    pub fn all_chunks(&self) -> Result<Vec<Chunk>> {
        let raw = self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CHUNK_COLUMNS} FROM knowledge_chunks ORDER BY created_at ASC, id ASC"
            ))?;
            let rows = stmt
                .query_map([], RawChunk::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;

        raw.into_iter().map(RawChunk::into_chunk).collect()
    }

    /// Row counts per chunk type; every type is present, zero when absent.
    pub fn count_chunks(&self, project: Option<&str>) -> Result<BTreeMap<ChunkType, u64>> {
        let project = project.unwrap_or("");
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT chunk_type, COUNT(*) FROM knowledge_chunks
                 WHERE (?1 = '' OR project = ?1)
                 GROUP BY chunk_type",
            )?;
            let rows = stmt
                .query_map(params![project], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;

        let mut counts: BTreeMap<ChunkType, u64> =
            ChunkType::ALL.iter().map(|t| (*t, 0)).collect();
        for (chunk_type, count) in rows {
            counts.insert(chunk_type.parse()?, count as u64);
        }
        Ok(counts)
    }

    /// Delete chunks older than their type's retention window. Permanent types are skipped.
    pub fn prune_old_chunks(&self) -> Result<u64> {
        let now = to_unix_seconds(Utc::now());

        let (total, per_type) = self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let mut total = 0u64;
            let mut per_type = Vec::new();
            for chunk_type in ChunkType::ALL {
                let Some(days) = chunk_type.retention_days() else {
                    continue;
                };
                let cutoff = now - days as f64 * SECONDS_PER_DAY;
                let deleted = tx.execute(
                    "DELETE FROM knowledge_chunks WHERE chunk_type = ?1 AND created_at < ?2",
                    params![chunk_type.as_str(), cutoff],
                )? as u64;
                if deleted > 0 {
                    per_type.push((chunk_type, deleted));
                }
                total += deleted;
            }
            tx.commit()?;
            Ok((total, per_type))
        })?;

        for (chunk_type, deleted) in per_type {
            tracing::debug!(chunk_type = %chunk_type, deleted, "pruned expired chunks");
        }
        tracing::info!(deleted = total, "retention prune complete");
        Ok(total)
    }

    /// Delete every chunk scoped to `project`.
    pub fn delete_project(&self, project: &str) -> Result<u64> {
        let deleted = self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let deleted = tx.execute(
                "DELETE FROM knowledge_chunks WHERE project = ?1",
                params![project],
            )?;
            tx.commit()?;
            Ok(deleted as u64)
        })?;

        tracing::info!(project, deleted, "project deleted");
        Ok(deleted)
    }

    /// Tier name recorded for the stored vectors, if any.
    pub fn embedding_tier(&self) -> Result<Option<String>> {
        self.with_conn(|conn| Ok(migrations::get_embedding_tier(conn)?))
    }

    pub fn record_embedding_tier(&self, tier: &str) -> Result<()> {
        self.with_conn(|conn| Ok(migrations::set_embedding_tier(conn, tier)?))
    }

    pub fn health(&self) -> Result<HealthReport> {
        self.with_conn(|conn| db::check_database_health(conn))
    }
}
