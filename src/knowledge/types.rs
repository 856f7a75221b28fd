//! Core knowledge type definitions.
//!
//! [`ChunkType`] carries the retention class and ranking weight of a chunk,
//! [`Domain`] is the closed set of domain tags, [`Chunk`] is a stored row and
//! [`ScoredChunk`] a retrieval hit.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::KnowledgeError;

/// Open metadata map stored as JSON text.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Kind of stored knowledge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkType {
    /// How a past error was fixed. Kept forever.
    ErrorResolution,
    /// Result of a finished task. 90 days.
    TaskOutcome,
    /// Conversation excerpt. 30 days.
    Conversation,
    /// Summary of a code change. 30 days.
    CodeChange,
    /// Summary of a directive (a multi-task request). 90 days.
    DirectiveSummary,
}

impl ChunkType {
    pub const ALL: [ChunkType; 5] = [
        Self::ErrorResolution,
        Self::TaskOutcome,
        Self::Conversation,
        Self::CodeChange,
        Self::DirectiveSummary,
    ];

    /// SQL-compatible string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ErrorResolution => "error_resolution",
            Self::TaskOutcome => "task_outcome",
            Self::Conversation => "conversation",
            Self::CodeChange => "code_change",
            Self::DirectiveSummary => "directive_summary",
        }
    }

    /// Retention window in days; `None` means permanent.
    pub fn retention_days(&self) -> Option<i64> {
        match self {
            Self::ErrorResolution => None,
            Self::TaskOutcome | Self::DirectiveSummary => Some(90),
            Self::Conversation | Self::CodeChange => Some(30),
        }
    }

    /// Ranking multiplier applied to raw similarity.
    pub fn weight(&self) -> f64 {
        match self {
            Self::ErrorResolution => 1.3,
            Self::TaskOutcome => 1.1,
            Self::Conversation => 1.0,
            Self::CodeChange => 0.9,
            Self::DirectiveSummary => 1.0,
        }
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChunkType {
    type Err = KnowledgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "error_resolution" => Ok(Self::ErrorResolution),
            "task_outcome" => Ok(Self::TaskOutcome),
            "conversation" => Ok(Self::Conversation),
            "code_change" => Ok(Self::CodeChange),
            "directive_summary" => Ok(Self::DirectiveSummary),
            _ => Err(KnowledgeError::UnknownChunkType(s.to_string())),
        }
    }
}

/// Domain tag inferred from content or supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Frontend,
    Backend,
    Devops,
    Security,
    Testing,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Frontend => "frontend",
            Self::Backend => "backend",
            Self::Devops => "devops",
            Self::Security => "security",
            Self::Testing => "testing",
        }
    }

    /// Parse a stored tag, where the empty string means "no domain".
    pub fn from_tag(tag: &str) -> Result<Option<Self>, KnowledgeError> {
        if tag.is_empty() {
            Ok(None)
        } else {
            tag.parse().map(Some)
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = KnowledgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "frontend" => Ok(Self::Frontend),
            "backend" => Ok(Self::Backend),
            "devops" => Ok(Self::Devops),
            "security" => Ok(Self::Security),
            "testing" => Ok(Self::Testing),
            _ => Err(KnowledgeError::UnknownDomain(s.to_string())),
        }
    }
}

/// Which chunk types a query covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    #[default]
    All,
    Errors,
    Tasks,
    Code,
    Conversations,
    Directives,
}

impl SearchMode {
    /// Allowed chunk types; empty means unrestricted.
    pub fn allowed_types(&self) -> &'static [ChunkType] {
        match self {
            Self::All => &[],
            Self::Errors => &[ChunkType::ErrorResolution],
            Self::Tasks => &[ChunkType::TaskOutcome],
            Self::Code => &[ChunkType::CodeChange],
            Self::Conversations => &[ChunkType::Conversation],
            Self::Directives => &[ChunkType::DirectiveSummary],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Errors => "errors",
            Self::Tasks => "tasks",
            Self::Code => "code",
            Self::Conversations => "conversations",
            Self::Directives => "directives",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMode {
    type Err = KnowledgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "errors" => Ok(Self::Errors),
            "tasks" => Ok(Self::Tasks),
            "code" => Ok(Self::Code),
            "conversations" => Ok(Self::Conversations),
            "directives" => Ok(Self::Directives),
            _ => Err(KnowledgeError::UnknownMode(s.to_string())),
        }
    }
}

/// A stored chunk, matching the `knowledge_chunks` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_type: ChunkType,
    /// Natural key; re-ingesting the same source replaces the row.
    pub source_id: String,
    pub content: String,
    /// Encoded vector (see [`crate::embedding::to_bytes`]). Not serialized.
    #[serde(skip)]
    pub embedding: Vec<u8>,
    #[serde(default)]
    pub domain_tag: Option<Domain>,
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
}

impl Chunk {
    /// Age in fractional days relative to `now`; `None` for an unset (epoch) timestamp.
    pub fn age_days(&self, now: DateTime<Utc>) -> Option<f64> {
        if self.created_at.timestamp() <= 0 {
            return None;
        }
        let millis = (now - self.created_at).num_milliseconds() as f64;
        Some(millis / 86_400_000.0)
    }
}

/// A chunk that passed the similarity threshold.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    #[serde(flatten)]
    pub chunk: Chunk,
    /// Cosine similarity between query and chunk vectors.
    pub raw_similarity: f64,
    /// `raw_similarity × type weight × recency factor`; used only for ranking.
    pub score: f64,
}

impl ScoredChunk {
    pub fn is_error_resolution(&self) -> bool {
        self.chunk.chunk_type == ChunkType::ErrorResolution
    }

    pub fn is_task_outcome(&self) -> bool {
        self.chunk.chunk_type == ChunkType::TaskOutcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_type_round_trips_through_str() {
        for t in ChunkType::ALL {
            assert_eq!(t.as_str().parse::<ChunkType>().unwrap(), t);
        }
        assert!("memo".parse::<ChunkType>().is_err());
    }

    #[test]
    fn retention_classes() {
        assert_eq!(ChunkType::ErrorResolution.retention_days(), None);
        assert_eq!(ChunkType::TaskOutcome.retention_days(), Some(90));
        assert_eq!(ChunkType::DirectiveSummary.retention_days(), Some(90));
        assert_eq!(ChunkType::Conversation.retention_days(), Some(30));
        assert_eq!(ChunkType::CodeChange.retention_days(), Some(30));
    }

    #[test]
    fn error_resolution_outweighs_conversation() {
        assert!(ChunkType::ErrorResolution.weight() > ChunkType::Conversation.weight());
        assert!(ChunkType::CodeChange.weight() < 1.0);
    }

    #[test]
    fn mode_maps_to_type_sets() {
        assert!(SearchMode::All.allowed_types().is_empty());
        assert_eq!(SearchMode::Errors.allowed_types(), &[ChunkType::ErrorResolution]);
        assert_eq!(SearchMode::Code.allowed_types(), &[ChunkType::CodeChange]);
        assert_eq!("conversations".parse::<SearchMode>().unwrap(), SearchMode::Conversations);
        assert!("everything".parse::<SearchMode>().is_err());
    }

    #[test]
    fn empty_domain_tag_is_none() {
        assert_eq!(Domain::from_tag("").unwrap(), None);
        assert_eq!(Domain::from_tag("security").unwrap(), Some(Domain::Security));
        assert!(Domain::from_tag("mobile").is_err());
    }

    #[test]
    fn epoch_timestamp_has_unknown_age() {
        let chunk = Chunk {
            chunk_type: ChunkType::Conversation,
            source_id: "s".into(),
            content: "c".into(),
            embedding: vec![],
            domain_tag: None,
            project: String::new(),
            metadata: Metadata::new(),
            created_at: DateTime::<Utc>::UNIX_EPOCH,
        };
        assert_eq!(chunk.age_days(Utc::now()), None);
    }

    #[test]
    fn scored_chunk_serializes_flat() {
        let chunk = Chunk {
            chunk_type: ChunkType::ErrorResolution,
            source_id: "err-1".into(),
            content: "Fix it".into(),
            embedding: vec![1, 2, 3],
            domain_tag: Some(Domain::Backend),
            project: "api".into(),
            metadata: Metadata::new(),
            created_at: Utc::now(),
        };
        let scored = ScoredChunk { chunk, raw_similarity: 0.8, score: 1.04 };
        let json = serde_json::to_value(&scored).unwrap();
        assert_eq!(json["chunk_type"], "error_resolution");
        assert_eq!(json["source_id"], "err-1");
        assert_eq!(json["domain_tag"], "backend");
        assert_eq!(json["raw_similarity"], 0.8);
        assert!(json.get("embedding").is_none());
    }
}
