pub mod debug;
pub mod search;
pub mod store;
pub mod types;

pub use debug::{DebugInvestigator, DebugReport, Investigation, PROVEN_FIX_THRESHOLD};
pub use search::{IngestRequest, KnowledgeSearch, KnowledgeStatus, Query, SearchResponse};
pub use store::{ChunkFilter, ChunkStore, NewChunk};
pub use types::{Chunk, ChunkType, Domain, Metadata, ScoredChunk, SearchMode};
