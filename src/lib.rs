//! Local-first knowledge store with semantic retrieval and debug investigation.
//!
//! Short text chunks (error resolutions, task outcomes, code changes,
//! conversations, directive summaries) are stored with a 384-dimension
//! embedding in a single SQLite file. Queries rank chunks by cosine similarity,
//! weighted by chunk type and recency. Investigations combine several queries
//! into one report and decide whether a past fix applies.
//!
//! # Modules
//!
//! - [`config`]: TOML config with environment overrides
//! - [`db`]: connection setup, schema, migrations, and health checks
//! - [`embedding`]: tiered text-to-vector backends, the blob codec, and domain classification
//! - [`knowledge`]: chunk store, search, and debug investigation
//! - [`error`]: the library error type

pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod knowledge;

pub use error::{KnowledgeError, Result};
