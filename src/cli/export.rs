use anyhow::Result;
use serde::{Deserialize, Serialize};

use nexus_knowledge::config::KnowledgeConfig;
use nexus_knowledge::knowledge::{Chunk, ChunkStore};

/// Export file format. Vectors are not exported; import re-embeds content.
#[derive(Debug, Serialize, Deserialize)]
pub struct ExportData {
    #[serde(default)]
    pub embedding_tier: Option<String>,
    pub chunks: Vec<Chunk>,
}

/// Export all chunks as JSON to stdout, oldest first.
pub fn export(config: &KnowledgeConfig) -> Result<()> {
    let store = ChunkStore::from_config(config)?;

    let data = ExportData {
        embedding_tier: store.embedding_tier()?,
        chunks: store.all_chunks()?,
    };

    let json = serde_json::to_string_pretty(&data)?;
    println!("{json}");

    eprintln!("Exported {} chunks.", data.chunks.len());
    Ok(())
}
