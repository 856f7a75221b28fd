use anyhow::{Context, Result};
use std::path::Path;

use nexus_knowledge::config::KnowledgeConfig;
use nexus_knowledge::knowledge::IngestRequest;

use super::export::ExportData;

/// Import chunks from an export file.
///
/// Each chunk is re-embedded with the running tier and upserted under its
/// original `source_id` and `created_at`, so retention windows carry over.
pub fn import(config: &KnowledgeConfig, file: &Path) -> Result<()> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read import file: {}", file.display()))?;
    let data: ExportData = serde_json::from_str(&json).context("failed to parse import JSON")?;

    let search = super::open_search(config)?;
    let running = search.embedder().tier();
    if let Some(exported) = data.embedding_tier.as_deref() {
        if exported != running.as_str() {
            println!("Re-embedding from the {exported} tier to the {running} tier.");
        }
    }

    println!("Importing {} chunks...", data.chunks.len());
    let mut imported = 0u64;
    for chunk in data.chunks {
        let source_id = chunk.source_id.clone();
        let request = IngestRequest::new(chunk.chunk_type, chunk.content)
            .source_id(chunk.source_id)
            .metadata(chunk.metadata)
            .domain(chunk.domain_tag)
            .project(chunk.project)
            .created_at(chunk.created_at);
        search
            .ingest(request)
            .with_context(|| format!("failed to import chunk {source_id}"))?;
        imported += 1;
    }

    search.store().record_embedding_tier(running.as_str())?;

    println!("Import complete: {imported} chunks stored.");
    Ok(())
}
