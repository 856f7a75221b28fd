use anyhow::{Context, Result};
use serde_json::Value;

use nexus_knowledge::config::KnowledgeConfig;
use nexus_knowledge::knowledge::{ChunkType, Domain, IngestRequest, Metadata};

/// Parse `key=value` pairs. Values that parse as JSON (numbers, booleans, arrays)
/// keep their type; anything else is stored as a string.
pub fn parse_meta(pairs: &[String]) -> Result<Metadata> {
    let mut metadata = Metadata::new();
    for pair in pairs {
        let (key, raw) = pair
            .split_once('=')
            .with_context(|| format!("metadata must be key=value, got {pair:?}"))?;
        let value = serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        metadata.insert(key.to_string(), value);
    }
    Ok(metadata)
}

pub fn ingest(
    config: &KnowledgeConfig,
    chunk_type: ChunkType,
    content: &str,
    source_id: Option<String>,
    domain: Option<Domain>,
    project: &str,
    meta: &[String],
) -> Result<()> {
    let search = super::open_search(config)?;

    let mut request = IngestRequest::new(chunk_type, content)
        .domain(domain)
        .project(project)
        .metadata(parse_meta(meta)?);
    if let Some(id) = source_id {
        request = request.source_id(id);
    }

    let source_id = search.ingest(request)?;
    println!("Stored {chunk_type} as {source_id}");
    Ok(())
}
