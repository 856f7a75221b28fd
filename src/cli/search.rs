use anyhow::Result;

use nexus_knowledge::config::KnowledgeConfig;
use nexus_knowledge::knowledge::{Domain, Query, SearchMode};

pub struct SearchOptions {
    pub mode: SearchMode,
    pub domain: Option<Domain>,
    pub project: String,
    pub top_k: Option<usize>,
    pub threshold: Option<f64>,
    pub json: bool,
}

/// Run a ranked search from the terminal.
pub fn search(config: &KnowledgeConfig, text: &str, options: &SearchOptions) -> Result<()> {
    let search = super::open_search(config)?;

    let query = Query::new(text)
        .mode(options.mode)
        .domain(options.domain)
        .project(options.project.clone())
        .top_k(options.top_k.unwrap_or(config.retrieval.default_top_k))
        .threshold(options.threshold.unwrap_or(config.retrieval.default_threshold));
    let response = search.query(&query)?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    if !response.has_results() {
        println!("No results found.");
        return Ok(());
    }

    println!("Found {} result(s)\n", response.count);
    for (i, hit) in response.results.iter().enumerate() {
        println!(
            "  {}. [{}] {} (similarity: {:.2}, score: {:.4})",
            i + 1,
            hit.chunk.chunk_type,
            hit.chunk.source_id,
            hit.raw_similarity,
            hit.score,
        );
        println!("     {}", super::preview(&hit.chunk.content, 120));
        println!();
    }

    Ok(())
}
