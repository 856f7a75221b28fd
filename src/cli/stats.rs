use anyhow::Result;

use nexus_knowledge::config::KnowledgeConfig;
use nexus_knowledge::knowledge::ChunkStore;

/// Display chunk counts in the terminal.
pub fn stats(config: &KnowledgeConfig, project: Option<&str>) -> Result<()> {
    let store = ChunkStore::from_config(config)?;
    let counts = store.count_chunks(project)?;
    let total: u64 = counts.values().sum();

    println!("Knowledge Statistics");
    println!("{}", "=".repeat(40));
    if let Some(project) = project {
        println!("  Project:             {project}");
    }
    println!("  Total chunks:        {total}");
    println!();

    println!("By Type:");
    for (chunk_type, count) in &counts {
        let retention = match chunk_type.retention_days() {
            Some(days) => format!("{days}d"),
            None => "permanent".to_string(),
        };
        println!("  {:<18} {:>6}   ({retention})", chunk_type.as_str(), count);
    }
    println!();

    println!(
        "Embedding tier:        {}",
        store.embedding_tier()?.as_deref().unwrap_or("(not recorded)")
    );

    Ok(())
}
