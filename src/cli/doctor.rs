//! CLI `doctor` command: database diagnostics and embedding-tier check.

use anyhow::{Context, Result};

use nexus_knowledge::config::KnowledgeConfig;
use nexus_knowledge::embedding::Embedder;
use nexus_knowledge::knowledge::ChunkStore;

pub fn doctor(config: &KnowledgeConfig) -> Result<()> {
    let db_path = config.resolved_db_path();

    if !db_path.exists() {
        println!("Database: not found at {}", db_path.display());
        println!("Run `nexus-kb ingest` to create it.");
        return Ok(());
    }

    let file_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

    let store = ChunkStore::from_config(config).context("failed to open database (may be corrupt)")?;
    let report = store.health().context("failed to run health check")?;
    let embedder = Embedder::from_config(&config.embedding)?;

    println!("Knowledge Base Health Report");
    println!("============================");
    println!();
    println!("Database:          {}", db_path.display());
    println!("File size:         {}", format_bytes(file_size));
    println!("Schema version:    {}", report.schema_version);
    println!("Chunks:            {}", report.chunk_count);
    println!();
    println!("Embedding tier:");
    println!("  Stored:          {}", report.embedding_tier.as_deref().unwrap_or("(not set)"));
    println!("  Running:         {}", embedder.tier());
    if let Some(stored) = &report.embedding_tier {
        if stored != embedder.tier().as_str() {
            println!("  WARNING: tier mismatch! Export and re-import to re-embed stored chunks.");
        } else {
            println!("  Status:          OK (match)");
        }
    }
    println!();
    if report.integrity_ok {
        println!("Integrity check:   PASSED");
    } else {
        println!("Integrity check:   FAILED ({})", report.integrity_details);
        println!();
        println!("Recovery steps:");
        println!("  1. Restore from a backup: cp backup.db {}", db_path.display());
        println!("  2. Or export from a good copy and reimport:");
        println!("     nexus-kb export > backup.json");
        println!("     nexus-kb import backup.json");
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
