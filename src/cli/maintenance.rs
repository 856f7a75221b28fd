//! Retention and project cleanup commands.

use anyhow::Result;

use nexus_knowledge::config::KnowledgeConfig;
use nexus_knowledge::knowledge::ChunkStore;

/// Delete chunks past their retention window.
pub fn prune(config: &KnowledgeConfig) -> Result<()> {
    let store = ChunkStore::from_config(config)?;
    let deleted = store.prune_old_chunks()?;
    if deleted == 0 {
        println!("No expired chunks.");
    } else {
        println!("Pruned {deleted} expired chunk(s).");
    }
    Ok(())
}

/// Delete every chunk scoped to `project`.
pub fn delete_project(config: &KnowledgeConfig, project: &str) -> Result<()> {
    anyhow::ensure!(!project.is_empty(), "project name must not be empty");
    let store = ChunkStore::from_config(config)?;
    let deleted = store.delete_project(project)?;
    println!("Deleted {deleted} chunk(s) from project {project:?}.");
    Ok(())
}
