pub mod migrations;
pub mod schema;

use rusqlite::Connection;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

use crate::error::Result;

/// Default bound on lock contention before a statement fails with `SQLITE_BUSY`.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Open (or create) the knowledge database at the given path, with WAL
/// journaling, a bounded busy timeout, and schema initialized.
pub fn open_database(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Connection> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut conn = Connection::open(path)?;

    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.busy_timeout(busy_timeout)?;

    schema::init_schema(&conn)?;
    migrations::run_migrations(&mut conn)?;

    tracing::info!(path = %path.display(), "database initialized");
    Ok(conn)
}

/// Open a private in-memory database with the full schema.
pub fn open_memory_database() -> Result<Connection> {
    let mut conn = Connection::open_in_memory()?;
    schema::init_schema(&conn)?;
    migrations::run_migrations(&mut conn)?;
    Ok(conn)
}

/// Result of [`check_database_health`].
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub schema_version: u32,
    pub embedding_tier: Option<String>,
    pub chunk_count: u64,
    pub integrity_ok: bool,
    pub integrity_details: String,
}

/// Run `PRAGMA integrity_check` and gather basic counts.
pub fn check_database_health(conn: &Connection) -> Result<HealthReport> {
    let schema_version = migrations::get_schema_version(conn)?;
    let embedding_tier = migrations::get_embedding_tier(conn)?;
    let chunk_count: i64 =
        conn.query_row("SELECT COUNT(*) FROM knowledge_chunks", [], |row| row.get(0))?;

    let integrity_details: String =
        conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;

    Ok(HealthReport {
        schema_version,
        embedding_tier,
        chunk_count: chunk_count as u64,
        integrity_ok: integrity_details == "ok",
        integrity_details,
    })
}
