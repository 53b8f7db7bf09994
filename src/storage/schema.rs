//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the metadata cache.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Newest metadata document per package
CREATE TABLE IF NOT EXISTS packages (
    name TEXT PRIMARY KEY,
    document TEXT NOT NULL,
    fetched_at TEXT NOT NULL
);

-- Packages given up on for a permanent reason
CREATE TABLE IF NOT EXISTS skips (
    name TEXT PRIMARY KEY,
    reason TEXT NOT NULL,
    status_code INTEGER,
    skipped_at TEXT NOT NULL
);

-- Track scrape passes
CREATE TABLE IF NOT EXISTS passes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    cursor TEXT,
    fetched INTEGER NOT NULL DEFAULT 0,
    fresh INTEGER NOT NULL DEFAULT 0,
    skipped INTEGER NOT NULL DEFAULT 0,
    failed INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_passes_status ON passes(status);

-- Last outbound request slot, shared by every process using this cache
CREATE TABLE IF NOT EXISTS permits (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    last_permit_ms INTEGER NOT NULL
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
