//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Folio Harvest database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per harvested article; hash is the SHA-256 of the URL
CREATE TABLE IF NOT EXISTS content (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    hash TEXT NOT NULL UNIQUE,
    source TEXT NOT NULL,
    url TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    author TEXT,
    published_date TEXT,
    crawled_at TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_content_source ON content(source);
CREATE INDEX IF NOT EXISTS idx_content_published ON content(published_date);

-- One row per harvesting run of a source
CREATE TABLE IF NOT EXISTS sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id TEXT NOT NULL,
    source_name TEXT NOT NULL,
    start_time TEXT NOT NULL,
    end_time TEXT,
    metadata_json TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sessions_source ON sessions(source_id);

-- Which content a session stored, in processing order
CREATE TABLE IF NOT EXISTS session_content (
    session_id INTEGER NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
    content_id INTEGER NOT NULL REFERENCES content(id) ON DELETE CASCADE,
    processed_order INTEGER NOT NULL,
    had_content_extraction_error INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (session_id, content_id)
);

CREATE INDEX IF NOT EXISTS idx_session_content_order ON session_content(session_id, processed_order);
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
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    Ok(())
}

/// Current schema version, stored in `PRAGMA user_version`
pub const SCHEMA_VERSION: u32 = 1;
