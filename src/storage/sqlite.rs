//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::state::{CrawledItem, SessionMetadata};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    CheckpointMode, ContentQuery, ContentRecord, SessionContentRecord, SessionRecord,
};
use crate::HarvestError;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, warn};

/// Keeps `IN (...)` lists under SQLite's bound-variable limit
const URL_LOOKUP_CHUNK: usize = 500;

const CONTENT_COLUMNS: &str =
    "id, hash, source, url, title, author, published_date, crawled_at, created_at";

const SESSION_COLUMNS: &str = "id, source_id, source_name, start_time, end_time, metadata_json";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file; parent directories are created
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(HarvestError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            PRAGMA mmap_size = 268435456;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA temp_store = MEMORY;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Truncates the WAL and closes the connection
    pub fn close(self) -> StorageResult<()> {
        self.checkpoint(CheckpointMode::Truncate);
        self.conn.close().map_err(|(_, e)| StorageError::Sqlite(e))
    }
}

fn content_from_row(row: &Row<'_>) -> rusqlite::Result<ContentRecord> {
    Ok(ContentRecord {
        id: row.get(0)?,
        hash: row.get(1)?,
        source: row.get(2)?,
        url: row.get(3)?,
        title: row.get(4)?,
        author: row.get(5)?,
        published_date: row.get(6)?,
        crawled_at: row.get(7)?,
        created_at: row.get(8)?,
    })
}

/// Session row before its metadata JSON is decoded
struct RawSession {
    id: i64,
    source_id: String,
    source_name: String,
    start_time: String,
    end_time: Option<String>,
    metadata_json: String,
}

impl RawSession {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            source_id: row.get(1)?,
            source_name: row.get(2)?,
            start_time: row.get(3)?,
            end_time: row.get(4)?,
            metadata_json: row.get(5)?,
        })
    }

    fn decode(self) -> StorageResult<SessionRecord> {
        Ok(SessionRecord {
            id: self.id,
            source_id: self.source_id,
            source_name: self.source_name,
            start_time: self.start_time,
            end_time: self.end_time,
            metadata: SessionMetadata::from_json(&self.metadata_json)?,
        })
    }
}

fn is_constraint_violation(error: &rusqlite::Error) -> bool {
    matches!(
        error,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

impl Storage for SqliteStorage {
    // ===== Content =====

    fn store_content(&mut self, item: &CrawledItem, hash: &str) -> StorageResult<i64> {
        if let Some(date) = &item.published_date {
            if DateTime::parse_from_rfc3339(date).is_err() {
                return Err(StorageError::InvalidDate {
                    url: item.url.clone(),
                    value: date.clone(),
                });
            }
        }

        let now = Utc::now().to_rfc3339();
        let result = self.conn.execute(
            "INSERT INTO content (hash, source, url, title, author, published_date, crawled_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                hash,
                item.source,
                item.url,
                item.title,
                item.author,
                item.published_date,
                item.crawled_at.to_rfc3339(),
                now
            ],
        );

        match result {
            Ok(_) => Ok(self.conn.last_insert_rowid()),
            Err(e) if is_constraint_violation(&e) => Err(StorageError::DuplicateUrl(item.url.clone())),
            Err(e) => Err(e.into()),
        }
    }

    fn get_existing_urls(&self, urls: &[String]) -> StorageResult<HashSet<String>> {
        let mut existing = HashSet::new();

        for chunk in urls.chunks(URL_LOOKUP_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!("SELECT url FROM content WHERE url IN ({})", placeholders);
            let mut stmt = self.conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| row.get::<_, String>(0))?;
            for url in rows {
                existing.insert(url?);
            }
        }

        Ok(existing)
    }

    fn url_exists(&self, url: &str) -> StorageResult<bool> {
        let found = self
            .conn
            .query_row("SELECT 1 FROM content WHERE url = ?1", params![url], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    fn get_by_hash(&self, hash: &str) -> StorageResult<Option<ContentRecord>> {
        let sql = format!("SELECT {} FROM content WHERE hash = ?1", CONTENT_COLUMNS);
        let record = self
            .conn
            .query_row(&sql, params![hash], content_from_row)
            .optional()?;
        Ok(record)
    }

    fn query(&self, query: &ContentQuery) -> StorageResult<Vec<ContentRecord>> {
        let mut clauses = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(source) = &query.source {
            clauses.push("source = ?");
            values.push(Value::Text(source.clone()));
        }
        if let Some(text) = &query.title_contains {
            clauses.push("title LIKE ? COLLATE NOCASE");
            values.push(Value::Text(format!("%{}%", text)));
        }
        if let Some(after) = &query.published_after {
            clauses.push("published_date >= ?");
            values.push(Value::Text(after.format(crate::extract::ISO_FORMAT).to_string()));
        }
        if let Some(before) = &query.published_before {
            clauses.push("published_date < ?");
            values.push(Value::Text(before.format(crate::extract::ISO_FORMAT).to_string()));
        }

        let mut sql = format!("SELECT {} FROM content", CONTENT_COLUMNS);
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY published_date IS NULL, published_date DESC, id DESC");
        sql.push_str(&format!(" LIMIT {}", query.limit.map(i64::from).unwrap_or(-1)));
        if let Some(offset) = query.offset {
            sql.push_str(&format!(" OFFSET {}", offset));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), content_from_row)?;
        let mut records = Vec::new();
        for record in rows {
            records.push(record?);
        }
        Ok(records)
    }

    fn get_by_source(&self, source: &str, limit: Option<u32>) -> StorageResult<Vec<ContentRecord>> {
        self.query(&ContentQuery {
            source: Some(source.to_string()),
            limit,
            ..ContentQuery::default()
        })
    }

    fn count_by_source(&self) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT source, COUNT(*) FROM content GROUP BY source ORDER BY source")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;

        let mut counts = Vec::new();
        for row in rows {
            let (source, count) = row?;
            counts.push((source, count as u64));
        }
        Ok(counts)
    }

    fn get_sources(&self) -> StorageResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT source FROM content ORDER BY source")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut sources = Vec::new();
        for source in rows {
            sources.push(source?);
        }
        Ok(sources)
    }

    fn delete_content_by_source(&mut self, source: &str) -> StorageResult<u64> {
        let deleted = self
            .conn
            .execute("DELETE FROM content WHERE source = ?1", params![source])?;
        Ok(deleted as u64)
    }

    // ===== Sessions =====

    fn create_session(
        &mut self,
        source_id: &str,
        source_name: &str,
        metadata: &SessionMetadata,
    ) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO sessions (source_id, source_name, start_time, metadata_json, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?3, ?3)",
            params![source_id, source_name, now, metadata.to_json()?],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update_session(&mut self, session_id: i64, metadata: &SessionMetadata) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE sessions SET metadata_json = ?1, updated_at = ?2 WHERE id = ?3",
            params![metadata.to_json()?, now, session_id],
        )?;

        if updated == 0 {
            return Err(StorageError::SessionNotFound(session_id));
        }
        Ok(())
    }

    fn end_session(&mut self, session_id: i64, metadata: &SessionMetadata) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE sessions SET end_time = ?1, metadata_json = ?2, updated_at = ?1
             WHERE id = ?3 AND end_time IS NULL",
            params![now, metadata.to_json()?, session_id],
        )?;

        if updated == 0 {
            return match self.get_session(session_id)? {
                Some(_) => Err(StorageError::SessionAlreadyEnded(session_id)),
                None => Err(StorageError::SessionNotFound(session_id)),
            };
        }
        Ok(())
    }

    fn get_session(&self, session_id: i64) -> StorageResult<Option<SessionRecord>> {
        let sql = format!("SELECT {} FROM sessions WHERE id = ?1", SESSION_COLUMNS);
        let raw = self
            .conn
            .query_row(&sql, params![session_id], RawSession::from_row)
            .optional()?;
        raw.map(RawSession::decode).transpose()
    }

    fn is_session_active(&self, session_id: i64) -> StorageResult<bool> {
        let end_time: Option<Option<String>> = self
            .conn
            .query_row(
                "SELECT end_time FROM sessions WHERE id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .optional()?;

        match end_time {
            Some(end_time) => Ok(end_time.is_none()),
            None => Err(StorageError::SessionNotFound(session_id)),
        }
    }

    fn get_sessions_by_source(&self, source_id: &str) -> StorageResult<Vec<SessionRecord>> {
        let sql = format!(
            "SELECT {} FROM sessions WHERE source_id = ?1 ORDER BY id DESC",
            SESSION_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![source_id], RawSession::from_row)?;

        let mut sessions = Vec::new();
        for raw in rows {
            sessions.push(raw?.decode()?);
        }
        Ok(sessions)
    }

    fn delete_sessions_by_source(&mut self, source_id: &str) -> StorageResult<u64> {
        let deleted = self
            .conn
            .execute("DELETE FROM sessions WHERE source_id = ?1", params![source_id])?;
        Ok(deleted as u64)
    }

    fn link_content_to_session(
        &mut self,
        session_id: i64,
        content_id: i64,
        had_content_extraction_error: bool,
    ) -> StorageResult<i64> {
        let tx = self.conn.transaction()?;
        let next_order: i64 = tx.query_row(
            "SELECT COALESCE(MAX(processed_order), 0) + 1 FROM session_content WHERE session_id = ?1",
            params![session_id],
            |row| row.get(0),
        )?;
        tx.execute(
            "INSERT INTO session_content (session_id, content_id, processed_order, had_content_extraction_error)
             VALUES (?1, ?2, ?3, ?4)",
            params![session_id, content_id, next_order, had_content_extraction_error],
        )?;
        tx.commit()?;
        Ok(next_order)
    }

    fn get_session_content(&self, session_id: i64) -> StorageResult<Vec<SessionContentRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT session_id, content_id, processed_order, had_content_extraction_error
             FROM session_content WHERE session_id = ?1 ORDER BY processed_order",
        )?;
        let rows = stmt.query_map(params![session_id], |row| {
            Ok(SessionContentRecord {
                session_id: row.get(0)?,
                content_id: row.get(1)?,
                processed_order: row.get(2)?,
                had_content_extraction_error: row.get(3)?,
            })
        })?;

        let mut records = Vec::new();
        for record in rows {
            records.push(record?);
        }
        Ok(records)
    }

    // ===== Maintenance =====

    fn checkpoint(&self, mode: CheckpointMode) {
        let sql = format!("PRAGMA wal_checkpoint({})", mode.to_db_string());
        let result = self.conn.query_row(&sql, [], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
            ))
        });

        match result {
            Ok((busy, log_frames, checkpointed)) => debug!(
                "WAL checkpoint ({}): busy={}, log={}, checkpointed={}",
                mode.to_db_string(),
                busy,
                log_frames,
                checkpointed
            ),
            Err(e) => warn!("WAL checkpoint ({}) failed: {}", mode.to_db_string(), e),
        }
    }

    // ===== Statistics =====

    fn count_content(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM content", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_sessions(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn item(url: &str, date: Option<&str>) -> CrawledItem {
        let mut item = CrawledItem::new("news");
        item.url = url.to_string();
        item.title = format!("Title of {}", url);
        item.published_date = date.map(str::to_string);
        item
    }

    #[test]
    fn test_create_in_memory() {
        let storage = SqliteStorage::new_in_memory();
        assert!(storage.is_ok());
    }

    #[test]
    fn test_store_and_lookup_content() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let id = storage
            .store_content(&item("https://e.com/a", Some("2025-07-10T00:00:00.000Z")), "h-a")
            .unwrap();
        assert!(id > 0);

        assert!(storage.url_exists("https://e.com/a").unwrap());
        assert!(!storage.url_exists("https://e.com/b").unwrap());

        let record = storage.get_by_hash("h-a").unwrap().unwrap();
        assert_eq!(record.url, "https://e.com/a");
        assert_eq!(record.published_date.as_deref(), Some("2025-07-10T00:00:00.000Z"));
        assert_eq!(storage.count_content().unwrap(), 1);
    }

    #[test]
    fn test_duplicate_url_is_typed() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage.store_content(&item("https://e.com/a", None), "h-a").unwrap();

        let result = storage.store_content(&item("https://e.com/a", None), "h-a");
        assert!(matches!(result, Err(StorageError::DuplicateUrl(url)) if url == "https://e.com/a"));
        assert_eq!(storage.count_content().unwrap(), 1);
    }

    #[test]
    fn test_invalid_date_rejected() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let result = storage.store_content(&item("https://e.com/a", Some("July 10, 2025")), "h-a");
        assert!(matches!(result, Err(StorageError::InvalidDate { .. })));
        assert_eq!(storage.count_content().unwrap(), 0);
    }

    #[test]
    fn test_get_existing_urls_across_chunks() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let urls: Vec<String> = (0..1200).map(|i| format!("https://e.com/{}", i)).collect();
        for (i, url) in urls.iter().enumerate() {
            if i % 3 == 0 {
                storage.store_content(&item(url, None), &format!("h{}", i)).unwrap();
            }
        }

        let existing = storage.get_existing_urls(&urls).unwrap();
        assert_eq!(existing.len(), 400);
        assert!(existing.contains("https://e.com/999"));
        assert!(!existing.contains("https://e.com/1000"));
        assert!(storage.get_existing_urls(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_session_lifecycle() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let metadata = SessionMetadata::default();
        let session = storage.create_session("news", "News", &metadata).unwrap();
        assert!(storage.is_session_active(session).unwrap());

        let mut updated = metadata.clone();
        updated.pages_processed = 3;
        storage.update_session(session, &updated).unwrap();
        let record = storage.get_session(session).unwrap().unwrap();
        assert_eq!(record.metadata.pages_processed, 3);
        assert!(record.is_active());

        storage.end_session(session, &updated).unwrap();
        assert!(!storage.is_session_active(session).unwrap());
        assert!(matches!(
            storage.end_session(session, &updated),
            Err(StorageError::SessionAlreadyEnded(id)) if id == session
        ));
        assert!(matches!(
            storage.end_session(999, &updated),
            Err(StorageError::SessionNotFound(999))
        ));
        assert!(matches!(
            storage.update_session(999, &updated),
            Err(StorageError::SessionNotFound(999))
        ));
    }

    #[test]
    fn test_processed_order_increases() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let session = storage
            .create_session("news", "News", &SessionMetadata::default())
            .unwrap();

        let mut orders = Vec::new();
        for i in 0..4 {
            let id = storage
                .store_content(&item(&format!("https://e.com/{}", i), None), &format!("h{}", i))
                .unwrap();
            orders.push(storage.link_content_to_session(session, id, i == 2).unwrap());
        }
        assert_eq!(orders, vec![1, 2, 3, 4]);

        let links = storage.get_session_content(session).unwrap();
        assert_eq!(links.len(), 4);
        assert!(links.windows(2).all(|w| w[0].processed_order < w[1].processed_order));
        assert!(links[2].had_content_extraction_error);
    }

    #[test]
    fn test_deletes_cascade_to_links() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let session = storage
            .create_session("news", "News", &SessionMetadata::default())
            .unwrap();
        let id = storage.store_content(&item("https://e.com/a", None), "h-a").unwrap();
        storage.link_content_to_session(session, id, false).unwrap();

        assert_eq!(storage.delete_content_by_source("news").unwrap(), 1);
        assert!(storage.get_session_content(session).unwrap().is_empty());

        assert_eq!(storage.delete_sessions_by_source("news").unwrap(), 1);
        assert_eq!(storage.count_sessions().unwrap(), 0);
    }

    #[test]
    fn test_query_filters() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage
            .store_content(&item("https://e.com/old", Some("2024-01-01T00:00:00.000Z")), "h1")
            .unwrap();
        storage
            .store_content(&item("https://e.com/new", Some("2025-07-10T00:00:00.000Z")), "h2")
            .unwrap();
        let mut other = item("https://o.com/x", None);
        other.source = "other".to_string();
        storage.store_content(&other, "h3").unwrap();

        let news = storage.get_by_source("news", None).unwrap();
        assert_eq!(news.len(), 2);
        assert_eq!(news[0].url, "https://e.com/new");

        let recent = storage
            .query(&ContentQuery {
                published_after: Some(
                    DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                        .unwrap()
                        .with_timezone(&Utc),
                ),
                ..ContentQuery::default()
            })
            .unwrap();
        assert_eq!(recent.len(), 1);

        let titled = storage
            .query(&ContentQuery {
                title_contains: Some("O.COM".to_string()),
                ..ContentQuery::default()
            })
            .unwrap();
        assert_eq!(titled.len(), 1);

        assert_eq!(storage.get_sources().unwrap(), vec!["news", "other"]);
        assert_eq!(
            storage.count_by_source().unwrap(),
            vec![("news".to_string(), 2), ("other".to_string(), 1)]
        );
    }

    #[test]
    fn test_file_database_checkpoint_and_close() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("harvest.db");

        let mut storage = SqliteStorage::new(&path).unwrap();
        storage.store_content(&item("https://e.com/a", None), "h-a").unwrap();
        storage.checkpoint(CheckpointMode::Passive);
        storage.close().unwrap();

        let reopened = SqliteStorage::new(&path).unwrap();
        assert!(reopened.url_exists("https://e.com/a").unwrap());
    }
}
