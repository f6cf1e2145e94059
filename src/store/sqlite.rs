//! SQLite-based chunk and status store.

use super::{Chunk, ChunkSink, ProcessingStatus, StatusRecord, StatusReporter};
use crate::error::{LecternError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS chunks (
        owner_id TEXT NOT NULL,
        chunk_order INTEGER NOT NULL,
        content TEXT NOT NULL,
        created_at TEXT NOT NULL,
        PRIMARY KEY (owner_id, chunk_order)
    );

    CREATE TABLE IF NOT EXISTS statuses (
        owner_id TEXT PRIMARY KEY,
        status TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
"#;

/// SQLite-based store implementing both [`ChunkSink`] and [`StatusReporter`].
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a store at `path`.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Enable WAL mode so status reads don't block chunk appends
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| LecternError::Persistence(format!("Failed to acquire lock: {}", e)))
    }

    /// All stored status records, most recently updated first.
    pub fn list_statuses(&self) -> Result<Vec<StatusRecord>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT owner_id, status, updated_at FROM statuses ORDER BY updated_at DESC",
        )?;

        let rows = stmt.query_map([], |row| {
            let owner_id: String = row.get(0)?;
            let status: String = row.get(1)?;
            let updated_at: String = row.get(2)?;
            Ok((owner_id, status, updated_at))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (owner_id, status, updated_at) = row?;
            records.push(to_record(owner_id, &status, &updated_at)?);
        }
        Ok(records)
    }
}

fn to_record(owner_id: String, status: &str, updated_at: &str) -> Result<StatusRecord> {
    let status = status
        .parse::<ProcessingStatus>()
        .map_err(LecternError::Persistence)?;
    let updated_at = DateTime::parse_from_rfc3339(updated_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            LecternError::Persistence(format!(
                "bad updated_at '{}' for {}: {}",
                updated_at, owner_id, e
            ))
        })?;

    Ok(StatusRecord {
        owner_id,
        status,
        updated_at,
    })
}

#[async_trait]
impl ChunkSink for SqliteStore {
    #[instrument(skip(self, chunk), fields(order = chunk.order))]
    async fn append(&self, owner_id: &str, chunk: &Chunk) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            r#"
            INSERT INTO chunks (owner_id, chunk_order, content, created_at) VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(owner_id, chunk_order) DO UPDATE SET content = excluded.content, created_at = excluded.created_at
            "#,
            params![owner_id, chunk.order as i64, chunk.content, Utc::now().to_rfc3339()],
        )?;

        debug!("Appended chunk {} for {}", chunk.order, owner_id);
        Ok(())
    }

    async fn chunks(&self, owner_id: &str) -> Result<Vec<Chunk>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT chunk_order, content FROM chunks WHERE owner_id = ?1 ORDER BY chunk_order",
        )?;

        let rows = stmt.query_map(params![owner_id], |row| {
            let order: i64 = row.get(0)?;
            Ok(Chunk {
                order: order as usize,
                content: row.get(1)?,
            })
        })?;

        let chunks = rows.collect::<std::result::Result<Vec<_>, _>>()?;
        debug!("Found {} chunks for {}", chunks.len(), owner_id);
        Ok(chunks)
    }
}

#[async_trait]
impl StatusReporter for SqliteStore {
    #[instrument(skip(self))]
    async fn set_status(&self, owner_id: &str, status: ProcessingStatus) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            r#"
            INSERT INTO statuses (owner_id, status, updated_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(owner_id) DO UPDATE SET status = excluded.status, updated_at = excluded.updated_at
            "#,
            params![owner_id, status.as_str(), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    async fn status_record(&self, owner_id: &str) -> Result<Option<StatusRecord>> {
        let conn = self.lock()?;

        let row = conn.query_row(
            "SELECT status, updated_at FROM statuses WHERE owner_id = ?1",
            params![owner_id],
            |row| {
                let status: String = row.get(0)?;
                let updated_at: String = row.get(1)?;
                Ok((status, updated_at))
            },
        );

        match row {
            Ok((status, updated_at)) => Ok(Some(to_record(owner_id.to_string(), &status, &updated_at)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_chunks_read_back_in_order() {
        let store = SqliteStore::in_memory().unwrap();

        for order in [2usize, 0, 1] {
            let chunk = Chunk {
                order,
                content: format!("chunk {}", order),
            };
            store.append("lecture-1", &chunk).await.unwrap();
        }
        store
            .append("lecture-2", &Chunk { order: 0, content: "other".to_string() })
            .await
            .unwrap();

        let chunks = store.chunks("lecture-1").await.unwrap();
        let orders: Vec<usize> = chunks.iter().map(|c| c.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
        assert_eq!(chunks[1].content, "chunk 1");
        assert_eq!(store.chunks("lecture-2").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reappend_replaces_in_place() {
        let store = SqliteStore::in_memory().unwrap();
        for order in 0..3usize {
            let chunk = Chunk { order, content: format!("first {}", order) };
            store.append("lecture-1", &chunk).await.unwrap();
        }

        // A later run re-appends order 1 only; nothing else is touched.
        let retried = Chunk { order: 1, content: "second 1".to_string() };
        store.append("lecture-1", &retried).await.unwrap();

        let contents: Vec<String> = store
            .chunks("lecture-1")
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.content)
            .collect();
        assert_eq!(contents, vec!["first 0", "second 1", "first 2"]);
    }

    #[tokio::test]
    async fn test_corrupt_timestamp_is_persistence_error() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .lock()
            .unwrap()
            .execute(
                "INSERT INTO statuses (owner_id, status, updated_at) VALUES ('lecture-1', 'DONE', 'yesterday')",
                [],
            )
            .unwrap();

        let err = store.status_record("lecture-1").await.unwrap_err();
        assert!(matches!(err, LecternError::Persistence(_)));
        assert!(store.list_statuses().is_err());
    }

    #[tokio::test]
    async fn test_status_last_write_wins() {
        let store = SqliteStore::in_memory().unwrap();
        assert_eq!(store.status("lecture-1").await.unwrap(), ProcessingStatus::NotStarted);
        assert!(store.status_record("lecture-1").await.unwrap().is_none());

        store.set_status("lecture-1", ProcessingStatus::Downloading).await.unwrap();
        store.set_status("lecture-1", ProcessingStatus::Failed).await.unwrap();
        assert_eq!(store.status("lecture-1").await.unwrap(), ProcessingStatus::Failed);

        let records = store.list_statuses().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].owner_id, "lecture-1");
    }

    #[tokio::test]
    async fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("lectern.db");

        {
            let store = SqliteStore::new(&path).unwrap();
            store.set_status("lecture-9", ProcessingStatus::Done).await.unwrap();
            store
                .append("lecture-9", &Chunk { order: 0, content: "kept".to_string() })
                .await
                .unwrap();
        }

        let reopened = SqliteStore::new(&path).unwrap();
        assert_eq!(reopened.status("lecture-9").await.unwrap(), ProcessingStatus::Done);
        assert_eq!(reopened.chunks("lecture-9").await.unwrap()[0].content, "kept");
    }
}
