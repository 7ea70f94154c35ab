//! SQLite-based vector store implementation.
//!
//! Uses SQLite with distances computed in Rust for simplicity.
//! For large collections, use the MongoDB backend instead.

use super::{rank, AnalysisRecord, SearchHit, VectorStore};
use crate::config::DistanceMetric;
use crate::error::{Result, VidquizError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, instrument};

/// SQLite-based vector store.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
    table: String,
}

impl SqliteVectorStore {
    /// Open or create a store at `path`, using `table` for records.
    #[instrument(skip_all)]
    pub fn new(path: &Path, table: &str) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        let store = Self::init(conn, table)?;
        info!("Initialized SQLite vector store at {:?}", path);
        Ok(store)
    }

    /// Create an in-memory SQLite vector store (useful for testing).
    pub fn in_memory(table: &str) -> Result<Self> {
        Self::init(Connection::open_in_memory()?, table)
    }

    fn init(conn: Connection, table: &str) -> Result<Self> {
        let table = validate_table_name(table)?;

        conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id TEXT PRIMARY KEY,
                video_reference TEXT NOT NULL,
                description TEXT NOT NULL,
                embedding BLOB NOT NULL,
                content_hash TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_{table}_content_hash ON {table}(content_hash);
            "#
        ))?;

        Ok(Self {
            conn: Mutex::new(conn),
            table,
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| VidquizError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    fn select(&self, filter: &str) -> String {
        format!(
            "SELECT id, video_reference, description, embedding, content_hash, created_at FROM {} {}",
            self.table, filter
        )
    }

    fn row_to_record(row: &Row<'_>) -> rusqlite::Result<AnalysisRecord> {
        let embedding_bytes: Vec<u8> = row.get(3)?;
        let created_at: String = row.get(5)?;

        Ok(AnalysisRecord {
            id: row.get(0)?,
            video_reference: row.get(1)?,
            description: row.get(2)?,
            embedding: bytes_to_embedding(&embedding_bytes),
            content_hash: row.get(4)?,
            created_at: DateTime::parse_from_rfc3339(&created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}

/// Only plain identifiers are accepted as table names.
fn validate_table_name(table: &str) -> Result<String> {
    let valid = !table.is_empty()
        && !table.starts_with(|c: char| c.is_ascii_digit())
        && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(VidquizError::Config(format!(
            "Invalid collection name for SQLite: '{}'",
            table
        )));
    }
    Ok(table.to_string())
}

/// Serialize embedding to bytes.
fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Deserialize embedding from bytes.
fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| {
            let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
            f32::from_le_bytes(arr)
        })
        .collect()
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    #[instrument(skip(self, record), fields(id = %record.id))]
    async fn insert(&self, record: &AnalysisRecord) -> Result<()> {
        let conn = self.lock()?;

        let result = conn.execute(
            &format!(
                "INSERT INTO {} (id, video_reference, description, embedding, content_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                self.table
            ),
            params![
                record.id,
                record.video_reference,
                record.description,
                embedding_to_bytes(&record.embedding),
                record.content_hash,
                record.created_at.to_rfc3339(),
            ],
        );

        match result {
            Ok(_) => {
                debug!("Inserted record {}", record.id);
                Ok(())
            }
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(VidquizError::Duplicate(format!("record id {}", record.id)))
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    async fn get(&self, id: &str) -> Result<Option<AnalysisRecord>> {
        let conn = self.lock()?;
        let record = conn
            .query_row(&self.select("WHERE id = ?1"), params![id], Self::row_to_record)
            .optional()?;
        Ok(record)
    }

    #[instrument(skip(self, query_embedding))]
    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        metric: DistanceMetric,
    ) -> Result<Vec<SearchHit>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&self.select(""))?;
        let records = stmt
            .query_map([], Self::row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let hits = rank(records, query_embedding, top_k, metric);
        debug!("Found {} matching records", hits.len());
        Ok(hits)
    }

    async fn find_by_content_hash(&self, hash: &str) -> Result<Option<AnalysisRecord>> {
        let conn = self.lock()?;
        let record = conn
            .query_row(
                &self.select("WHERE content_hash = ?1 LIMIT 1"),
                params![hash],
                Self::row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    async fn count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", self.table),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(description: &str, embedding: Vec<f32>) -> AnalysisRecord {
        AnalysisRecord::new("lecture.mp4".to_string(), description.to_string(), embedding)
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = SqliteVectorStore::in_memory("Video_Summarization").unwrap();
        let rec = record("Ownership and borrowing", vec![0.5, -0.25, 1.0]);

        store.insert(&rec).await.unwrap();
        let fetched = store.get(&rec.id).await.unwrap().unwrap();

        assert_eq!(fetched.description, rec.description);
        assert_eq!(fetched.embedding, rec.embedding);
        assert_eq!(fetched.content_hash, rec.content_hash);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_search_ranks_by_distance() {
        let store = SqliteVectorStore::in_memory("records").unwrap();
        store.insert(&record("far", vec![0.0, 1.0])).await.unwrap();
        store.insert(&record("near", vec![0.9, 0.1])).await.unwrap();
        store.insert(&record("exact", vec![1.0, 0.0])).await.unwrap();

        let hits = store
            .search(&[1.0, 0.0], 2, DistanceMetric::Euclidean)
            .await
            .unwrap();
        let names: Vec<_> = hits.iter().map(|h| h.record.description.as_str()).collect();
        assert_eq!(names, vec!["exact", "near"]);
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kb.db");
        let rec = record("persisted", vec![1.0]);

        {
            let store = SqliteVectorStore::new(&path, "records").unwrap();
            store.insert(&rec).await.unwrap();
        }

        let store = SqliteVectorStore::new(&path, "records").unwrap();
        assert!(store.get(&rec.id).await.unwrap().is_some());
        assert!(store
            .find_by_content_hash(&rec.content_hash)
            .await
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_rejects_unsafe_table_names() {
        assert!(SqliteVectorStore::in_memory("records; DROP TABLE x").is_err());
        assert!(SqliteVectorStore::in_memory("1records").is_err());
    }

    #[test]
    fn test_embedding_roundtrip() {
        let embedding = vec![1.0, -2.5, 3.25];
        assert_eq!(bytes_to_embedding(&embedding_to_bytes(&embedding)), embedding);
    }
}
