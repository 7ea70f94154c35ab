//! Vector store abstraction for vidquiz.
//!
//! Provides a trait-based interface for different vector database backends.
//! The backend is chosen from the scheme of the configured connection string.

mod memory;
mod mongo;
mod sqlite;

pub use memory::MemoryVectorStore;
pub use mongo::MongoVectorStore;
pub use sqlite::SqliteVectorStore;

use crate::config::{DistanceMetric, Settings, StoreSettings};
use crate::error::{Result, VidquizError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// A persisted video description.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisRecord {
    /// Store-assigned identifier.
    pub id: String,
    /// Where the description came from (usually the video path).
    pub video_reference: String,
    /// Text returned by the describer.
    pub description: String,
    /// Embedding of `description`.
    pub embedding: Vec<f32>,
    /// SHA-256 of reference and description.
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
}

impl AnalysisRecord {
    /// Create a new record with a fresh id.
    pub fn new(video_reference: String, description: String, embedding: Vec<f32>) -> Self {
        let content_hash = content_hash(&video_reference, &description);
        Self {
            id: Uuid::new_v4().to_string(),
            video_reference,
            description,
            embedding,
            content_hash,
            created_at: Utc::now(),
        }
    }
}

/// Hash used for the optional uniqueness constraint.
pub fn content_hash(video_reference: &str, description: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(video_reference.as_bytes());
    hasher.update([0u8]);
    hasher.update(description.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// A search result with its distance to the query.
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// The matched record.
    pub record: AnalysisRecord,
    /// Distance under the configured metric (lower is closer).
    pub distance: f32,
}

/// Trait for vector store implementations.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert a fully built record. Records are never replaced.
    async fn insert(&self, record: &AnalysisRecord) -> Result<()>;

    /// Point lookup by id.
    async fn get(&self, id: &str) -> Result<Option<AnalysisRecord>>;

    /// Nearest records to `query_embedding`, closest first.
    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        metric: DistanceMetric,
    ) -> Result<Vec<SearchHit>>;

    /// Find a record by its content hash.
    async fn find_by_content_hash(&self, hash: &str) -> Result<Option<AnalysisRecord>>;

    /// Get total record count.
    async fn count(&self) -> Result<usize>;

    /// Build whatever index nearest-neighbour search over `dimensions`-long
    /// vectors needs. Backends that rank in process need none.
    async fn ensure_index(&self, _dimensions: usize, _metric: DistanceMetric) -> Result<()> {
        Ok(())
    }

    /// Release the connection. Further calls may fail.
    async fn close(&self) -> Result<()> {
        Ok(())
    }

    /// Backend name for diagnostics.
    fn backend(&self) -> &'static str;
}

/// Distance between two vectors under `metric`.
///
/// Returns `None` when the vectors cannot be compared.
pub fn distance(metric: DistanceMetric, a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    match metric {
        DistanceMetric::Cosine => {
            let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
            let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm_a == 0.0 || norm_b == 0.0 {
                return None;
            }
            Some(1.0 - dot / (norm_a * norm_b))
        }
        DistanceMetric::Euclidean => Some(
            a.iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f32>()
                .sqrt(),
        ),
        DistanceMetric::Dot => Some(-dot),
    }
}

/// Rank records by distance to the query and keep the closest `top_k`.
pub(crate) fn rank<I>(
    records: I,
    query: &[f32],
    top_k: usize,
    metric: DistanceMetric,
) -> Vec<SearchHit>
where
    I: IntoIterator<Item = AnalysisRecord>,
{
    let mut hits: Vec<SearchHit> = records
        .into_iter()
        .filter_map(|record| {
            distance(metric, query, &record.embedding)
                .map(|distance| SearchHit { record, distance })
        })
        .collect();

    hits.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(top_k);
    hits
}

/// Parsed form of `store.connection_string`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    Memory,
    Sqlite(PathBuf),
    SqliteInMemory,
    Mongo(String),
}

impl StoreLocation {
    pub fn parse(connection_string: &str) -> Result<Self> {
        let s = connection_string.trim();
        if s == "memory://" || s == "memory" {
            Ok(StoreLocation::Memory)
        } else if let Some(path) = s.strip_prefix("sqlite://") {
            if path.is_empty() {
                return Err(VidquizError::Config(
                    "sqlite connection string needs a path, e.g. sqlite://~/.vidquiz/knowledge.db"
                        .to_string(),
                ));
            }
            if path == ":memory:" {
                Ok(StoreLocation::SqliteInMemory)
            } else {
                Ok(StoreLocation::Sqlite(Settings::expand_path(path)))
            }
        } else if s.starts_with("mongodb://") || s.starts_with("mongodb+srv://") {
            Ok(StoreLocation::Mongo(s.to_string()))
        } else {
            Err(VidquizError::Config(format!(
                "Unsupported store connection string '{}'. Use mongodb://, sqlite:// or memory://",
                s
            )))
        }
    }
}

/// Opens a store for one pipeline run.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self, settings: &StoreSettings) -> Result<Box<dyn VectorStore>>;
}

/// Connector that dispatches on the connection string scheme.
pub struct DefaultConnector {
    /// Connect and server-selection timeout for remote stores.
    pub timeout: Duration,
}

#[async_trait]
impl StoreConnector for DefaultConnector {
    async fn connect(&self, settings: &StoreSettings) -> Result<Box<dyn VectorStore>> {
        open_store(settings, self.timeout).await
    }
}

/// Open the store described by `settings`.
pub async fn open_store(
    settings: &StoreSettings,
    timeout: Duration,
) -> Result<Box<dyn VectorStore>> {
    let store: Box<dyn VectorStore> = match StoreLocation::parse(&settings.connection_string)? {
        StoreLocation::Memory => Box::new(MemoryVectorStore::new()),
        StoreLocation::Sqlite(path) => {
            Box::new(SqliteVectorStore::new(&path, &settings.collection)?)
        }
        StoreLocation::SqliteInMemory => {
            Box::new(SqliteVectorStore::in_memory(&settings.collection)?)
        }
        StoreLocation::Mongo(uri) => {
            Box::new(MongoVectorStore::connect(&uri, settings, timeout).await?)
        }
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_distance() {
        let a = vec![1.0, 0.0, 0.0];
        assert!(distance(DistanceMetric::Cosine, &a, &a).unwrap().abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!((distance(DistanceMetric::Cosine, &a, &c).unwrap() - 1.0).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((distance(DistanceMetric::Cosine, &a, &d).unwrap() - 2.0).abs() < 0.001);
    }

    #[test]
    fn test_euclidean_and_dot() {
        let a = vec![0.0, 0.0];
        let b = vec![3.0, 4.0];
        assert!((distance(DistanceMetric::Euclidean, &a, &b).unwrap() - 5.0).abs() < 0.001);
        assert!((distance(DistanceMetric::Dot, &b, &b).unwrap() + 25.0).abs() < 0.001);
    }

    #[test]
    fn test_mismatched_dimensions() {
        assert!(distance(DistanceMetric::Cosine, &[1.0], &[1.0, 0.0]).is_none());
    }

    #[test]
    fn test_rank_orders_ascending() {
        let near = AnalysisRecord::new("a".into(), "near".into(), vec![1.0, 0.1]);
        let far = AnalysisRecord::new("b".into(), "far".into(), vec![0.0, 1.0]);
        let odd = AnalysisRecord::new("c".into(), "odd".into(), vec![1.0]);

        let hits = rank(vec![far, odd, near], &[1.0, 0.0], 5, DistanceMetric::Cosine);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].record.description, "near");
        assert!(hits[0].distance <= hits[1].distance);
    }

    #[test]
    fn test_content_hash_depends_on_both_fields() {
        assert_eq!(content_hash("a.mp4", "text"), content_hash("a.mp4", "text"));
        assert_ne!(content_hash("a.mp4", "text"), content_hash("b.mp4", "text"));
        assert_ne!(content_hash("ab", "c"), content_hash("a", "bc"));
    }

    #[test]
    fn test_parse_locations() {
        assert_eq!(StoreLocation::parse("memory://").unwrap(), StoreLocation::Memory);
        assert_eq!(
            StoreLocation::parse("sqlite://:memory:").unwrap(),
            StoreLocation::SqliteInMemory
        );
        assert_eq!(
            StoreLocation::parse("sqlite:///tmp/kb.db").unwrap(),
            StoreLocation::Sqlite(PathBuf::from("/tmp/kb.db"))
        );
        assert!(matches!(
            StoreLocation::parse("mongodb://localhost:51083/?directConnection=true").unwrap(),
            StoreLocation::Mongo(_)
        ));
        assert!(matches!(
            StoreLocation::parse("postgres://localhost"),
            Err(VidquizError::Config(_))
        ));
    }
}
