//! In-memory vector store implementation.

use super::{rank, AnalysisRecord, SearchHit, VectorStore};
use crate::config::DistanceMetric;
use crate::error::{Result, VidquizError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory vector store for tests and dry runs. Contents are lost on drop.
pub struct MemoryVectorStore {
    records: RwLock<HashMap<String, AnalysisRecord>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, AnalysisRecord>>> {
        self.records
            .read()
            .map_err(|e| VidquizError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }
}

impl Default for MemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn insert(&self, record: &AnalysisRecord) -> Result<()> {
        let mut records = self
            .records
            .write()
            .map_err(|e| VidquizError::VectorStore(format!("Failed to acquire lock: {}", e)))?;

        if records.contains_key(&record.id) {
            return Err(VidquizError::Duplicate(format!("record id {}", record.id)));
        }
        records.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<AnalysisRecord>> {
        Ok(self.read()?.get(id).cloned())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        metric: DistanceMetric,
    ) -> Result<Vec<SearchHit>> {
        let records = self.read()?;
        Ok(rank(records.values().cloned(), query_embedding, top_k, metric))
    }

    async fn find_by_content_hash(&self, hash: &str) -> Result<Option<AnalysisRecord>> {
        Ok(self
            .read()?
            .values()
            .find(|r| r.content_hash == hash)
            .cloned())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_vector_store() {
        let store = MemoryVectorStore::new();

        let record = AnalysisRecord::new(
            "lecture.mp4".to_string(),
            "A lecture about borrowing".to_string(),
            vec![1.0, 0.0, 0.0],
        );
        store.insert(&record).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);

        let fetched = store.get(&record.id).await.unwrap().unwrap();
        assert_eq!(fetched, record);

        let hits = store
            .search(&[1.0, 0.0, 0.0], 10, DistanceMetric::Cosine)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].distance.abs() < 0.001);

        let by_hash = store.find_by_content_hash(&record.content_hash).await.unwrap();
        assert!(by_hash.is_some());
        assert!(store.get("unknown").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_same_id_is_not_replaced() {
        let store = MemoryVectorStore::new();
        let record = AnalysisRecord::new("a".into(), "b".into(), vec![1.0]);
        store.insert(&record).await.unwrap();
        assert!(matches!(
            store.insert(&record).await,
            Err(VidquizError::Duplicate(_))
        ));
    }
}
