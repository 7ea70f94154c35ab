//! Knowledge base: embeds descriptions and persists them in a vector store.

use crate::config::DistanceMetric;
use crate::embedding::Embedder;
use crate::error::{Result, VidquizError};
use crate::retry::{with_retry, RetryPolicy};
use crate::vector_store::{content_hash, AnalysisRecord, SearchHit, VectorStore};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Embedder plus store, opened once per run.
pub struct KnowledgeBase {
    embedder: Arc<dyn Embedder>,
    store: Box<dyn VectorStore>,
    retry: RetryPolicy,
    metric: DistanceMetric,
    unique_descriptions: bool,
}

impl KnowledgeBase {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Box<dyn VectorStore>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            embedder,
            store,
            retry,
            metric: DistanceMetric::default(),
            unique_descriptions: false,
        }
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Reject a second record with the same reference and description.
    pub fn with_unique_descriptions(mut self, unique: bool) -> Self {
        self.unique_descriptions = unique;
        self
    }

    /// Have the store index vectors of this embedder's length under the
    /// configured metric.
    pub async fn prepare_index(&self) -> Result<()> {
        self.store
            .ensure_index(self.embedder.dimensions(), self.metric)
            .await
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embedder = &self.embedder;
        with_retry(&self.retry, "Embedding", move |_| async move {
            embedder.embed(text).await
        })
        .await
    }

    /// Persist a description and return the new record id.
    ///
    /// The record is built completely before a single insert.
    #[instrument(skip(self, description), fields(backend = self.store.backend()))]
    pub async fn store(&self, description: &str, video_reference: &str) -> Result<String> {
        if description.trim().is_empty() {
            return Err(VidquizError::InvalidInput(
                "description must not be empty".to_string(),
            ));
        }

        if self.unique_descriptions {
            let hash = content_hash(video_reference, description);
            if let Some(existing) = self.store.find_by_content_hash(&hash).await? {
                return Err(VidquizError::Duplicate(format!(
                    "description of {} already stored as {}",
                    video_reference, existing.id
                )));
            }
        }

        let embedding = self.embed(description).await?;
        let record = AnalysisRecord::new(
            video_reference.to_string(),
            description.to_string(),
            embedding,
        );

        self.store.insert(&record).await?;
        info!("Stored description as record {}", record.id);
        Ok(record.id)
    }

    /// Point lookup by record id.
    pub async fn get(&self, id: &str) -> Result<Option<AnalysisRecord>> {
        self.store.get(id).await
    }

    /// Records most similar to `query`, closest first.
    #[instrument(skip(self, query))]
    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        if query.trim().is_empty() {
            return Err(VidquizError::InvalidInput("query must not be empty".to_string()));
        }
        let embedding = self.embed(query).await?;
        self.nearest(&embedding, top_k).await
    }

    /// Records most similar to an existing embedding, closest first.
    pub async fn nearest(&self, embedding: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        let hits = self.store.search(embedding, top_k, self.metric).await?;
        debug!("{} hits under {} distance", hits.len(), self.metric);
        Ok(hits)
    }

    pub async fn count(&self) -> Result<usize> {
        self.store.count().await
    }

    /// Release the underlying store.
    pub async fn close(self) -> Result<()> {
        self.store.close().await
    }
}
