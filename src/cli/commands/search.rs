//! Search command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::{Credentials, Settings};
use crate::embedding::GeminiEmbedder;
use crate::knowledge::KnowledgeBase;
use crate::retry::RetryPolicy;
use crate::vector_store::{open_store, SearchHit};
use anyhow::Result;
use std::sync::Arc;
use tracing::warn;

/// Run the search command.
pub async fn run_search(query: &str, top_k: usize, settings: Settings) -> Result<()> {
    let credentials = Credentials::from_env();
    preflight::check(Operation::Search, &settings, &credentials)?;

    let embedder = Arc::new(GeminiEmbedder::new(&settings.api, credentials.gemini()?)?);
    let store = open_store(&settings.store, settings.api.request_timeout()).await?;
    let kb = KnowledgeBase::new(embedder, store, RetryPolicy::from_settings(&settings.app))
        .with_metric(settings.store.distance_metric);

    let spinner = Output::spinner("Searching...");
    let results = search_then_close(kb, query, top_k).await;
    spinner.finish_and_clear();

    let hits = results?;
    if hits.is_empty() {
        Output::warning("No stored descriptions match your query.");
    } else {
        Output::success(&format!("Found {} results", hits.len()));
        for hit in &hits {
            Output::search_result(&hit.record, hit.distance);
        }
    }

    Ok(())
}

/// Search, then release the store. A failed close is logged, not returned.
async fn search_then_close(
    kb: KnowledgeBase,
    query: &str,
    top_k: usize,
) -> crate::Result<Vec<SearchHit>> {
    let results = async {
        kb.prepare_index().await?;
        kb.search(query, top_k).await
    }
    .await;

    if let Err(e) = kb.close().await {
        warn!("Failed to close knowledge store: {}", e);
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DistanceMetric;
    use crate::embedding::Embedder;
    use crate::vector_store::{AnalysisRecord, MemoryVectorStore, VectorStore};
    use crate::VidquizError;
    use async_trait::async_trait;

    struct LengthEmbedder;

    #[async_trait]
    impl Embedder for LengthEmbedder {
        async fn embed(&self, text: &str) -> crate::Result<Vec<f32>> {
            Ok(vec![text.len() as f32, 1.0])
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    /// Answers queries but fails to close.
    struct StickyStore(MemoryVectorStore);

    #[async_trait]
    impl VectorStore for StickyStore {
        async fn insert(&self, record: &AnalysisRecord) -> crate::Result<()> {
            self.0.insert(record).await
        }

        async fn get(&self, id: &str) -> crate::Result<Option<AnalysisRecord>> {
            self.0.get(id).await
        }

        async fn search(
            &self,
            query_embedding: &[f32],
            top_k: usize,
            metric: DistanceMetric,
        ) -> crate::Result<Vec<SearchHit>> {
            self.0.search(query_embedding, top_k, metric).await
        }

        async fn find_by_content_hash(&self, hash: &str) -> crate::Result<Option<AnalysisRecord>> {
            self.0.find_by_content_hash(hash).await
        }

        async fn count(&self) -> crate::Result<usize> {
            self.0.count().await
        }

        async fn close(&self) -> crate::Result<()> {
            Err(VidquizError::VectorStore("connection already closed".to_string()))
        }

        fn backend(&self) -> &'static str {
            "sticky"
        }
    }

    #[tokio::test]
    async fn test_close_failure_keeps_search_results() {
        let kb = KnowledgeBase::new(
            Arc::new(LengthEmbedder),
            Box::new(StickyStore(MemoryVectorStore::new())),
            RetryPolicy::none(),
        );
        kb.store("A lecture on traits.", "traits.mp4").await.unwrap();

        let hits = search_then_close(kb, "traits", 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.video_reference, "traits.mp4");
    }
}
