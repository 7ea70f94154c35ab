//! Embedding generation for semantic search and retrieval.

mod gemini;

pub use gemini::GeminiEmbedder;

use crate::error::Result;
use async_trait::async_trait;

/// Trait for embedding generation.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Length of every vector `embed` returns.
    fn dimensions(&self) -> usize;
}
