//! Gemini embeddings implementation.

use super::Embedder;
use crate::config::ApiSettings;
use crate::error::{Result, VidquizError};
use crate::http::{check_status, create_http_client, transport_error};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

const SERVICE: &str = "Gemini embeddings";

/// Gemini-based embedder.
pub struct GeminiEmbedder {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    dimensions: usize,
}

impl GeminiEmbedder {
    /// Create an embedder from the API settings.
    pub fn new(api: &ApiSettings, api_key: &str) -> Result<Self> {
        Ok(Self {
            client: create_http_client(api.request_timeout())?,
            api_key: api_key.to_string(),
            base_url: api.gemini_base_url.trim_end_matches('/').to_string(),
            model: api.embedding_model.clone(),
            dimensions: api.embedding_dimensions as usize,
        })
    }

    fn request_for(&self, text: &str) -> EmbedContentRequest {
        EmbedContentRequest {
            model: format!("models/{}", self.model),
            content: Content {
                parts: vec![TextPart {
                    text: text.to_string(),
                }],
            },
            output_dimensionality: self.dimensions as u32,
        }
    }

    fn check_dimensions(&self, values: Vec<f32>) -> Result<Vec<f32>> {
        if values.len() != self.dimensions {
            return Err(VidquizError::Embedding(format!(
                "expected {} dimensions, got {}",
                self.dimensions,
                values.len()
            )));
        }
        Ok(values)
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    #[instrument(skip(self, text), fields(chars = text.len()))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/models/{}:embedContent", self.base_url, self.model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&self.request_for(text))
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;

        let body: EmbedContentResponse = check_status(SERVICE, response)
            .await?
            .json()
            .await
            .map_err(|e| VidquizError::Embedding(format!("invalid response: {}", e)))?;

        self.check_dimensions(body.embedding.values)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest {
    model: String,
    content: Content,
    output_dimensionality: u32,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<TextPart>,
}

#[derive(Serialize)]
struct TextPart {
    text: String,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: EmbeddingValues,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(server: &mockito::Server, dimensions: u32) -> ApiSettings {
        ApiSettings {
            gemini_base_url: server.url(),
            embedding_dimensions: dimensions,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_embed_single() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/models/gemini-embedding-001:embedContent")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"outputDimensionality":3}"#.to_string(),
            ))
            .with_status(200)
            .with_body(r#"{"embedding":{"values":[0.1,0.2,0.3]}}"#)
            .create_async()
            .await;

        let embedder = GeminiEmbedder::new(&settings(&server, 3), "key").unwrap();
        let values = embedder.embed("hello").await.unwrap();

        assert_eq!(values, vec![0.1, 0.2, 0.3]);
        assert_eq!(embedder.dimensions(), 3);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/models/gemini-embedding-001:embedContent")
            .with_status(200)
            .with_body(r#"{"embedding":{"values":[0.1,0.2]}}"#)
            .create_async()
            .await;

        let embedder = GeminiEmbedder::new(&settings(&server, 3), "key").unwrap();
        let err = embedder.embed("hello").await.unwrap_err();
        assert!(matches!(err, VidquizError::Embedding(_)));
    }
}
