//! MongoDB-backed vector store.
//!
//! Records are stored as documents in one collection with an Atlas vector
//! search index over `embedding`. Servers without search support fall back to
//! ranking the fetched embeddings in process.

use super::{rank, AnalysisRecord, SearchHit, VectorStore};
use crate::config::{DistanceMetric, StoreSettings};
use crate::error::{Result, VidquizError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::{ClientOptions, ServerAddress};
use mongodb::{Client, Collection, Database};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const INDEX_ALREADY_EXISTS: i32 = 68;
const INDEX_POLL_INTERVAL: Duration = Duration::from_secs(1);
const MAX_CANDIDATES: usize = 10_000;

/// Document shape in the collection.
#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    #[serde(rename = "_id")]
    id: String,
    video_reference: String,
    description: String,
    embedding: Vec<f32>,
    content_hash: String,
    created_at: String,
}

impl From<&AnalysisRecord> for StoredRecord {
    fn from(record: &AnalysisRecord) -> Self {
        Self {
            id: record.id.clone(),
            video_reference: record.video_reference.clone(),
            description: record.description.clone(),
            embedding: record.embedding.clone(),
            content_hash: record.content_hash.clone(),
            created_at: record.created_at.to_rfc3339(),
        }
    }
}

impl From<StoredRecord> for AnalysisRecord {
    fn from(stored: StoredRecord) -> Self {
        Self {
            id: stored.id,
            video_reference: stored.video_reference,
            description: stored.description,
            embedding: stored.embedding,
            content_hash: stored.content_hash,
            created_at: DateTime::parse_from_rfc3339(&stored.created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        }
    }
}

/// MongoDB vector store.
pub struct MongoVectorStore {
    client: Client,
    db: Database,
    collection: Collection<StoredRecord>,
    index_name: String,
    index_wait: Duration,
    /// Similarity of the queryable vector index, once one is ready.
    index_metric: OnceLock<DistanceMetric>,
}

impl MongoVectorStore {
    /// Connect and verify the server answers a ping.
    ///
    /// Connection failures carry the host and port of the first configured
    /// server.
    #[instrument(skip(uri, settings), fields(collection = %settings.collection))]
    pub async fn connect(uri: &str, settings: &StoreSettings, timeout: Duration) -> Result<Self> {
        let mut options = ClientOptions::parse(uri).await?;
        options.connect_timeout = Some(timeout);
        options.server_selection_timeout = Some(timeout);
        options.app_name = Some("vidquiz".to_string());

        let (host, port) = first_host(&options);
        let connection_error = |message: String| VidquizError::StoreConnection {
            host: host.clone(),
            port,
            message,
        };

        let client = Client::with_options(options).map_err(|e| connection_error(e.to_string()))?;
        let db = client.database(&settings.database);
        db.run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| connection_error(e.to_string()))?;

        info!(
            "Connected to MongoDB at {}:{} ({}.{})",
            host, port, settings.database, settings.collection
        );

        Ok(Self {
            collection: db.collection(&settings.collection),
            db,
            client,
            index_name: settings.vector_index.clone(),
            index_wait: Duration::from_secs(settings.index_wait_seconds),
            index_metric: OnceLock::new(),
        })
    }

    /// Poll until the vector index answers queries or the wait runs out.
    async fn wait_for_index(&self) -> Result<Option<Document>> {
        let deadline = tokio::time::Instant::now() + self.index_wait;
        loop {
            let listing = doc! { "$listSearchIndexes": { "name": self.index_name.as_str() } };
            let mut cursor = self.collection.aggregate([listing]).await?;
            if let Some(index) = cursor.try_next().await? {
                if index.get_bool("queryable").unwrap_or(false) {
                    return Ok(Some(index));
                }
                debug!(
                    "Vector index {} is {}",
                    self.index_name,
                    index.get_str("status").unwrap_or("pending")
                );
            }

            if tokio::time::Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(INDEX_POLL_INTERVAL).await;
        }
    }

    async fn vector_search(
        &self,
        query: &[f32],
        top_k: usize,
        metric: DistanceMetric,
    ) -> Result<Vec<SearchHit>> {
        let stage = vector_search_stage(&self.index_name, query, top_k);
        let found: Vec<Document> = self.collection.aggregate([stage]).await?.try_collect().await?;

        let records = found
            .into_iter()
            .map(|d| mongodb::bson::from_document::<StoredRecord>(d).map(AnalysisRecord::from))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| VidquizError::VectorStore(format!("malformed record: {}", e)))?;

        // Distances are recomputed so every backend reports the same scale.
        Ok(rank(records, query, top_k, metric))
    }

    async fn scan(
        &self,
        query: &[f32],
        top_k: usize,
        metric: DistanceMetric,
    ) -> Result<Vec<SearchHit>> {
        let stored: Vec<StoredRecord> = self.collection.find(doc! {}).await?.try_collect().await?;
        Ok(rank(
            stored.into_iter().map(AnalysisRecord::from),
            query,
            top_k,
            metric,
        ))
    }
}

/// Name of `metric` in a vector index definition.
fn similarity_name(metric: DistanceMetric) -> &'static str {
    match metric {
        DistanceMetric::Cosine => "cosine",
        DistanceMetric::Euclidean => "euclidean",
        DistanceMetric::Dot => "dotProduct",
    }
}

/// Similarity configured for `embedding` in a `$listSearchIndexes` entry.
fn index_similarity(index: &Document) -> Option<DistanceMetric> {
    let fields = index
        .get_document("latestDefinition")
        .ok()?
        .get_array("fields")
        .ok()?;
    let similarity = fields
        .iter()
        .filter_map(Bson::as_document)
        .find(|f| f.get_str("path").ok() == Some("embedding"))?
        .get_str("similarity")
        .ok()?;

    [DistanceMetric::Cosine, DistanceMetric::Euclidean, DistanceMetric::Dot]
        .into_iter()
        .find(|m| similarity_name(*m) == similarity)
}

fn vector_index_command(
    collection: &str,
    name: &str,
    dimensions: usize,
    metric: DistanceMetric,
) -> Document {
    let num_dimensions = dimensions as i64;
    doc! {
        "createSearchIndexes": collection,
        "indexes": [{
            "name": name,
            "type": "vectorSearch",
            "definition": {
                "fields": [{
                    "type": "vector",
                    "path": "embedding",
                    "numDimensions": num_dimensions,
                    "similarity": similarity_name(metric),
                }]
            }
        }]
    }
}

fn vector_search_stage(index: &str, query: &[f32], top_k: usize) -> Document {
    let limit = top_k as i64;
    let candidates = (top_k * 10).clamp(100, MAX_CANDIDATES) as i64;
    doc! {
        "$vectorSearch": {
            "index": index,
            "path": "embedding",
            "queryVector": query.to_vec(),
            "numCandidates": candidates,
            "limit": limit,
        }
    }
}

fn command_code(err: &mongodb::error::Error) -> Option<i32> {
    match err.kind.as_ref() {
        mongodb::error::ErrorKind::Command(command) => Some(command.code),
        _ => None,
    }
}

fn first_host(options: &ClientOptions) -> (String, u16) {
    match options.hosts.first() {
        Some(ServerAddress::Tcp { host, port }) => (host.clone(), port.unwrap_or(27017)),
        Some(other) => (other.to_string(), 0),
        None => ("localhost".to_string(), 27017),
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(w)) if w.code == 11000
    )
}

#[async_trait]
impl VectorStore for MongoVectorStore {
    #[instrument(skip(self, record), fields(id = %record.id))]
    async fn insert(&self, record: &AnalysisRecord) -> Result<()> {
        self.collection
            .insert_one(StoredRecord::from(record))
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    VidquizError::Duplicate(format!("record id {}", record.id))
                } else {
                    VidquizError::Mongo(e)
                }
            })?;
        debug!("Inserted record {}", record.id);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<AnalysisRecord>> {
        let found = self.collection.find_one(doc! { "_id": id }).await?;
        Ok(found.map(AnalysisRecord::from))
    }

    #[instrument(skip(self, query_embedding))]
    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        metric: DistanceMetric,
    ) -> Result<Vec<SearchHit>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let hits = if self.index_metric.get() == Some(&metric) {
            self.vector_search(query_embedding, top_k, metric).await?
        } else {
            self.scan(query_embedding, top_k, metric).await?
        };
        debug!("Found {} matching records", hits.len());
        Ok(hits)
    }

    #[instrument(skip(self))]
    async fn ensure_index(&self, dimensions: usize, metric: DistanceMetric) -> Result<()> {
        if self.index_metric.get().is_some() {
            return Ok(());
        }

        let command =
            vector_index_command(self.collection.name(), &self.index_name, dimensions, metric);
        match self.db.run_command(command).await {
            Ok(_) => info!("Created vector index {}", self.index_name),
            Err(e) if command_code(&e) == Some(INDEX_ALREADY_EXISTS) => {
                debug!("Vector index {} already exists", self.index_name)
            }
            Err(e) => {
                warn!("Vector search unavailable, ranking in process: {}", e);
                return Ok(());
            }
        }

        match self.wait_for_index().await? {
            Some(index) => {
                let similarity = index_similarity(&index).unwrap_or(metric);
                if similarity != metric {
                    warn!(
                        "Vector index {} uses {} similarity, not {}",
                        self.index_name, similarity, metric
                    );
                }
                let _ = self.index_metric.set(similarity);
            }
            None => warn!(
                "Vector index {} not ready after {:?}, ranking in process",
                self.index_name, self.index_wait
            ),
        }
        Ok(())
    }

    async fn find_by_content_hash(&self, hash: &str) -> Result<Option<AnalysisRecord>> {
        let found = self
            .collection
            .find_one(doc! { "content_hash": hash })
            .await?;
        Ok(found.map(AnalysisRecord::from))
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.collection.count_documents(doc! {}).await? as usize)
    }

    async fn close(&self) -> Result<()> {
        self.client.clone().shutdown().await;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "mongodb"
    }
}
