//! Qdrant vector database storage implementation.
//!
//! Alternative backend for self-hosted deployments, reached over gRPC.

use super::store::VectorStore;
use super::types::{SearchResult, VectorRecord};
use anyhow::{Context, Result};
use async_trait::async_trait;
use qdrant_client::{
    Qdrant,
    qdrant::{
        vectors_config::Config, CountPointsBuilder, CreateCollectionBuilder, Distance, PointStruct,
        SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder, VectorsConfig,
    },
};
use serde_json::json;
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::info;

/// Qdrant-based vector store for chunk embeddings.
///
/// Qdrant's upsert replaces points with an existing id, so re-processing a
/// document overwrites its previous chunks.
#[derive(Clone)]
pub struct QdrantStore {
    client: Arc<Qdrant>,
    collection_name: String,
    vector_size: u64,
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let points: Vec<PointStruct> = records.into_iter().map(|record| {
            let payload: HashMap<String, serde_json::Value> = HashMap::from([
                ("text".to_string(), json!(record.text)),
                ("id".to_string(), json!(record.id)),
            ]);

            PointStruct::new(point_id(&record.id), record.embedding, payload)
        }).collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection_name, points).wait(true))
            .await
            .context("Failed to upsert points")?;

        Ok(())
    }

    /// Searches for the most similar chunks using cosine similarity.
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        let search_result = self
            .client
            .search_points(
                SearchPointsBuilder::new(&self.collection_name, vector.to_vec(), top_k as u64)
                    .with_payload(true)
            )
            .await
            .context("Failed to search points")?;

        let results = search_result
            .result
            .into_iter()
            .map(|point| {
                let payload = point.payload;
                let text = payload
                    .get("text")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
                    .unwrap_or_default();

                // Get the original ID from metadata
                let id = payload
                    .get("id")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
                    .unwrap_or_default();

                SearchResult {
                    id,
                    text,
                    score: point.score,
                }
            })
            .collect();

        Ok(results)
    }

    /// Returns the exact number of points in the collection.
    async fn count(&self) -> Result<usize> {
        let response = self
            .client
            .count(CountPointsBuilder::new(&self.collection_name).exact(true))
            .await
            .context("Failed to count points")?;

        Ok(response.result.map(|r| r.count as usize).unwrap_or(0))
    }

    /// Removes all points by dropping and recreating the collection.
    async fn clear(&self) -> Result<()> {
        self.client
            .delete_collection(&self.collection_name)
            .await
            .context("Failed to delete collection")?;

        self.ensure_collection().await?;

        Ok(())
    }
}

impl QdrantStore {
    /// Connects to a Qdrant server and ensures the collection exists.
    ///
    /// # Arguments
    ///
    /// * `url` - gRPC endpoint, e.g. `http://localhost:6334`
    /// * `collection_name` - Collection holding the chunk vectors
    /// * `vector_size` - Dimension of the embedding vectors
    pub async fn new(url: &str, collection_name: String, vector_size: u64) -> Result<Self> {
        let client = Arc::new(
            Qdrant::from_url(url)
                .build()
                .context("Failed to connect to Qdrant server")?
        );

        let store = Self {
            client,
            collection_name,
            vector_size,
        };

        store.ensure_collection().await?;

        Ok(store)
    }

    /// Check-then-create; not atomic against a concurrent initializer.
    async fn ensure_collection(&self) -> Result<()> {
        let exists = self
            .client
            .collection_exists(&self.collection_name)
            .await
            .context("Failed to check collection")?;

        if !exists {
            info!(collection = %self.collection_name, size = self.vector_size, "creating Qdrant collection");
            self.client
                .create_collection(
                    CreateCollectionBuilder::new(&self.collection_name)
                        .vectors_config(VectorsConfig {
                            config: Some(Config::Params(
                                VectorParamsBuilder::new(self.vector_size, Distance::Cosine).build()
                            )),
                        })
                )
                .await
                .context("Failed to create collection")?;
        }

        Ok(())
    }
}

/// Maps a chunk id to a Qdrant point id.
///
/// Decimal ids (the pipeline's sequential chunk ids) map to the same number;
/// anything else is hashed.
fn point_id(id: &str) -> u64 {
    id.parse::<u64>().unwrap_or_else(|_| {
        let mut hasher = DefaultHasher::new();
        id.hash(&mut hasher);
        hasher.finish()
    })
}
