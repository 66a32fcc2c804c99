//! Vector store abstraction and factory.
//!
//! This module provides a unified interface for different vector database implementations.

use super::memory_store::MemoryStore;
use super::pinecone_store::PineconeStore;
use super::qdrant_store::QdrantStore;
use super::types::{SearchResult, VectorRecord};
use crate::config::{StorageConfig, StorageMode};
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Unified interface for vector database operations.
///
/// Implementations handle record storage and cosine similarity search across
/// different backends (Pinecone over REST, Qdrant over gRPC, in-process memory).
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Inserts or overwrites records by id, in a single backend request.
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<()>;

    /// Searches for the most similar records using cosine similarity.
    ///
    /// # Returns
    ///
    /// At most `top_k` results, sorted by descending similarity score.
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<SearchResult>>;

    /// Returns the total number of records in the store.
    async fn count(&self) -> Result<usize>;

    /// Removes all records from the store.
    async fn clear(&self) -> Result<()>;
}

/// Upserts `records` in consecutive batches of at most `batch_size`.
///
/// Batches are sent in order, one request each. If a batch fails, the error is
/// returned and earlier batches stay persisted.
///
/// # Returns
///
/// The number of records written.
pub async fn upsert_in_batches(
    store: &dyn VectorStore,
    records: Vec<VectorRecord>,
    batch_size: usize,
) -> Result<usize> {
    let batch_size = batch_size.max(1);
    let total = records.len();
    let mut records = records.into_iter().peekable();
    let mut batch_index = 0;

    while records.peek().is_some() {
        let batch: Vec<VectorRecord> = records.by_ref().take(batch_size).collect();
        debug!(batch = batch_index, size = batch.len(), "upserting batch");
        store.upsert(batch).await?;
        batch_index += 1;
    }

    Ok(total)
}

/// Creates a vector store instance based on the storage mode.
///
/// - `Pinecone` provisions the index if absent and resolves its data-plane host
/// - `Qdrant` connects to a gRPC server and provisions the collection if absent
/// - `Memory` keeps records in process
///
/// # Arguments
///
/// * `storage_config` - Storage mode and index name
/// * `dimension` - Dimension of the embedding vectors
/// * `pinecone_api_key` - Key for the Pinecone control and data planes
pub async fn create_vector_store(
    storage_config: &StorageConfig,
    dimension: usize,
    pinecone_api_key: &str,
) -> Result<Arc<dyn VectorStore>> {
    let index_name = storage_config.vector_db.index_name.clone();
    match &storage_config.storage_mode {
        StorageMode::Pinecone { .. } => {
            let store = PineconeStore::connect(
                &storage_config.storage_mode,
                index_name,
                dimension,
                pinecone_api_key,
            )
            .await?;
            Ok(Arc::new(store))
        }
        StorageMode::Qdrant { url } => {
            let store = QdrantStore::new(url, index_name, dimension as u64).await?;
            Ok(Arc::new(store))
        }
        StorageMode::Memory => Ok(Arc::new(MemoryStore::new())),
    }
}
