//! In-memory vector storage and search.
//!
//! A linear-scan store with exact cosine similarity. Records are lost when the
//! process ends.

use super::store::VectorStore;
use super::types::{SearchResult, VectorRecord};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::{Arc, RwLock};

/// An in-memory vector store.
///
/// Upserting a record whose id already exists replaces it in place, matching
/// the overwrite-by-id behaviour of the managed backends.
///
/// # Example
///
/// ```no_run
/// # use finrag_core::rag::{MemoryStore, VectorRecord, VectorStore};
/// # async fn example() -> anyhow::Result<()> {
/// let store = MemoryStore::new();
/// store.upsert(vec![VectorRecord::new("0", "cats", vec![1.0, 0.0, 0.0])]).await?;
///
/// let results = store.query(&[1.0, 0.0, 0.0], 5).await?;
/// assert_eq!(results[0].id, "0");
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct MemoryStore {
    records: Arc<RwLock<Vec<VectorRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<()> {
        let mut stored = self.records.write().map_err(|_| anyhow!("memory store lock poisoned"))?;

        for record in records {
            match stored.iter_mut().find(|existing| existing.id == record.id) {
                Some(existing) => *existing = record,
                None => stored.push(record),
            }
        }

        Ok(())
    }

    /// Scores every record against `vector`.
    ///
    /// Time complexity: O(n * d) where n is the number of records and d is
    /// the embedding dimension.
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        let stored = self.records.read().map_err(|_| anyhow!("memory store lock poisoned"))?;

        let mut results: Vec<SearchResult> = stored
            .iter()
            .map(|record| SearchResult {
                id: record.id.clone(),
                text: record.text.clone(),
                score: cosine_similarity(vector, &record.embedding),
            })
            .collect();

        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(top_k);

        Ok(results)
    }

    async fn count(&self) -> Result<usize> {
        let stored = self.records.read().map_err(|_| anyhow!("memory store lock poisoned"))?;
        Ok(stored.len())
    }

    async fn clear(&self) -> Result<()> {
        self.records
            .write()
            .map_err(|_| anyhow!("memory store lock poisoned"))?
            .clear();
        Ok(())
    }
}

/// Computes cosine similarity between two vectors.
///
/// Returns values from -1.0 (opposite) to 1.0 (identical), with 0.0 indicating
/// orthogonal vectors. Returns 0.0 for mismatched lengths or zero magnitude.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    (dot_product / (magnitude_a * magnitude_b)).clamp(-1.0, 1.0)
}
