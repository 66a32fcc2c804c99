//! Embedding generation using provider embedding models.
//!
//! Document chunks and queries go through the same [`Embedder`], so both are
//! produced by one model and one normalization.

use crate::provider::{EmbeddingProvider, ProviderError};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur during embedding generation.
#[derive(Debug, Error)]
pub enum EmbedderError {
    /// The provider API returned an error.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The API response contained no embeddings.
    #[error("No embeddings returned")]
    NoEmbeddings,

    #[error("Expected {expected} embeddings, got {actual}")]
    CountMismatch { expected: usize, actual: usize },

    /// The model produced vectors that don't fit the index.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Result type for embedding operations.
pub type Result<T> = std::result::Result<T, EmbedderError>;

/// Generates unit-length vector embeddings of a fixed dimension.
///
/// Every vector is L2-normalized after it comes back from the provider, so
/// cosine scores between chunks and queries are computed on the same scale.
#[derive(Clone)]
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
    dimension: usize,
}

impl Embedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, dimension: usize) -> Self {
        Self { provider, dimension }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embeds a batch of texts, one vector per text, in input order.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The provider is unreachable or rejects the request
    /// - The provider returns a different number of vectors than inputs
    /// - Any vector's length differs from the configured dimension
    pub async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(model = self.provider.model(), count = texts.len(), "embedding texts");
        let mut embeddings = self.provider.embed_batch(texts).await?;

        if embeddings.len() != texts.len() {
            return Err(EmbedderError::CountMismatch {
                expected: texts.len(),
                actual: embeddings.len(),
            });
        }

        for embedding in &mut embeddings {
            self.check_dimension(embedding)?;
            l2_normalize(embedding);
        }

        Ok(embeddings)
    }

    /// Embeds a single query string.
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or(EmbedderError::NoEmbeddings)
    }

    fn check_dimension(&self, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dimension {
            return Err(EmbedderError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }
        Ok(())
    }
}

/// Scales `v` to unit length. Zero vectors are left unchanged.
fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
