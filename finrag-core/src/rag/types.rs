use serde::{Deserialize, Serialize};

/// A chunk as persisted in the vector store.
///
/// The only metadata stored alongside the vector is the chunk text.
///
/// # Example
///
/// ```no_run
/// # use finrag_core::rag::VectorRecord;
/// let record = VectorRecord::new("0", "Total revenue for Q1 2024 was $2.4M", vec![0.0; 384]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    pub id: String,
    pub text: String,
    pub embedding: Vec<f32>,
}

impl VectorRecord {
    pub fn new(id: impl Into<String>, text: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            embedding,
        }
    }
}

/// A match returned by a vector store query.
///
/// Returned by vector search operations, ordered by descending similarity score.
///
/// # Score Range
///
/// Cosine similarity, from `-1.0` (opposite) through `0.0` (orthogonal) to
/// `1.0` (identical direction).
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub id: String,
    pub text: String,
    pub score: f32,
}

/// A retrieved chunk as shown to the user alongside the answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedContext {
    pub text: String,
    pub score: f32,
}

impl From<SearchResult> for RetrievedContext {
    fn from(result: SearchResult) -> Self {
        Self {
            text: result.text,
            score: result.score,
        }
    }
}

/// The final artifact of a query: generated text plus the contexts it was grounded on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub response: String,
    pub contexts: Vec<RetrievedContext>,
}
