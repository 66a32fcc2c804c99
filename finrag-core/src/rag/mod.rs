//! Retrieval Augmented Generation (RAG) over financial statements.
//!
//! # Architecture
//!
//! - [`extractor`]: PDF bytes to page text
//! - [`Chunker`]: recursive boundary-aware splitting (500 chars, 100 overlap)
//! - [`Embedder`]: 384-dimensional sentence embeddings for chunks and queries
//! - [`VectorStore`]: Pinecone, Qdrant or in-memory index with batched upsert
//! - [`AnswerGenerator`]: prompt assembly and chat completion
//! - [`RagPipeline`]: composes the above into `process_document` and `answer_query`
//!
//! # How It Works
//!
//! 1. **Ingestion**: extract → chunk → embed → upsert, in strict sequence.
//!    Chunk ids are `"0".."n-1"` per document, so re-processing overwrites.
//! 2. **Query**: embed the question → top-k cosine search → generate an
//!    answer grounded in the retrieved chunks.

mod chunker;
mod embedder;
pub mod extractor;
mod generator;
mod memory_store;
mod pinecone_store;
mod qdrant_store;
mod store;
mod types;

pub use chunker::{Chunker, ChunkerError};
pub use embedder::{Embedder, EmbedderError};
pub use extractor::{extract_pdf_text, ExtractError};
pub use generator::{build_prompt, AnswerGenerator, GeneratorError};
pub use memory_store::MemoryStore;
pub use pinecone_store::PineconeStore;
pub use qdrant_store::QdrantStore;
pub use store::{create_vector_store, upsert_in_batches, VectorStore};
pub use types::{Answer, RetrievedContext, SearchResult, VectorRecord};

use crate::config::{Config, Credentials};
use crate::provider::{ChatProvider, GroqProvider, OllamaEmbeddingProvider};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Prefix of the response text when answer generation fails.
pub const GENERATION_ERROR_PREFIX: &str = "Error generating response";

#[derive(Debug, Error)]
pub enum RagError {
    #[error("Embedder error: {0}")]
    Embedder(#[from] EmbedderError),

    #[error("Chunker error: {0}")]
    Chunker(#[from] ChunkerError),

    #[error("Vector store error: {0:#}")]
    Store(#[from] anyhow::Error),

    #[error("Embedder produces {embedder}-dimensional vectors, config expects {configured}")]
    DimensionMismatch { embedder: usize, configured: usize },
}

pub type Result<T> = std::result::Result<T, RagError>;

/// The question-answering pipeline.
///
/// All collaborators are injected at construction; the pipeline holds no
/// global state. It is `Clone`, and clones share the same store and provider
/// handles.
///
/// Operations are not isolated from each other: two documents processed at
/// the same time write the same chunk ids and may overwrite each other.
#[derive(Clone)]
pub struct RagPipeline {
    chunker: Chunker,
    embedder: Embedder,
    store: Arc<dyn VectorStore>,
    generator: AnswerGenerator,
    top_k: usize,
    upsert_batch_size: usize,
}

impl RagPipeline {
    /// Creates a pipeline from explicit components.
    ///
    /// Chunking, retrieval and generation settings come from `config`. The
    /// embedder's dimension must match `config.embedding.dimension`.
    pub fn new(
        config: &Config,
        embedder: Embedder,
        store: Arc<dyn VectorStore>,
        chat: Arc<dyn ChatProvider>,
    ) -> Result<Self> {
        if embedder.dimension() != config.embedding.dimension {
            return Err(RagError::DimensionMismatch {
                embedder: embedder.dimension(),
                configured: config.embedding.dimension,
            });
        }

        let chunker = Chunker::new(config.rag.chunk_size, config.rag.chunk_overlap)?;
        let generator = AnswerGenerator::new(chat, config.llm.clone());

        Ok(Self {
            chunker,
            embedder,
            store,
            generator,
            top_k: config.rag.top_k,
            upsert_batch_size: config.rag.upsert_batch_size,
        })
    }

    /// Builds the production pipeline: Ollama embeddings, the configured
    /// vector store (provisioned if absent) and Groq chat.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use finrag_core::{Config, Credentials, RagPipeline};
    /// # async fn example() -> anyhow::Result<()> {
    /// let config = Config::load_or_default();
    /// let credentials = Credentials::from_env()?;
    /// let pipeline = RagPipeline::connect(&config, &credentials).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(config: &Config, credentials: &Credentials) -> Result<Self> {
        let embedding_provider = Arc::new(OllamaEmbeddingProvider::new(&config.embedding));
        let embedder = Embedder::new(embedding_provider, config.embedding.dimension);

        let store = create_vector_store(
            &config.storage,
            config.embedding.dimension,
            &credentials.pinecone_api_key,
        )
        .await?;

        let chat = Arc::new(GroqProvider::new(&config.llm, credentials.groq_api_key.clone()));

        Self::new(config, embedder, store, chat)
    }

    /// Ingests a PDF into the vector store.
    ///
    /// A PDF that can't be parsed is logged and treated as empty, so it
    /// produces zero chunks and no store writes rather than an error.
    ///
    /// # Returns
    ///
    /// The number of chunks stored.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding or any upsert batch fails. Batches upserted
    /// before the failure stay in the store.
    pub async fn process_document(&self, pdf_bytes: Vec<u8>) -> Result<usize> {
        let text = match extractor::extract_pdf_text(pdf_bytes).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "PDF extraction failed, continuing with empty text");
                String::new()
            }
        };

        self.ingest_text(&text).await
    }

    /// Chunks, embeds and stores already-extracted text.
    ///
    /// Chunk ids restart at `"0"` on every call.
    pub async fn ingest_text(&self, text: &str) -> Result<usize> {
        let chunks = self.chunker.split(text);
        if chunks.is_empty() {
            info!("No chunks produced, nothing to store");
            return Ok(0);
        }

        info!(chunks = chunks.len(), "Embedding document chunks");
        let chunk_refs: Vec<&str> = chunks.iter().map(String::as_str).collect();
        let embeddings = self.embedder.embed(&chunk_refs).await?;

        let records: Vec<VectorRecord> = chunks
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(i, (chunk, embedding))| VectorRecord::new(i.to_string(), chunk, embedding))
            .collect();

        let stored = upsert_in_batches(self.store.as_ref(), records, self.upsert_batch_size).await?;
        info!(chunks = stored, "Document stored");
        Ok(stored)
    }

    /// Answers a question using the default `top_k` contexts.
    pub async fn answer_query(&self, query: &str) -> Result<Answer> {
        self.answer_query_with_top_k(query, self.top_k).await
    }

    /// Answers a question from the `top_k` most similar chunks.
    ///
    /// If the chat model fails, the answer's response is an error message and
    /// the retrieved contexts are still returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the query can't be embedded or the store query fails.
    pub async fn answer_query_with_top_k(&self, query: &str, top_k: usize) -> Result<Answer> {
        let query_embedding = self.embedder.embed_one(query).await?;
        debug!(dimension = query_embedding.len(), top_k, "Query embedding generated");

        let results = self.store.query(&query_embedding, top_k).await?;
        info!(results = results.len(), "Retrieved contexts");

        let contexts: Vec<RetrievedContext> = results.into_iter().map(RetrievedContext::from).collect();

        let response = match self.generator.generate(query, &contexts).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Answer generation failed");
                format!("{GENERATION_ERROR_PREFIX}: {e}")
            }
        };

        Ok(Answer { response, contexts })
    }

    /// Returns the number of records in the vector store.
    pub async fn count(&self) -> Result<usize> {
        Ok(self.store.count().await?)
    }

    /// Removes all records from the vector store.
    pub async fn clear(&self) -> Result<()> {
        self.store.clear().await?;
        Ok(())
    }
}
