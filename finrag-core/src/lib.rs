//! finrag-core - question answering over P&L statements
//!
//! Provides the components of the retrieval-augmented pipeline:
//! - Model providers (Groq chat, Ollama sentence embeddings)
//! - RAG (PDF extraction, chunking, embedding, vector stores, generation)
//! - Configuration and credential loading
//!
//! ## Primary API
//!
//! Build a [`RagPipeline`] and call `process_document` / `answer_query`.

pub mod config;
pub mod provider;
pub mod rag;

pub use config::{Config, ConfigError, Credentials};
pub use rag::{Answer, RagError, RagPipeline, RetrievedContext};

// Provider exports
pub use provider::{
    ChatProvider, ChatRequest, ChatResponse, EmbeddingProvider, Message, ProviderError,
};
