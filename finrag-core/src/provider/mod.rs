//! Model provider abstraction layer.
//!
//! Defines the interfaces the pipeline uses for chat completions and
//! embeddings, plus the HTTP clients that implement them (Groq for chat,
//! Ollama for sentence embeddings).

mod types;
pub mod groq;
pub mod ollama;

// Re-export common types
pub use types::{
    ChatProvider,
    ChatRequest,
    ChatResponse,
    EmbeddingProvider,
    Message,
    ProviderError,
    Result,
};

// Re-export provider implementations
pub use groq::GroqProvider;
pub use ollama::OllamaEmbeddingProvider;
