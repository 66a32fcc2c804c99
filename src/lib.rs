//! finrag - question answering over P&L statements
//!
//! Convenience crate that re-exports the `finrag-core` pipeline.
//!
//! # Quick Start
//!
//! ```no_run
//! use finrag::prelude::*;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::load_or_default();
//! let credentials = Credentials::from_env()?;
//! let pipeline = RagPipeline::connect(&config, &credentials).await?;
//!
//! let pdf = std::fs::read("q1_pnl.pdf")?;
//! pipeline.process_document(pdf).await?;
//!
//! let answer = pipeline.answer_query("What is the total revenue?").await?;
//! println!("{}", answer.response);
//! # Ok(())
//! # }
//! ```

pub use finrag_core::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use finrag_core::rag::{Embedder, MemoryStore, VectorStore};
    pub use finrag_core::{
        Answer, ChatProvider, Config, Credentials, EmbeddingProvider, RagError, RagPipeline,
        RetrievedContext,
    };
}
