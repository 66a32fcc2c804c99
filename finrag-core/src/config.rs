use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Environment variable holding the Pinecone API key.
pub const PINECONE_API_KEY_VAR: &str = "PINECONE_API_KEY";
/// Environment variable holding the Groq API key.
pub const GROQ_API_KEY_VAR: &str = "GROQ_API_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Missing credential: set {0} in your environment or .env file")]
    MissingCredential(&'static str),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration for the whole question-answering pipeline.
///
/// Secrets are deliberately absent; see [`Credentials`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub rag: RagConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Configuration for the hosted chat model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub model: String,
    pub base_url: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub system_prompt: String,
}

/// Configuration for the sentence-embedding model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model name as known to the embedding server (e.g. `all-minilm`)
    pub model: String,
    pub base_url: String,
    /// Expected vector length; must match the index dimension
    pub dimension: usize,
}

/// Configuration for chunking and retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Maximum records per upsert request
    #[serde(default = "default_upsert_batch_size")]
    pub upsert_batch_size: usize,
}

fn default_top_k() -> usize {
    5
}

fn default_upsert_batch_size() -> usize {
    100
}

/// Vector database storage mode
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum StorageMode {
    /// Managed serverless Pinecone index (default)
    Pinecone {
        #[serde(default = "default_pinecone_control_url")]
        control_url: String,
        cloud: String,
        region: String,
        /// Seconds to wait for a freshly created index to become ready
        #[serde(default = "default_ready_timeout_secs")]
        ready_timeout_secs: u64,
    },
    /// External Qdrant server over gRPC
    Qdrant { url: String },
    /// In-process store, lost on exit
    Memory,
}

fn default_pinecone_control_url() -> String {
    "https://api.pinecone.io".to_string()
}

fn default_ready_timeout_secs() -> u64 {
    120
}

impl Default for StorageMode {
    fn default() -> Self {
        Self::Pinecone {
            control_url: default_pinecone_control_url(),
            cloud: "aws".to_string(),
            region: "us-east-1".to_string(),
            ready_timeout_secs: default_ready_timeout_secs(),
        }
    }
}

/// Storage configuration for the vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub storage_mode: StorageMode,
    #[serde(default)]
    pub vector_db: VectorDbConfig,
}

/// Vector database configuration (index/collection name, etc.).
///
/// Provider-agnostic: Pinecone calls it an index, Qdrant a collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorDbConfig {
    pub index_name: String,
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        Self {
            index_name: "financial-rag".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_mode: StorageMode::default(),
            vector_db: VectorDbConfig::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "llama3-8b-8192".to_string(),
            base_url: "https://api.groq.com/openai/v1".to_string(),
            temperature: 0.3,
            max_tokens: 300,
            system_prompt:
                "You are a professional financial analyst specializing in P&L statement interpretation."
                    .to_string(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "all-minilm".to_string(),
            base_url: "http://localhost:11434".to_string(),
            dimension: 384,
        }
    }
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 100,
            top_k: default_top_k(),
            upsert_batch_size: default_upsert_batch_size(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `config.yaml` if it exists, otherwise use defaults.
    pub fn load_or_default() -> Self {
        Self::load("config.yaml").unwrap_or_default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.rag.chunk_size == 0 {
            return Err(ConfigError::Invalid("rag.chunk_size must be positive".into()));
        }
        if self.rag.chunk_overlap > self.rag.chunk_size {
            return Err(ConfigError::Invalid(format!(
                "rag.chunk_overlap ({}) exceeds rag.chunk_size ({})",
                self.rag.chunk_overlap, self.rag.chunk_size
            )));
        }
        if self.rag.top_k == 0 {
            return Err(ConfigError::Invalid("rag.top_k must be positive".into()));
        }
        if self.rag.upsert_batch_size == 0 {
            return Err(ConfigError::Invalid("rag.upsert_batch_size must be positive".into()));
        }
        if self.embedding.dimension == 0 {
            return Err(ConfigError::Invalid("embedding.dimension must be positive".into()));
        }
        Ok(())
    }
}

/// API keys for the managed services.
///
/// Both keys are required; there is no partial-functionality mode.
#[derive(Clone)]
pub struct Credentials {
    pub pinecone_api_key: String,
    pub groq_api_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("pinecone_api_key", &"<redacted>")
            .field("groq_api_key", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Reads both keys from the process environment, loading `.env` first if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds credentials from an arbitrary variable lookup. Empty values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::MissingCredential(name))
        };

        Ok(Self {
            pinecone_api_key: read(PINECONE_API_KEY_VAR)?,
            groq_api_key: read(GROQ_API_KEY_VAR)?,
        })
    }
}
