//! Groq chat provider.
//!
//! Groq exposes an OpenAI-compatible `/chat/completions` endpoint; this client
//! sends non-streaming requests and returns the first choice's text.

use super::types::*;
use crate::config::LlmConfig;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

/// Groq HTTP API chat provider.
#[derive(Clone)]
pub struct GroqProvider {
    base_url: String,
    api_key: String,
    http_client: reqwest::Client,
}

impl std::fmt::Debug for GroqProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroqProvider")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GroqProvider {
    pub fn new(config: &LlmConfig, api_key: impl Into<String>) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            http_client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ChatProvider for GroqProvider {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(model = %request.model, messages = request.messages.len(), "sending chat completion");

        let response = self.http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let completion = response.json::<CompletionResponse>().await?;
        completion.into_chat_response(&request.model)
    }
}

// OpenAI-compatible response types (internal)

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

impl CompletionResponse {
    fn into_chat_response(self, requested_model: &str) -> Result<ChatResponse> {
        let model = self.model.unwrap_or_else(|| requested_model.to_string());
        let content = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Other("No choices returned".to_string()))?
            .message
            .content
            .unwrap_or_default();

        Ok(ChatResponse { model, content })
    }
}
