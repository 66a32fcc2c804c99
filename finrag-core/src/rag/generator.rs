//! Grounded answer generation.
//!
//! Builds a prompt from retrieved contexts and asks the chat model for a
//! financial-analyst style answer. Failures are returned to the caller; the
//! pipeline decides whether to degrade them into a message.

use super::types::RetrievedContext;
use crate::config::LlmConfig;
use crate::provider::{ChatProvider, ChatRequest, Message, ProviderError};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("{0}")]
    Provider(#[from] ProviderError),
}

pub type Result<T> = std::result::Result<T, GeneratorError>;

/// Produces answers grounded in retrieved P&L context.
#[derive(Clone)]
pub struct AnswerGenerator {
    provider: Arc<dyn ChatProvider>,
    config: LlmConfig,
}

impl AnswerGenerator {
    pub fn new(provider: Arc<dyn ChatProvider>, config: LlmConfig) -> Self {
        Self { provider, config }
    }

    /// Asks the chat model to answer `query` from `contexts`.
    pub async fn generate(&self, query: &str, contexts: &[RetrievedContext]) -> Result<String> {
        let request = self.build_request(query, contexts);
        debug!(model = %request.model, contexts = contexts.len(), "generating answer");

        let response = self.provider.complete(request).await?;
        Ok(response.content)
    }

    pub(crate) fn build_request(&self, query: &str, contexts: &[RetrievedContext]) -> ChatRequest {
        ChatRequest::new(
            self.config.model.clone(),
            vec![
                Message::system(self.config.system_prompt.clone()),
                Message::user(build_prompt(query, contexts)),
            ],
        )
        .with_temperature(self.config.temperature)
        .with_max_tokens(self.config.max_tokens)
    }
}

/// Formats the user prompt. Context texts are joined with single spaces,
/// with no de-duplication or truncation.
pub fn build_prompt(query: &str, contexts: &[RetrievedContext]) -> String {
    let context_text = contexts
        .iter()
        .map(|ctx| ctx.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    format!(
        "Financial Context: {context_text}\n\
         \n\
         Question: {query}\n\
         \n\
         Provide a precise, professional financial analysis based on the given context.\n\
         If specific information is unavailable, clearly state the limitations.\n\
         \n\
         Include:\n\
         - Direct answer to the query\n\
         - Relevant financial insights\n\
         - Context-based explanation\n"
    )
}
