//! LLM provider trait for condensing questions and generating answers

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::Result;

/// Incremental answer tokens, in generation order
pub type TokenStream = BoxStream<'static, Result<String>>;

/// Per-call sampling options
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionOptions {
    pub temperature: f32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self { temperature: 0.0 }
    }
}

/// Trait for text completion backends
///
/// Implementations:
/// - `OllamaLlm`: Local Ollama server (llama3, phi3, etc.)
/// - `OpenAiLlm`: OpenAI chat completions (gpt-4o-mini, etc.)
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Complete a prompt and return the whole output
    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String>;

    /// Complete a prompt, yielding tokens as the model produces them.
    ///
    /// An `Err` item ends the stream; nothing follows it.
    async fn complete_stream(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<TokenStream>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}
