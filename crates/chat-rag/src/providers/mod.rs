//! Provider abstractions for embeddings, LLM and vector search
//!
//! Trait-based so the pipeline can run against local (Ollama) or hosted
//! (OpenAI) models and is testable without any network.

pub mod embedding;
pub mod llm;
pub mod ollama;
pub mod openai;
pub mod pinecone;
pub mod vector_store;

mod lines;
mod retry;

use std::sync::Arc;

use crate::config::{ModelBackend, RagConfig};
use crate::error::Result;

pub use embedding::EmbeddingProvider;
pub use llm::{CompletionOptions, LlmProvider, TokenStream};
pub use vector_store::VectorStoreProvider;

/// Build the LLM selected by `[llm].backend`
pub fn build_llm(config: &RagConfig) -> Result<Arc<dyn LlmProvider>> {
    let llm: Arc<dyn LlmProvider> = match config.llm.backend {
        ModelBackend::Ollama => Arc::new(ollama::OllamaLlm::new(&config.llm)?),
        ModelBackend::OpenAi => Arc::new(openai::OpenAiLlm::new(&config.llm)?),
    };
    tracing::info!("LLM provider: {} ({})", llm.name(), llm.model());
    Ok(llm)
}

/// Build the embedder selected by `[embeddings].backend`
pub fn build_embedder(config: &RagConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let embedder: Arc<dyn EmbeddingProvider> = match config.embeddings.backend {
        ModelBackend::Ollama => Arc::new(ollama::OllamaEmbedder::new(&config.embeddings, &config.llm)?),
        ModelBackend::OpenAi => Arc::new(openai::OpenAiEmbedder::new(&config.embeddings, &config.llm)?),
    };
    tracing::info!(
        "Embedding provider: {} ({} dims)",
        embedder.name(),
        embedder.dimensions()
    );
    Ok(embedder)
}

/// Build the vector store
pub fn build_vector_store(config: &RagConfig) -> Result<Arc<dyn VectorStoreProvider>> {
    Ok(Arc::new(pinecone::PineconeStore::new(&config.vector_db)?))
}
