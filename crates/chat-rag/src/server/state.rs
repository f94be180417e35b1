//! Application state for the chat server

use parking_lot::RwLock;
use std::sync::Arc;

use crate::config::RagConfig;
use crate::error::Result;
use crate::pipeline::{PipelineSettings, RagPipeline};
use crate::providers::{self, EmbeddingProvider, LlmProvider, VectorStoreProvider};

/// Reachability of one collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendHealth {
    /// `llm`, `embeddings` or `vector_store`
    pub role: &'static str,
    /// Provider name, e.g. `ollama`
    pub provider: String,
    pub healthy: bool,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: RagConfig,
    /// The one pipeline every request runs through
    pipeline: Arc<RagPipeline>,
    /// LLM provider (health checks, info)
    llm: Arc<dyn LlmProvider>,
    /// Embedding provider (health checks, info)
    embedder: Arc<dyn EmbeddingProvider>,
    /// Vector index (health checks, info)
    vector_store: Arc<dyn VectorStoreProvider>,
    /// Ready state
    ready: RwLock<bool>,
}

impl AppState {
    /// Construct every collaborator from configuration
    pub fn new(config: RagConfig) -> Result<Self> {
        tracing::info!(
            "Initializing chat state (llm: {:?}, embeddings: {:?})...",
            config.llm.backend,
            config.embeddings.backend
        );

        let llm = providers::build_llm(&config)?;
        let embedder = providers::build_embedder(&config)?;
        let vector_store = providers::build_vector_store(&config)?;
        tracing::info!(
            "Vector index: {} (namespace: {})",
            config.vector_db.index_host,
            config.vector_db.namespace.as_deref().unwrap_or("<default>")
        );

        Ok(Self::from_parts(config, llm, embedder, vector_store))
    }

    /// Assemble state from already-built collaborators
    pub fn from_parts(
        config: RagConfig,
        llm: Arc<dyn LlmProvider>,
        embedder: Arc<dyn EmbeddingProvider>,
        vector_store: Arc<dyn VectorStoreProvider>,
    ) -> Self {
        let pipeline = Arc::new(RagPipeline::new(
            llm.clone(),
            embedder.clone(),
            vector_store.clone(),
            PipelineSettings::from_config(&config),
        ));

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pipeline,
                llm,
                embedder,
                vector_store,
                ready: RwLock::new(true),
            }),
        }
    }

    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    pub fn pipeline(&self) -> Arc<RagPipeline> {
        Arc::clone(&self.inner.pipeline)
    }

    pub fn llm(&self) -> &Arc<dyn LlmProvider> {
        &self.inner.llm
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.inner.embedder
    }

    pub fn vector_store(&self) -> &Arc<dyn VectorStoreProvider> {
        &self.inner.vector_store
    }

    /// Probe the model, embedding service and index. A probe error counts as
    /// unhealthy; nothing here fails.
    pub async fn probe_backends(&self) -> Vec<BackendHealth> {
        let (llm, embedder, store) = tokio::join!(
            self.inner.llm.health_check(),
            self.inner.embedder.health_check(),
            self.inner.vector_store.health_check(),
        );

        vec![
            BackendHealth {
                role: "llm",
                provider: self.inner.llm.name().to_string(),
                healthy: matches!(llm, Ok(true)),
            },
            BackendHealth {
                role: "embeddings",
                provider: self.inner.embedder.name().to_string(),
                healthy: matches!(embedder, Ok(true)),
            },
            BackendHealth {
                role: "vector_store",
                provider: self.inner.vector_store.name().to_string(),
                healthy: matches!(store, Ok(true)),
            },
        ]
    }

    /// Check if ready to serve requests
    pub fn is_ready(&self) -> bool {
        *self.inner.ready.read()
    }

    /// Flip readiness (cleared when shutdown starts)
    pub fn set_ready(&self, ready: bool) {
        *self.inner.ready.write() = ready;
    }
}
