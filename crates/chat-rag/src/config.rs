//! Configuration for the chat RAG server

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Default Ollama endpoint
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Default OpenAI endpoint
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";

/// Upper bound for `llm.max_retries`; backoff doubles per retry
pub const MAX_RETRIES_LIMIT: u32 = 8;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Generative model configuration
    pub llm: LlmConfig,
    /// Embedding model configuration
    pub embeddings: EmbeddingConfig,
    /// Vector index configuration
    pub vector_db: VectorDbConfig,
    /// Retrieval configuration
    pub retrieval: RetrievalConfig,
}

/// Which model service to talk to
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModelBackend {
    /// Local Ollama server
    #[default]
    Ollama,
    /// OpenAI-compatible REST API
    OpenAi,
}

impl ModelBackend {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAi),
            other => Err(Error::config(format!(
                "Unknown model backend '{}' (expected 'ollama' or 'openai')",
                other
            ))),
        }
    }

    fn default_url(self) -> &'static str {
        match self {
            Self::Ollama => DEFAULT_OLLAMA_URL,
            Self::OpenAi => DEFAULT_OPENAI_URL,
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_cors: true,
        }
    }
}

/// Generative model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Model service
    pub backend: ModelBackend,
    /// Base URL of the model service
    pub base_url: String,
    /// API key (required for OpenAI)
    pub api_key: Option<String>,
    /// Generation model name
    pub generate_model: String,
    /// Sampling temperature for both condensing and answering
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Retries for failed non-streaming requests
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: ModelBackend::Ollama,
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            api_key: None,
            generate_model: "llama3.2:3b".to_string(),
            temperature: 0.0, // Deterministic rephrasing and answers
            timeout_secs: 120,
            max_retries: 2,
        }
    }
}

/// Embedding model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Model service
    pub backend: ModelBackend,
    /// Base URL of the embedding service
    pub base_url: String,
    /// Embedding model name
    pub model: String,
    /// Embedding dimensions (must match the index)
    pub dimensions: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: ModelBackend::Ollama,
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            model: "nomic-embed-text".to_string(),
            dimensions: 768,
        }
    }
}

/// Vector index (Pinecone) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorDbConfig {
    /// Index host, e.g. `https://switches-abc123.svc.us-east1-gcp.pinecone.io`
    pub index_host: String,
    /// API key
    pub api_key: Option<String>,
    /// Namespace to query; `None` queries the default namespace
    pub namespace: Option<String>,
    /// Metadata field holding the passage text
    pub text_key: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        Self {
            index_host: String::new(),
            api_key: None,
            namespace: None,
            text_key: "text".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of passages fetched per request
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 4 }
    }
}

impl RagConfig {
    /// Load from an optional TOML file, then apply environment overrides.
    ///
    /// A missing file is not an error; defaults are used instead.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => {
                tracing::info!("Loading configuration from {}", path.display());
                Self::from_toml_str(&std::fs::read_to_string(path)?)?
            }
            Some(path) => {
                tracing::warn!("Config file {} not found, using defaults", path.display());
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse a TOML document
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::config(format!("Invalid config file: {}", e)))
    }

    /// Apply overrides from a key lookup (the process environment in practice)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(backend) = get("RAG_LLM_BACKEND") {
            let backend = ModelBackend::parse(&backend)?;
            if self.llm.base_url == self.llm.backend.default_url() {
                self.llm.base_url = backend.default_url().to_string();
            }
            self.llm.backend = backend;
        }
        if let Some(url) = get("RAG_LLM_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Some(model) = get("RAG_GENERATE_MODEL") {
            self.llm.generate_model = model;
        }
        if let Some(key) = get("OPENAI_API_KEY") {
            self.llm.api_key = Some(key);
        }

        if let Some(backend) = get("RAG_EMBED_BACKEND") {
            let backend = ModelBackend::parse(&backend)?;
            if self.embeddings.base_url == self.embeddings.backend.default_url() {
                self.embeddings.base_url = backend.default_url().to_string();
            }
            self.embeddings.backend = backend;
        }
        if let Some(url) = get("RAG_EMBED_BASE_URL") {
            self.embeddings.base_url = url;
        }
        if let Some(model) = get("RAG_EMBED_MODEL") {
            self.embeddings.model = model;
        }

        if let Some(host) = get("PINECONE_INDEX_HOST") {
            self.vector_db.index_host = host;
        }
        if let Some(key) = get("PINECONE_API_KEY") {
            self.vector_db.api_key = Some(key);
        }
        if let Some(namespace) = get("PINECONE_NAMESPACE") {
            self.vector_db.namespace = Some(namespace);
        }

        if let Some(top_k) = get("RAG_TOP_K") {
            self.retrieval.top_k = top_k
                .trim()
                .parse()
                .map_err(|_| Error::config(format!("RAG_TOP_K must be an integer, got '{}'", top_k)))?;
        }
        if let Some(host) = get("RAG_HOST") {
            self.server.host = host;
        }
        if let Some(port) = get("RAG_PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| Error::config(format!("RAG_PORT must be a port number, got '{}'", port)))?;
        }

        Ok(())
    }

    /// Check everything needed to serve a request; run once at startup
    pub fn validate(&self) -> Result<()> {
        if self.retrieval.top_k == 0 {
            return Err(Error::config("retrieval.top_k must be at least 1"));
        }

        check_url("llm.base_url", &self.llm.base_url)?;
        if self.llm.generate_model.trim().is_empty() {
            return Err(Error::config("llm.generate_model must be set"));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(Error::config(format!(
                "llm.temperature must be between 0 and 2, got {}",
                self.llm.temperature
            )));
        }

        if self.llm.max_retries > MAX_RETRIES_LIMIT {
            return Err(Error::config(format!(
                "llm.max_retries must be at most {}, got {}",
                MAX_RETRIES_LIMIT, self.llm.max_retries
            )));
        }

        check_url("embeddings.base_url", &self.embeddings.base_url)?;
        if self.embeddings.model.trim().is_empty() {
            return Err(Error::config("embeddings.model must be set"));
        }
        if self.embeddings.dimensions == 0 {
            return Err(Error::config("embeddings.dimensions must be positive"));
        }

        let needs_openai_key = self.llm.backend == ModelBackend::OpenAi
            || self.embeddings.backend == ModelBackend::OpenAi;
        if needs_openai_key && self.llm.api_key.is_none() {
            return Err(Error::config(
                "OPENAI_API_KEY (llm.api_key) must be set when an OpenAI backend is selected",
            ));
        }

        if self.vector_db.index_host.trim().is_empty() {
            return Err(Error::config(
                "PINECONE_INDEX_HOST (vector_db.index_host) must be set",
            ));
        }
        check_url("vector_db.index_host", &self.vector_db.index_host)?;
        if self.vector_db.api_key.is_none() {
            return Err(Error::config(
                "PINECONE_API_KEY (vector_db.api_key) must be set",
            ));
        }
        if self.vector_db.text_key.trim().is_empty() {
            return Err(Error::config("vector_db.text_key must be set"));
        }

        Ok(())
    }

    /// Listen address as `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn check_url(field: &str, url: &str) -> Result<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(Error::config(format!(
            "{} must start with http:// or https://, got '{}'",
            field, url
        )))
    }
}
