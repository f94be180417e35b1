//! Ollama client and the provider implementations built on it

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{EmbeddingConfig, LlmConfig};
use crate::error::{Error, Result};

use super::embedding::EmbeddingProvider;
use super::lines::split_lines;
use super::retry::{with_backoff, Attempt};
use super::llm::{CompletionOptions, LlmProvider, TokenStream};

/// Ollama API client; non-streaming calls retry with backoff
pub struct OllamaClient {
    client: Client,
    base_url: String,
    max_retries: u32,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// One NDJSON record of a streaming generation
#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

impl OllamaClient {
    /// Create a new Ollama client with retry support
    pub fn new(base_url: &str, timeout_secs: u64, max_retries: u32) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .pool_max_idle_per_host(5)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries,
        })
    }

    /// Check if Ollama is available
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.base_url);

        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// Embed one text
    pub async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);

        with_backoff("Ollama", self.max_retries, || {
            let client = self.client.clone();
            let url = url.clone();

            async move {
                let response = client
                    .post(&url)
                    .json(&EmbedRequest { model, prompt: text })
                    .send()
                    .await
                    .map_err(|e| Error::embedding(format!("Embedding request failed: {}", e)))?;

                let status = response.status();
                if !status.is_success() {
                    return Err(Attempt::from_status(
                        status,
                        Error::embedding(format!("Embedding failed: HTTP {}", status)),
                    ));
                }

                let body: EmbedResponse = response.json().await.map_err(|e| {
                    Error::embedding(format!("Failed to parse embedding response: {}", e))
                })?;

                Ok(body.embedding)
            }
        })
        .await
    }

    /// Non-streaming generation
    pub async fn generate(&self, model: &str, prompt: &str, temperature: f32) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);

        with_backoff("Ollama", self.max_retries, || {
            let client = self.client.clone();
            let url = url.clone();

            async move {
                let request = GenerateRequest {
                    model,
                    prompt,
                    stream: false,
                    options: GenerateOptions { temperature },
                };

                let response = client
                    .post(&url)
                    .json(&request)
                    .send()
                    .await
                    .map_err(|e| Error::llm(format!("Generation request failed: {}", e)))?;

                if !response.status().is_success() {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(Attempt::from_status(
                        status,
                        Error::llm(format!("Generation failed: HTTP {} - {}", status, body)),
                    ));
                }

                let body: GenerateResponse = response
                    .json()
                    .await
                    .map_err(|e| Error::llm(format!("Failed to parse generation response: {}", e)))?;

                Ok(body.response)
            }
        })
        .await
    }

    /// Streaming generation. Not retried: tokens may already have gone out.
    pub async fn generate_stream(
        &self,
        model: &str,
        prompt: &str,
        temperature: f32,
    ) -> Result<TokenStream> {
        let url = format!("{}/api/generate", self.base_url);
        let request = GenerateRequest {
            model,
            prompt,
            stream: true,
            options: GenerateOptions { temperature },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::llm(format!("Stream request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::llm(format!(
                "Stream failed: HTTP {}",
                response.status()
            )));
        }

        let tokens = split_lines(response.bytes_stream()).filter_map(|line| async move {
            match line {
                Ok(line) => parse_stream_line(&line),
                Err(e) => Some(Err(e)),
            }
        });

        Ok(tokens.boxed())
    }
}

/// Turn one NDJSON line into a token, an error, or nothing
fn parse_stream_line(line: &str) -> Option<Result<String>> {
    if line.trim().is_empty() {
        return None;
    }

    match serde_json::from_str::<StreamChunk>(line) {
        Ok(StreamChunk {
            error: Some(error), ..
        }) => Some(Err(Error::llm(format!("Ollama stream error: {}", error)))),
        Ok(chunk) if chunk.response.is_empty() => None,
        Ok(chunk) => Some(Ok(chunk.response)),
        Err(e) => Some(Err(Error::llm(format!(
            "Failed to parse stream chunk: {}",
            e
        )))),
    }
}

/// Ollama embedding provider using nomic-embed-text or similar models
pub struct OllamaEmbedder {
    client: Arc<OllamaClient>,
    model: String,
    dimensions: usize,
}

impl OllamaEmbedder {
    /// Create a new Ollama embedder
    pub fn new(config: &EmbeddingConfig, llm: &LlmConfig) -> Result<Self> {
        let client = OllamaClient::new(&config.base_url, llm.timeout_secs, llm.max_retries)?;
        Ok(Self::from_client(
            Arc::new(client),
            config.model.clone(),
            config.dimensions,
        ))
    }

    /// Create from existing OllamaClient
    pub fn from_client(client: Arc<OllamaClient>, model: String, dimensions: usize) -> Self {
        Self {
            client,
            model,
            dimensions,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embedding = self.client.embed(&self.model, text).await?;
        if embedding.len() != self.dimensions {
            return Err(Error::embedding(format!(
                "Expected {} dimensions from {}, got {}",
                self.dimensions,
                self.model,
                embedding.len()
            )));
        }
        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// Ollama LLM provider
pub struct OllamaLlm {
    client: Arc<OllamaClient>,
    model: String,
}

impl OllamaLlm {
    /// Create a new Ollama LLM provider
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = OllamaClient::new(&config.base_url, config.timeout_secs, config.max_retries)?;
        Ok(Self::from_client(Arc::new(client), config.generate_model.clone()))
    }

    /// Create from existing OllamaClient
    pub fn from_client(client: Arc<OllamaClient>, model: String) -> Self {
        Self { client, model }
    }
}

#[async_trait]
impl LlmProvider for OllamaLlm {
    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String> {
        self.client
            .generate(&self.model, prompt, options.temperature)
            .await
    }

    async fn complete_stream(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<TokenStream> {
        self.client
            .generate_stream(&self.model, prompt, options.temperature)
            .await
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }
}
