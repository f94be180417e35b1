//! OpenAI chat completion and embedding providers.
//!
//! Endpoints are derived from the configured base URL:
//! - POST {base}/v1/chat/completions (buffered and `stream: true`)
//! - POST {base}/v1/embeddings
//! - GET  {base}/v1/models (health)

use async_trait::async_trait;
use futures_util::{future, StreamExt, TryStreamExt};
use reqwest::header;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::config::{EmbeddingConfig, LlmConfig};
use crate::error::{Error, Result};

use super::embedding::EmbeddingProvider;
use super::lines::split_lines;
use super::llm::{CompletionOptions, LlmProvider, TokenStream};
use super::retry::{with_backoff, Attempt};

/// Thin client for the OpenAI REST API with a preconfigured bearer header
#[derive(Debug)]
pub struct OpenAiClient {
    client: reqwest::Client,
    url_chat: String,
    url_embeddings: String,
    url_models: String,
    max_retries: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    stream: bool,
}

impl<'a> ChatCompletionRequest<'a> {
    fn new(model: &'a str, prompt: &'a str, temperature: f32, stream: bool) -> Self {
        Self {
            model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature,
            stream,
        }
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// One `data:` payload of a streamed completion
#[derive(Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Deserialize, Default)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// A parsed line of the completion event stream
#[derive(Debug, PartialEq)]
enum StreamLine {
    Token(String),
    Skip,
    Done,
}

impl OpenAiClient {
    /// Build a client. Fails if the key cannot be used as a header value.
    pub fn new(base_url: &str, api_key: &str, timeout_secs: u64, max_retries: u32) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| Error::config(format!("Invalid OpenAI API key header: {}", e)))?,
        );
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .default_headers(headers)
            .build()?;

        let base = base_url.trim_end_matches('/');
        info!(endpoint = %base, timeout_secs, "OpenAI client initialized");

        Ok(Self {
            client,
            url_chat: format!("{}/v1/chat/completions", base),
            url_embeddings: format!("{}/v1/embeddings", base),
            url_models: format!("{}/v1/models", base),
            max_retries,
        })
    }

    /// Create from the `[llm]` config section
    pub fn from_config(config: &LlmConfig, base_url: &str) -> Result<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .ok_or_else(|| Error::config("OPENAI_API_KEY is not set"))?;
        Self::new(base_url, api_key, config.timeout_secs, config.max_retries)
    }

    /// Check if the API answers with our key
    pub async fn health_check(&self) -> Result<bool> {
        match self.client.get(&self.url_models).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// Buffered chat completion
    pub async fn chat(&self, model: &str, prompt: &str, temperature: f32) -> Result<String> {
        let started = Instant::now();
        debug!(model, prompt_len = prompt.len(), "POST {}", self.url_chat);

        with_backoff("OpenAI", self.max_retries, || {
            let client = self.client.clone();
            let url = self.url_chat.clone();

            async move {
                let body = ChatCompletionRequest::new(model, prompt, temperature, false);
                let response = client.post(&url).json(&body).send().await?;

                if !response.status().is_success() {
                    let status = response.status();
                    let text = response.text().await.unwrap_or_default();
                    error!(
                        %status,
                        model,
                        latency_ms = started.elapsed().as_millis() as u64,
                        "OpenAI chat completion returned non-success status"
                    );
                    return Err(Attempt::from_status(
                        status,
                        Error::llm(format!(
                            "Chat completion failed: HTTP {} - {}",
                            status,
                            snippet(&text)
                        )),
                    ));
                }

                let out: ChatCompletionResponse = response.json().await.map_err(|e| {
                    Error::llm(format!(
                        "Failed to decode chat completion: {}; expected choices[0].message.content",
                        e
                    ))
                })?;

                out.choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.message.content)
                    .ok_or_else(|| Error::llm("Chat completion returned no choices"))
                    .map_err(Attempt::from)
            }
        })
        .await
    }

    /// Streamed chat completion. Not retried once the request is accepted.
    pub async fn chat_stream(
        &self,
        model: &str,
        prompt: &str,
        temperature: f32,
    ) -> Result<TokenStream> {
        let body = ChatCompletionRequest::new(model, prompt, temperature, true);
        let response = self
            .client
            .post(&self.url_chat)
            .header(header::ACCEPT, "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::llm(format!("Stream request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::llm(format!(
                "Stream failed: HTTP {} - {}",
                status,
                snippet(&text)
            )));
        }

        let tokens = split_lines(response.bytes_stream())
            .and_then(|line| future::ready(parse_stream_line(&line)))
            .try_take_while(|line| future::ready(Ok(*line != StreamLine::Done)))
            .try_filter_map(|line| {
                future::ready(Ok(match line {
                    StreamLine::Token(token) => Some(token),
                    StreamLine::Skip | StreamLine::Done => None,
                }))
            });

        Ok(tokens.boxed())
    }

    /// Embed one text
    pub async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>> {
        with_backoff("OpenAI", self.max_retries, || {
            let client = self.client.clone();
            let url = self.url_embeddings.clone();

            async move {
                let response = client
                    .post(&url)
                    .json(&EmbeddingRequest { model, input: text })
                    .send()
                    .await
                    .map_err(|e| Error::embedding(format!("Embedding request failed: {}", e)))?;

                if !response.status().is_success() {
                    let status = response.status();
                    let text = response.text().await.unwrap_or_default();
                    return Err(Attempt::from_status(
                        status,
                        Error::embedding(format!(
                            "Embedding failed: HTTP {} - {}",
                            status,
                            snippet(&text)
                        )),
                    ));
                }

                let out: EmbeddingResponse = response.json().await.map_err(|e| {
                    Error::embedding(format!("Failed to decode embedding response: {}", e))
                })?;

                out.data
                    .into_iter()
                    .next()
                    .map(|d| d.embedding)
                    .ok_or_else(|| Error::embedding("Embedding response had no data"))
                    .map_err(Attempt::from)
            }
        })
        .await
    }
}

/// Parse one line of the completion event stream
fn parse_stream_line(line: &str) -> Result<StreamLine> {
    let Some(payload) = line.strip_prefix("data:") else {
        // Blank separators, `:` comments and `event:` fields
        return Ok(StreamLine::Skip);
    };

    let payload = payload.trim();
    if payload == "[DONE]" {
        return Ok(StreamLine::Done);
    }
    if payload.is_empty() {
        return Ok(StreamLine::Skip);
    }

    let chunk: ChatCompletionChunk = serde_json::from_str(payload)
        .map_err(|e| Error::llm(format!("Failed to parse stream chunk: {}", e)))?;

    if let Some(err) = chunk.error {
        return Err(Error::llm(format!("OpenAI stream error: {}", err.message)));
    }

    let token = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .unwrap_or_default();

    if token.is_empty() {
        Ok(StreamLine::Skip)
    } else {
        Ok(StreamLine::Token(token))
    }
}

/// First 200 chars of an error body
fn snippet(text: &str) -> String {
    text.chars().take(200).collect()
}

/// OpenAI LLM provider
pub struct OpenAiLlm {
    client: Arc<OpenAiClient>,
    model: String,
}

impl OpenAiLlm {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = OpenAiClient::from_config(config, &config.base_url)?;
        Ok(Self::from_client(Arc::new(client), config.generate_model.clone()))
    }

    pub fn from_client(client: Arc<OpenAiClient>, model: String) -> Self {
        Self { client, model }
    }
}

#[async_trait]
impl LlmProvider for OpenAiLlm {
    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String> {
        self.client
            .chat(&self.model, prompt, options.temperature)
            .await
    }

    async fn complete_stream(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<TokenStream> {
        self.client
            .chat_stream(&self.model, prompt, options.temperature)
            .await
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// OpenAI embedding provider (text-embedding-3-small, ada-002, ...)
pub struct OpenAiEmbedder {
    client: Arc<OpenAiClient>,
    model: String,
    dimensions: usize,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig, llm: &LlmConfig) -> Result<Self> {
        let client = OpenAiClient::from_config(llm, &config.base_url)?;
        Ok(Self::from_client(
            Arc::new(client),
            config.model.clone(),
            config.dimensions,
        ))
    }

    pub fn from_client(client: Arc<OpenAiClient>, model: String, dimensions: usize) -> Self {
        Self {
            client,
            model,
            dimensions,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
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
        "openai"
    }
}
