//! Stub collaborators shared by the unit tests

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Map};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::generation::TokenSink;
use crate::providers::{
    CompletionOptions, EmbeddingProvider, LlmProvider, TokenStream, VectorStoreProvider,
};
use crate::types::{response::SOURCE_KEY, RetrievedPassage};

/// `n` passages about Jwick Semi-Silents, most similar first
pub(crate) fn passages(n: usize) -> Vec<RetrievedPassage> {
    (0..n)
        .map(|i| {
            let mut metadata = Map::new();
            metadata.insert(
                SOURCE_KEY.into(),
                json!(format!("https://example.com/reviews/jwick-semi-silent#{}", i)),
            );
            RetrievedPassage::new(
                format!("Jwick Semi-Silents review, part {}: muted and creamy.", i + 1),
                metadata,
                0.95 - i as f32 * 0.05,
            )
        })
        .collect()
}

/// Scripted model.
///
/// Buffered completions echo the follow-up question out of the condense
/// prompt; streamed completions replay the configured tokens.
#[derive(Default)]
pub(crate) struct StubLlm {
    tokens: Vec<String>,
    fail_complete: bool,
    fail_stream_open: bool,
    fail_stream_after: Option<usize>,
    hang_after_tokens: bool,
    complete_calls: AtomicUsize,
    stream_calls: AtomicUsize,
    pulled: Arc<AtomicUsize>,
    last_complete_prompt: Mutex<Option<String>>,
    last_stream_prompt: Mutex<Option<String>>,
    last_temperature: Mutex<Option<f32>>,
}

impl StubLlm {
    pub(crate) fn new(tokens: &[&str]) -> Self {
        Self {
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    pub(crate) fn failing_complete(mut self) -> Self {
        self.fail_complete = true;
        self
    }

    pub(crate) fn failing_stream_open(mut self) -> Self {
        self.fail_stream_open = true;
        self
    }

    /// Emit `n` tokens, then a stream error
    pub(crate) fn failing_stream_after(mut self, n: usize) -> Self {
        self.fail_stream_after = Some(n);
        self
    }

    /// Emit all tokens, then never finish
    pub(crate) fn hanging(mut self) -> Self {
        self.hang_after_tokens = true;
        self
    }

    pub(crate) fn complete_calls(&self) -> usize {
        self.complete_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }

    /// Tokens taken off the model stream so far
    pub(crate) fn tokens_pulled(&self) -> usize {
        self.pulled.load(Ordering::SeqCst)
    }

    pub(crate) fn last_complete_prompt(&self) -> Option<String> {
        self.last_complete_prompt.lock().clone()
    }

    pub(crate) fn last_stream_prompt(&self) -> Option<String> {
        self.last_stream_prompt.lock().clone()
    }

    pub(crate) fn last_temperature(&self) -> Option<f32> {
        *self.last_temperature.lock()
    }
}

#[async_trait]
impl LlmProvider for StubLlm {
    async fn complete(&self, prompt: &str, options: &CompletionOptions) -> Result<String> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_complete_prompt.lock() = Some(prompt.to_string());
        *self.last_temperature.lock() = Some(options.temperature);

        if self.fail_complete {
            return Err(Error::llm("HTTP 500 from stub"));
        }

        let echoed = prompt
            .split_once("Follow Up Input: ")
            .and_then(|(_, rest)| rest.split_once("\nStandalone question:"))
            .map(|(question, _)| question.to_string())
            .unwrap_or_else(|| prompt.to_string());
        Ok(echoed)
    }

    async fn complete_stream(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<TokenStream> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_stream_prompt.lock() = Some(prompt.to_string());
        *self.last_temperature.lock() = Some(options.temperature);

        if self.fail_stream_open {
            return Err(Error::llm("connection refused"));
        }

        let mut items: Vec<Result<String>> = match self.fail_stream_after {
            Some(n) => self.tokens.iter().take(n).cloned().map(Ok).collect(),
            None => self.tokens.iter().cloned().map(Ok).collect(),
        };
        if self.fail_stream_after.is_some() {
            items.push(Err(Error::llm("stream reset by peer")));
        }

        let pulled = self.pulled.clone();
        let replay = stream::iter(items).inspect(move |_| {
            pulled.fetch_add(1, Ordering::SeqCst);
        });

        if self.hang_after_tokens {
            Ok(replay.chain(stream::pending()).boxed())
        } else {
            Ok(replay.boxed())
        }
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "stub"
    }

    fn model(&self) -> &str {
        "stub-model"
    }
}

/// Fixed-vector embedder that counts calls
#[derive(Default)]
pub(crate) struct StubEmbedder {
    fail: bool,
    calls: AtomicUsize,
}

impl StubEmbedder {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for StubEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::embedding("embedding service unavailable"));
        }
        Ok(vec![0.25; 4])
    }

    fn dimensions(&self) -> usize {
        4
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(!self.fail)
    }

    fn name(&self) -> &str {
        "stub"
    }
}

/// Index returning scripted passages
#[derive(Default)]
pub(crate) struct StubStore {
    passages: Vec<RetrievedPassage>,
    fail: bool,
    calls: AtomicUsize,
    last_top_k: Mutex<Option<usize>>,
    last_namespace: Mutex<Option<String>>,
}

impl StubStore {
    pub(crate) fn with_passages(passages: Vec<RetrievedPassage>) -> Self {
        Self {
            passages,
            ..Default::default()
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn last_top_k(&self) -> Option<usize> {
        *self.last_top_k.lock()
    }

    pub(crate) fn last_namespace(&self) -> Option<String> {
        self.last_namespace.lock().clone()
    }
}

#[async_trait]
impl VectorStoreProvider for StubStore {
    async fn search(
        &self,
        _query_embedding: &[f32],
        top_k: usize,
        namespace: Option<&str>,
    ) -> Result<Vec<RetrievedPassage>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_top_k.lock() = Some(top_k);
        *self.last_namespace.lock() = namespace.map(str::to_string);

        if self.fail {
            return Err(Error::vector_db("index unavailable"));
        }
        // Deliberately ignores top_k so callers must truncate
        Ok(self.passages.clone())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(!self.fail)
    }

    fn name(&self) -> &str {
        "stub"
    }
}

/// Records tokens; optionally refuses after accepting `limit` of them
#[derive(Default)]
pub(crate) struct RecordingSink {
    tokens: Mutex<Vec<String>>,
    limit: Option<usize>,
}

impl RecordingSink {
    pub(crate) fn closing_after(limit: usize) -> Self {
        Self {
            tokens: Mutex::new(Vec::new()),
            limit: Some(limit),
        }
    }

    pub(crate) fn tokens(&self) -> Vec<String> {
        self.tokens.lock().clone()
    }
}

#[async_trait]
impl TokenSink for RecordingSink {
    async fn send_token(&self, token: String) -> Result<()> {
        let mut tokens = self.tokens.lock();
        if self.limit.is_some_and(|limit| tokens.len() >= limit) {
            return Err(Error::transport("sink closed"));
        }
        tokens.push(token);
        Ok(())
    }
}
