//! Streamed answer synthesis.
//!
//! The model stream is driven by a producer task that hands tokens to the
//! consumer through a channel of capacity 1, so the model is never read
//! further ahead than one token of what the client has accepted. The producer
//! finishes with exactly one completion marker carrying success or the
//! stream error.

use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::providers::{CompletionOptions, LlmProvider, TokenStream};
use crate::types::RetrievedPassage;

use super::prompt::PromptBuilder;

/// Receives answer tokens as they are generated
#[async_trait]
pub trait TokenSink: Send + Sync {
    /// Deliver one token. Returns `Error::Transport` once nobody is reading;
    /// synthesis stops at that point.
    async fn send_token(&self, token: String) -> Result<()>;
}

/// Producer to consumer hand-off
enum Handoff {
    Token(String),
    Complete(Result<()>),
}

/// Aborts the producer when synthesis ends or its future is dropped, which
/// drops the model stream and with it the upstream HTTP request.
struct ProducerGuard(JoinHandle<()>);

impl Drop for ProducerGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Generates the answer from the standalone question and passages
pub struct AnswerSynthesizer {
    llm: Arc<dyn LlmProvider>,
    options: CompletionOptions,
}

impl AnswerSynthesizer {
    pub fn new(llm: Arc<dyn LlmProvider>, temperature: f32) -> Self {
        Self {
            llm,
            options: CompletionOptions { temperature },
        }
    }

    /// Stream the answer into `sink` and return the full text.
    ///
    /// `sink` sees every token exactly once, in order, and never after the
    /// model finished or failed.
    pub async fn synthesize(
        &self,
        question: &str,
        passages: &[RetrievedPassage],
        sink: &dyn TokenSink,
    ) -> Result<String> {
        let prompt = PromptBuilder::build_qa_prompt(question, passages);

        tracing::debug!(
            model = self.llm.model(),
            passages = passages.len(),
            "Starting answer stream"
        );

        let stream = self
            .llm
            .complete_stream(&prompt, &self.options)
            .await
            .map_err(Error::synthesis)?;

        let (tx, mut rx) = mpsc::channel(1);
        let _producer = ProducerGuard(tokio::spawn(produce(stream, tx)));

        let mut answer = String::new();
        loop {
            match rx.recv().await {
                Some(Handoff::Token(token)) => {
                    answer.push_str(&token);
                    sink.send_token(token).await?;
                }
                Some(Handoff::Complete(Ok(()))) => return Ok(answer),
                Some(Handoff::Complete(Err(e))) => return Err(Error::synthesis(e)),
                None => {
                    return Err(Error::synthesis(Error::internal(
                        "Token producer stopped without a completion marker",
                    )))
                }
            }
        }
    }
}

/// Drive the model stream until it ends, fails, or the consumer goes away
async fn produce(mut stream: TokenStream, tx: mpsc::Sender<Handoff>) {
    while let Some(item) = stream.next().await {
        match item {
            Ok(token) => {
                if tx.send(Handoff::Token(token)).await.is_err() {
                    return;
                }
            }
            Err(e) => {
                let _ = tx.send(Handoff::Complete(Err(e))).await;
                return;
            }
        }
    }

    let _ = tx.send(Handoff::Complete(Ok(()))).await;
}
