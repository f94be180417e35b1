//! Sequences condense, retrieve and synthesize for one request

use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::generation::{AnswerSynthesizer, QuestionCondenser};
use crate::providers::{EmbeddingProvider, LlmProvider, VectorStoreProvider};
use crate::retrieval::Retriever;
use crate::types::{ChatRequest, PipelineResult, Question};

use super::events::PipelineEvent;
use super::lifecycle::{Lifecycle, PipelineState};

/// Per-deployment pipeline constants
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Passages fetched per request
    pub top_k: usize,
    /// Index namespace
    pub namespace: Option<String>,
    /// Temperature for both model calls
    pub temperature: f32,
}

impl PipelineSettings {
    pub fn from_config(config: &RagConfig) -> Self {
        Self {
            top_k: config.retrieval.top_k,
            namespace: config.vector_db.namespace.clone(),
            temperature: config.llm.temperature,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            top_k: 4,
            namespace: None,
            temperature: 0.0,
        }
    }
}

/// The conversational RAG pipeline.
///
/// Holds only immutable collaborators, so one instance serves every request;
/// all per-request state lives inside [`RagPipeline::run`].
pub struct RagPipeline {
    condenser: QuestionCondenser,
    retriever: Retriever,
    synthesizer: AnswerSynthesizer,
    top_k: usize,
}

impl RagPipeline {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStoreProvider>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            condenser: QuestionCondenser::new(llm.clone(), settings.temperature),
            retriever: Retriever::new(embedder, store, settings.namespace),
            synthesizer: AnswerSynthesizer::new(llm, settings.temperature),
            top_k: settings.top_k,
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Run one request to completion, publishing tokens and exactly one
    /// terminal event on `events`. Returns the terminal state.
    ///
    /// Dropping the receiving side of `events` cancels the in-flight stage.
    pub async fn run(
        &self,
        request: ChatRequest,
        events: mpsc::Sender<PipelineEvent>,
    ) -> PipelineState {
        let mut lifecycle = Lifecycle::new();

        let terminal = match self.execute(&mut lifecycle, &request, &events).await {
            Ok(result) => {
                tracing::info!(
                    answer_chars = result.text.len(),
                    sources = result.sources.len(),
                    elapsed_ms = lifecycle.elapsed_ms(),
                    "Chat request completed"
                );
                self.finish(&mut lifecycle, PipelineState::Completed);
                PipelineEvent::Completed(result)
            }
            Err(err) => {
                if err.is_transport() {
                    tracing::info!(stage = %lifecycle.state(), "Client went away: {}", err);
                } else {
                    tracing::error!(stage = %lifecycle.state(), "Chat request failed: {:?}", err);
                }
                self.finish(&mut lifecycle, PipelineState::Failed);
                PipelineEvent::Failed(err)
            }
        };

        // Receiver may already be gone; nothing left to notify then
        let _ = events.send(terminal).await;

        lifecycle.state()
    }

    async fn execute(
        &self,
        lifecycle: &mut Lifecycle,
        request: &ChatRequest,
        events: &mpsc::Sender<PipelineEvent>,
    ) -> Result<PipelineResult> {
        let question = Question::parse(&request.question)?;

        lifecycle.advance(PipelineState::Condensing)?;
        let standalone = until_closed(
            events,
            self.condenser.condense(&question, &request.history),
        )
        .await?;

        lifecycle.advance(PipelineState::Retrieving)?;
        let sources = until_closed(events, self.retriever.retrieve(&standalone, self.top_k)).await?;

        lifecycle.advance(PipelineState::Synthesizing)?;
        let text = until_closed(
            events,
            self.synthesizer.synthesize(&standalone, &sources, events),
        )
        .await?;

        Ok(PipelineResult { text, sources })
    }

    fn finish(&self, lifecycle: &mut Lifecycle, terminal: PipelineState) {
        if let Err(e) = lifecycle.advance(terminal) {
            tracing::error!("{}", e);
        }
    }
}

/// Race a stage against the client going away
async fn until_closed<T>(
    events: &mpsc::Sender<PipelineEvent>,
    stage: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = events.closed() => Err(Error::transport("client disconnected")),
        result = stage => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{passages, StubEmbedder, StubLlm, StubStore};
    use crate::types::{ChatHistory, StreamMessage};
    use tokio_test::assert_ok;

    const JWICK: &str = "What's the sound signature of Jwick Semi-Silents?";

    struct Harness {
        llm: Arc<StubLlm>,
        embedder: Arc<StubEmbedder>,
        store: Arc<StubStore>,
        pipeline: RagPipeline,
    }

    fn harness(llm: StubLlm, embedder: StubEmbedder, store: StubStore) -> Harness {
        let llm = Arc::new(llm);
        let embedder = Arc::new(embedder);
        let store = Arc::new(store);
        let pipeline = RagPipeline::new(
            llm.clone(),
            embedder.clone(),
            store.clone(),
            PipelineSettings::default(),
        );
        Harness {
            llm,
            embedder,
            store,
            pipeline,
        }
    }

    fn jwick_harness() -> Harness {
        harness(
            StubLlm::new(&["The", " sound", " signature", " is..."]),
            StubEmbedder::default(),
            StubStore::with_passages(passages(2)),
        )
    }

    /// Run the pipeline and collect every event it published
    async fn collect(pipeline: &RagPipeline, request: ChatRequest) -> (PipelineState, Vec<PipelineEvent>) {
        let (tx, mut rx) = mpsc::channel(1);
        let drain = tokio::spawn(async move {
            let mut events = Vec::new();
            while let Some(event) = rx.recv().await {
                events.push(event);
            }
            events
        });

        let state = pipeline.run(request, tx).await;
        (state, drain.await.unwrap())
    }

    /// Wire messages a streaming client would see
    fn as_messages(events: Vec<PipelineEvent>) -> Vec<StreamMessage> {
        let mut messages = Vec::new();
        for event in events {
            match event {
                PipelineEvent::Token(t) => messages.push(StreamMessage::Message(t)),
                PipelineEvent::Completed(result) => {
                    messages.push(StreamMessage::SourceDocuments(result.sources));
                    messages.push(StreamMessage::end());
                }
                PipelineEvent::Failed(_) => messages.push(StreamMessage::end()),
            }
        }
        messages
    }

    #[tokio::test]
    async fn test_jwick_scenario() {
        let h = jwick_harness();
        let (state, events) = collect(&h.pipeline, ChatRequest::new(JWICK)).await;

        assert_eq!(state, PipelineState::Completed);

        // Condenser echoed the question into retrieval and synthesis
        assert_eq!(h.llm.complete_calls(), 1);
        assert!(h.llm.last_stream_prompt().unwrap().contains(&format!("Question: {}", JWICK)));

        let messages = as_messages(events);
        assert_eq!(messages.len(), 6);
        assert_eq!(
            messages[..4],
            [
                StreamMessage::Message("The".into()),
                StreamMessage::Message(" sound".into()),
                StreamMessage::Message(" signature".into()),
                StreamMessage::Message(" is...".into()),
            ]
        );
        assert_eq!(messages[4], StreamMessage::SourceDocuments(passages(2)));
        assert_eq!(messages[5], StreamMessage::end());
    }

    #[tokio::test]
    async fn test_tokens_concatenate_to_result_text() {
        let h = jwick_harness();
        let (_, events) = collect(&h.pipeline, ChatRequest::new(JWICK)).await;

        let mut streamed = String::new();
        let mut result = None;
        for event in events {
            match event {
                PipelineEvent::Token(t) => streamed.push_str(&t),
                PipelineEvent::Completed(r) => result = Some(r),
                PipelineEvent::Failed(e) => panic!("unexpected failure: {}", e),
            }
        }

        let result = result.unwrap();
        assert_eq!(streamed, result.text);
        assert_eq!(result.text, "The sound signature is...");
    }

    #[tokio::test]
    async fn test_sources_are_the_passages_used_for_the_answer() {
        let h = jwick_harness();
        let (_, events) = collect(&h.pipeline, ChatRequest::new(JWICK)).await;

        let Some(PipelineEvent::Completed(result)) = events.into_iter().last() else {
            panic!("expected completion");
        };
        let prompt = h.llm.last_stream_prompt().unwrap();
        for passage in &result.sources {
            assert!(prompt.contains(&passage.content));
        }
        assert_eq!(result.sources, passages(2));
    }

    #[tokio::test]
    async fn test_empty_question_makes_no_calls() {
        let h = jwick_harness();
        let (state, events) = collect(&h.pipeline, ChatRequest::new("")).await;

        assert_eq!(state, PipelineState::Failed);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], PipelineEvent::Failed(Error::Validation(_))));

        assert_eq!(h.llm.complete_calls(), 0);
        assert_eq!(h.embedder.calls(), 0);
        assert_eq!(h.store.calls(), 0);
        assert_eq!(h.llm.stream_calls(), 0);
    }

    #[tokio::test]
    async fn test_retriever_error_skips_synthesis() {
        let h = harness(
            StubLlm::new(&["never"]),
            StubEmbedder::default(),
            StubStore::failing(),
        );
        let (state, events) = collect(&h.pipeline, ChatRequest::new(JWICK)).await;

        assert_eq!(state, PipelineState::Failed);
        assert_eq!(h.llm.stream_calls(), 0);
        assert!(matches!(&events[..], [PipelineEvent::Failed(Error::Retrieval(_))]));

        let messages = as_messages(events);
        assert_eq!(messages, vec![StreamMessage::end()]);
    }

    #[tokio::test]
    async fn test_embedding_error_is_retrieval_failure() {
        let h = harness(
            StubLlm::new(&["never"]),
            StubEmbedder::failing(),
            StubStore::with_passages(passages(2)),
        );
        let (state, events) = collect(&h.pipeline, ChatRequest::new(JWICK)).await;

        assert_eq!(state, PipelineState::Failed);
        assert_eq!(h.store.calls(), 0);
        assert!(matches!(&events[..], [PipelineEvent::Failed(Error::Retrieval(_))]));
    }

    #[tokio::test]
    async fn test_condense_error_stops_pipeline() {
        let h = harness(
            StubLlm::new(&["never"]).failing_complete(),
            StubEmbedder::default(),
            StubStore::with_passages(passages(2)),
        );
        let (state, events) = collect(&h.pipeline, ChatRequest::new(JWICK)).await;

        assert_eq!(state, PipelineState::Failed);
        assert_eq!(h.embedder.calls(), 0);
        assert!(matches!(&events[..], [PipelineEvent::Failed(Error::Condense(_))]));
    }

    #[tokio::test]
    async fn test_mid_stream_failure_ends_without_sources() {
        let h = harness(
            StubLlm::new(&["The", " sound"]).failing_stream_after(1),
            StubEmbedder::default(),
            StubStore::with_passages(passages(2)),
        );
        let (state, events) = collect(&h.pipeline, ChatRequest::new(JWICK)).await;

        assert_eq!(state, PipelineState::Failed);
        let messages = as_messages(events);
        assert_eq!(
            messages,
            vec![StreamMessage::Message("The".into()), StreamMessage::end()]
        );
    }

    #[tokio::test]
    async fn test_same_input_same_output() {
        let h = jwick_harness();
        let mut history = ChatHistory::new();
        history.push_turn("What are Jwicks?", "Budget linears.");
        let request = ChatRequest::new(JWICK).with_history(history);

        let (_, first) = collect(&h.pipeline, request.clone()).await;
        let first_prompt = h.llm.last_stream_prompt();
        let (_, second) = collect(&h.pipeline, request).await;

        assert_eq!(first_prompt, h.llm.last_stream_prompt());
        match (first.last(), second.last()) {
            (Some(PipelineEvent::Completed(a)), Some(PipelineEvent::Completed(b))) => {
                assert_eq!(a, b)
            }
            other => panic!("expected two completions, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_question_normalized_before_condensing() {
        let h = jwick_harness();
        let (state, _) = collect(&h.pipeline, ChatRequest::new("  What's the sound\nsignature?\r\n")).await;

        assert_eq!(state, PipelineState::Completed);
        let prompt = h.llm.last_complete_prompt().unwrap();
        assert!(prompt.contains("Follow Up Input: What's the sound signature?\nStandalone question:"));
    }

    #[tokio::test]
    async fn test_client_disconnect_cancels_synthesis() {
        let h = harness(
            StubLlm::new(&["The", " sound"]).hanging(),
            StubEmbedder::default(),
            StubStore::with_passages(passages(2)),
        );

        let (tx, mut rx) = mpsc::channel(1);
        let pipeline = Arc::new(h.pipeline);
        let run = tokio::spawn({
            let pipeline = pipeline.clone();
            async move { pipeline.run(ChatRequest::new(JWICK), tx).await }
        });

        // Read the two tokens, then hang up while the model is still "generating"
        assert!(matches!(rx.recv().await, Some(PipelineEvent::Token(_))));
        assert!(matches!(rx.recv().await, Some(PipelineEvent::Token(_))));
        drop(rx);

        let state = assert_ok!(run.await);
        assert_eq!(state, PipelineState::Failed);
    }
}
