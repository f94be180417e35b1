//! Delivery strategies for the events of one pipeline run

use async_trait::async_trait;
use axum::{
    http::header,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures::stream::{self, Stream, StreamExt};
use std::collections::VecDeque;
use tokio::sync::mpsc;

use crate::error::Error;
use crate::pipeline::PipelineEvent;
use crate::types::{BufferedResponse, StreamMessage};

/// Turns the event channel of one request into an HTTP response.
///
/// Dropping the returned response (client disconnect) drops the receiver,
/// which is how cancellation reaches the pipeline.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn deliver(&self, events: mpsc::Receiver<PipelineEvent>) -> Response;
}

/// `text/event-stream` delivery: tokens as they arrive, then sources, then end
#[derive(Debug, Clone, Copy, Default)]
pub struct SseTransport;

/// Single JSON body once the answer is complete
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonTransport;

struct MessageState {
    events: mpsc::Receiver<PipelineEvent>,
    pending: VecDeque<StreamMessage>,
    finished: bool,
}

/// Map pipeline events to wire messages.
///
/// Always ends with exactly one `end`, including when the pipeline goes away
/// without a terminal event. `sourceDocuments` only follows a completed run.
pub fn stream_messages(
    events: mpsc::Receiver<PipelineEvent>,
) -> impl Stream<Item = StreamMessage> + Send {
    let state = MessageState {
        events,
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(message) = state.pending.pop_front() {
                return Some((message, state));
            }
            if state.finished {
                return None;
            }

            match state.events.recv().await {
                Some(PipelineEvent::Token(token)) => {
                    return Some((StreamMessage::Message(token), state));
                }
                Some(PipelineEvent::Completed(result)) => {
                    state.pending.push_back(StreamMessage::SourceDocuments(result.sources));
                    state.pending.push_back(StreamMessage::end());
                    state.finished = true;
                }
                Some(PipelineEvent::Failed(err)) => {
                    tracing::debug!("Closing event stream after failure: {}", err);
                    state.pending.push_back(StreamMessage::end());
                    state.finished = true;
                }
                None => {
                    tracing::warn!("Pipeline ended without a terminal event");
                    state.pending.push_back(StreamMessage::end());
                    state.finished = true;
                }
            }
        }
    })
}

#[async_trait]
impl Transport for SseTransport {
    async fn deliver(&self, events: mpsc::Receiver<PipelineEvent>) -> Response {
        let stream = stream_messages(events).map(|message| Event::default().json_data(message));

        (
            [(header::CACHE_CONTROL, "no-cache, no-transform")],
            Sse::new(stream).keep_alive(KeepAlive::default()),
        )
            .into_response()
    }
}

#[async_trait]
impl Transport for JsonTransport {
    async fn deliver(&self, mut events: mpsc::Receiver<PipelineEvent>) -> Response {
        while let Some(event) = events.recv().await {
            match event {
                PipelineEvent::Token(_) => continue,
                PipelineEvent::Completed(result) => {
                    return Json(BufferedResponse::from(result)).into_response()
                }
                PipelineEvent::Failed(err) => return err.into_response(),
            }
        }

        Error::internal("Pipeline ended without a terminal event").into_response()
    }
}
