//! Chat endpoint

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    Json,
};
use tokio::sync::mpsc;
use tracing::Instrument;
use uuid::Uuid;

use crate::error::Error;
use crate::server::state::AppState;
use crate::server::transport::{JsonTransport, SseTransport, Transport};
use crate::types::ChatRequest;

const EVENT_STREAM: &str = "text/event-stream";

/// POST /api/chat - Answer a follow-up question, streamed or buffered
pub async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("chat", %request_id);

    async move {
        let request = match body {
            Ok(Json(request)) => request,
            Err(rejection) => return Error::validation(rejection.body_text()).into_response(),
        };

        // Reject before an event stream is opened
        if let Err(err) = request.ensure_not_blank() {
            return err.into_response();
        }

        let streaming = wants_event_stream(&headers);
        tracing::info!(
            streaming,
            turns = request.history.len(),
            "Chat request: \"{}\"",
            request.question
        );

        let (tx, rx) = mpsc::channel(1);
        let pipeline = state.pipeline();
        tokio::spawn(
            async move {
                pipeline.run(request, tx).await;
            }
            .in_current_span(),
        );

        let transport: Box<dyn Transport> = if streaming {
            Box::new(SseTransport)
        } else {
            Box::new(JsonTransport)
        };
        transport.deliver(rx).await
    }
    .instrument(span)
    .await
}

/// Streaming iff the client lists `text/event-stream` in `Accept`
fn wants_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::ACCEPT)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| value.contains(EVENT_STREAM))
}
