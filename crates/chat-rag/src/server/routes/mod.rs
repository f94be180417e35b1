//! API routes for the chat server

pub mod chat;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use crate::server::state::AppState;

/// Build all `/api` routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/chat", post(chat::chat))
        .route("/info", get(info))
}

/// API info endpoint
async fn info(State(state): State<AppState>) -> Json<Value> {
    let config = state.config();

    Json(json!({
        "name": "chat-rag",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Conversational RAG over a fixed document corpus with streamed answers",
        "models": {
            "llm": {
                "provider": state.llm().name(),
                "model": state.llm().model(),
                "temperature": config.llm.temperature,
            },
            "embeddings": {
                "provider": state.embedder().name(),
                "model": config.embeddings.model,
                "dimensions": state.embedder().dimensions(),
            },
            "vector_store": state.vector_store().name(),
        },
        "retrieval": {
            "top_k": state.pipeline().top_k(),
            "namespace": config.vector_db.namespace,
        },
        "endpoints": {
            "POST /api/chat": "Ask a question; send `Accept: text/event-stream` for a streamed answer",
            "GET /api/info": "This document",
            "GET /health": "Liveness",
            "GET /ready": "Readiness"
        }
    }))
}
