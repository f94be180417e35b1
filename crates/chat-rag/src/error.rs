//! Error types for the chat pipeline

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Message shown to clients for any upstream failure
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong while answering your question";

/// Chat pipeline errors
#[derive(Debug, Error)]
pub enum Error {
    /// Empty or malformed question, rejected before any external call
    #[error("Invalid request: {0}")]
    Validation(String),

    /// The model failed while rephrasing the follow-up question
    #[error("Question condensation failed: {0}")]
    Condense(#[source] Box<Error>),

    /// Embedding or vector index failure while fetching passages
    #[error("Passage retrieval failed: {0}")]
    Retrieval(#[source] Box<Error>),

    /// The model failed before or while streaming the answer
    #[error("Answer synthesis failed: {0}")]
    Synthesis(#[source] Box<Error>),

    /// Client disconnected or the outbound channel closed
    #[error("Transport error: {0}")]
    Transport(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// LLM error
    #[error("LLM error: {0}")]
    Llm(String),

    /// Embedding error
    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    /// Vector database error
    #[error("Vector database error: {0}")]
    VectorDb(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create a vector db error
    pub fn vector_db(message: impl Into<String>) -> Self {
        Self::VectorDb(message.into())
    }

    /// Create an LLM error
    pub fn llm(message: impl Into<String>) -> Self {
        Self::Llm(message.into())
    }

    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Wrap a collaborator failure raised while condensing
    pub fn condense(err: Error) -> Self {
        Self::Condense(Box::new(err))
    }

    /// Wrap a collaborator failure raised while retrieving
    pub fn retrieval(err: Error) -> Self {
        Self::Retrieval(Box::new(err))
    }

    /// Wrap a collaborator failure raised while synthesizing
    pub fn synthesis(err: Error) -> Self {
        Self::Synthesis(Box::new(err))
    }

    /// True when the client went away; nobody is left to read a response
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    /// HTTP status, stable error kind and client-safe message
    fn response_parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            Error::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg.clone()),
            Error::Condense(_) => (
                StatusCode::BAD_GATEWAY,
                "condense_error",
                GENERIC_FAILURE_MESSAGE.to_string(),
            ),
            Error::Retrieval(_) => (
                StatusCode::BAD_GATEWAY,
                "retrieval_error",
                GENERIC_FAILURE_MESSAGE.to_string(),
            ),
            Error::Synthesis(_) => (
                StatusCode::BAD_GATEWAY,
                "synthesis_error",
                GENERIC_FAILURE_MESSAGE.to_string(),
            ),
            Error::Llm(_) | Error::Embedding(_) | Error::VectorDb(_) | Error::Http(_) => (
                StatusCode::BAD_GATEWAY,
                "upstream_error",
                GENERIC_FAILURE_MESSAGE.to_string(),
            ),
            Error::Transport(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "transport_error",
                GENERIC_FAILURE_MESSAGE.to_string(),
            ),
            Error::Config(_) | Error::Io(_) | Error::Json(_) | Error::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                GENERIC_FAILURE_MESSAGE.to_string(),
            ),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type, message) = self.response_parts();

        if status.is_server_error() {
            tracing::error!(error_type, "Request failed: {}", self);
        } else {
            tracing::debug!(error_type, "Request rejected: {}", self);
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}
