//! chat-rag: conversational retrieval-augmented generation over a fixed corpus
//!
//! Each request condenses the follow-up question against the caller's chat
//! history, retrieves the top-K passages from a vector index, and streams an
//! answer grounded in those passages. Answers are delivered either as a
//! `text/event-stream` of `message` / `sourceDocuments` / `end` objects or as
//! one JSON body.
//!
//! The server keeps no conversation state; history travels with every
//! request.

pub mod config;
pub mod error;
pub mod generation;
pub mod pipeline;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod types;

#[cfg(test)]
mod testing;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use pipeline::{PipelineEvent, PipelineState, RagPipeline};
pub use types::{
    ChatHistory, ChatRequest, ConversationTurn, PipelineResult, RetrievedPassage, StreamMessage,
};
