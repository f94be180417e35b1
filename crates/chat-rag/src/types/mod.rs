//! Core types for the chat pipeline

pub mod history;
pub mod query;
pub mod response;

pub use history::{ChatHistory, ConversationTurn};
pub use query::{normalize_question, ChatRequest, Question};
pub use response::{BufferedResponse, PipelineResult, RetrievedPassage, StreamMessage};
