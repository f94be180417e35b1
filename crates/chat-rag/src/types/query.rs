//! Chat request types

use serde::{Deserialize, Serialize};

use super::history::ChatHistory;
use crate::error::{Error, Result};

/// Inbound chat request, as posted by the browser client
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Raw follow-up question
    pub question: String,

    /// Prior turns; defaults to empty
    #[serde(default)]
    pub history: ChatHistory,
}

impl ChatRequest {
    /// Create a request with no history
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            history: ChatHistory::new(),
        }
    }

    /// Attach prior turns
    pub fn with_history(mut self, history: ChatHistory) -> Self {
        self.history = history;
        self
    }

    /// Cheap upstream check used by the HTTP layer so a blank question is
    /// answered with 400 before any event stream is opened. Does not
    /// normalize; that happens once inside the pipeline.
    pub fn ensure_not_blank(&self) -> Result<()> {
        if self.question.trim().is_empty() {
            return Err(Error::validation("Question is empty"));
        }
        Ok(())
    }
}

/// A question that went through normalization and is known to be non-empty
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question(String);

impl Question {
    /// Trim and collapse newlines to spaces; reject empty input
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized = normalize_question(raw);
        if normalized.is_empty() {
            return Err(Error::validation("Question is empty"));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for Question {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Embedding models do better with single-line input
pub fn normalize_question(raw: &str) -> String {
    raw.trim()
        .replace("\r\n", " ")
        .replace(['\n', '\r'], " ")
}
