//! Caller-owned conversation history

use serde::{Deserialize, Serialize};

/// One finished question/answer exchange.
///
/// Serialized as a two-element array `[question, answer]`, which is the shape
/// the browser client sends back with every request. A `null` answer (a turn
/// whose answer never arrived) reads as empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, Option<String>)", into = "(String, String)")]
pub struct ConversationTurn {
    /// Question as the user typed it
    pub question: String,
    /// Finalized answer text
    pub answer: String,
}

impl ConversationTurn {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

impl From<(String, Option<String>)> for ConversationTurn {
    fn from((question, answer): (String, Option<String>)) -> Self {
        Self {
            question,
            answer: answer.unwrap_or_default(),
        }
    }
}

impl From<ConversationTurn> for (String, String) {
    fn from(turn: ConversationTurn) -> Self {
        (turn.question, turn.answer)
    }
}

/// Ordered prior turns, oldest first.
///
/// The server never keeps one of these between requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatHistory(Vec<ConversationTurn>);

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a completed exchange. Only call this once the answer has
    /// finished streaming; partial answers are not replayable.
    pub fn push_turn(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.0.push(ConversationTurn::new(question, answer));
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ConversationTurn> {
        self.0.iter()
    }
}

impl From<Vec<ConversationTurn>> for ChatHistory {
    fn from(turns: Vec<ConversationTurn>) -> Self {
        Self(turns)
    }
}

impl<'a> IntoIterator for &'a ChatHistory {
    type Item = &'a ConversationTurn;
    type IntoIter = std::slice::Iter<'a, ConversationTurn>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_deserializes_from_pairs() {
        let json = r#"[["What are Oil Kings?", "A linear switch."], ["Are they loud?", "No."]]"#;
        let history: ChatHistory = serde_json::from_str(json).unwrap();

        assert_eq!(history.len(), 2);
        assert_eq!(history.turns()[0].question, "What are Oil Kings?");
        assert_eq!(history.turns()[1].answer, "No.");
    }

    #[test]
    fn test_history_serializes_back_to_pairs() {
        let mut history = ChatHistory::new();
        history.push_turn("q1", "a1");

        let json = serde_json::to_string(&history).unwrap();
        assert_eq!(json, r#"[["q1","a1"]]"#);
    }

    #[test]
    fn test_null_answer_reads_as_empty() {
        let request: crate::types::ChatRequest = serde_json::from_str(
            r#"{"question":"Are they loud?","history":[["What are Jwicks?", null]]}"#,
        )
        .unwrap();

        assert_eq!(request.history.len(), 1);
        assert_eq!(request.history.turns()[0].question, "What are Jwicks?");
        assert_eq!(request.history.turns()[0].answer, "");
    }

    #[test]
    fn test_malformed_turn_is_rejected() {
        let json = r#"[["only a question"]]"#;
        assert!(serde_json::from_str::<ChatHistory>(json).is_err());
    }
}
