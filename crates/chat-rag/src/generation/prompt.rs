//! Prompt templates for condensing and answering

use crate::types::{ChatHistory, RetrievedPassage};

/// Rephrases a follow-up into a question that stands on its own
pub const CONDENSE_TEMPLATE: &str = "Given the following conversation and a follow up question, rephrase the follow up question to be a standalone question.

Chat History:
{chat_history}
Follow Up Input: {question}
Standalone question:";

/// Answers strictly from the retrieved context
pub const QA_TEMPLATE: &str = "You can channel TheRemingoat, an esteemed reviewer of mechanical keyboard switches. Use the following pieces of context to answer the question at the end.
If you don't know the answer, just say you don't know. DO NOT try to make up an answer.
If the question is not related to the context, politely respond that you are tuned to only answer questions that are related to the context.

{context}

Question: {question}
Helpful answer in markdown:";

/// Prompt builder for the two model calls of a chat request
pub struct PromptBuilder;

impl PromptBuilder {
    /// Render prior turns as `Human:`/`Assistant:` lines, oldest first
    pub fn format_history(history: &ChatHistory) -> String {
        history
            .iter()
            .map(|turn| format!("Human: {}\nAssistant: {}", turn.question, turn.answer))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Passage contents separated by a blank line, in retrieval order
    pub fn build_context(passages: &[RetrievedPassage]) -> String {
        passages
            .iter()
            .map(|p| p.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn build_condense_prompt(question: &str, history: &ChatHistory) -> String {
        let history = Self::format_history(history);
        fill(
            CONDENSE_TEMPLATE,
            &[("chat_history", history.as_str()), ("question", question)],
        )
    }

    pub fn build_qa_prompt(question: &str, passages: &[RetrievedPassage]) -> String {
        let context = Self::build_context(passages);
        fill(
            QA_TEMPLATE,
            &[("context", context.as_str()), ("question", question)],
        )
    }
}

/// Substitute `{name}` placeholders in one left-to-right pass.
///
/// Inserted values are never scanned again, so braces in history, questions
/// or passages reach the model verbatim. Unknown placeholders are kept.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let extra: usize = values.iter().map(|(_, value)| value.len()).sum();
    let mut out = String::with_capacity(template.len() + extra);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let value = after.find('}').and_then(|close| {
            let name = &after[..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });

        match value {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}
