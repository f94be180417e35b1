//! Follow-up question condensation

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::providers::{CompletionOptions, LlmProvider};
use crate::types::{ChatHistory, Question};

use super::prompt::PromptBuilder;

/// Turns a follow-up plus prior turns into one standalone question.
///
/// Always makes exactly one buffered model call, including when the history
/// is empty.
pub struct QuestionCondenser {
    llm: Arc<dyn LlmProvider>,
    options: CompletionOptions,
}

impl QuestionCondenser {
    pub fn new(llm: Arc<dyn LlmProvider>, temperature: f32) -> Self {
        Self {
            llm,
            options: CompletionOptions { temperature },
        }
    }

    pub async fn condense(&self, question: &Question, history: &ChatHistory) -> Result<String> {
        let prompt = PromptBuilder::build_condense_prompt(question.as_str(), history);

        let output = self
            .llm
            .complete(&prompt, &self.options)
            .await
            .map_err(Error::condense)?;

        let standalone = output.trim();
        if standalone.is_empty() {
            return Err(Error::condense(Error::llm(
                "Model returned an empty standalone question",
            )));
        }

        tracing::debug!(
            turns = history.len(),
            standalone = %standalone,
            "Condensed follow-up question"
        );

        Ok(standalone.to_string())
    }
}
