//! Question condensation and streamed answer synthesis

pub mod condenser;
pub mod prompt;
pub mod synthesizer;

pub use condenser::QuestionCondenser;
pub use prompt::PromptBuilder;
pub use synthesizer::{AnswerSynthesizer, TokenSink};
