//! One-request conversational RAG pipeline

pub mod events;
pub mod lifecycle;
pub mod orchestrator;

pub use events::PipelineEvent;
pub use lifecycle::{Lifecycle, PipelineState};
pub use orchestrator::{PipelineSettings, RagPipeline};
