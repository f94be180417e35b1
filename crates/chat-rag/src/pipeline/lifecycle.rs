//! Per-request state machine

use std::fmt;
use std::time::Instant;

use crate::error::{Error, Result};

/// Where one request is in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Received,
    Condensing,
    Retrieving,
    Synthesizing,
    Completed,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Forward-only; any live state may fail
    fn can_advance_to(self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Received, Condensing)
                | (Condensing, Retrieving)
                | (Retrieving, Synthesizing)
                | (Synthesizing, Completed)
                | (Received | Condensing | Retrieving | Synthesizing, Failed)
        )
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::Condensing => "condensing",
            Self::Retrieving => "retrieving",
            Self::Synthesizing => "synthesizing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Tracks and logs the transitions of one request
#[derive(Debug)]
pub struct Lifecycle {
    state: PipelineState,
    started: Instant,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: PipelineState::Received,
            started: Instant::now(),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Move to `next`, rejecting anything the state machine does not allow
    pub fn advance(&mut self, next: PipelineState) -> Result<()> {
        if !self.state.can_advance_to(next) {
            return Err(Error::internal(format!(
                "Invalid pipeline transition {} -> {}",
                self.state, next
            )));
        }

        tracing::debug!(
            from = %self.state,
            to = %next,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "Pipeline transition"
        );
        self.state = next;
        Ok(())
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
