//! Events flowing from the orchestrator to a transport

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::generation::TokenSink;
use crate::types::PipelineResult;

/// What a transport receives for one request: zero or more tokens followed by
/// exactly one terminal event.
#[derive(Debug)]
pub enum PipelineEvent {
    /// One answer token
    Token(String),
    /// Answer finished; carries the text and the passages it was built from
    Completed(PipelineResult),
    /// The request failed at some stage
    Failed(Error),
}

#[async_trait]
impl TokenSink for mpsc::Sender<PipelineEvent> {
    async fn send_token(&self, token: String) -> Result<()> {
        self.send(PipelineEvent::Token(token))
            .await
            .map_err(|_| Error::transport("client disconnected while streaming"))
    }
}
