//! Vector store provider trait for similarity search

use async_trait::async_trait;

use crate::error::Result;
use crate::types::RetrievedPassage;

/// Trait for read-only similarity search over a pre-built index
///
/// Implementations:
/// - `PineconeStore`: Pinecone serverless/pod index over REST
#[async_trait]
pub trait VectorStoreProvider: Send + Sync {
    /// Return up to `top_k` passages nearest to `query_embedding`, most
    /// similar first. `namespace` of `None` searches the default namespace.
    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        namespace: Option<&str>,
    ) -> Result<Vec<RetrievedPassage>>;

    /// Check if the index is reachable
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
