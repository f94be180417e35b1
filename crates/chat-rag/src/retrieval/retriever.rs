//! Embeds the standalone question and searches the vector index

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::providers::{EmbeddingProvider, VectorStoreProvider};
use crate::types::RetrievedPassage;

/// Retriever adapter over an embedder and an index
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStoreProvider>,
    namespace: Option<String>,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStoreProvider>,
        namespace: Option<String>,
    ) -> Self {
        Self {
            embedder,
            store,
            namespace,
        }
    }

    /// Up to `k` passages in the index's order (most similar first).
    ///
    /// No re-ranking or deduplication; extra results are cut off, never
    /// reordered.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedPassage>> {
        let embedding = self.embedder.embed(query).await.map_err(Error::retrieval)?;

        let mut passages = self
            .store
            .search(&embedding, k, self.namespace.as_deref())
            .await
            .map_err(Error::retrieval)?;
        passages.truncate(k);

        tracing::debug!(
            store = self.store.name(),
            namespace = self.namespace.as_deref().unwrap_or(""),
            k,
            found = passages.len(),
            "Retrieved passages"
        );

        Ok(passages)
    }
}
