//! Pinecone vector index over its data-plane REST API

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

use crate::config::VectorDbConfig;
use crate::error::{Error, Result};
use crate::types::RetrievedPassage;

use super::vector_store::VectorStoreProvider;

const API_VERSION: &str = "2024-07";

/// Read-only Pinecone store. The index is populated by a separate
/// ingestion job; passage text lives in a metadata field.
pub struct PineconeStore {
    client: reqwest::Client,
    url_query: String,
    url_stats: String,
    api_key: String,
    text_key: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<Match>,
}

#[derive(Deserialize)]
struct Match {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<Map<String, Value>>,
}

impl PineconeStore {
    pub fn new(config: &VectorDbConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| Error::config("PINECONE_API_KEY is not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let host = config.index_host.trim_end_matches('/');

        Ok(Self {
            client,
            url_query: format!("{}/query", host),
            url_stats: format!("{}/describe_index_stats", host),
            api_key,
            text_key: config.text_key.clone(),
        })
    }

    /// Turn matches into passages, keeping index order
    fn into_passages(&self, matches: Vec<Match>) -> Vec<RetrievedPassage> {
        matches
            .into_iter()
            .filter_map(|m| {
                let mut metadata = m.metadata.unwrap_or_default();
                match metadata.remove(&self.text_key) {
                    Some(Value::String(text)) => Some(RetrievedPassage::new(text, metadata, m.score)),
                    _ => {
                        tracing::warn!(
                            id = %m.id,
                            text_key = %self.text_key,
                            "Skipping match without passage text"
                        );
                        None
                    }
                }
            })
            .collect()
    }
}

#[async_trait]
impl VectorStoreProvider for PineconeStore {
    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
        namespace: Option<&str>,
    ) -> Result<Vec<RetrievedPassage>> {
        let request = QueryRequest {
            vector: query_embedding,
            top_k,
            include_metadata: true,
            include_values: false,
            namespace,
        };

        let response = self
            .client
            .post(&self.url_query)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::vector_db(format!("Query request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::vector_db(format!(
                "Query failed: HTTP {} - {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let body: QueryResponse = response
            .json()
            .await
            .map_err(|e| Error::vector_db(format!("Failed to parse query response: {}", e)))?;

        tracing::debug!(matches = body.matches.len(), top_k, "Pinecone query complete");

        Ok(self.into_passages(body.matches))
    }

    async fn health_check(&self) -> Result<bool> {
        match self
            .client
            .get(&self.url_stats)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .send()
            .await
        {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        "pinecone"
    }
}
