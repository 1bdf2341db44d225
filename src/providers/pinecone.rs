//! Pinecone REST client implementing `VectorIndex`.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::core::errors::ApiError;
use crate::search::index::{SearchMatch, VectorIndex};

#[derive(Clone)]
pub struct PineconeIndex {
    host: String,
    api_key: String,
    namespace: String,
    client: Client,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<RawMatch>,
}

#[derive(Deserialize)]
struct RawMatch {
    id: String,
    #[serde(default)]
    score: f32,
    metadata: Option<Value>,
}

impl PineconeIndex {
    /// `host` is the index endpoint, with or without the scheme.
    pub fn new(host: String, api_key: String, namespace: String) -> Self {
        let host = host.trim_end_matches('/').to_string();
        let host = if host.starts_with("http") {
            host
        } else {
            format!("https://{}", host)
        };
        Self {
            host,
            api_key,
            namespace,
            client: Client::new(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<SearchMatch>, ApiError> {
        let url = format!("{}/query", self.host);

        let body = json!({
            "vector": vector,
            "topK": top_k,
            "namespace": self.namespace,
            "includeMetadata": true,
        });

        let res = self
            .client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(ApiError::internal)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Internal(format!(
                "Pinecone query failed ({}): {}",
                status, text
            )));
        }

        let payload: QueryResponse = res.json().await.map_err(ApiError::internal)?;

        Ok(payload
            .matches
            .into_iter()
            .map(|m| SearchMatch::from_raw(m.id, m.score, m.metadata))
            .collect())
    }
}
