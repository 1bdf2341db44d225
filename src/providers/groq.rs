//! Groq chat-completions client implementing `CompletionProvider`.
//!
//! Groq exposes an OpenAI-compatible API; the whole rendered prompt is
//! sent as a single user message.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::{CompletionProvider, SamplingConfig};
use crate::core::errors::ApiError;

const GROQ_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

#[derive(Clone)]
pub struct GroqCompletion {
    api_key: String,
    model: String,
    client: Client,
}

impl GroqCompletion {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl CompletionProvider for GroqCompletion {
    async fn complete(
        &self,
        prompt: &str,
        sampling: &SamplingConfig,
    ) -> Result<String, ApiError> {
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": sampling.temperature,
            "max_tokens": sampling.max_tokens,
        });

        let res = self
            .client
            .post(GROQ_API_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(ApiError::internal)?;

        if !res.status().is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Internal(format!("Groq chat error: {}", text)));
        }

        let payload: Value = res.json().await.map_err(ApiError::internal)?;

        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .trim()
            .to_string();

        Ok(content)
    }
}
