//! HTTP embedding client
//!
//! Speaks the OpenAI embeddings wire shape, which every embedding endpoint
//! the gateway targets understands.

use super::types::EmbeddingProvider;
use crate::utils::error::{GatewayError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// Client for `POST <base>/v1/embeddings`
pub struct HttpEmbeddingProvider {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    dimension: usize,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    embedding: Vec<f32>,
}

impl HttpEmbeddingProvider {
    /// Build a client for one embedding endpoint and model
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        dimension: usize,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("llmgate-embeddings/0.1")
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
            dimension,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let mut request = self
            .http
            .post(&url)
            .json(&json!({ "model": self.model, "input": text }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::from_upstream_status(status.as_u16(), body));
        }

        let parsed: EmbeddingResponse = response.json().await?;
        let embedding = parsed
            .data
            .into_iter()
            .next()
            .map(|row| row.embedding)
            .ok_or_else(|| GatewayError::Cache("embedding response carried no vectors".to_string()))?;

        if embedding.len() != self.dimension {
            return Err(GatewayError::Cache(format!(
                "embedding dimension {} does not match configured {}",
                embedding.len(),
                self.dimension
            )));
        }
        Ok(embedding)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
