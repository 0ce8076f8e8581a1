//! Shared test fixtures
#![allow(dead_code)]

use llmgate::core::cache::EmbeddingProvider;
use llmgate::core::types::{Compatibility, Modality, ModelInfo, Provider};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;

/// Deterministic embedder with a fixed prompt → vector table
///
/// Unknown prompts hash into a unit vector far from everything in the table.
pub struct StubEmbedder {
    pub dimension: usize,
    table: HashMap<String, Vec<f32>>,
}

impl StubEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension, table: HashMap::new() }
    }

    pub fn with(mut self, prompt: &str, vector: Vec<f32>) -> Self {
        assert_eq!(vector.len(), self.dimension);
        self.table.insert(prompt.to_string(), vector);
        self
    }
}

#[async_trait]
impl EmbeddingProvider for StubEmbedder {
    async fn generate_embedding(&self, text: &str) -> llmgate::Result<Vec<f32>> {
        if let Some(vector) = self.table.get(text) {
            return Ok(vector.clone());
        }
        let mut vector = vec![0.0; self.dimension];
        let index = text.bytes().map(|b| b as usize).sum::<usize>() % self.dimension;
        vector[index] = 1.0;
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// An active, freshly-probed OpenAI-compatible provider
pub fn active_provider(name: &str, base_url: &str) -> Provider {
    let mut provider = Provider::new(name, base_url, Compatibility::Openai);
    provider.last_health_check = Some(Utc::now());
    provider.latency_ms = 100.0;
    provider
}

/// A chat model with the given prices and quality
pub fn chat_model(name: &str, input_price: f64, output_price: f64, quality: f64) -> ModelInfo {
    ModelInfo {
        name: name.to_string(),
        modality: Modality::Chat,
        context_length: 16_384,
        max_output_tokens: 4096,
        input_price_per_1k: input_price,
        output_price_per_1k: output_price,
        quality_score: quality,
        speed_score: 0.8,
    }
}

/// An OpenAI-shaped chat completion body
pub fn openai_response_body(id: &str, model: &str, content: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "object": "chat.completion",
        "created": 1_700_000_000,
        "model": model,
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }],
        "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
    })
}
