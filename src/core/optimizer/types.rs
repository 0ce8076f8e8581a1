//! Optimizer configuration and selection records

use crate::core::types::Modality;
use serde::{Deserialize, Serialize};

/// Objective weights over cost, quality, and latency
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimizerWeights {
    /// Weight on the cost score
    pub cost: f64,
    /// Weight on the model quality score
    pub quality: f64,
    /// Weight on the latency score
    pub latency: f64,
}

impl OptimizerWeights {
    /// Clamp negatives to zero and scale the weights to sum to 1
    pub fn normalized(self) -> Self {
        let cost = self.cost.max(0.0);
        let quality = self.quality.max(0.0);
        let latency = self.latency.max(0.0);
        let sum = cost + quality + latency;
        if sum == 0.0 {
            return Self::default();
        }
        Self { cost: cost / sum, quality: quality / sum, latency: latency / sum }
    }
}

impl Default for OptimizerWeights {
    fn default() -> Self {
        Self { cost: 0.4, quality: 0.4, latency: 0.2 }
    }
}

/// Optimizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Objective weights, normalized before use
    pub weights: OptimizerWeights,
    /// Candidates below this success rate are filtered
    pub min_success_rate: f64,
    /// Candidates above this EWMA latency are filtered
    pub max_latency_ms: f64,
    /// Models below this quality are filtered
    pub min_quality_score: f64,
    /// Seconds between training runs
    pub training_interval_secs: u64,
    /// Width of the training window in seconds
    pub training_window_secs: u64,
    /// Cap on rows loaded per training run
    pub max_training_samples: usize,
    /// Minimum rows for a training run to proceed
    pub min_training_samples: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            weights: OptimizerWeights::default(),
            min_success_rate: 0.8,
            max_latency_ms: 5000.0,
            min_quality_score: 0.6,
            training_interval_secs: 6 * 3600,
            training_window_secs: 24 * 3600,
            max_training_samples: 10_000,
            min_training_samples: 10,
        }
    }
}

/// Observed token history for one user
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UserHistory {
    /// Mean input tokens per request
    pub avg_input_tokens: f64,
    /// Mean output tokens per request
    pub avg_output_tokens: f64,
}

/// Inputs to one provider selection
#[derive(Debug, Clone)]
pub struct SelectionRequest {
    /// End-user tag
    pub user_id: Option<String>,
    /// Requested modality
    pub modality: Modality,
    /// Prompt length in characters
    pub prompt_length: usize,
    /// Prompt complexity in [0,1]
    pub complexity: f64,
    /// Known input tokens; predicted when absent
    pub input_tokens: Option<u32>,
    /// Known output tokens; predicted when absent
    pub output_tokens: Option<u32>,
    /// Hard cap on estimated cost in USD
    pub max_cost: Option<f64>,
    /// Hard cap on provider EWMA latency
    pub max_latency_ms: Option<f64>,
    /// Token history for the requesting user
    pub history: Option<UserHistory>,
}

impl SelectionRequest {
    /// Selection request for a chat prompt
    pub fn chat(prompt_length: usize, complexity: f64) -> Self {
        Self {
            user_id: None,
            modality: Modality::Chat,
            prompt_length,
            complexity,
            input_tokens: None,
            output_tokens: None,
            max_cost: None,
            max_latency_ms: None,
            history: None,
        }
    }
}

/// One scored (provider, model) candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    /// Provider name
    pub provider: String,
    /// Model name
    pub model: String,
    /// Estimated USD cost of the request
    pub estimated_cost: f64,
    /// Sigmoidal cost score, 1 at free
    pub cost_score: f64,
    /// Model quality score
    pub quality_score: f64,
    /// Latency score, 1 at or under 500 ms
    pub latency_score: f64,
    /// Observed success rate
    pub success_rate: f64,
    /// Weighted objective times success rate
    pub total_score: f64,
}

/// Outcome of one selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    /// Winning candidate
    pub best: RankedCandidate,
    /// Up to three runners-up, best first
    pub alternatives: Vec<RankedCandidate>,
    /// Cost difference between the costliest filtered candidate and the
    /// winner
    pub estimated_savings: f64,
    /// Input tokens the scores were computed with
    pub input_tokens: u32,
    /// Output tokens the scores were computed with
    pub output_tokens: u32,
    /// Prediction confidence in [0,1]
    pub confidence: f64,
}
