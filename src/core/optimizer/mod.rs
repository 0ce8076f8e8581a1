//! Cost/quality/latency optimizer
//!
//! Scores every (active provider, best model) pair under a weighted
//! objective and picks the winner plus up to three alternatives. A training
//! loop refits the token and cost predictors from recent request logs.

pub mod predictor;
pub mod recommend;
pub mod training;
pub mod types;

#[cfg(test)]
mod tests;

pub use predictor::{PredictorParams, TokenPredictor, TrainingSample};
pub use recommend::{recommendations_for_user, Recommendation, RecommendationKind, UserPatterns};
pub use types::{
    OptimizerConfig, OptimizerWeights, RankedCandidate, Selection, SelectionRequest, UserHistory,
};

use crate::core::registry::ProviderRegistry;
use crate::utils::error::{GatewayError, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Prompt complexity in [0,1] from lexical variety
///
/// The ratio of distinct words to total words; short prompts score low.
pub fn estimate_complexity(text: &str) -> f64 {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return 0.0;
    }
    let distinct: HashSet<&str> = words.iter().copied().collect();
    let variety = distinct.len() as f64 / words.len() as f64;
    let length_factor = (words.len() as f64 / 100.0).min(1.0);
    (variety * length_factor).clamp(0.0, 1.0)
}

/// Sigmoidal cost score: 1 at free, decaying on the cent scale
fn cost_score(cost: f64) -> f64 {
    1.0 / (1.0 + cost / 0.01)
}

/// Latency score: 1 at or under 500 ms, linear to 0 at the latency cap
fn latency_score(latency_ms: f64, max_latency_ms: f64) -> f64 {
    if latency_ms <= 500.0 {
        1.0
    } else if max_latency_ms <= 500.0 {
        0.0
    } else {
        (1.0 - (latency_ms - 500.0) / (max_latency_ms - 500.0)).clamp(0.0, 1.0)
    }
}

/// Per-request provider selection over registry candidates
pub struct Optimizer {
    config: OptimizerConfig,
    registry: Arc<ProviderRegistry>,
    predictor: Arc<TokenPredictor>,
}

impl Optimizer {
    /// Create an optimizer; weights are normalized up front
    pub fn new(
        mut config: OptimizerConfig,
        registry: Arc<ProviderRegistry>,
        predictor: Arc<TokenPredictor>,
    ) -> Self {
        config.weights = config.weights.normalized();
        Self { config, registry, predictor }
    }

    /// The shared token predictor
    pub fn predictor(&self) -> Arc<TokenPredictor> {
        self.predictor.clone()
    }

    /// The effective configuration
    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Pick the best (provider, model) pair for a request
    ///
    /// Missing token counts are filled by the predictor. Candidates are
    /// filtered on success rate, latency, quality, and the caller's cost
    /// cap, then ranked by the weighted objective times success rate. Ties
    /// break on the lower provider name, making selection deterministic.
    pub fn select(&self, request: &SelectionRequest) -> Result<Selection> {
        let input_tokens = request
            .input_tokens
            .unwrap_or_else(|| self.predictor.predict_input(request.prompt_length, request.complexity));
        let output_tokens = request
            .output_tokens
            .unwrap_or_else(|| self.predictor.predict_output(input_tokens, request.history.as_ref()));

        let max_latency_ms = request.max_latency_ms.unwrap_or(self.config.max_latency_ms);
        let weights = self.config.weights;

        let mut candidates: Vec<RankedCandidate> = Vec::new();
        for provider in self.registry.list_active() {
            let Some(model) = provider.best_model(request.modality) else {
                continue;
            };

            if provider.success_rate() < self.config.min_success_rate {
                continue;
            }
            if provider.latency_ms > max_latency_ms {
                continue;
            }
            if model.quality_score < self.config.min_quality_score {
                continue;
            }
            let estimated_cost = model.estimate_cost(input_tokens, output_tokens);
            if let Some(max_cost) = request.max_cost {
                if estimated_cost > max_cost {
                    continue;
                }
            }

            let cost_score = cost_score(estimated_cost);
            let latency_score = latency_score(provider.latency_ms, max_latency_ms);
            let success_rate = provider.success_rate();
            let total_score = (weights.cost * cost_score
                + weights.quality * model.quality_score
                + weights.latency * latency_score)
                * success_rate;

            candidates.push(RankedCandidate {
                provider: provider.name.clone(),
                model: model.name.clone(),
                estimated_cost,
                cost_score,
                quality_score: model.quality_score,
                latency_score,
                success_rate,
                total_score,
            });
        }

        if candidates.is_empty() {
            return Err(GatewayError::NoSuitableProvider(format!(
                "no candidate passed filtering for modality {:?}",
                request.modality
            )));
        }

        candidates.sort_by(|a, b| {
            b.total_score
                .partial_cmp(&a.total_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.provider.cmp(&b.provider))
        });

        let most_expensive =
            candidates.iter().map(|c| c.estimated_cost).fold(f64::MIN, f64::max);
        let best = candidates.remove(0);
        let estimated_savings = (most_expensive - best.estimated_cost).max(0.0);
        candidates.truncate(3);

        debug!(
            provider = %best.provider,
            model = %best.model,
            score = best.total_score,
            savings = estimated_savings,
            "selected provider"
        );

        Ok(Selection {
            best,
            alternatives: candidates,
            estimated_savings,
            input_tokens,
            output_tokens,
            confidence: self.predictor.confidence(),
        })
    }
}
