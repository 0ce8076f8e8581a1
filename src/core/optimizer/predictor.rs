//! Token and cost prediction
//!
//! A linear model maps prompt shape to input tokens, and input tokens to
//! output tokens. Coefficients come from ordinary least squares over recent
//! request logs; the fitted parameters are published atomically so readers
//! always see one consistent snapshot.

use super::types::UserHistory;
use crate::utils::error::{GatewayError, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Prompt lengths are clipped here before entering the regression so one
/// pathological row cannot destabilize the covariance terms
const MAX_FEATURE_LENGTH: f64 = 100_000.0;

/// One training row derived from a request log
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingSample {
    /// Prompt length in characters
    pub length: f64,
    /// Prompt complexity in [0,1]
    pub complexity: f64,
    /// Observed input tokens
    pub input_tokens: f64,
    /// Observed output tokens
    pub output_tokens: f64,
    /// Observed USD cost
    pub cost: f64,
}

/// Published predictor coefficients
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictorParams {
    /// Input-token intercept
    pub input_intercept: f64,
    /// Input tokens per prompt character
    pub length_coef: f64,
    /// Input-token contribution of complexity
    pub complexity_coef: f64,
    /// Output-token intercept
    pub output_intercept: f64,
    /// Output tokens per input token
    pub output_ratio: f64,
    /// Fitted USD per input token
    pub cost_per_input_token: f64,
    /// Fitted USD per output token
    pub cost_per_output_token: f64,
    /// Rows the fit was computed from
    pub samples: usize,
    /// When the fit was published
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trained_at: Option<DateTime<Utc>>,
    /// Root-mean-square error of the input-token fit
    pub input_rmse: f64,
}

impl Default for PredictorParams {
    fn default() -> Self {
        // Cold-start coefficients: roughly four characters per token
        Self {
            input_intercept: 0.0,
            length_coef: 0.25,
            complexity_coef: 50.0,
            output_intercept: 20.0,
            output_ratio: 0.5,
            cost_per_input_token: 0.0,
            cost_per_output_token: 0.0,
            samples: 0,
            trained_at: None,
            input_rmse: 0.0,
        }
    }
}

/// Thread-safe predictor over the published parameters
#[derive(Default)]
pub struct TokenPredictor {
    params: RwLock<PredictorParams>,
}

impl TokenPredictor {
    /// Create a predictor with cold-start coefficients
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the published parameters
    pub fn snapshot(&self) -> PredictorParams {
        *self.params.read()
    }

    /// Publish a fitted parameter set; readers see the old set or the new
    /// one, never a mix
    pub fn publish(&self, params: PredictorParams) {
        *self.params.write() = params;
    }

    /// Predicted input tokens for a prompt shape, at least 1
    pub fn predict_input(&self, prompt_length: usize, complexity: f64) -> u32 {
        let p = self.params.read();
        let length = (prompt_length as f64).min(MAX_FEATURE_LENGTH);
        let predicted = p.input_intercept + p.length_coef * length + p.complexity_coef * complexity;
        predicted.max(1.0).round() as u32
    }

    /// Predicted output tokens, preferring the user's own history
    pub fn predict_output(&self, input_tokens: u32, history: Option<&UserHistory>) -> u32 {
        if let Some(history) = history {
            if history.avg_input_tokens > 0.0 {
                let ratio = history.avg_output_tokens / history.avg_input_tokens;
                return (input_tokens as f64 * ratio).max(1.0).round() as u32;
            }
        }
        let p = self.params.read();
        (p.output_intercept + p.output_ratio * input_tokens as f64).max(1.0).round() as u32
    }

    /// Confidence of the current parameters
    ///
    /// Sample factor: 0.8 at 100 rows, 0.7 at 50, 0.5 below. Recency factor:
    /// 1.0 fresh, 0.8 past 24 h, 0.6 past 72 h.
    pub fn confidence(&self) -> f64 {
        let p = self.params.read();
        let sample_factor = if p.samples >= 100 {
            0.8
        } else if p.samples >= 50 {
            0.7
        } else {
            0.5
        };
        let recency_factor = match p.trained_at {
            None => 0.6,
            Some(trained_at) => {
                let age = Utc::now().signed_duration_since(trained_at);
                if age <= chrono::Duration::hours(24) {
                    1.0
                } else if age <= chrono::Duration::hours(72) {
                    0.8
                } else {
                    0.6
                }
            }
        };
        sample_factor * recency_factor
    }

    /// Fit all models from samples by closed-form least squares
    ///
    /// Two-feature OLS for input tokens, simple regression for output
    /// tokens, and a 25/75 split of observed cost across input and output
    /// tokens.
    pub fn fit(samples: &[TrainingSample]) -> Result<PredictorParams> {
        if samples.is_empty() {
            return Err(GatewayError::InsufficientData("no training samples".to_string()));
        }
        let n = samples.len() as f64;

        let lengths: Vec<f64> = samples.iter().map(|s| s.length.min(MAX_FEATURE_LENGTH)).collect();
        let mean_length = lengths.iter().sum::<f64>() / n;
        let mean_complexity = samples.iter().map(|s| s.complexity).sum::<f64>() / n;
        let mean_input = samples.iter().map(|s| s.input_tokens).sum::<f64>() / n;
        let mean_output = samples.iter().map(|s| s.output_tokens).sum::<f64>() / n;

        let mut s11 = 0.0;
        let mut s22 = 0.0;
        let mut s12 = 0.0;
        let mut s1y = 0.0;
        let mut s2y = 0.0;
        for (sample, length) in samples.iter().zip(lengths.iter()) {
            let dl = length - mean_length;
            let dc = sample.complexity - mean_complexity;
            let dy = sample.input_tokens - mean_input;
            s11 += dl * dl;
            s22 += dc * dc;
            s12 += dl * dc;
            s1y += dl * dy;
            s2y += dc * dy;
        }

        let det = s11 * s22 - s12 * s12;
        let (length_coef, complexity_coef) = if det.abs() > f64::EPSILON {
            ((s1y * s22 - s2y * s12) / det, (s2y * s11 - s1y * s12) / det)
        } else if s11 > f64::EPSILON {
            // Complexity is constant across the window; regress on length
            (s1y / s11, 0.0)
        } else {
            (0.0, 0.0)
        };
        let input_intercept = mean_input - length_coef * mean_length - complexity_coef * mean_complexity;

        // Output regressed on input
        let mut sxx = 0.0;
        let mut sxy = 0.0;
        for sample in samples {
            let dx = sample.input_tokens - mean_input;
            sxx += dx * dx;
            sxy += dx * (sample.output_tokens - mean_output);
        }
        let output_ratio = if sxx > f64::EPSILON { sxy / sxx } else { 0.0 };
        let output_intercept = mean_output - output_ratio * mean_input;

        // Cost: per-token average, split 25/75 across input and output
        let total_cost: f64 = samples.iter().map(|s| s.cost).sum();
        let total_input: f64 = samples.iter().map(|s| s.input_tokens).sum();
        let total_output: f64 = samples.iter().map(|s| s.output_tokens).sum();
        let cost_per_input_token =
            if total_input > 0.0 { 0.25 * total_cost / total_input } else { 0.0 };
        let cost_per_output_token =
            if total_output > 0.0 { 0.75 * total_cost / total_output } else { 0.0 };

        let mut squared_error = 0.0;
        for (sample, length) in samples.iter().zip(lengths.iter()) {
            let predicted =
                input_intercept + length_coef * length + complexity_coef * sample.complexity;
            squared_error += (predicted - sample.input_tokens).powi(2);
        }

        Ok(PredictorParams {
            input_intercept,
            length_coef,
            complexity_coef,
            output_intercept,
            output_ratio,
            cost_per_input_token,
            cost_per_output_token,
            samples: samples.len(),
            trained_at: Some(Utc::now()),
            input_rmse: (squared_error / n).sqrt(),
        })
    }
}
