//! Predictor training loop
//!
//! On a fixed interval, recent successful request logs are loaded, the
//! token and cost models are refit, and the parameters are published
//! atomically to the shared predictor.

use super::predictor::{TokenPredictor, TrainingSample};
use super::types::OptimizerConfig;
use crate::storage::{LogQuery, Store};
use crate::utils::error::{GatewayError, Result};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Periodic trainer for the shared predictor
pub struct Trainer {
    config: OptimizerConfig,
    predictor: Arc<TokenPredictor>,
    store: Arc<dyn Store>,
}

impl Trainer {
    /// Create a trainer
    pub fn new(config: OptimizerConfig, predictor: Arc<TokenPredictor>, store: Arc<dyn Store>) -> Self {
        Self { config, predictor, store }
    }

    /// One training pass: load, fit, publish
    ///
    /// Fails with `insufficient_data` when the window holds fewer rows than
    /// the configured minimum.
    pub async fn train_once(&self) -> Result<usize> {
        let since = Utc::now() - chrono::Duration::seconds(self.config.training_window_secs as i64);
        let logs = self
            .store
            .query_logs(LogQuery {
                since: Some(since),
                success_only: true,
                limit: Some(self.config.max_training_samples),
                ..Default::default()
            })
            .await?;

        let samples: Vec<TrainingSample> = logs
            .iter()
            .filter(|log| log.input_tokens > 0)
            .map(|log| TrainingSample {
                length: log.prompt_length as f64,
                complexity: log.prompt_complexity,
                input_tokens: log.input_tokens as f64,
                output_tokens: log.output_tokens as f64,
                cost: log.estimated_cost,
            })
            .collect();

        if samples.len() < self.config.min_training_samples {
            return Err(GatewayError::InsufficientData(format!(
                "{} samples in window, {} required",
                samples.len(),
                self.config.min_training_samples
            )));
        }

        let params = TokenPredictor::fit(&samples)?;
        info!(
            samples = params.samples,
            rmse = params.input_rmse,
            length_coef = params.length_coef,
            "trained token predictor"
        );
        self.predictor.publish(params);
        Ok(samples.len())
    }

    /// Drive the training loop until cancelled
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker =
            tokio::time::interval(Duration::from_secs(self.config.training_interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(
            interval_secs = self.config.training_interval_secs,
            "training loop started"
        );
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    match self.train_once().await {
                        Ok(_) => {}
                        Err(GatewayError::InsufficientData(reason)) => {
                            warn!(%reason, "skipping training run");
                        }
                        Err(error) => warn!(%error, "training run failed"),
                    }
                }
            }
        }
        info!("training loop stopped");
    }
}
