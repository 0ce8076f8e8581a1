//! Configuration validation

use super::models::GatewayConfig;
use crate::utils::error::{GatewayError, Result};

/// Validation hook run after loading configuration
pub trait Validate {
    /// Check the configuration for contradictions
    fn validate(&self) -> Result<()>;
}

impl Validate for GatewayConfig {
    fn validate(&self) -> Result<()> {
        let weights = self.optimizer.weights;
        if weights.cost < 0.0 || weights.quality < 0.0 || weights.latency < 0.0 {
            return Err(GatewayError::Config("optimizer weights must be non-negative".to_string()));
        }
        if weights.cost + weights.quality + weights.latency == 0.0 {
            return Err(GatewayError::Config("optimizer weights must not all be zero".to_string()));
        }

        if !(0.0..=1.0).contains(&self.cache.core.similarity_threshold) {
            return Err(GatewayError::Config(format!(
                "cache similarity threshold {} must be in [0, 1]",
                self.cache.core.similarity_threshold
            )));
        }
        if self.cache.core.max_entries == 0 {
            return Err(GatewayError::Config("cache max_entries must be positive".to_string()));
        }
        if self.cache.core.embedding_dimension == 0 {
            return Err(GatewayError::Config("embedding dimension must be positive".to_string()));
        }

        if !(0.0..=1.0).contains(&self.discovery.core.min_health_score) {
            return Err(GatewayError::Config(
                "discovery min_health_score must be in [0, 1]".to_string(),
            ));
        }
        if self.discovery.core.max_concurrent == 0 {
            return Err(GatewayError::Config("discovery max_concurrent must be positive".to_string()));
        }

        if !(0.0..=1.0).contains(&self.optimizer.min_success_rate) {
            return Err(GatewayError::Config("min_success_rate must be in [0, 1]".to_string()));
        }
        if !(0.0..=1.0).contains(&self.optimizer.min_quality_score) {
            return Err(GatewayError::Config("min_quality_score must be in [0, 1]".to_string()));
        }

        let mut names = std::collections::HashSet::new();
        for seed in &self.providers {
            if !names.insert(seed.name.as_str()) {
                return Err(GatewayError::Config(format!(
                    "duplicate provider name in config: {}",
                    seed.name
                )));
            }
            for model in &seed.models {
                if model.input_price_per_1k < 0.0 || model.output_price_per_1k < 0.0 {
                    return Err(GatewayError::Config(format!(
                        "model {} has negative prices",
                        model.name
                    )));
                }
                if !(0.0..=1.0).contains(&model.quality_score)
                    || !(0.0..=1.0).contains(&model.speed_score)
                {
                    return Err(GatewayError::Config(format!(
                        "model {} scores must be in [0, 1]",
                        model.name
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Modality, ModelInfo};

    #[test]
    fn test_default_config_is_valid() {
        assert!(GatewayConfig::default().validate().is_ok());
    }

    #[test]
    fn test_negative_weight_rejected() {
        let mut config = GatewayConfig::default();
        config.optimizer.weights.cost = -0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_similarity_threshold_rejected() {
        let mut config = GatewayConfig::default();
        config.cache.core.similarity_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_provider_names_rejected() {
        let mut config = GatewayConfig::default();
        let seed: crate::config::ProviderSeed = serde_yaml::from_str(
            "name: a\nbase_url: https://a\ncompatibility: openai\n",
        )
        .unwrap();
        config.providers = vec![seed.clone(), seed];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_negative_model_price_rejected() {
        let mut config = GatewayConfig::default();
        let mut seed: crate::config::ProviderSeed = serde_yaml::from_str(
            "name: a\nbase_url: https://a\ncompatibility: openai\n",
        )
        .unwrap();
        seed.models = vec![ModelInfo {
            name: "m".to_string(),
            modality: Modality::Chat,
            context_length: 8192,
            max_output_tokens: 4096,
            input_price_per_1k: -0.1,
            output_price_per_1k: 0.0,
            quality_score: 0.8,
            speed_score: 0.8,
        }];
        config.providers = vec![seed];
        assert!(config.validate().is_err());
    }
}
