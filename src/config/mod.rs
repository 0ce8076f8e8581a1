//! Gateway configuration
//!
//! One serde-deserializable struct tree with defaults for every knob,
//! loaded from YAML or assembled from the environment and validated before
//! the gateway starts.

pub mod models;
pub mod validation;

pub use models::*;
pub use validation::Validate;

use crate::utils::error::{GatewayError, Result};
use std::path::Path;
use tracing::{debug, info};

impl GatewayConfig {
    /// Load configuration from a YAML file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| GatewayError::Config(format!("failed to read config file: {}", e)))?;
        let config: GatewayConfig = serde_yaml::from_str(&content)
            .map_err(|e| GatewayError::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        debug!("configuration loaded");
        Ok(config)
    }

    /// Assemble configuration from environment variables over defaults
    pub fn from_env() -> Result<Self> {
        let mut config = GatewayConfig::default();

        if let Ok(host) = std::env::var("LLMGATE_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = std::env::var("LLMGATE_PORT") {
            config.server.port = port
                .parse()
                .map_err(|_| GatewayError::Config(format!("invalid LLMGATE_PORT: {}", port)))?;
        }
        if let Ok(token) = std::env::var("LLMGATE_GITHUB_TOKEN") {
            config.discovery.github_token = Some(token);
        }
        if let Ok(key) = std::env::var("LLMGATE_EMBEDDING_API_KEY") {
            config.cache.embedding.api_key = Some(key);
        }

        config.validate()?;
        Ok(config)
    }
}
