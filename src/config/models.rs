//! Configuration struct tree

use crate::core::cache::CacheConfig;
use crate::core::discovery::DiscoveryConfig;
use crate::core::health::HealthTrackerConfig;
use crate::core::optimizer::OptimizerConfig;
use crate::core::types::{
    AuthMode, Capabilities, Compatibility, ModelInfo, Provider, ProviderKind, RateLimit,
};
use serde::{Deserialize, Serialize};

/// Top-level gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP server binding
    pub server: ServerConfig,
    /// Optimizer weights and thresholds, training knobs
    pub optimizer: OptimizerConfig,
    /// Semantic cache knobs
    pub cache: CacheSection,
    /// Discovery engine knobs
    pub discovery: DiscoverySection,
    /// Health tracker knobs
    pub health: HealthSection,
    /// Outbound HTTP defaults
    pub http: HttpConfig,
    /// Providers registered at startup
    pub providers: Vec<ProviderSeed>,
}

/// HTTP server binding
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind host
    pub host: String,
    /// Bind port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 8080 }
    }
}

/// Cache section: core cache config plus the embedding endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    /// Core cache configuration
    #[serde(flatten)]
    pub core: CacheConfig,
    /// Embedding endpoint the cache embeds prompts with
    pub embedding: EmbeddingConfig,
}

/// Embedding endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Base URL of an OpenAI-compatible embeddings endpoint
    pub base_url: String,
    /// Embedding model name
    pub model: String,
    /// Credential for the embedding endpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            model: "text-embedding-3-small".to_string(),
            api_key: None,
        }
    }
}

/// Discovery section: engine config plus source credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoverySection {
    /// Core discovery configuration
    #[serde(flatten)]
    pub core: DiscoveryConfig,
    /// Token for the repository search API
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github_token: Option<String>,
    /// Awesome-list README URLs the scraper source reads
    pub list_urls: Vec<String>,
}

/// Health tracker section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthSection {
    /// Seconds between probe sweeps
    pub check_interval_secs: u64,
}

impl Default for HealthSection {
    fn default() -> Self {
        Self { check_interval_secs: 300 }
    }
}

impl HealthSection {
    /// As the core tracker config
    pub fn to_tracker_config(&self) -> HealthTrackerConfig {
        HealthTrackerConfig {
            check_interval: std::time::Duration::from_secs(self.check_interval_secs),
        }
    }
}

/// Outbound HTTP defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Default provider timeout in seconds
    pub timeout_secs: u64,
    /// Timeout for local providers in seconds
    pub local_timeout_secs: u64,
    /// Default retry count
    pub max_retries: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: 30, local_timeout_secs: 120, max_retries: 3 }
    }
}

/// A provider declared in configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSeed {
    /// Provider name
    pub name: String,
    /// Endpoint base URL
    pub base_url: String,
    /// Wire compatibility
    pub compatibility: Compatibility,
    /// Authentication mode
    #[serde(default = "ProviderSeed::default_auth")]
    pub auth: AuthMode,
    /// Credential; environment interpolation happens before parse
    #[serde(default)]
    pub api_key: Option<String>,
    /// Commercial model
    #[serde(default = "ProviderSeed::default_kind")]
    pub kind: ProviderKind,
    /// Tier, defaults to 1 for configured providers
    #[serde(default = "ProviderSeed::default_tier")]
    pub tier: u8,
    /// Capability flags
    #[serde(default)]
    pub capabilities: Capabilities,
    /// Models served
    #[serde(default)]
    pub models: Vec<ModelInfo>,
    /// Rate limits enforced at admission
    #[serde(default)]
    pub rate_limits: Vec<RateLimit>,
    /// Request timeout override in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl ProviderSeed {
    fn default_auth() -> AuthMode {
        AuthMode::None
    }

    fn default_kind() -> ProviderKind {
        ProviderKind::Paid
    }

    fn default_tier() -> u8 {
        1
    }

    /// Materialize the seed into a provider record
    pub fn to_provider(&self, http: &HttpConfig) -> Provider {
        let mut provider = Provider::new(&self.name, &self.base_url, self.compatibility);
        provider.auth = self.auth;
        provider.api_key = self.api_key.clone();
        provider.kind = self.kind;
        provider.tier = self.tier;
        provider.capabilities = self.capabilities;
        provider.models = self.models.clone();
        provider.rate_limits = self.rate_limits.clone();
        provider.source = "config".to_string();
        provider.timeout_secs = self.timeout_secs.unwrap_or(match self.kind {
            ProviderKind::Local => http.local_timeout_secs,
            _ => http.timeout_secs,
        });
        provider.retry.max_retries = http.max_retries;
        provider
    }
}
