//! Provider, model, and rate-limit records

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How long a health probe stays fresh for availability checks, in minutes
pub const HEALTH_FRESHNESS_MINUTES: i64 = 10;

/// Authentication mode expected by a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// No credentials required
    None,
    /// Key sent as a dedicated header
    ApiKey,
    /// Key sent as `Authorization: Bearer`
    Bearer,
    /// OAuth2 access token
    Oauth2,
}

/// Commercial model of a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// No paid tier
    Free,
    /// Free tier with paid upgrades
    Freemium,
    /// Paid only
    Paid,
    /// Runs on local hardware
    Local,
}

/// Lifecycle status of a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    /// Serving traffic
    Active,
    /// Kept for history, not selectable
    Deprecated,
    /// Failing health checks
    Down,
    /// Temporarily withdrawn
    Maintenance,
}

/// Detected wire compatibility of an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compatibility {
    /// OpenAI chat-completions shape
    Openai,
    /// Anthropic messages shape
    Anthropic,
    /// Not yet fingerprinted
    Unknown,
}

impl Default for Compatibility {
    fn default() -> Self {
        Compatibility::Unknown
    }
}

/// Capability flags, immutable after registration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Server-sent event streaming
    #[serde(default)]
    pub streaming: bool,
    /// Tool calling
    #[serde(default)]
    pub tools: bool,
    /// JSON response mode
    #[serde(default)]
    pub json_mode: bool,
}

/// Modality a model serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    /// Chat completion
    Chat,
    /// Legacy text completion
    Completion,
    /// Embedding generation
    Embedding,
    /// Audio transcription or synthesis
    Audio,
    /// Video generation
    Video,
    /// Image generation
    Image,
    /// Realtime bidirectional sessions
    Realtime,
    /// Mixed input modalities
    Multimodal,
}

/// Per-provider retry policy applied by the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum retry attempts after the first try
    pub max_retries: u32,
    /// Linear backoff step in seconds
    pub backoff_step_secs: u64,
    /// Backoff ceiling in seconds
    pub backoff_cap_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 3, backoff_step_secs: 1, backoff_cap_secs: 10 }
    }
}

/// Rate limit kinds enforced at dispatch admission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitKind {
    /// Requests per minute
    Rpm,
    /// Requests per hour
    Rph,
    /// Requests per day
    Rpd,
    /// Tokens per minute
    Tpm,
    /// Tokens per day
    Tpd,
    /// Concurrent in-flight requests
    Concurrent,
}

impl RateLimitKind {
    /// Whether the limit counts tokens rather than requests
    pub fn counts_tokens(&self) -> bool {
        matches!(self, RateLimitKind::Tpm | RateLimitKind::Tpd)
    }
}

/// One rate limit row for a provider
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateLimit {
    /// Limit kind
    pub kind: RateLimitKind,
    /// Allowed volume per interval
    pub value: u64,
    /// Interval after which the budget resets, in seconds
    pub reset_interval_secs: u64,
}

/// Model owned by a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model name as served by the provider
    pub name: String,
    /// Modality
    pub modality: Modality,
    /// Context window in tokens
    pub context_length: u32,
    /// Maximum output tokens
    pub max_output_tokens: u32,
    /// USD per 1k input tokens
    pub input_price_per_1k: f64,
    /// USD per 1k output tokens
    pub output_price_per_1k: f64,
    /// Quality score in [0,1]
    pub quality_score: f64,
    /// Speed score in [0,1]
    pub speed_score: f64,
}

impl ModelInfo {
    /// True when both prices are zero
    pub fn is_free(&self) -> bool {
        self.input_price_per_1k == 0.0 && self.output_price_per_1k == 0.0
    }

    /// Estimated USD cost for a token split
    pub fn estimate_cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        (input_tokens as f64 / 1000.0) * self.input_price_per_1k
            + (output_tokens as f64 / 1000.0) * self.output_price_per_1k
    }
}

/// A registered upstream provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    /// Registry identity
    pub id: Uuid,
    /// Globally unique name
    pub name: String,
    /// Endpoint base URL, no trailing slash
    pub base_url: String,
    /// Authentication mode
    pub auth: AuthMode,
    /// Credential attached when probing or dispatching
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Commercial model
    pub kind: ProviderKind,
    /// Lifecycle status
    pub status: ProviderStatus,
    /// Tier, 1 premium through 3 experimental
    pub tier: u8,
    /// Wire compatibility
    pub compatibility: Compatibility,
    /// Capability flags
    pub capabilities: Capabilities,
    /// Health score in [0,1]
    pub health_score: f64,
    /// Exponentially-weighted average latency in milliseconds
    pub latency_ms: f64,
    /// Consecutive failed requests or probes
    pub consecutive_failures: u32,
    /// Successful request count
    pub success_count: u64,
    /// Failed request count
    pub error_count: u64,
    /// Last health probe time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_health_check: Option<DateTime<Utc>>,
    /// When the provider entered the registry
    pub discovered_at: DateTime<Utc>,
    /// Where the provider came from (`manual`, `github`, `scraper:<list>`)
    pub source: String,
    /// Models served
    #[serde(default)]
    pub models: Vec<ModelInfo>,
    /// Rate limits enforced at admission
    #[serde(default)]
    pub rate_limits: Vec<RateLimit>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Retry policy
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl Provider {
    /// Create a provider with sane defaults for manual registration
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, compatibility: Compatibility) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            base_url: base_url.into(),
            auth: AuthMode::None,
            api_key: None,
            kind: ProviderKind::Free,
            status: ProviderStatus::Active,
            tier: 3,
            compatibility,
            capabilities: Capabilities::default(),
            health_score: 1.0,
            latency_ms: 0.0,
            consecutive_failures: 0,
            success_count: 0,
            error_count: 0,
            last_health_check: None,
            discovered_at: Utc::now(),
            source: "manual".to_string(),
            models: Vec::new(),
            rate_limits: Vec::new(),
            timeout_secs: 30,
            retry: RetryPolicy::default(),
        }
    }

    /// True when the provider may serve traffic: active, freshly probed,
    /// and healthy
    pub fn is_available(&self) -> bool {
        self.is_available_at(Utc::now())
    }

    /// Availability evaluated at a fixed instant
    pub fn is_available_at(&self, now: DateTime<Utc>) -> bool {
        self.status == ProviderStatus::Active
            && self
                .last_health_check
                .map(|t| now.signed_duration_since(t) <= Duration::minutes(HEALTH_FRESHNESS_MINUTES))
                .unwrap_or(false)
            && self.health_score > 0.5
    }

    /// Observed success rate; 1.0 before any traffic
    pub fn success_rate(&self) -> f64 {
        let total = self.success_count + self.error_count;
        if total == 0 {
            1.0
        } else {
            self.success_count as f64 / total as f64
        }
    }

    /// Request timeout as a std duration
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }

    /// Best-quality model of the requested modality, if any
    pub fn best_model(&self, modality: Modality) -> Option<&ModelInfo> {
        self.models
            .iter()
            .filter(|m| m.modality == modality)
            .max_by(|a, b| a.quality_score.partial_cmp(&b.quality_score).unwrap_or(std::cmp::Ordering::Equal))
    }

    /// Mark the provider probed at `now` with `score` and flip status
    /// between `down` and `active` around the 0.3 boundary
    pub fn apply_probe(&mut self, score: f64, latency_ms: f64, now: DateTime<Utc>) {
        self.health_score = score.clamp(0.0, 1.0);
        self.last_health_check = Some(now);
        if latency_ms > 0.0 {
            self.blend_latency(latency_ms);
        }
        if self.health_score < 0.3 {
            if self.status == ProviderStatus::Active {
                self.status = ProviderStatus::Down;
            }
            self.consecutive_failures += 1;
        } else if self.status == ProviderStatus::Down {
            self.status = ProviderStatus::Active;
            self.consecutive_failures = 0;
        }
    }

    /// Fold an observed latency into the EWMA with weight 0.2
    pub fn blend_latency(&mut self, latency_ms: f64) {
        const ALPHA: f64 = 0.2;
        if self.latency_ms == 0.0 {
            self.latency_ms = latency_ms;
        } else {
            self.latency_ms = ALPHA * latency_ms + (1.0 - ALPHA) * self.latency_ms;
        }
    }

    /// Staleness of the last probe relative to `now`
    pub fn probe_age(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.last_health_check.map(|t| now.signed_duration_since(t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probed_provider() -> Provider {
        let mut provider = Provider::new("test", "https://api.test.io", Compatibility::Openai);
        provider.last_health_check = Some(Utc::now());
        provider
    }

    #[test]
    fn test_availability_requires_fresh_probe() {
        let mut provider = Provider::new("p", "https://p", Compatibility::Openai);
        assert!(!provider.is_available(), "no probe yet");

        provider.last_health_check = Some(Utc::now() - Duration::minutes(11));
        assert!(!provider.is_available(), "stale probe");

        provider.last_health_check = Some(Utc::now());
        assert!(provider.is_available());
    }

    #[test]
    fn test_availability_requires_health_above_half() {
        let mut provider = probed_provider();
        provider.health_score = 0.5;
        assert!(!provider.is_available());
        provider.health_score = 0.51;
        assert!(provider.is_available());
    }

    #[test]
    fn test_availability_requires_active_status() {
        let mut provider = probed_provider();
        provider.status = ProviderStatus::Maintenance;
        assert!(!provider.is_available());
    }

    #[test]
    fn test_probe_flips_status_around_threshold() {
        let mut provider = probed_provider();
        provider.apply_probe(0.2, 100.0, Utc::now());
        assert_eq!(provider.status, ProviderStatus::Down);

        provider.apply_probe(0.4, 100.0, Utc::now());
        assert_eq!(provider.status, ProviderStatus::Active);
        assert_eq!(provider.consecutive_failures, 0);
    }

    #[test]
    fn test_latency_ewma() {
        let mut provider = probed_provider();
        provider.blend_latency(100.0);
        assert_eq!(provider.latency_ms, 100.0);
        provider.blend_latency(200.0);
        assert!((provider.latency_ms - 120.0).abs() < 1e-9);
    }

    #[test]
    fn test_model_free_and_cost() {
        let model = ModelInfo {
            name: "m".to_string(),
            modality: Modality::Chat,
            context_length: 8192,
            max_output_tokens: 4096,
            input_price_per_1k: 0.001,
            output_price_per_1k: 0.002,
            quality_score: 0.8,
            speed_score: 0.9,
        };
        assert!(!model.is_free());
        let cost = model.estimate_cost(1000, 500);
        assert!((cost - 0.002).abs() < 1e-12);

        let free = ModelInfo { input_price_per_1k: 0.0, output_price_per_1k: 0.0, ..model };
        assert!(free.is_free());
        assert_eq!(free.estimate_cost(100_000, 100_000), 0.0);
    }

    #[test]
    fn test_best_model_picks_highest_quality() {
        let mut provider = probed_provider();
        let base = ModelInfo {
            name: "a".to_string(),
            modality: Modality::Chat,
            context_length: 8192,
            max_output_tokens: 4096,
            input_price_per_1k: 0.0,
            output_price_per_1k: 0.0,
            quality_score: 0.5,
            speed_score: 0.5,
        };
        provider.models = vec![
            base.clone(),
            ModelInfo { name: "b".to_string(), quality_score: 0.9, ..base.clone() },
            ModelInfo { name: "c".to_string(), modality: Modality::Embedding, quality_score: 1.0, ..base },
        ];
        assert_eq!(provider.best_model(Modality::Chat).unwrap().name, "b");
    }

    #[test]
    fn test_success_rate_defaults_to_one() {
        let provider = probed_provider();
        assert_eq!(provider.success_rate(), 1.0);
    }
}
