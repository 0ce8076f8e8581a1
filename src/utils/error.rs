//! Error handling for the gateway
//!
//! This module defines all error types surfaced by the gateway core.

use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

/// Result type alias for the gateway
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Main error type for the gateway
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Malformed canonical request or a wire translation constraint violated
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Upstream rejected the credentials (401)
    #[error("Invalid API key: {0}")]
    InvalidApiKey(String),

    /// Upstream or local rate limit exceeded (429)
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Requested model does not exist upstream (404)
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Upstream is unavailable (503)
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Load-balanced dispatch exhausted every active provider
    #[error("No providers available: {0}")]
    NoProvidersAvailable(String),

    /// Optimizer filtering eliminated every candidate
    #[error("No suitable provider: {0}")]
    NoSuitableProvider(String),

    /// Training requested with fewer rows than the configured minimum
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Analytical query returned empty over the window
    #[error("No data: {0}")]
    NoData(String),

    /// Context deadline exceeded
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Semantic cache errors
    #[error("Cache error: {0}")]
    Cache(String),

    /// Discovery pipeline errors
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// Storage collaborator errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// HTTP client errors
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal errors that should not reach callers under normal operation
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Stable wire code for the error, used in JSON error bodies
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::InvalidRequest(_) => "invalid_request",
            GatewayError::InvalidApiKey(_) => "invalid_api_key",
            GatewayError::RateLimitExceeded(_) => "rate_limit_exceeded",
            GatewayError::ModelNotFound(_) => "model_not_found",
            GatewayError::ServiceUnavailable(_) => "service_unavailable",
            GatewayError::NoProvidersAvailable(_) => "no_providers_available",
            GatewayError::NoSuitableProvider(_) => "no_suitable_provider",
            GatewayError::InsufficientData(_) => "insufficient_data",
            GatewayError::NoData(_) => "no_data",
            GatewayError::Timeout(_) => "timeout",
            GatewayError::Config(_) => "configuration_error",
            GatewayError::Cache(_) => "cache_error",
            GatewayError::Discovery(_) => "discovery_error",
            GatewayError::Storage(_) => "storage_error",
            GatewayError::HttpClient(_) => "upstream_error",
            GatewayError::Serialization(_) => "serialization_error",
            GatewayError::Yaml(_) => "configuration_error",
            GatewayError::Io(_) => "io_error",
            GatewayError::Internal(_) => "internal_error",
        }
    }

    /// Map an upstream HTTP status to the matching error kind
    pub fn from_upstream_status(status: u16, body: String) -> Self {
        match status {
            401 => GatewayError::InvalidApiKey(body),
            404 => GatewayError::ModelNotFound(body),
            429 => GatewayError::RateLimitExceeded(body),
            408 => GatewayError::Timeout(body),
            503 => GatewayError::ServiceUnavailable(body),
            s if s >= 500 => GatewayError::ServiceUnavailable(format!("upstream {}: {}", s, body)),
            s => GatewayError::InvalidRequest(format!("upstream {}: {}", s, body)),
        }
    }

    /// Whether the dispatcher may retry the request after this error
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::RateLimitExceeded(_)
            | GatewayError::ServiceUnavailable(_)
            | GatewayError::Timeout(_) => true,
            GatewayError::HttpClient(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }

    fn http_status(&self) -> actix_web::http::StatusCode {
        use actix_web::http::StatusCode;
        match self {
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::InvalidApiKey(_) => StatusCode::UNAUTHORIZED,
            GatewayError::RateLimitExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::ModelNotFound(_) | GatewayError::NoData(_) => StatusCode::NOT_FOUND,
            GatewayError::ServiceUnavailable(_)
            | GatewayError::NoProvidersAvailable(_)
            | GatewayError::NoSuitableProvider(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::InsufficientData(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ResponseError for GatewayError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        self.http_status()
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.http_status()).json(serde_json::json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        }))
    }
}
