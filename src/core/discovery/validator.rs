//! Endpoint validation probes
//!
//! Shared by the discovery pipeline (candidate ingestion) and the health
//! tracker (periodic re-probing of registered providers).

use super::types::ValidationResult;
use crate::core::health::score::health_score;
use crate::core::types::{AuthMode, Capabilities, Compatibility};
use crate::utils::error::Result;
use reqwest::StatusCode;
use serde_json::json;
use std::time::{Duration, Instant};
use tracing::debug;

/// Statuses that prove an endpoint exists even when it rejects us
fn endpoint_exists(status: StatusCode) -> bool {
    status.is_success()
        || matches!(
            status,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND
        )
}

/// Probes endpoints for reachability, wire shape, and served models
pub struct EndpointValidator {
    http: reqwest::Client,
}

impl EndpointValidator {
    /// Build a validator whose probes time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("llmgate-discovery/0.1")
            .build()?;
        Ok(Self { http })
    }

    /// Validate one endpoint
    ///
    /// Never returns an error: probe failures produce an unreachable result
    /// so the pipeline can downgrade the candidate and move on.
    pub async fn validate(
        &self,
        base_url: &str,
        auth: AuthMode,
        api_key: Option<&str>,
    ) -> ValidationResult {
        let base_url = base_url.trim_end_matches('/');
        let mut result = ValidationResult::default();

        let start = Instant::now();
        let connectivity = self.get_with_auth(base_url, auth, api_key).send().await;
        result.latency_ms = start.elapsed().as_millis() as u64;

        match connectivity {
            Ok(response) if endpoint_exists(response.status()) => {
                result.reachable = true;
            }
            Ok(response) => {
                result.error = Some(format!("unexpected status {}", response.status()));
            }
            Err(e) => {
                result.error = Some(e.to_string());
            }
        }

        if result.reachable {
            self.detect_compatibility(base_url, auth, api_key, &mut result).await;

            // Feature support follows the detected wire shape; both formats
            // we speak carry streaming, JSON mode, and tools
            if result.compatibility != Compatibility::Unknown {
                result.capabilities =
                    Capabilities { streaming: true, tools: true, json_mode: true };
            }
        }

        result.health_score = health_score(&result);
        debug!(
            base_url,
            reachable = result.reachable,
            compatibility = ?result.compatibility,
            score = result.health_score,
            "validated endpoint"
        );
        result
    }

    /// Compatibility detection: URL heuristic first, then fingerprint probes
    async fn detect_compatibility(
        &self,
        base_url: &str,
        auth: AuthMode,
        api_key: Option<&str>,
        result: &mut ValidationResult,
    ) {
        if base_url.contains("anthropic") {
            result.compatibility = Compatibility::Anthropic;
            return;
        }

        // OpenAI fingerprint: a model list with a `data` array
        let models_url = format!("{}/v1/models", base_url);
        if let Ok(response) = self.get_with_auth(&models_url, auth, api_key).send().await {
            if response.status().is_success() {
                if let Ok(body) = response.json::<serde_json::Value>().await {
                    if let Some(data) = body["data"].as_array() {
                        result.compatibility = Compatibility::Openai;
                        result.models = data
                            .iter()
                            .filter_map(|m| m["id"].as_str().map(String::from))
                            .collect();
                        return;
                    }
                }
            }
        }

        // Anthropic fingerprint: /v1/messages recognizes the request shape
        // even when it rejects the credentials
        let messages_url = format!("{}/v1/messages", base_url);
        let probe = json!({
            "model": "claude-3-5-haiku-20241022",
            "max_tokens": 1,
            "messages": [{ "role": "user", "content": "ping" }],
        });
        let mut request = self
            .http
            .post(&messages_url)
            .header("anthropic-version", crate::core::adapters::anthropic::ANTHROPIC_VERSION)
            .json(&probe);
        if let Some(key) = api_key {
            request = request.header("x-api-key", key);
        }
        if let Ok(response) = request.send().await {
            if matches!(
                response.status(),
                StatusCode::OK
                    | StatusCode::BAD_REQUEST
                    | StatusCode::UNAUTHORIZED
                    | StatusCode::FORBIDDEN
            ) {
                result.compatibility = Compatibility::Anthropic;
            }
        }
    }

    fn get_with_auth(
        &self,
        url: &str,
        auth: AuthMode,
        api_key: Option<&str>,
    ) -> reqwest::RequestBuilder {
        let mut request = self.http.get(url);
        if let Some(key) = api_key {
            request = match auth {
                AuthMode::None => request,
                AuthMode::ApiKey => request.header("x-api-key", key),
                AuthMode::Bearer | AuthMode::Oauth2 => request.bearer_auth(key),
            };
        }
        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_exists_statuses() {
        assert!(endpoint_exists(StatusCode::OK));
        assert!(endpoint_exists(StatusCode::UNAUTHORIZED));
        assert!(endpoint_exists(StatusCode::FORBIDDEN));
        assert!(endpoint_exists(StatusCode::NOT_FOUND));
        assert!(!endpoint_exists(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!endpoint_exists(StatusCode::BAD_GATEWAY));
    }
}
