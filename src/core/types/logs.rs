//! Request logs and aggregated provider statistics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Immutable record of one dispatched request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestLog {
    /// Log identity
    pub id: Uuid,
    /// Provider the request was dispatched to
    pub provider: String,
    /// Model requested
    pub model: String,
    /// End-user tag, if supplied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// HTTP method of the upstream call
    pub method: String,
    /// Upstream endpoint path
    pub endpoint: String,
    /// Upstream status code, 0 on transport failure
    pub status_code: u16,
    /// Wall-clock latency in milliseconds
    pub latency_ms: u64,
    /// Prompt tokens
    pub input_tokens: u32,
    /// Completion tokens
    pub output_tokens: u32,
    /// Prompt length in characters; the body itself is never persisted
    pub prompt_length: u32,
    /// Prompt complexity score in [0,1]
    pub prompt_complexity: f64,
    /// Whether the request succeeded
    pub success: bool,
    /// Error message on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Estimated USD cost
    pub estimated_cost: f64,
    /// When the request completed
    pub timestamp: DateTime<Utc>,
}

impl RequestLog {
    /// Start a log for a chat dispatch; outcome fields are filled by the
    /// dispatcher before append
    pub fn chat(provider: impl Into<String>, model: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            provider: provider.into(),
            model: model.into(),
            user_id: None,
            method: "POST".to_string(),
            endpoint: endpoint.into(),
            status_code: 0,
            latency_ms: 0,
            input_tokens: 0,
            output_tokens: 0,
            prompt_length: 0,
            prompt_complexity: 0.0,
            success: false,
            error: None,
            estimated_cost: 0.0,
            timestamp: Utc::now(),
        }
    }
}

/// Aggregated per-provider window snapshot, produced on demand
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderStats {
    /// Provider name
    pub provider: String,
    /// Fraction of successful requests
    pub success_rate: f64,
    /// Mean latency over the window in milliseconds
    pub avg_latency_ms: f64,
    /// Requests in the window
    pub total_requests: u64,
    /// Tokens in the window
    pub total_tokens: u64,
    /// Cost avoided versus the costliest alternative, accumulated by the
    /// optimizer
    pub cost_saved: f64,
    /// Failed requests
    pub error_count: u64,
    /// Requests that timed out
    pub timeout_count: u64,
    /// Requests rejected for exhausted quota
    pub quota_exhausted_count: u64,
    /// Window start
    pub window_start: DateTime<Utc>,
    /// Window end
    pub window_end: DateTime<Utc>,
}

impl ProviderStats {
    /// Aggregate logs for one provider over `[window_start, window_end]`
    ///
    /// Logs outside the window or for other providers are skipped.
    pub fn from_logs(
        provider: &str,
        logs: &[RequestLog],
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Self {
        let mut stats = Self {
            provider: provider.to_string(),
            window_start,
            window_end,
            ..Default::default()
        };

        let mut latency_sum: u128 = 0;
        let mut successes: u64 = 0;
        for log in logs {
            if log.provider != provider || log.timestamp < window_start || log.timestamp > window_end {
                continue;
            }
            stats.total_requests += 1;
            stats.total_tokens += (log.input_tokens + log.output_tokens) as u64;
            latency_sum += log.latency_ms as u128;
            if log.success {
                successes += 1;
            } else {
                stats.error_count += 1;
                match log.status_code {
                    408 => stats.timeout_count += 1,
                    429 => stats.quota_exhausted_count += 1,
                    _ => {}
                }
            }
        }

        if stats.total_requests > 0 {
            stats.success_rate = successes as f64 / stats.total_requests as f64;
            stats.avg_latency_ms = latency_sum as f64 / stats.total_requests as f64;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn log(provider: &str, success: bool, status: u16, latency: u64) -> RequestLog {
        let mut entry = RequestLog::chat(provider, "m", "/v1/chat/completions");
        entry.success = success;
        entry.status_code = status;
        entry.latency_ms = latency;
        entry.input_tokens = 100;
        entry.output_tokens = 50;
        entry
    }

    #[test]
    fn test_stats_aggregation() {
        let logs = vec![
            log("a", true, 200, 100),
            log("a", false, 429, 300),
            log("a", false, 408, 500),
            log("b", true, 200, 50),
        ];
        let now = Utc::now();
        let stats = ProviderStats::from_logs("a", &logs, now - Duration::hours(1), now + Duration::hours(1));

        assert_eq!(stats.total_requests, 3);
        assert_eq!(stats.error_count, 2);
        assert_eq!(stats.timeout_count, 1);
        assert_eq!(stats.quota_exhausted_count, 1);
        assert_eq!(stats.total_tokens, 450);
        assert!((stats.success_rate - 1.0 / 3.0).abs() < 1e-9);
        assert!((stats.avg_latency_ms - 300.0).abs() < 1e-9);
    }

    #[test]
    fn test_stats_window_filter() {
        let mut old = log("a", true, 200, 100);
        old.timestamp = Utc::now() - Duration::days(2);
        let logs = vec![old, log("a", true, 200, 100)];
        let now = Utc::now();
        let stats = ProviderStats::from_logs("a", &logs, now - Duration::hours(1), now + Duration::hours(1));
        assert_eq!(stats.total_requests, 1);
    }
}
