//! Usage-pattern analysis and savings recommendations

use crate::core::types::RequestLog;
use crate::storage::{LogQuery, Store};
use crate::utils::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use chrono::{Timelike, Utc};

/// Days of history analyzed per user
const ANALYSIS_WINDOW_DAYS: i64 = 7;

/// Aggregated usage patterns for one user over an analysis window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPatterns {
    /// Requests in the window
    pub request_count: u64,
    /// Total USD spent
    pub total_cost: f64,
    /// Mean USD per request
    pub avg_cost_per_request: f64,
    /// Fraction of requests repeating an earlier prompt shape
    pub repetitive_ratio: f64,
    /// Mean input tokens per request
    pub avg_input_tokens: f64,
    /// Hours of day with more than twice the mean traffic
    pub peak_hours: Vec<u32>,
}

/// What a recommendation proposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    /// Route to cheaper models
    CheaperModels,
    /// Enable or widen semantic caching
    Caching,
    /// Compress or trim prompts
    PromptCompression,
    /// Batch off-peak traffic
    Batching,
}

/// One savings recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Proposed action
    pub kind: RecommendationKind,
    /// Human-readable rationale
    pub description: String,
    /// Estimated USD savings over the analysis window
    pub estimated_savings: f64,
}

/// Analyze a user's logs into usage patterns
///
/// Returns `no_data` on an empty window. Repetition is detected on the
/// stored prompt shape (model and length); bodies are never persisted.
pub fn analyze_patterns(logs: &[RequestLog]) -> Result<UserPatterns> {
    if logs.is_empty() {
        return Err(GatewayError::NoData("no request logs in the analysis window".to_string()));
    }

    let request_count = logs.len() as u64;
    let total_cost: f64 = logs.iter().map(|l| l.estimated_cost).sum();
    let avg_input_tokens =
        logs.iter().map(|l| l.input_tokens as f64).sum::<f64>() / request_count as f64;

    let mut shapes: HashMap<(String, u32), u64> = HashMap::new();
    for log in logs {
        *shapes.entry((log.model.clone(), log.prompt_length)).or_insert(0) += 1;
    }
    let repeats: u64 = shapes.values().map(|count| count - 1).sum();
    let repetitive_ratio = repeats as f64 / request_count as f64;

    let mut per_hour = [0u64; 24];
    for log in logs {
        per_hour[log.timestamp.hour() as usize] += 1;
    }
    let mean_per_hour = request_count as f64 / 24.0;
    let peak_hours: Vec<u32> = (0..24u32)
        .filter(|&hour| per_hour[hour as usize] as f64 > 2.0 * mean_per_hour)
        .collect();

    Ok(UserPatterns {
        request_count,
        total_cost,
        avg_cost_per_request: total_cost / request_count as f64,
        repetitive_ratio,
        avg_input_tokens,
        peak_hours,
    })
}

/// Derive recommendations from analyzed patterns
pub fn recommend(patterns: &UserPatterns) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();

    if patterns.avg_cost_per_request > 0.005 {
        recommendations.push(Recommendation {
            kind: RecommendationKind::CheaperModels,
            description: format!(
                "average cost per request is ${:.4}; cheaper models cover most traffic",
                patterns.avg_cost_per_request
            ),
            estimated_savings: patterns.total_cost * 0.30,
        });
    }

    if patterns.repetitive_ratio > 0.20 {
        recommendations.push(Recommendation {
            kind: RecommendationKind::Caching,
            description: format!(
                "{:.0}% of requests repeat an earlier prompt; semantic caching would absorb them",
                patterns.repetitive_ratio * 100.0
            ),
            estimated_savings: patterns.total_cost * patterns.repetitive_ratio,
        });
    }

    if patterns.avg_input_tokens > 2000.0 {
        recommendations.push(Recommendation {
            kind: RecommendationKind::PromptCompression,
            description: format!(
                "average prompt is {:.0} tokens; compression would trim steady overhead",
                patterns.avg_input_tokens
            ),
            estimated_savings: patterns.total_cost * 0.20,
        });
    }

    if !patterns.peak_hours.is_empty() {
        recommendations.push(Recommendation {
            kind: RecommendationKind::Batching,
            description: format!(
                "traffic concentrates in {} peak hour(s); batching would flatten it",
                patterns.peak_hours.len()
            ),
            estimated_savings: patterns.total_cost * 0.15,
        });
    }

    recommendations
}

/// Analyze the last week of a user's traffic and derive recommendations
pub async fn recommendations_for_user(
    store: &dyn Store,
    user_id: &str,
) -> Result<Vec<Recommendation>> {
    let logs = store
        .query_logs(LogQuery {
            since: Some(Utc::now() - chrono::Duration::days(ANALYSIS_WINDOW_DAYS)),
            user_id: Some(user_id.to_string()),
            ..Default::default()
        })
        .await?;
    let patterns = analyze_patterns(&logs)?;
    Ok(recommend(&patterns))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn log_at(hour: u32, cost: f64, input_tokens: u32, prompt_length: u32) -> RequestLog {
        let mut log = RequestLog::chat("p", "m", "/v1/chat/completions");
        log.success = true;
        log.estimated_cost = cost;
        log.input_tokens = input_tokens;
        log.prompt_length = prompt_length;
        log.timestamp = Utc.with_ymd_and_hms(2026, 7, 1, hour, 0, 0).unwrap();
        log
    }

    #[test]
    fn test_empty_window_is_no_data() {
        assert!(matches!(analyze_patterns(&[]), Err(GatewayError::NoData(_))));
    }

    #[test]
    fn test_expensive_traffic_recommends_cheaper_models() {
        let logs: Vec<RequestLog> = (0..10).map(|i| log_at(i % 24, 0.01, 100, 100 + i)).collect();
        let patterns = analyze_patterns(&logs).unwrap();
        let recommendations = recommend(&patterns);
        let cheaper = recommendations
            .iter()
            .find(|r| r.kind == RecommendationKind::CheaperModels)
            .unwrap();
        assert!((cheaper.estimated_savings - 0.1 * 0.30).abs() < 1e-9);
    }

    #[test]
    fn test_repetitive_traffic_recommends_caching() {
        // Same model and prompt length over and over
        let logs: Vec<RequestLog> = (0..10).map(|_| log_at(3, 0.001, 100, 500)).collect();
        let patterns = analyze_patterns(&logs).unwrap();
        assert!((patterns.repetitive_ratio - 0.9).abs() < 1e-9);
        let recommendations = recommend(&patterns);
        let caching =
            recommendations.iter().find(|r| r.kind == RecommendationKind::Caching).unwrap();
        assert!((caching.estimated_savings - patterns.total_cost * 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_long_prompts_recommend_compression() {
        let logs: Vec<RequestLog> = (0..5).map(|i| log_at(i, 0.001, 3000, 12_000 + i)).collect();
        let patterns = analyze_patterns(&logs).unwrap();
        let recommendations = recommend(&patterns);
        assert!(recommendations.iter().any(|r| r.kind == RecommendationKind::PromptCompression));
    }

    #[test]
    fn test_peaked_traffic_recommends_batching() {
        let mut logs = Vec::new();
        for i in 0..20 {
            logs.push(log_at(9, 0.001, 100, 100 + i));
        }
        logs.push(log_at(3, 0.001, 100, 50));
        let patterns = analyze_patterns(&logs).unwrap();
        assert!(patterns.peak_hours.contains(&9));
        assert!(recommend(&patterns).iter().any(|r| r.kind == RecommendationKind::Batching));
    }

    #[test]
    fn test_cheap_flat_traffic_yields_nothing() {
        let logs: Vec<RequestLog> = (0..24).map(|i| log_at(i, 0.0001, 100, 100 + i * 7)).collect();
        let patterns = analyze_patterns(&logs).unwrap();
        assert!(recommend(&patterns).is_empty());
    }
}
