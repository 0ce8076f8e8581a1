//! Selection scoring and filtering tests

use super::*;
use crate::core::types::{Compatibility, Modality, ModelInfo, Provider};
use chrono::Utc;

fn chat_model(name: &str, input_price: f64, output_price: f64, quality: f64) -> ModelInfo {
    ModelInfo {
        name: name.to_string(),
        modality: Modality::Chat,
        context_length: 16_384,
        max_output_tokens: 4096,
        input_price_per_1k: input_price,
        output_price_per_1k: output_price,
        quality_score: quality,
        speed_score: 0.8,
    }
}

fn active_provider(name: &str, model: ModelInfo) -> Provider {
    let mut provider = Provider::new(name, format!("https://{}.example.com", name), Compatibility::Openai);
    provider.last_health_check = Some(Utc::now());
    provider.latency_ms = 200.0;
    provider.models = vec![model];
    provider
}

fn optimizer_over(providers: Vec<Provider>) -> Optimizer {
    let registry = Arc::new(ProviderRegistry::new());
    for provider in providers {
        registry.register(provider).unwrap();
    }
    Optimizer::new(OptimizerConfig::default(), registry, Arc::new(TokenPredictor::new()))
}

fn known_tokens(input: u32, output: u32) -> SelectionRequest {
    SelectionRequest {
        input_tokens: Some(input),
        output_tokens: Some(output),
        ..SelectionRequest::chat(1000, 0.5)
    }
}

#[test]
fn test_cheaper_provider_wins_at_equal_quality() {
    // Two providers, quality 0.8 each, $0.001 vs $0.010 per 1k input
    let optimizer = optimizer_over(vec![
        active_provider("cheap", chat_model("small", 0.001, 0.001, 0.8)),
        active_provider("pricey", chat_model("large", 0.010, 0.010, 0.8)),
    ]);

    let selection = optimizer.select(&known_tokens(1000, 500)).unwrap();
    assert_eq!(selection.best.provider, "cheap");
    assert_eq!(selection.alternatives.len(), 1);
    assert_eq!(selection.alternatives[0].provider, "pricey");

    // savings = (0.010 + 0.005) - (0.001 + 0.0005) = 0.0135
    assert!((selection.estimated_savings - 0.0135).abs() < 1e-9);
}

#[test]
fn test_cost_score_monotonicity() {
    // Identical apart from price: the cheaper candidate scores higher
    let optimizer = optimizer_over(vec![
        active_provider("a", chat_model("m", 0.002, 0.002, 0.8)),
        active_provider("b", chat_model("m", 0.004, 0.004, 0.8)),
    ]);
    let selection = optimizer.select(&known_tokens(1000, 1000)).unwrap();
    assert_eq!(selection.best.provider, "a");
    assert!(selection.best.total_score > selection.alternatives[0].total_score);
}

#[test]
fn test_tie_breaks_on_lower_provider_name() {
    let optimizer = optimizer_over(vec![
        active_provider("zeta", chat_model("m", 0.001, 0.001, 0.8)),
        active_provider("alpha", chat_model("m", 0.001, 0.001, 0.8)),
    ]);
    for _ in 0..5 {
        let selection = optimizer.select(&known_tokens(500, 500)).unwrap();
        assert_eq!(selection.best.provider, "alpha", "tie-break must be deterministic");
    }
}

#[test]
fn test_quality_filter_removes_candidates() {
    let optimizer = optimizer_over(vec![
        active_provider("good", chat_model("m", 0.001, 0.001, 0.7)),
        active_provider("weak", chat_model("m", 0.0, 0.0, 0.3)),
    ]);
    let selection = optimizer.select(&known_tokens(500, 500)).unwrap();
    assert_eq!(selection.best.provider, "good");
    assert!(selection.alternatives.is_empty(), "low-quality model must be filtered");
}

#[test]
fn test_latency_filter() {
    let mut slow = active_provider("slow", chat_model("m", 0.0, 0.0, 0.9));
    slow.latency_ms = 9000.0;
    let optimizer = optimizer_over(vec![slow, active_provider("fast", chat_model("m", 0.001, 0.001, 0.8))]);

    let selection = optimizer.select(&known_tokens(500, 500)).unwrap();
    assert_eq!(selection.best.provider, "fast");
}

#[test]
fn test_success_rate_filter() {
    let mut flaky = active_provider("flaky", chat_model("m", 0.0, 0.0, 0.9));
    flaky.success_count = 1;
    flaky.error_count = 9;
    let optimizer =
        optimizer_over(vec![flaky, active_provider("steady", chat_model("m", 0.001, 0.001, 0.8))]);

    let selection = optimizer.select(&known_tokens(500, 500)).unwrap();
    assert_eq!(selection.best.provider, "steady");
}

#[test]
fn test_max_cost_constraint() {
    let optimizer = optimizer_over(vec![
        active_provider("pricey", chat_model("m", 0.05, 0.05, 0.95)),
        active_provider("cheap", chat_model("m", 0.001, 0.001, 0.7)),
    ]);
    let mut request = known_tokens(1000, 1000);
    request.max_cost = Some(0.01);
    let selection = optimizer.select(&request).unwrap();
    assert_eq!(selection.best.provider, "cheap");
    assert!(selection.alternatives.is_empty());
}

#[test]
fn test_everything_filtered_is_no_suitable_provider() {
    let optimizer = optimizer_over(vec![active_provider("weak", chat_model("m", 0.0, 0.0, 0.2))]);
    let error = optimizer.select(&known_tokens(500, 500)).unwrap_err();
    assert!(matches!(error, GatewayError::NoSuitableProvider(_)));
}

#[test]
fn test_missing_tokens_are_predicted() {
    let optimizer = optimizer_over(vec![active_provider("p", chat_model("m", 0.001, 0.001, 0.8))]);
    let selection = optimizer.select(&SelectionRequest::chat(4000, 0.5)).unwrap();
    assert!(selection.input_tokens >= 1);
    assert!(selection.output_tokens >= 1);
    assert!(selection.confidence > 0.0);
}

#[test]
fn test_alternatives_capped_at_three() {
    let providers: Vec<Provider> = (0..6)
        .map(|i| {
            active_provider(
                &format!("p{}", i),
                chat_model("m", 0.001 * (i + 1) as f64, 0.001, 0.8),
            )
        })
        .collect();
    let optimizer = optimizer_over(providers);
    let selection = optimizer.select(&known_tokens(1000, 500)).unwrap();
    assert_eq!(selection.alternatives.len(), 3);
}

#[test]
fn test_estimate_complexity_bounds() {
    assert_eq!(estimate_complexity(""), 0.0);
    let repetitive = "word ".repeat(200);
    let varied: String =
        (0..200).map(|i| format!("token{} ", i)).collect();
    assert!(estimate_complexity(&varied) > estimate_complexity(&repetitive));
    assert!(estimate_complexity(&varied) <= 1.0);
}
