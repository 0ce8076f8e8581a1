//! Cost-aware routing scenarios

mod common;

use common::{active_provider, chat_model};
use llmgate::core::optimizer::{Optimizer, OptimizerConfig, SelectionRequest, TokenPredictor};
use llmgate::core::registry::ProviderRegistry;
use std::sync::Arc;

fn optimizer_over(providers: Vec<llmgate::Provider>) -> Optimizer {
    let registry = Arc::new(ProviderRegistry::new());
    for provider in providers {
        registry.register(provider).unwrap();
    }
    Optimizer::new(OptimizerConfig::default(), registry, Arc::new(TokenPredictor::new()))
}

#[test]
fn routing_prefers_the_cheaper_of_two_equal_quality_providers() {
    // Two active providers, quality 0.8 each, $0.001 vs $0.010 per 1k input,
    // weights 0.4/0.4/0.2, predicted 1000 input / 500 output tokens
    let mut cheap = active_provider("cheap", "https://cheap.example.com");
    cheap.models = vec![chat_model("cheap-chat", 0.001, 0.0, 0.8)];
    let mut pricey = active_provider("pricey", "https://pricey.example.com");
    pricey.models = vec![chat_model("pricey-chat", 0.010, 0.0, 0.8)];

    let optimizer = optimizer_over(vec![cheap, pricey]);
    let request = SelectionRequest {
        input_tokens: Some(1000),
        output_tokens: Some(500),
        ..SelectionRequest::chat(4000, 0.5)
    };

    let selection = optimizer.select(&request).unwrap();
    assert_eq!(selection.best.provider, "cheap");
    assert_eq!(
        selection.alternatives.iter().map(|c| c.provider.as_str()).collect::<Vec<_>>(),
        vec!["pricey"]
    );
    assert!(
        (selection.estimated_savings - 0.009).abs() < 1e-9,
        "savings should be ~$0.009, got {}",
        selection.estimated_savings
    );
}

#[test]
fn routing_is_deterministic_for_identical_candidates() {
    let build = || {
        let mut a = active_provider("aurora", "https://a.example.com");
        a.models = vec![chat_model("m", 0.001, 0.001, 0.8)];
        let mut b = active_provider("borealis", "https://b.example.com");
        b.models = vec![chat_model("m", 0.001, 0.001, 0.8)];
        optimizer_over(vec![b, a])
    };

    let request = SelectionRequest {
        input_tokens: Some(500),
        output_tokens: Some(500),
        ..SelectionRequest::chat(2000, 0.5)
    };
    for _ in 0..10 {
        let selection = build().select(&request).unwrap();
        assert_eq!(selection.best.provider, "aurora", "ties break on lower provider name");
    }
}

#[test]
fn routing_respects_quality_over_cost_when_weighted() {
    let mut free_weak = active_provider("free-weak", "https://f.example.com");
    free_weak.models = vec![chat_model("weak", 0.0, 0.0, 0.61)];
    let mut paid_strong = active_provider("paid-strong", "https://p.example.com");
    paid_strong.models = vec![chat_model("strong", 0.002, 0.002, 0.99)];

    let registry = Arc::new(ProviderRegistry::new());
    registry.register(free_weak).unwrap();
    registry.register(paid_strong).unwrap();
    let mut config = OptimizerConfig::default();
    config.weights.cost = 0.05;
    config.weights.quality = 0.9;
    config.weights.latency = 0.05;
    let optimizer = Optimizer::new(config, registry, Arc::new(TokenPredictor::new()));

    let selection = optimizer
        .select(&SelectionRequest {
            input_tokens: Some(1000),
            output_tokens: Some(500),
            ..SelectionRequest::chat(4000, 0.5)
        })
        .unwrap();
    assert_eq!(selection.best.provider, "paid-strong");
}
