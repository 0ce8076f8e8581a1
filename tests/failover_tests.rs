//! Load-balanced failover scenarios against fake upstreams

mod common;

use common::{active_provider, chat_model, openai_response_body};
use llmgate::core::adapters::AdapterSet;
use llmgate::core::dispatch::Dispatcher;
use llmgate::core::events::EventHub;
use llmgate::core::registry::ProviderRegistry;
use llmgate::core::types::{ChatMessage, ChatRequest};
use llmgate::storage::{LogQuery, MemoryStore, Store};
use llmgate::GatewayError;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Fixture {
    registry: Arc<ProviderRegistry>,
    store: Arc<MemoryStore>,
    dispatcher: Dispatcher,
}

fn fixture(registry: Arc<ProviderRegistry>) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let dispatcher = Dispatcher::new(
        registry.clone(),
        Arc::new(AdapterSet::default()),
        store.clone(),
        EventHub::new().publisher(),
    )
    .unwrap();
    Fixture { registry, store, dispatcher }
}

fn no_retry_provider(name: &str, base_url: &str) -> llmgate::Provider {
    let mut provider = active_provider(name, base_url);
    provider.retry.max_retries = 0;
    provider.models = vec![chat_model("test-chat", 0.001, 0.001, 0.8)];
    provider
}

async fn failing_server(status: u16) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(status))
        .mount(&server)
        .await;
    server
}

async fn succeeding_server(content: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(openai_response_body("chatcmpl-ok", "test-chat", content)),
        )
        .mount(&server)
        .await;
    server
}

fn request() -> ChatRequest {
    ChatRequest::new("test-chat").with_message(ChatMessage::user("hello"))
}

#[tokio::test]
async fn failover_takes_the_second_provider_when_the_first_returns_503() {
    let broken = failing_server(503).await;
    let healthy = succeeding_server("from the healthy one").await;
    let fallback = failing_server(503).await;

    let registry = Arc::new(ProviderRegistry::new());
    // list_active iterates in name order: alpha first, then beta, then gamma
    registry.register(no_retry_provider("alpha", &broken.uri())).unwrap();
    registry.register(no_retry_provider("beta", &healthy.uri())).unwrap();
    registry.register(no_retry_provider("gamma", &fallback.uri())).unwrap();

    let f = fixture(registry);
    let response = f.dispatcher.execute_balanced(&request()).await.unwrap();
    assert_eq!(response.first_text(), "from the healthy one");

    let alpha = f.registry.get("alpha").unwrap();
    assert_eq!(alpha.error_count, 1);
    assert_eq!(alpha.success_count, 0);
    let beta = f.registry.get("beta").unwrap();
    assert_eq!(beta.success_count, 1);
    let gamma = f.registry.get("gamma").unwrap();
    assert_eq!(gamma.error_count, 0, "third provider never contacted");

    let successes = f
        .store
        .query_logs(LogQuery { success_only: true, ..Default::default() })
        .await
        .unwrap();
    assert_eq!(successes.len(), 1, "exactly one successful request log row");
    assert_eq!(successes[0].provider, "beta");
    assert_eq!(successes[0].input_tokens, 10);
    assert_eq!(successes[0].output_tokens, 5);
}

#[tokio::test]
async fn exhausted_provider_list_is_no_providers_available() {
    let broken_a = failing_server(503).await;
    let broken_b = failing_server(500).await;

    let registry = Arc::new(ProviderRegistry::new());
    registry.register(no_retry_provider("alpha", &broken_a.uri())).unwrap();
    registry.register(no_retry_provider("beta", &broken_b.uri())).unwrap();

    let f = fixture(registry);
    let error = f.dispatcher.execute_balanced(&request()).await.unwrap_err();
    assert!(matches!(error, GatewayError::NoProvidersAvailable(_)));
    assert_eq!(f.registry.get("alpha").unwrap().error_count, 1);
    assert_eq!(f.registry.get("beta").unwrap().error_count, 1);
}

#[tokio::test]
async fn upstream_401_is_not_retried_and_surfaces_as_invalid_api_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let registry = Arc::new(ProviderRegistry::new());
    let mut provider = active_provider("alpha", &server.uri());
    provider.retry.max_retries = 3;
    registry.register(provider).unwrap();

    let f = fixture(registry);
    let error = f.dispatcher.execute(&request(), Some("alpha")).await.unwrap_err();
    assert!(matches!(error, GatewayError::InvalidApiKey(_)));
}

#[tokio::test]
async fn retryable_500_is_retried_until_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(openai_response_body("chatcmpl-2", "test-chat", "recovered")),
        )
        .mount(&server)
        .await;

    let registry = Arc::new(ProviderRegistry::new());
    registry.register(active_provider("alpha", &server.uri())).unwrap();

    let f = fixture(registry);
    let response = f.dispatcher.execute(&request(), Some("alpha")).await.unwrap();
    assert_eq!(response.first_text(), "recovered");
}

#[tokio::test]
async fn streaming_relays_chunks_in_order() {
    let sse_body = concat!(
        "data: {\"id\":\"s1\",\"created\":1,\"model\":\"test-chat\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hel\"},\"finish_reason\":null}]}\n\n",
        "data: {\"id\":\"s1\",\"created\":1,\"model\":\"test-chat\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"lo\"},\"finish_reason\":null}]}\n\n",
        "data: {\"id\":\"s1\",\"created\":1,\"model\":\"test-chat\",\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
        "data: [DONE]\n\n",
    );
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_raw(sse_body, "text/event-stream"),
        )
        .mount(&server)
        .await;

    let registry = Arc::new(ProviderRegistry::new());
    registry.register(active_provider("alpha", &server.uri())).unwrap();

    let f = fixture(registry);
    let mut text = String::new();
    let mut saw_done = false;
    f.dispatcher
        .stream(&request(), Some("alpha"), |chunk| {
            text.push_str(&chunk.delta);
            if chunk.done {
                saw_done = true;
            }
            true
        })
        .await
        .unwrap();

    assert_eq!(text, "Hello");
    assert!(saw_done, "terminal chunk must be delivered");
    assert_eq!(f.registry.get("alpha").unwrap().success_count, 1);
}
