//! Request dispatch
//!
//! Executes canonical requests against a chosen provider with admission
//! control, retry, and outcome recording. Load-balanced mode walks the
//! active providers in order; the first success wins.

pub mod rate_limit;

pub use rate_limit::{AdmissionGuard, RateLimiter};

use crate::core::adapters::sse::LineBuffer;
use crate::core::adapters::{AdapterSet, WireAdapter};
use crate::core::events::EventPublisher;
use crate::core::registry::ProviderRegistry;
use crate::core::types::{
    ChatChunk, ChatRequest, ChatResponse, Channel, Event, Provider, RequestLog, Usage,
};
use crate::storage::Store;
use crate::utils::error::{GatewayError, Result};
use futures_util::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Executes canonical requests against upstream providers
pub struct Dispatcher {
    registry: Arc<ProviderRegistry>,
    adapters: Arc<AdapterSet>,
    store: Arc<dyn Store>,
    events: EventPublisher,
    limiter: RateLimiter,
    http: reqwest::Client,
    round_robin: AtomicUsize,
}

impl Dispatcher {
    /// Create a dispatcher
    pub fn new(
        registry: Arc<ProviderRegistry>,
        adapters: Arc<AdapterSet>,
        store: Arc<dyn Store>,
        events: EventPublisher,
    ) -> Result<Self> {
        let http = reqwest::Client::builder().user_agent("llmgate/0.1").build()?;
        Ok(Self {
            registry,
            adapters,
            store,
            events,
            limiter: RateLimiter::new(),
            http,
            round_robin: AtomicUsize::new(0),
        })
    }

    /// Pick the named provider, or the next active one round-robin
    pub fn pick_provider(&self, name: Option<&str>) -> Result<Provider> {
        match name {
            Some(name) => self
                .registry
                .get(name)
                .ok_or_else(|| GatewayError::ModelNotFound(format!("provider {} is not registered", name))),
            None => {
                let active = self.registry.list_active();
                if active.is_empty() {
                    return Err(GatewayError::NoProvidersAvailable(
                        "no active providers".to_string(),
                    ));
                }
                let index = self.round_robin.fetch_add(1, Ordering::Relaxed) % active.len();
                Ok(active[index].clone())
            }
        }
    }

    /// Execute a request against a named provider or the round-robin pick
    pub async fn execute(
        &self,
        request: &ChatRequest,
        provider_name: Option<&str>,
    ) -> Result<ChatResponse> {
        let provider = self.pick_provider(provider_name)?;
        self.try_provider(&provider, request).await
    }

    /// Walk the active providers in order until one succeeds
    ///
    /// A request the adapter itself rejects fails immediately; upstream
    /// failures move on to the next provider. An exhausted list is
    /// `no_providers_available`.
    pub async fn execute_balanced(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let active = self.registry.list_active();
        if active.is_empty() {
            return Err(GatewayError::NoProvidersAvailable("no active providers".to_string()));
        }

        let mut last_error = None;
        for provider in &active {
            match self.try_provider(provider, request).await {
                Ok(response) => return Ok(response),
                Err(error @ GatewayError::InvalidRequest(_)) => return Err(error),
                Err(error) => {
                    warn!(provider = %provider.name, error = %error, "provider failed, trying next");
                    last_error = Some(error);
                }
            }
        }
        Err(GatewayError::NoProvidersAvailable(format!(
            "all {} providers failed, last error: {}",
            active.len(),
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    /// Execute one request against one provider with its retry policy
    pub async fn try_provider(
        &self,
        provider: &Provider,
        request: &ChatRequest,
    ) -> Result<ChatResponse> {
        let adapter = self.adapters.get(provider.compatibility)?;
        let _guard = self.limiter.admit(provider, request.estimate_input_tokens())?;
        let body = adapter.encode_request(request)?;
        let url = format!("{}{}", provider.base_url.trim_end_matches('/'), adapter.chat_path());

        let mut attempt = 0;
        loop {
            let start = Instant::now();
            let outcome = self.send_once(adapter, provider, &url, &body).await;
            let latency_ms = start.elapsed().as_millis() as u64;

            match outcome {
                Ok(response) => {
                    self.record(provider, request, adapter.chat_path(), 200, latency_ms, Ok(&response))
                        .await;
                    return Ok(response);
                }
                Err(error) => {
                    if error.is_retryable() && attempt < provider.retry.max_retries {
                        attempt += 1;
                        let backoff = Duration::from_secs(
                            (attempt as u64 * provider.retry.backoff_step_secs)
                                .min(provider.retry.backoff_cap_secs),
                        );
                        debug!(
                            provider = %provider.name,
                            attempt,
                            backoff_secs = backoff.as_secs(),
                            "retrying after {}", error
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                    let status = upstream_status(&error);
                    self.record(provider, request, adapter.chat_path(), status, latency_ms, Err(&error))
                        .await;
                    return Err(error);
                }
            }
        }
    }

    async fn send_once(
        &self,
        adapter: &dyn WireAdapter,
        provider: &Provider,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<ChatResponse> {
        let mut request = self.http.post(url).timeout(provider.timeout()).json(body);
        for (name, value) in adapter.headers(provider) {
            request = request.header(name, value);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GatewayError::from_upstream_status(status.as_u16(), text));
        }
        let bytes = response.bytes().await?;
        adapter.decode_response(&bytes)
    }

    /// Stream a request, invoking `handler` once per canonical chunk
    ///
    /// The handler returning false terminates the stream. Retries apply only
    /// until the first byte arrives.
    pub async fn stream<F>(
        &self,
        request: &ChatRequest,
        provider_name: Option<&str>,
        mut handler: F,
    ) -> Result<()>
    where
        F: FnMut(ChatChunk) -> bool + Send,
    {
        let provider = self.pick_provider(provider_name)?;
        let adapter = self.adapters.get(provider.compatibility)?;
        let _guard = self.limiter.admit(&provider, request.estimate_input_tokens())?;

        let mut streamed = request.clone();
        streamed.stream = true;
        let body = adapter.encode_request(&streamed)?;
        let url = format!("{}{}", provider.base_url.trim_end_matches('/'), adapter.chat_path());

        let start = Instant::now();
        let mut attempt = 0;
        let response = loop {
            let mut http_request = self.http.post(&url).timeout(provider.timeout()).json(&body);
            for (name, value) in adapter.headers(&provider) {
                http_request = http_request.header(name, value);
            }
            match http_request.send().await {
                Ok(response) if response.status().is_success() => break response,
                Ok(response) => {
                    let status = response.status().as_u16();
                    let text = response.text().await.unwrap_or_default();
                    let error = GatewayError::from_upstream_status(status, text);
                    if error.is_retryable() && attempt < provider.retry.max_retries {
                        attempt += 1;
                        let backoff = Duration::from_secs(
                            (attempt as u64 * provider.retry.backoff_step_secs)
                                .min(provider.retry.backoff_cap_secs),
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                    let latency_ms = start.elapsed().as_millis() as u64;
                    self.record(&provider, request, adapter.chat_path(), status, latency_ms, Err(&error))
                        .await;
                    return Err(error);
                }
                Err(e) => {
                    let error = GatewayError::from(e);
                    if error.is_retryable() && attempt < provider.retry.max_retries {
                        attempt += 1;
                        tokio::time::sleep(Duration::from_secs(
                            (attempt as u64 * provider.retry.backoff_step_secs)
                                .min(provider.retry.backoff_cap_secs),
                        ))
                        .await;
                        continue;
                    }
                    let latency_ms = start.elapsed().as_millis() as u64;
                    self.record(&provider, request, adapter.chat_path(), 0, latency_ms, Err(&error))
                        .await;
                    return Err(error);
                }
            }
        };

        let mut decoder = adapter.new_stream_decoder(&request.model);
        let mut lines = LineBuffer::new();
        let mut usage: Option<Usage> = None;
        let mut byte_stream = response.bytes_stream();

        'stream: while let Some(chunk_bytes) = byte_stream.next().await {
            let chunk_bytes = chunk_bytes?;
            for line in lines.push(&chunk_bytes) {
                for chunk in decoder.decode_line(&line)? {
                    if chunk.usage.is_some() {
                        usage = chunk.usage;
                    }
                    let done = chunk.done;
                    if !handler(chunk) || done {
                        break 'stream;
                    }
                }
            }
        }

        let latency_ms = start.elapsed().as_millis() as u64;
        self.record_streamed(&provider, request, adapter.chat_path(), latency_ms, usage).await;
        Ok(())
    }

    async fn record(
        &self,
        provider: &Provider,
        request: &ChatRequest,
        endpoint: &str,
        status: u16,
        latency_ms: u64,
        outcome: std::result::Result<&ChatResponse, &GatewayError>,
    ) {
        let prompt = request.prompt_text();
        let mut log = RequestLog::chat(&provider.name, &request.model, endpoint);
        log.user_id = request.user.clone();
        log.status_code = status;
        log.latency_ms = latency_ms;
        log.prompt_length = prompt.len() as u32;
        log.prompt_complexity = crate::core::optimizer::estimate_complexity(&prompt);

        match outcome {
            Ok(response) => {
                self.registry.record_success(&provider.name, latency_ms as f64);
                log.success = true;
                if let Some(usage) = response.usage {
                    log.input_tokens = usage.prompt_tokens;
                    log.output_tokens = usage.completion_tokens;
                    log.estimated_cost = provider
                        .models
                        .iter()
                        .find(|m| m.name == request.model)
                        .map(|m| m.estimate_cost(usage.prompt_tokens, usage.completion_tokens))
                        .unwrap_or(0.0);
                }
            }
            Err(error) => {
                self.registry.record_error(&provider.name);
                log.error = Some(error.to_string());
            }
        }

        self.events.publish(
            Channel::Requests,
            Event::request(&provider.name, &request.model, log.success, latency_ms),
        );
        if let Err(e) = self.store.append_log(log).await {
            warn!(error = %e, "failed to append request log");
        }
    }

    async fn record_streamed(
        &self,
        provider: &Provider,
        request: &ChatRequest,
        endpoint: &str,
        latency_ms: u64,
        usage: Option<Usage>,
    ) {
        self.registry.record_success(&provider.name, latency_ms as f64);
        let prompt = request.prompt_text();
        let mut log = RequestLog::chat(&provider.name, &request.model, endpoint);
        log.user_id = request.user.clone();
        log.status_code = 200;
        log.latency_ms = latency_ms;
        log.prompt_length = prompt.len() as u32;
        log.prompt_complexity = crate::core::optimizer::estimate_complexity(&prompt);
        log.success = true;
        if let Some(usage) = usage {
            log.input_tokens = usage.prompt_tokens;
            log.output_tokens = usage.completion_tokens;
            log.estimated_cost = provider
                .models
                .iter()
                .find(|m| m.name == request.model)
                .map(|m| m.estimate_cost(usage.prompt_tokens, usage.completion_tokens))
                .unwrap_or(0.0);
        }
        self.events.publish(
            Channel::Requests,
            Event::request(&provider.name, &request.model, true, latency_ms),
        );
        if let Err(e) = self.store.append_log(log).await {
            warn!(error = %e, "failed to append request log");
        }
    }
}

fn upstream_status(error: &GatewayError) -> u16 {
    match error {
        GatewayError::InvalidApiKey(_) => 401,
        GatewayError::ModelNotFound(_) => 404,
        GatewayError::RateLimitExceeded(_) => 429,
        GatewayError::Timeout(_) => 408,
        GatewayError::ServiceUnavailable(_) => 503,
        GatewayError::InvalidRequest(_) => 400,
        _ => 0,
    }
}
