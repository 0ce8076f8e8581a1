//! # llmgate
//!
//! A multi-provider LLM gateway. Heterogeneous upstream providers
//! (OpenAI-compatible and Anthropic-native) are unified behind one
//! canonical chat interface; requests are routed to the provider that best
//! satisfies a cost/quality/latency objective, with health-aware failover,
//! deduplication against a semantic cache, and scheduled auto-discovery of
//! new candidate endpoints.
//!
//! ## Subsystems
//!
//! - [`core::registry`] — provider records, capability flags, health counters
//! - [`core::health`] — periodic reachability probes and scoring
//! - [`core::optimizer`] — weighted provider selection plus the predictor
//!   training loop
//! - [`core::adapters`] — pure translators between the canonical schema and
//!   the OpenAI / Anthropic wire formats, streaming included
//! - [`core::dispatch`] — retrying executor with admission control and
//!   load-balanced failover
//! - [`core::cache`] — embedding-based response cache with TTL and eviction
//! - [`core::discovery`] — scheduled scan of external sources for new
//!   endpoints
//! - [`core::events`] — pub/sub hub multiplexing gateway events to
//!   subscribers
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use llmgate::config::GatewayConfig;
//! use llmgate::Gateway;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GatewayConfig::from_file("config/gateway.yaml").await?;
//!     let gateway = Gateway::new(config)?;
//!     gateway.run().await?;
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod core;
pub mod monitoring;
pub mod server;
pub mod storage;
pub mod utils;

pub use config::GatewayConfig;
pub use utils::error::{GatewayError, Result};

pub use crate::core::types::{
    ChatChunk, ChatMessage, ChatRequest, ChatResponse, Channel, Event, MessageContent,
    MessageRole, Provider, ProviderStatus,
};

use crate::core::adapters::AdapterSet;
use crate::core::cache::{HttpEmbeddingProvider, SemanticCache};
use crate::core::discovery::{
    DiscoveryEngine, DiscoverySource, EndpointRules, EndpointValidator, ListScraperSource,
    RepoSearchSource,
};
use crate::core::dispatch::Dispatcher;
use crate::core::events::EventHub;
use crate::core::health::HealthTracker;
use crate::core::optimizer::{training::Trainer, Optimizer, TokenPredictor};
use crate::core::registry::ProviderRegistry;
use crate::monitoring::StatsBroadcaster;
use crate::storage::{MemoryStore, Store};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// The assembled gateway: core subsystems, background loops, HTTP surface
pub struct Gateway {
    config: GatewayConfig,
    registry: Arc<ProviderRegistry>,
    store: Arc<dyn Store>,
    hub: Arc<EventHub>,
    dispatcher: Arc<Dispatcher>,
    optimizer: Arc<Optimizer>,
    cache: Arc<SemanticCache>,
    tracker: Arc<HealthTracker>,
    trainer: Arc<Trainer>,
    discovery: Arc<DiscoveryEngine>,
    stats: Arc<StatsBroadcaster>,
}

impl Gateway {
    /// Wire every subsystem together from configuration
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let registry = Arc::new(ProviderRegistry::new());
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let hub = Arc::new(EventHub::new());
        let adapters = Arc::new(AdapterSet::default());

        for seed in &config.providers {
            registry.register(seed.to_provider(&config.http))?;
        }

        let dispatcher = Arc::new(Dispatcher::new(
            registry.clone(),
            adapters,
            store.clone(),
            hub.publisher(),
        )?);

        let predictor = Arc::new(TokenPredictor::new());
        let optimizer = Arc::new(Optimizer::new(
            config.optimizer.clone(),
            registry.clone(),
            predictor.clone(),
        ));
        let trainer = Arc::new(Trainer::new(config.optimizer.clone(), predictor, store.clone()));

        let embedder = Arc::new(HttpEmbeddingProvider::new(
            config.cache.embedding.base_url.as_str(),
            config.cache.embedding.model.as_str(),
            config.cache.embedding.api_key.clone(),
            config.cache.core.embedding_dimension,
        )?);
        let cache = Arc::new(SemanticCache::new(config.cache.core.clone(), embedder));

        let validator = Arc::new(EndpointValidator::new(Duration::from_secs(
            config.discovery.core.validation_timeout_secs,
        ))?);
        let tracker = Arc::new(HealthTracker::new(
            config.health.to_tracker_config(),
            registry.clone(),
            validator.clone(),
            hub.publisher(),
        ));

        let rules = EndpointRules::default_rules();
        let mut sources: Vec<Box<dyn DiscoverySource>> = vec![Box::new(RepoSearchSource::new(
            config.discovery.github_token.clone(),
            config.discovery.core.search_terms.clone(),
            rules,
        )?)];
        if !config.discovery.list_urls.is_empty() {
            sources.push(Box::new(ListScraperSource::new(
                config.discovery.list_urls.clone(),
                EndpointRules::default_rules(),
            )?));
        }
        let discovery = Arc::new(DiscoveryEngine::new(
            config.discovery.core.clone(),
            sources,
            validator,
            registry.clone(),
            store.clone(),
            hub.publisher(),
        ));

        let stats = Arc::new(StatsBroadcaster::new(
            Duration::from_secs(30),
            registry.clone(),
            store.clone(),
            hub.publisher(),
        ));

        Ok(Self {
            config,
            registry,
            store,
            hub,
            dispatcher,
            optimizer,
            cache,
            tracker,
            trainer,
            discovery,
            stats,
        })
    }

    /// Run the gateway until interrupted
    ///
    /// Every background loop hangs off one root cancellation token; stopping
    /// the gateway stops discovery, verification, cache cleanup, training,
    /// health tracking, and the event hub.
    pub async fn run(self) -> Result<()> {
        let cancel = CancellationToken::new();

        let hub = self.hub.clone();
        let hub_cancel = cancel.clone();
        tokio::spawn(async move { hub.run(hub_cancel).await });

        let tracker = self.tracker.clone();
        let tracker_cancel = cancel.clone();
        tokio::spawn(async move { tracker.run(tracker_cancel).await });

        let trainer = self.trainer.clone();
        let trainer_cancel = cancel.clone();
        tokio::spawn(async move { trainer.run(trainer_cancel).await });

        let cache = self.cache.clone();
        let cache_cancel = cancel.clone();
        tokio::spawn(async move { cache.run_cleanup(cache_cancel).await });

        let discovery = self.discovery.clone();
        let discovery_cancel = cancel.clone();
        tokio::spawn(async move { discovery.run(discovery_cancel).await });

        let stats = self.stats.clone();
        let stats_cancel = cancel.clone();
        tokio::spawn(async move { stats.run(stats_cancel).await });

        let state = server::AppState {
            registry: self.registry.clone(),
            dispatcher: self.dispatcher.clone(),
            optimizer: self.optimizer.clone(),
            cache: self.cache.clone(),
            hub: self.hub.clone(),
            store: self.store.clone(),
            config: self.config.clone(),
        };
        let http = server::HttpServer::new(state);

        let shutdown = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, shutting down");
                shutdown.cancel();
            }
        });

        let result = http.run(cancel.clone()).await;
        cancel.cancel();
        result
    }

    /// The provider registry
    pub fn registry(&self) -> Arc<ProviderRegistry> {
        self.registry.clone()
    }

    /// The storage collaborator
    pub fn store(&self) -> Arc<dyn Store> {
        self.store.clone()
    }
}

/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
