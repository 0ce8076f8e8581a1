//! Provider auto-discovery
//!
//! A scheduled pipeline harvests candidate endpoints from external sources,
//! deduplicates and validates them under bounded concurrency, and persists
//! the survivors as providers. A separate verification loop re-probes
//! registered providers on its own interval.

pub mod sources;
pub mod types;
pub mod validator;


pub use sources::{DiscoverySource, EndpointRules, ListScraperSource, RepoSearchSource};
pub use types::{Candidate, ScanReport, ValidationResult};
pub use validator::EndpointValidator;

use crate::core::events::EventPublisher;
use crate::core::registry::ProviderRegistry;
use crate::core::types::{
    Channel, Event, Modality, ModelInfo, Provider, ProviderKind, ProviderStatus,
};
use crate::storage::Store;
use crate::utils::error::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Discovery engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Master switch
    pub enabled: bool,
    /// Seconds between full scans
    pub scan_interval_secs: u64,
    /// Seconds between verification sweeps of registered providers
    pub verify_interval_secs: u64,
    /// Concurrent validations per scan
    pub max_concurrent: usize,
    /// Per-candidate validation timeout in seconds
    pub validation_timeout_secs: u64,
    /// Minimum health score for ingestion
    pub min_health_score: f64,
    /// Repository search terms
    pub search_terms: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scan_interval_secs: 24 * 3600,
            verify_interval_secs: 6 * 3600,
            max_concurrent: 5,
            validation_timeout_secs: 30,
            min_health_score: 0.6,
            search_terms: vec![
                "free llm api".to_string(),
                "openai compatible api".to_string(),
                "llm inference server".to_string(),
            ],
        }
    }
}

/// Scheduled discovery pipeline
pub struct DiscoveryEngine {
    config: DiscoveryConfig,
    sources: Vec<Box<dyn DiscoverySource>>,
    validator: Arc<EndpointValidator>,
    registry: Arc<ProviderRegistry>,
    store: Arc<dyn Store>,
    events: EventPublisher,
}

impl DiscoveryEngine {
    /// Create an engine over the given sources
    pub fn new(
        config: DiscoveryConfig,
        sources: Vec<Box<dyn DiscoverySource>>,
        validator: Arc<EndpointValidator>,
        registry: Arc<ProviderRegistry>,
        store: Arc<dyn Store>,
        events: EventPublisher,
    ) -> Self {
        Self { config, sources, validator, registry, store, events }
    }

    /// One full scan: harvest, dedupe, filter, validate, persist
    pub async fn run_scan(&self) -> ScanReport {
        let mut report = ScanReport { started_at: Utc::now(), ..Default::default() };

        // Harvest every source in turn; one failing source does not stop
        // the scan
        let mut harvested: Vec<Candidate> = Vec::new();
        for source in &self.sources {
            match source.harvest().await {
                Ok(candidates) => harvested.extend(candidates),
                Err(error) => {
                    warn!(source = source.name(), %error, "source harvest failed");
                    report.errors.push(format!("{}: {}", source.name(), error));
                }
            }
        }
        report.found = harvested.len();

        // One candidate per base URL, first source wins
        let mut by_url: HashMap<String, Candidate> = HashMap::new();
        for candidate in harvested {
            by_url.entry(candidate.base_url.trim_end_matches('/').to_string()).or_insert(candidate);
        }
        let mut deduped: Vec<Candidate> = by_url.into_values().collect();
        deduped.sort_by(|a, b| a.base_url.cmp(&b.base_url));
        report.deduped = deduped.len();

        // Drop anything already registered
        let fresh: Vec<Candidate> = deduped
            .into_iter()
            .filter(|candidate| {
                let exists = self.registry.has_base_url(&candidate.base_url);
                if exists {
                    report.skipped_existing += 1;
                }
                !exists
            })
            .collect();

        // Validate under bounded concurrency
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));
        let timeout = Duration::from_secs(self.config.validation_timeout_secs);
        let validations = fresh.into_iter().map(|candidate| {
            let semaphore = semaphore.clone();
            let validator = self.validator.clone();
            async move {
                let _permit = semaphore.acquire().await.expect("semaphore never closed");
                let result = tokio::time::timeout(
                    timeout,
                    validator.validate(&candidate.base_url, candidate.auth, None),
                )
                .await
                .unwrap_or_else(|_| ValidationResult {
                    error: Some("validation timed out".to_string()),
                    ..Default::default()
                });
                (candidate, result)
            }
        });
        let validated = futures::future::join_all(validations).await;
        report.validated = validated.len();

        // Persist the survivors
        for (candidate, result) in validated {
            if result.health_score < self.config.min_health_score {
                continue;
            }
            match self.persist_candidate(&candidate, &result).await {
                Ok(()) => report.saved += 1,
                Err(error) => {
                    warn!(candidate = %candidate.name, %error, "failed to persist candidate");
                    report.errors.push(format!("{}: {}", candidate.name, error));
                }
            }
        }

        report.finished_at = Utc::now();
        info!(
            found = report.found,
            validated = report.validated,
            saved = report.saved,
            skipped = report.skipped_existing,
            "discovery scan complete"
        );
        report
    }

    async fn persist_candidate(&self, candidate: &Candidate, result: &ValidationResult) -> Result<()> {
        let mut provider = Provider::new(&candidate.name, &candidate.base_url, result.compatibility);
        provider.auth = candidate.auth;
        provider.kind = ProviderKind::Free;
        provider.status = ProviderStatus::Active;
        provider.tier = if candidate.stars >= 100 { 2 } else { 3 };
        provider.capabilities = result.capabilities;
        provider.health_score = result.health_score;
        provider.latency_ms = result.latency_ms as f64;
        provider.last_health_check = Some(Utc::now());
        provider.source = candidate.source.clone();

        let mut model_names: Vec<String> = result.models.clone();
        if model_names.is_empty() {
            model_names = candidate.models.clone();
        }
        provider.models = model_names
            .into_iter()
            .map(|name| ModelInfo {
                name,
                modality: Modality::Chat,
                context_length: 8192,
                max_output_tokens: 4096,
                input_price_per_1k: 0.0,
                output_price_per_1k: 0.0,
                quality_score: 0.7,
                speed_score: 0.7,
            })
            .collect();

        self.registry.register(provider.clone())?;
        self.store.save_provider(&provider).await?;
        self.events.publish(
            Channel::Providers,
            Event::provider_status(&provider.name, "active", provider.health_score),
        );
        Ok(())
    }

    /// Re-probe every registered provider and fold the scores in
    pub async fn verify_providers(&self) {
        let providers: Vec<Provider> = self
            .registry
            .list()
            .into_iter()
            .filter(|p| matches!(p.status, ProviderStatus::Active | ProviderStatus::Down))
            .collect();

        info!(count = providers.len(), "verification sweep started");
        for provider in providers {
            let result = self
                .validator
                .validate(&provider.base_url, provider.auth, provider.api_key.as_deref())
                .await;
            if let Ok(status) = self.registry.apply_probe(
                &provider.name,
                result.health_score,
                result.latency_ms as f64,
            ) {
                if status != provider.status {
                    info!(provider = %provider.name, from = ?provider.status, to = ?status, "verification changed status");
                    self.events.publish(
                        Channel::Providers,
                        Event::provider_status(
                            &provider.name,
                            if status == ProviderStatus::Active { "active" } else { "down" },
                            result.health_score,
                        ),
                    );
                }
            }
        }
    }

    /// Drive the scan and verification schedulers until cancelled
    ///
    /// Each tick body is bounded by its own interval so a slow pass cannot
    /// overlap the next.
    pub async fn run(&self, cancel: CancellationToken) {
        if !self.config.enabled {
            info!("discovery disabled");
            return;
        }

        let scan_interval = Duration::from_secs(self.config.scan_interval_secs);
        let verify_interval = Duration::from_secs(self.config.verify_interval_secs);
        let mut scan_ticker = tokio::time::interval(scan_interval);
        let mut verify_ticker = tokio::time::interval(verify_interval);
        scan_ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        verify_ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The immediate first ticks would race startup traffic
        scan_ticker.tick().await;
        verify_ticker.tick().await;

        info!(
            scan_interval_secs = self.config.scan_interval_secs,
            verify_interval_secs = self.config.verify_interval_secs,
            "discovery engine started"
        );
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = scan_ticker.tick() => {
                    if tokio::time::timeout(scan_interval, self.run_scan()).await.is_err() {
                        warn!("scan exceeded its interval, truncated");
                    }
                }
                _ = verify_ticker.tick() => {
                    if tokio::time::timeout(verify_interval, self.verify_providers()).await.is_err() {
                        warn!("verification exceeded its interval, truncated");
                    }
                }
            }
        }
        info!("discovery engine stopped");
    }
}
