//! Provider health tracking
//!
//! A background loop probes every serving provider on a fixed interval,
//! folds the outcome into the registry counters, and announces status
//! changes on the event fabric.

pub mod score;

use crate::core::discovery::validator::EndpointValidator;
use crate::core::events::EventPublisher;
use crate::core::registry::ProviderRegistry;
use crate::core::types::{Channel, Event, Provider, ProviderStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Health tracker configuration
#[derive(Debug, Clone)]
pub struct HealthTrackerConfig {
    /// Interval between probe sweeps
    pub check_interval: Duration,
}

impl Default for HealthTrackerConfig {
    fn default() -> Self {
        Self { check_interval: Duration::from_secs(300) }
    }
}

/// Periodic health prober for registered providers
pub struct HealthTracker {
    config: HealthTrackerConfig,
    registry: Arc<ProviderRegistry>,
    validator: Arc<EndpointValidator>,
    events: EventPublisher,
}

impl HealthTracker {
    /// Create a tracker
    pub fn new(
        config: HealthTrackerConfig,
        registry: Arc<ProviderRegistry>,
        validator: Arc<EndpointValidator>,
        events: EventPublisher,
    ) -> Self {
        Self { config, registry, validator, events }
    }

    /// Probe one provider and apply the outcome
    pub async fn check_provider(&self, provider: &Provider) {
        let result = self
            .validator
            .validate(&provider.base_url, provider.auth, provider.api_key.as_deref())
            .await;

        let previous_status = provider.status;
        let new_status = match self.registry.apply_probe(
            &provider.name,
            result.health_score,
            result.latency_ms as f64,
        ) {
            Ok(status) => status,
            // Unregistered mid-probe
            Err(_) => return,
        };

        if !result.reachable {
            self.registry.record_error(&provider.name);
        }

        debug!(
            provider = %provider.name,
            score = result.health_score,
            latency_ms = result.latency_ms,
            "health probe complete"
        );

        if new_status != previous_status {
            info!(provider = %provider.name, from = ?previous_status, to = ?new_status, "provider status changed");
        }
        self.events.publish(
            Channel::Providers,
            Event::provider_status(
                &provider.name,
                match new_status {
                    ProviderStatus::Active => "active",
                    ProviderStatus::Deprecated => "deprecated",
                    ProviderStatus::Down => "down",
                    ProviderStatus::Maintenance => "maintenance",
                },
                result.health_score,
            ),
        );
    }

    /// One probe sweep over every provider that is serving or recovering
    pub async fn check_all(&self) {
        let targets: Vec<Provider> = self
            .registry
            .list()
            .into_iter()
            .filter(|p| matches!(p.status, ProviderStatus::Active | ProviderStatus::Down))
            .collect();

        debug!(count = targets.len(), "starting health sweep");
        let checks = targets.iter().map(|provider| self.check_provider(provider));
        futures::future::join_all(checks).await;
    }

    /// Drive the probe loop until cancelled
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.check_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(interval_secs = self.config.check_interval.as_secs(), "health tracker started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    // Bound the sweep so a slow tick cannot overlap the next
                    let sweep = tokio::time::timeout(self.config.check_interval, self.check_all());
                    if sweep.await.is_err() {
                        tracing::warn!("health sweep exceeded its interval, truncated");
                    }
                }
            }
        }
        info!("health tracker stopped");
    }
}
