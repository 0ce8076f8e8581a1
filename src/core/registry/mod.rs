//! Provider registry
//!
//! Single owner of provider records and their health counters. One
//! reader-writer lock protects the name map; reads run in parallel, writes
//! are serialized and brief.


use crate::core::types::{Provider, ProviderStatus};
use crate::utils::error::{GatewayError, Result};
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Registry of upstream providers
#[derive(Default)]
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, Provider>>,
}

impl ProviderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider; duplicate names are rejected
    ///
    /// Assigns a fresh identity and stamps `discovered_at`. Deleting and
    /// re-registering is the only way to change capability flags.
    pub fn register(&self, mut provider: Provider) -> Result<()> {
        let mut providers = self.providers.write();
        if providers.contains_key(&provider.name) {
            return Err(GatewayError::InvalidRequest(format!(
                "provider {} is already registered",
                provider.name
            )));
        }
        provider.id = Uuid::new_v4();
        provider.discovered_at = Utc::now();
        info!(provider = %provider.name, source = %provider.source, "registered provider");
        providers.insert(provider.name.clone(), provider);
        Ok(())
    }

    /// Remove a provider and, with it, its models and rate limits
    pub fn unregister(&self, name: &str) -> Result<()> {
        let removed = self.providers.write().remove(name);
        match removed {
            Some(_) => {
                info!(provider = %name, "unregistered provider");
                Ok(())
            }
            None => Err(GatewayError::ModelNotFound(format!("provider {} is not registered", name))),
        }
    }

    /// Look up a provider by name
    pub fn get(&self, name: &str) -> Option<Provider> {
        self.providers.read().get(name).cloned()
    }

    /// Snapshot of every registered provider
    pub fn list(&self) -> Vec<Provider> {
        let mut providers: Vec<Provider> = self.providers.read().values().cloned().collect();
        providers.sort_by(|a, b| a.name.cmp(&b.name));
        providers
    }

    /// Snapshot of providers currently able to serve traffic
    pub fn list_active(&self) -> Vec<Provider> {
        let now = Utc::now();
        let mut providers: Vec<Provider> = self
            .providers
            .read()
            .values()
            .filter(|p| p.is_available_at(now))
            .cloned()
            .collect();
        providers.sort_by(|a, b| a.name.cmp(&b.name));
        providers
    }

    /// True when a base URL is already registered under any name
    pub fn has_base_url(&self, base_url: &str) -> bool {
        let normalized = base_url.trim_end_matches('/');
        self.providers
            .read()
            .values()
            .any(|p| p.base_url.trim_end_matches('/') == normalized)
    }

    /// Set a provider's lifecycle status
    pub fn set_status(&self, name: &str, status: ProviderStatus) -> Result<()> {
        let mut providers = self.providers.write();
        let provider = providers
            .get_mut(name)
            .ok_or_else(|| GatewayError::ModelNotFound(format!("provider {} is not registered", name)))?;
        debug!(provider = %name, status = ?status, "status changed");
        provider.status = status;
        Ok(())
    }

    /// Record a successful request with its observed latency
    pub fn record_success(&self, name: &str, latency_ms: f64) {
        let mut providers = self.providers.write();
        if let Some(provider) = providers.get_mut(name) {
            provider.success_count += 1;
            provider.consecutive_failures = 0;
            provider.blend_latency(latency_ms);
        }
    }

    /// Record a failed request
    pub fn record_error(&self, name: &str) {
        let mut providers = self.providers.write();
        if let Some(provider) = providers.get_mut(name) {
            provider.error_count += 1;
            provider.consecutive_failures += 1;
        }
    }

    /// Apply a health probe outcome to a provider
    ///
    /// Status flips around the 0.3 score boundary; the probe time feeds
    /// the availability freshness window.
    pub fn apply_probe(&self, name: &str, score: f64, latency_ms: f64) -> Result<ProviderStatus> {
        let mut providers = self.providers.write();
        let provider = providers
            .get_mut(name)
            .ok_or_else(|| GatewayError::ModelNotFound(format!("provider {} is not registered", name)))?;
        provider.apply_probe(score, latency_ms, Utc::now());
        Ok(provider.status)
    }

    /// Fan out `probe` over every active provider, collecting per-name errors
    pub async fn health_check_all<F, Fut>(&self, probe: F) -> Vec<(String, Option<GatewayError>)>
    where
        F: Fn(Provider) -> Fut,
        Fut: std::future::Future<Output = Result<()>>,
    {
        let targets: Vec<Provider> = self
            .providers
            .read()
            .values()
            .filter(|p| p.status == ProviderStatus::Active || p.status == ProviderStatus::Down)
            .cloned()
            .collect();

        let mut results = Vec::with_capacity(targets.len());
        let checks = targets.into_iter().map(|provider| {
            let name = provider.name.clone();
            let fut = probe(provider);
            async move { (name, fut.await.err()) }
        });
        for result in futures::future::join_all(checks).await {
            if let Some(error) = &result.1 {
                warn!(provider = %result.0, error = %error, "health check failed");
            }
            results.push(result);
        }
        results
    }

    /// Number of registered providers
    pub fn len(&self) -> usize {
        self.providers.read().len()
    }

    /// True when the registry is empty
    pub fn is_empty(&self) -> bool {
        self.providers.read().is_empty()
    }
}
