//! Admission control
//!
//! Token buckets per (provider, limit kind), refilled continuously from the
//! provider's rate-limit rows. Concurrent limits are tracked as in-flight
//! counts released by a guard.

use crate::core::types::{Provider, RateLimitKind};
use crate::utils::error::{GatewayError, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    capacity: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl Bucket {
    fn new(capacity: f64, refill_per_sec: f64) -> Self {
        Self { tokens: capacity, capacity, refill_per_sec, last_refill: Instant::now() }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }
}

#[derive(Default)]
struct LimiterState {
    buckets: HashMap<(String, RateLimitKind), Bucket>,
    inflight: HashMap<String, u64>,
}

/// Rate limiter consulted before every dispatch
#[derive(Clone, Default)]
pub struct RateLimiter {
    state: Arc<Mutex<LimiterState>>,
}

impl RateLimiter {
    /// Create a limiter
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit one request against every limit row of the provider
    ///
    /// Either all budgets are consumed or none: the check runs first over
    /// every row, then commits. The returned guard releases the concurrent
    /// slot when dropped.
    pub fn admit(&self, provider: &Provider, estimated_tokens: u32) -> Result<AdmissionGuard> {
        let mut state = self.state.lock();
        let now = Instant::now();

        let mut has_concurrent_limit = false;
        for limit in &provider.rate_limits {
            if limit.kind == RateLimitKind::Concurrent {
                has_concurrent_limit = true;
                let inflight = state.inflight.get(&provider.name).copied().unwrap_or(0);
                if inflight >= limit.value {
                    return Err(GatewayError::RateLimitExceeded(format!(
                        "{}: {} concurrent requests in flight",
                        provider.name, inflight
                    )));
                }
                continue;
            }

            let cost = if limit.kind.counts_tokens() { estimated_tokens.max(1) as f64 } else { 1.0 };
            let key = (provider.name.clone(), limit.kind);
            let bucket = state.buckets.entry(key).or_insert_with(|| {
                Bucket::new(limit.value as f64, limit.value as f64 / limit.reset_interval_secs.max(1) as f64)
            });
            bucket.refill(now);
            if bucket.tokens < cost {
                return Err(GatewayError::RateLimitExceeded(format!(
                    "{}: {:?} budget exhausted",
                    provider.name, limit.kind
                )));
            }
        }

        // All checks passed; commit
        for limit in &provider.rate_limits {
            if limit.kind == RateLimitKind::Concurrent {
                continue;
            }
            let cost = if limit.kind.counts_tokens() { estimated_tokens.max(1) as f64 } else { 1.0 };
            if let Some(bucket) = state.buckets.get_mut(&(provider.name.clone(), limit.kind)) {
                bucket.tokens -= cost;
            }
        }
        if has_concurrent_limit {
            *state.inflight.entry(provider.name.clone()).or_insert(0) += 1;
        }

        Ok(AdmissionGuard {
            state: self.state.clone(),
            provider: provider.name.clone(),
            holds_slot: has_concurrent_limit,
        })
    }
}

/// Releases a concurrent slot when the request finishes
pub struct AdmissionGuard {
    state: Arc<Mutex<LimiterState>>,
    provider: String,
    holds_slot: bool,
}

impl Drop for AdmissionGuard {
    fn drop(&mut self) {
        if self.holds_slot {
            let mut state = self.state.lock();
            if let Some(count) = state.inflight.get_mut(&self.provider) {
                *count = count.saturating_sub(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Compatibility, RateLimit};

    fn provider_with_limits(limits: Vec<RateLimit>) -> Provider {
        let mut provider = Provider::new("limited", "https://l", Compatibility::Openai);
        provider.rate_limits = limits;
        provider
    }

    #[test]
    fn test_unlimited_provider_always_admits() {
        let limiter = RateLimiter::new();
        let provider = provider_with_limits(Vec::new());
        for _ in 0..100 {
            assert!(limiter.admit(&provider, 1000).is_ok());
        }
    }

    #[test]
    fn test_rpm_bucket_exhausts() {
        let limiter = RateLimiter::new();
        let provider = provider_with_limits(vec![RateLimit {
            kind: RateLimitKind::Rpm,
            value: 3,
            reset_interval_secs: 60,
        }]);

        for _ in 0..3 {
            assert!(limiter.admit(&provider, 10).is_ok());
        }
        assert!(matches!(
            limiter.admit(&provider, 10),
            Err(GatewayError::RateLimitExceeded(_))
        ));
    }

    #[test]
    fn test_token_bucket_charges_estimated_tokens() {
        let limiter = RateLimiter::new();
        let provider = provider_with_limits(vec![RateLimit {
            kind: RateLimitKind::Tpm,
            value: 1000,
            reset_interval_secs: 60,
        }]);

        assert!(limiter.admit(&provider, 900).is_ok());
        assert!(limiter.admit(&provider, 900).is_err(), "second request exceeds token budget");
        assert!(limiter.admit(&provider, 50).is_ok(), "small request still fits");
    }

    #[test]
    fn test_concurrent_slots_release_on_drop() {
        let limiter = RateLimiter::new();
        let provider = provider_with_limits(vec![RateLimit {
            kind: RateLimitKind::Concurrent,
            value: 2,
            reset_interval_secs: 1,
        }]);

        let first = limiter.admit(&provider, 1).unwrap();
        let _second = limiter.admit(&provider, 1).unwrap();
        assert!(limiter.admit(&provider, 1).is_err(), "both slots taken");

        drop(first);
        assert!(limiter.admit(&provider, 1).is_ok(), "slot freed on drop");
    }

    #[test]
    fn test_failed_admission_consumes_nothing() {
        let limiter = RateLimiter::new();
        let provider = provider_with_limits(vec![
            RateLimit { kind: RateLimitKind::Rpm, value: 10, reset_interval_secs: 60 },
            RateLimit { kind: RateLimitKind::Tpm, value: 100, reset_interval_secs: 60 },
        ]);

        // Token budget blocks this request; the rpm budget must stay intact
        assert!(limiter.admit(&provider, 500).is_err());
        for _ in 0..10 {
            assert!(limiter.admit(&provider, 5).is_ok());
        }
    }
}
