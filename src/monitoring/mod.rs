//! Periodic statistics aggregation
//!
//! On a timer, per-provider windows are aggregated from request logs and
//! re-broadcast on the `stats` channel.

use crate::core::events::EventPublisher;
use crate::core::registry::ProviderRegistry;
use crate::core::types::{Channel, Event, EventType, ProviderStats};
use crate::storage::{LogQuery, Store};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Window width aggregated into each snapshot, in hours
const STATS_WINDOW_HOURS: i64 = 1;

/// Aggregates and re-broadcasts provider statistics on an interval
pub struct StatsBroadcaster {
    interval: Duration,
    registry: Arc<ProviderRegistry>,
    store: Arc<dyn Store>,
    events: EventPublisher,
}

impl StatsBroadcaster {
    /// Create a broadcaster
    pub fn new(
        interval: Duration,
        registry: Arc<ProviderRegistry>,
        store: Arc<dyn Store>,
        events: EventPublisher,
    ) -> Self {
        Self { interval, registry, store, events }
    }

    /// Aggregate one snapshot across every registered provider
    pub async fn snapshot(&self) -> Vec<ProviderStats> {
        let window_end = Utc::now();
        let window_start = window_end - chrono::Duration::hours(STATS_WINDOW_HOURS);
        let logs = match self
            .store
            .query_logs(LogQuery { since: Some(window_start), ..Default::default() })
            .await
        {
            Ok(logs) => logs,
            Err(error) => {
                warn!(%error, "stats log query failed");
                return Vec::new();
            }
        };

        self.registry
            .list()
            .iter()
            .map(|provider| ProviderStats::from_logs(&provider.name, &logs, window_start, window_end))
            .filter(|stats| stats.total_requests > 0)
            .collect()
    }

    /// Drive the broadcast loop until cancelled
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        info!(interval_secs = self.interval.as_secs(), "stats broadcaster started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let snapshot = self.snapshot().await;
                    if snapshot.is_empty() {
                        continue;
                    }
                    match serde_json::to_value(&snapshot) {
                        Ok(data) => self.events.publish(
                            Channel::Stats,
                            Event::new(EventType::StatsUpdate, data),
                        ),
                        Err(error) => warn!(%error, "stats serialization failed"),
                    }
                }
            }
        }
        info!("stats broadcaster stopped");
    }
}
