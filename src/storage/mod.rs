//! Storage collaborator interface
//!
//! The core treats persistence as a table-oriented CRUD interface with a
//! filtered-query idiom; concrete databases live behind the `Store` trait.
//! An in-memory implementation ships with the crate.

pub mod memory;

pub use memory::MemoryStore;

use crate::core::types::{Provider, RequestLog};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Filter for request-log queries
#[derive(Debug, Clone, Default)]
pub struct LogQuery {
    /// Only logs at or after this instant
    pub since: Option<DateTime<Utc>>,
    /// Only logs at or before this instant
    pub until: Option<DateTime<Utc>>,
    /// Only logs for this provider
    pub provider: Option<String>,
    /// Only logs for this user
    pub user_id: Option<String>,
    /// Only successful requests
    pub success_only: bool,
    /// Keep at most this many rows, newest first
    pub limit: Option<usize>,
}

impl LogQuery {
    /// Logs since `since`, newest first, capped at `limit`
    pub fn recent(since: DateTime<Utc>, limit: usize) -> Self {
        Self { since: Some(since), limit: Some(limit), ..Default::default() }
    }

    fn matches(&self, log: &RequestLog) -> bool {
        if let Some(since) = self.since {
            if log.timestamp < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if log.timestamp > until {
                return false;
            }
        }
        if let Some(provider) = &self.provider {
            if &log.provider != provider {
                return false;
            }
        }
        if let Some(user_id) = &self.user_id {
            if log.user_id.as_ref() != Some(user_id) {
                return false;
            }
        }
        if self.success_only && !log.success {
            return false;
        }
        true
    }
}

/// Table-oriented persistence boundary
#[async_trait]
pub trait Store: Send + Sync {
    /// Upsert a provider row (models and rate limits ride along)
    async fn save_provider(&self, provider: &Provider) -> Result<()>;

    /// Delete a provider row, cascading to its models and rate limits
    async fn delete_provider(&self, name: &str) -> Result<()>;

    /// Load every provider row
    async fn load_providers(&self) -> Result<Vec<Provider>>;

    /// Append one immutable request log row
    async fn append_log(&self, log: RequestLog) -> Result<()>;

    /// Query request logs, newest first
    async fn query_logs(&self, query: LogQuery) -> Result<Vec<RequestLog>>;
}
