//! In-memory store
//!
//! Backs tests and single-node deployments without an external database.
//! The log table is capped; the oldest rows fall off first.

use super::{LogQuery, Store};
use crate::core::types::{Provider, RequestLog};
use crate::utils::error::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::collections::VecDeque;

/// Maximum retained log rows
const LOG_CAPACITY: usize = 100_000;

/// Process-local store
#[derive(Default)]
pub struct MemoryStore {
    providers: RwLock<HashMap<String, Provider>>,
    logs: RwLock<VecDeque<RequestLog>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn save_provider(&self, provider: &Provider) -> Result<()> {
        self.providers.write().insert(provider.name.clone(), provider.clone());
        Ok(())
    }

    async fn delete_provider(&self, name: &str) -> Result<()> {
        self.providers.write().remove(name);
        Ok(())
    }

    async fn load_providers(&self) -> Result<Vec<Provider>> {
        Ok(self.providers.read().values().cloned().collect())
    }

    async fn append_log(&self, log: RequestLog) -> Result<()> {
        let mut logs = self.logs.write();
        if logs.len() == LOG_CAPACITY {
            logs.pop_front();
        }
        logs.push_back(log);
        Ok(())
    }

    async fn query_logs(&self, query: LogQuery) -> Result<Vec<RequestLog>> {
        let logs = self.logs.read();
        let mut matched: Vec<RequestLog> =
            logs.iter().rev().filter(|log| query.matches(log)).cloned().collect();
        if let Some(limit) = query.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }
}
