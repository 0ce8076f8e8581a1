//! Semantic response cache
//!
//! Prompts are embedded and looked up by cosine similarity against stored
//! entries. Entries carry their own TTL; a cleanup loop sweeps expired
//! entries, and capacity overflows evict the oldest entry by creation time.

pub mod dedup;
pub mod embedding;
pub mod similarity;
pub mod types;


pub use dedup::{group_by_similarity, DedupGroup};
pub use embedding::HttpEmbeddingProvider;
pub use types::{CacheConfig, CacheEntry, CacheHit, CacheStats, EmbeddingProvider};

use crate::utils::error::{GatewayError, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use similarity::VectorIndex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    index: VectorIndex,
    stats: CacheStats,
}

/// Embedding-based response cache
pub struct SemanticCache {
    config: CacheConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    inner: Mutex<CacheInner>,
}

impl SemanticCache {
    /// Create a cache over the given embedding provider
    pub fn new(config: CacheConfig, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        let dimension = config.embedding_dimension;
        Self {
            config,
            embedder,
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                index: VectorIndex::new(dimension),
                stats: CacheStats::default(),
            }),
        }
    }

    /// Derive a 16-hex-character entry id from the prompt and insert time
    fn entry_id(prompt: &str, inserted_at: DateTime<Utc>) -> String {
        let mut hasher = Sha256::new();
        hasher.update(prompt.as_bytes());
        hasher.update(inserted_at.timestamp_nanos_opt().unwrap_or_default().to_be_bytes());
        hex::encode(hasher.finalize())[..16].to_string()
    }

    /// Look up the nearest cached response for a prompt
    ///
    /// Expired matches are deleted and count as a miss. A hit bumps the
    /// entry's counter and refreshes its last-hit time.
    pub async fn lookup(&self, prompt: &str) -> Result<Option<CacheHit>> {
        let embedding = self.embedder.generate_embedding(prompt).await?;
        let now = Utc::now();

        let mut inner = self.inner.lock();
        let Some((id, similarity)) = inner.index.nearest(&embedding, self.config.similarity_threshold)
        else {
            inner.stats.misses += 1;
            return Ok(None);
        };

        let response = match inner.entries.get_mut(&id) {
            Some(entry) if !entry.is_expired(now) => {
                entry.hit_count += 1;
                entry.last_hit = Some(now);
                entry.response.clone()
            }
            _ => {
                inner.entries.remove(&id);
                inner.index.remove(&id);
                inner.stats.expirations += 1;
                inner.stats.misses += 1;
                inner.stats.entries = inner.entries.len();
                debug!(entry = %id, "expired entry removed on lookup");
                return Ok(None);
            }
        };
        inner.stats.hits += 1;
        debug!(entry = %id, similarity, "cache hit");
        Ok(Some(CacheHit { entry_id: id, similarity, response }))
    }

    /// Store a response under its prompt embedding
    ///
    /// When the cache exceeds capacity, the oldest entry by creation time is
    /// evicted (one eviction per insert).
    pub async fn insert(
        &self,
        prompt: &str,
        response: serde_json::Value,
        ttl: Option<chrono::Duration>,
        metadata: HashMap<String, String>,
    ) -> Result<String> {
        let embedding = self.embedder.generate_embedding(prompt).await?;
        if embedding.len() != self.config.embedding_dimension {
            return Err(GatewayError::Cache(format!(
                "embedding dimension {} does not match configured {}",
                embedding.len(),
                self.config.embedding_dimension
            )));
        }

        let now = Utc::now();
        let id = Self::entry_id(prompt, now);
        let entry = CacheEntry {
            id: id.clone(),
            prompt: prompt.to_string(),
            embedding: embedding.clone(),
            response,
            metadata,
            created_at: now,
            expires_at: now + ttl.unwrap_or_else(|| self.config.default_ttl()),
            hit_count: 0,
            last_hit: None,
        };

        let mut inner = self.inner.lock();
        inner.index.insert(id.clone(), embedding)?;
        inner.entries.insert(id.clone(), entry);
        inner.stats.insertions += 1;

        if inner.entries.len() > self.config.max_entries {
            if let Some(oldest) = inner
                .entries
                .values()
                .min_by_key(|e| e.created_at)
                .map(|e| e.id.clone())
            {
                inner.entries.remove(&oldest);
                inner.index.remove(&oldest);
                inner.stats.evictions += 1;
                debug!(entry = %oldest, "evicted oldest entry");
            }
        }
        inner.stats.entries = inner.entries.len();
        Ok(id)
    }

    /// Delete every entry whose similarity to `prompt` exceeds `threshold`
    pub async fn invalidate_similar(&self, prompt: &str, threshold: f32) -> Result<usize> {
        let embedding = self.embedder.generate_embedding(prompt).await?;
        let mut inner = self.inner.lock();
        let doomed = inner.index.all_above(&embedding, threshold);
        for (id, _) in &doomed {
            inner.entries.remove(id);
            inner.index.remove(id);
        }
        inner.stats.entries = inner.entries.len();
        info!(count = doomed.len(), "invalidated similar entries");
        Ok(doomed.len())
    }

    /// Remove every expired entry, returning how many were swept
    pub fn cleanup_expired(&self) -> usize {
        let now = Utc::now();
        let mut inner = self.inner.lock();
        let expired: Vec<String> = inner
            .entries
            .values()
            .filter(|e| e.is_expired(now))
            .map(|e| e.id.clone())
            .collect();
        for id in &expired {
            inner.entries.remove(id);
            inner.index.remove(id);
        }
        inner.stats.expirations += expired.len() as u64;
        inner.stats.entries = inner.entries.len();
        if !expired.is_empty() {
            debug!(count = expired.len(), "swept expired entries");
        }
        expired.len()
    }

    /// Group a batch of prompts by embedding similarity
    ///
    /// One provider call per returned group serves every member.
    pub async fn dedupe(&self, prompts: &[String], threshold: f32) -> Result<Vec<DedupGroup>> {
        let mut embeddings = Vec::with_capacity(prompts.len());
        for prompt in prompts {
            embeddings.push(self.embedder.generate_embedding(prompt).await?);
        }
        Ok(group_by_similarity(&embeddings, threshold))
    }

    /// Counter snapshot
    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats
    }

    /// Live entry count
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// True when the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Drive the expired-entry sweep until cancelled
    pub async fn run_cleanup(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.cleanup_interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        info!(
            interval_secs = self.config.cleanup_interval_secs,
            "cache cleanup loop started"
        );
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.cleanup_expired();
                }
            }
        }
        info!("cache cleanup loop stopped");
    }
}
