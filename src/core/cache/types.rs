//! Semantic cache types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// One cached response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// 16-hex-character identifier derived from the prompt and insert time
    pub id: String,
    /// Prompt text the embedding was produced from
    pub prompt: String,
    /// Prompt embedding
    pub embedding: Vec<f32>,
    /// Stored response, opaque to the cache
    pub response: serde_json::Value,
    /// Free-form metadata
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Insert time
    pub created_at: DateTime<Utc>,
    /// Expiry time
    pub expires_at: DateTime<Utc>,
    /// Lookup hits served from this entry
    pub hit_count: u64,
    /// Last hit time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_hit: Option<DateTime<Utc>>,
}

impl CacheEntry {
    /// True once the entry's TTL has elapsed
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Semantic cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Minimum cosine similarity for a hit
    pub similarity_threshold: f32,
    /// TTL applied when the caller does not supply one, in seconds
    pub default_ttl_secs: u64,
    /// Maximum entries before eviction
    pub max_entries: usize,
    /// Expired-entry sweep interval, in seconds
    pub cleanup_interval_secs: u64,
    /// Embedding dimensionality the index is built for
    pub embedding_dimension: usize,
}

impl CacheConfig {
    /// Default TTL as a duration
    pub fn default_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.default_ttl_secs as i64)
    }

    /// Cleanup interval as a std duration
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.9,
            default_ttl_secs: 3600,
            max_entries: 10_000,
            cleanup_interval_secs: 300,
            embedding_dimension: 1536,
        }
    }
}

/// A successful cache lookup
#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit {
    /// Entry the hit was served from
    pub entry_id: String,
    /// Cosine similarity to the query prompt
    pub similarity: f32,
    /// Cached response
    pub response: serde_json::Value,
}

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Lookups served from the cache
    pub hits: u64,
    /// Lookups that missed
    pub misses: u64,
    /// Entries written
    pub insertions: u64,
    /// Entries removed by capacity eviction
    pub evictions: u64,
    /// Entries removed by TTL expiry
    pub expirations: u64,
    /// Live entries
    pub entries: usize,
}

/// Generates prompt embeddings for the cache and the deduplicator
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one text
    async fn generate_embedding(&self, text: &str) -> crate::utils::error::Result<Vec<f32>>;

    /// Dimensionality of the produced vectors
    fn dimension(&self) -> usize;
}
