//! Discovery pipeline records

use crate::core::types::{AuthMode, Capabilities, Compatibility};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A prospective provider surfaced by a discovery source
///
/// Lives until it is persisted as a Provider or dropped by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Proposed provider name
    pub name: String,
    /// Endpoint base URL
    pub base_url: String,
    /// Suspected authentication mode
    pub auth: AuthMode,
    /// Source tag (`github`, `scraper:<list>`)
    pub source: String,
    /// Repository the candidate was harvested from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
    /// Repository description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Repository stars
    pub stars: u32,
    /// Primary repository language
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Last repository update
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
    /// Model names mentioned alongside the endpoint
    #[serde(default)]
    pub models: Vec<String>,
}

impl Candidate {
    /// Minimal candidate for a bare endpoint
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            auth: AuthMode::None,
            source: source.into(),
            repo_url: None,
            description: None,
            stars: 0,
            language: None,
            last_update: None,
            models: Vec::new(),
        }
    }
}

/// Outcome of validating one endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Endpoint exists and responded
    pub reachable: bool,
    /// Health score per the probe scoring rules
    pub health_score: f64,
    /// Connectivity probe latency
    pub latency_ms: u64,
    /// Observed capability flags
    pub capabilities: Capabilities,
    /// Probe error, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Detected wire compatibility
    pub compatibility: Compatibility,
    /// Model ids enumerated from the endpoint
    #[serde(default)]
    pub models: Vec<String>,
}

/// Summary of one discovery scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    /// Candidates produced by all sources
    pub found: usize,
    /// Candidates left after URL dedup
    pub deduped: usize,
    /// Candidates dropped because their URL was already registered
    pub skipped_existing: usize,
    /// Candidates that went through validation
    pub validated: usize,
    /// Candidates persisted as providers
    pub saved: usize,
    /// Errors encountered along the way
    #[serde(default)]
    pub errors: Vec<String>,
    /// Scan start
    pub started_at: DateTime<Utc>,
    /// Scan end
    pub finished_at: DateTime<Utc>,
}

impl Default for ScanReport {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            found: 0,
            deduped: 0,
            skipped_existing: 0,
            validated: 0,
            saved: 0,
            errors: Vec::new(),
            started_at: now,
            finished_at: now,
        }
    }
}
