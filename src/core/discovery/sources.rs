//! Discovery sources
//!
//! Each source harvests provider candidates from one kind of external
//! corpus. Endpoint extraction is driven by a declarative rule set so new
//! sources can reuse it without touching pipeline code.

use super::types::Candidate;
use crate::core::types::AuthMode;
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use tracing::{debug, warn};
use url::Url;

/// Repositories per search term fetched from the repository search API
const REPOS_PER_TERM: usize = 10;

/// A source of provider candidates
#[async_trait]
pub trait DiscoverySource: Send + Sync {
    /// Source tag written into the candidates
    fn name(&self) -> &str;

    /// Produce candidates; failures inside one source do not abort a scan
    async fn harvest(&self) -> Result<Vec<Candidate>>;
}

/// Declarative endpoint extraction and classification rules
pub struct EndpointRules {
    endpoint_patterns: Vec<Regex>,
    markdown_link: Regex,
    model_pattern: Regex,
    allow_keywords: Vec<String>,
    deny_keywords: Vec<String>,
}

impl EndpointRules {
    /// Build the rule set with the given keyword filters
    pub fn new(allow_keywords: Vec<String>, deny_keywords: Vec<String>) -> Self {
        Self {
            endpoint_patterns: vec![
                // Versioned API paths
                Regex::new(r#"https?://[A-Za-z0-9.-]+(?::\d+)?(?:/[A-Za-z0-9._-]+)*/v\d+(?:/[A-Za-z0-9._-]+)*"#)
                    .expect("static pattern"),
                // api.-prefixed hosts
                Regex::new(r#"https?://api\.[A-Za-z0-9.-]+(?::\d+)?(?:/[A-Za-z0-9._-]+)*"#)
                    .expect("static pattern"),
                // Explicit base_url assignments
                Regex::new(r#"base_url\s*[:=]\s*["']?(https?://[^\s"'<>)]+)"#).expect("static pattern"),
            ],
            markdown_link: Regex::new(r#"\[[^\]]*\]\((https?://[^\s)]+)\)"#).expect("static pattern"),
            model_pattern: Regex::new(
                r#"(?i)\b(gpt-[0-9a-z.-]+|claude-[0-9a-z.-]+|llama-?[0-9][0-9a-z.-]*|mistral-[0-9a-z.-]+|gemini-[0-9a-z.-]+|deepseek-[0-9a-z.-]+)\b"#,
            )
            .expect("static pattern"),
            allow_keywords,
            deny_keywords,
        }
    }

    /// Default keyword filters for LLM API hunting
    pub fn default_rules() -> Self {
        Self::new(
            ["api", "llm", "gpt", "openai", "anthropic", "chat", "inference", "free"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ["deprecated", "archived", "tutorial", "example only"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
    }

    /// Extract candidate base URLs from free text
    ///
    /// Matched URLs are reduced to their base: everything before the first
    /// `/v<digit>` path segment, or the origin when none is present.
    pub fn extract_base_urls(&self, text: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut bases = Vec::new();

        let mut push = |raw: &str| {
            if let Some(base) = Self::to_base_url(raw) {
                if seen.insert(base.clone()) {
                    bases.push(base);
                }
            }
        };

        for pattern in &self.endpoint_patterns {
            for captures in pattern.captures_iter(text) {
                let raw = captures.get(1).or_else(|| captures.get(0)).map(|m| m.as_str());
                if let Some(raw) = raw {
                    push(raw);
                }
            }
        }
        for captures in self.markdown_link.captures_iter(text) {
            if let Some(raw) = captures.get(1) {
                push(raw.as_str());
            }
        }
        bases
    }

    fn to_base_url(raw: &str) -> Option<String> {
        let trimmed = raw.trim_end_matches(['.', ',', ';', ')', ']']);
        let parsed = Url::parse(trimmed).ok()?;
        if parsed.host_str().is_none() {
            return None;
        }
        // Documentation and repository hosts are never API endpoints
        let host = parsed.host_str().unwrap_or_default();
        if ["github.com", "gitlab.com", "docs.rs", "crates.io"].contains(&host) {
            return None;
        }

        static VERSION_SEGMENT: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
        let version_segment =
            VERSION_SEGMENT.get_or_init(|| Regex::new(r"/v\d+(/|$)").expect("static pattern"));
        let path = parsed.path();
        let base_path = match version_segment.find(path) {
            Some(m) => &path[..m.start()],
            None => "",
        };
        let mut base = format!("{}://{}", parsed.scheme(), host);
        if let Some(port) = parsed.port() {
            base.push_str(&format!(":{}", port));
        }
        base.push_str(base_path.trim_end_matches('/'));
        Some(base)
    }

    /// Classify the likely auth mode from documentation text
    pub fn classify_auth(&self, text: &str) -> AuthMode {
        let lower = text.to_lowercase();
        if lower.contains("no api key") || lower.contains("no auth") || lower.contains("without api key")
        {
            AuthMode::None
        } else if lower.contains("oauth") {
            AuthMode::Oauth2
        } else if lower.contains("bearer") {
            AuthMode::Bearer
        } else if lower.contains("api key") || lower.contains("api_key") || lower.contains("x-api-key") {
            AuthMode::ApiKey
        } else {
            AuthMode::None
        }
    }

    /// Extract model names mentioned in documentation text
    pub fn extract_models(&self, text: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        self.model_pattern
            .find_iter(text)
            .map(|m| m.as_str().to_lowercase())
            .filter(|name| seen.insert(name.clone()))
            .collect()
    }

    /// Allow/deny keyword gate applied before a candidate is emitted
    pub fn passes_keyword_filter(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        if self.deny_keywords.iter().any(|k| lower.contains(k.as_str())) {
            return false;
        }
        self.allow_keywords.is_empty() || self.allow_keywords.iter().any(|k| lower.contains(k.as_str()))
    }
}

/// Derive a provider name from a base URL host
pub fn name_from_base_url(base_url: &str) -> String {
    Url::parse(base_url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("api.").replace('.', "-")))
        .unwrap_or_else(|| base_url.to_string())
}

#[derive(Debug, Deserialize)]
struct RepoSearchResponse {
    #[serde(default)]
    items: Vec<RepoItem>,
}

#[derive(Debug, Deserialize)]
struct RepoItem {
    full_name: String,
    html_url: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    stargazers_count: u32,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    pushed_at: Option<DateTime<Utc>>,
}

/// Harvests candidates from repository search
///
/// Queries each search term constrained to starred, recently-updated
/// repositories, then mines the README of every hit for API endpoints.
pub struct RepoSearchSource {
    http: reqwest::Client,
    api_base: String,
    token: Option<String>,
    search_terms: Vec<String>,
    rules: EndpointRules,
}

impl RepoSearchSource {
    /// Create a source against the hosted search API
    pub fn new(token: Option<String>, search_terms: Vec<String>, rules: EndpointRules) -> Result<Self> {
        Self::with_api_base("https://api.github.com", token, search_terms, rules)
    }

    /// Create a source against an explicit API base (used by tests)
    pub fn with_api_base(
        api_base: impl Into<String>,
        token: Option<String>,
        search_terms: Vec<String>,
        rules: EndpointRules,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("llmgate-discovery/0.1")
            .build()?;
        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token,
            search_terms,
            rules,
        })
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn search_repos(&self, term: &str) -> Result<Vec<RepoItem>> {
        let cutoff = (Utc::now() - Duration::days(183)).format("%Y-%m-%d");
        let query = format!("{} stars:>10 pushed:>{}", term, cutoff);
        let url = format!(
            "{}/search/repositories?q={}&sort=stars&order=desc&per_page={}",
            self.api_base,
            urlencode(&query),
            REPOS_PER_TERM
        );
        let response = self
            .authorized(self.http.get(&url))
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?
            .error_for_status()?;
        let parsed: RepoSearchResponse = response.json().await?;
        Ok(parsed.items)
    }

    async fn fetch_readme(&self, full_name: &str) -> Result<String> {
        let url = format!("{}/repos/{}/readme", self.api_base, full_name);
        let response = self
            .authorized(self.http.get(&url))
            .header("Accept", "application/vnd.github.raw")
            .send()
            .await?
            .error_for_status()?;
        Ok(response.text().await?)
    }
}

#[async_trait]
impl DiscoverySource for RepoSearchSource {
    fn name(&self) -> &str {
        "github"
    }

    async fn harvest(&self) -> Result<Vec<Candidate>> {
        let mut candidates = Vec::new();
        let mut seen_urls = HashSet::new();

        for term in &self.search_terms {
            let repos = match self.search_repos(term).await {
                Ok(repos) => repos,
                Err(error) => {
                    warn!(term, %error, "repository search failed");
                    continue;
                }
            };

            for repo in repos {
                let readme = match self.fetch_readme(&repo.full_name).await {
                    Ok(readme) => readme,
                    Err(error) => {
                        debug!(repo = %repo.full_name, %error, "readme fetch failed");
                        continue;
                    }
                };

                let haystack = format!(
                    "{} {} {}",
                    repo.full_name,
                    repo.description.clone().unwrap_or_default(),
                    readme
                );
                if !self.rules.passes_keyword_filter(&haystack) {
                    continue;
                }

                let auth = self.rules.classify_auth(&readme);
                let models = self.rules.extract_models(&readme);
                for base_url in self.rules.extract_base_urls(&readme) {
                    if !seen_urls.insert(base_url.clone()) {
                        continue;
                    }
                    candidates.push(Candidate {
                        name: name_from_base_url(&base_url),
                        base_url,
                        auth,
                        source: self.name().to_string(),
                        repo_url: Some(repo.html_url.clone()),
                        description: repo.description.clone(),
                        stars: repo.stargazers_count,
                        language: repo.language.clone(),
                        last_update: repo.pushed_at,
                        models: models.clone(),
                    });
                }
            }
        }

        debug!(count = candidates.len(), "repository search harvest complete");
        Ok(candidates)
    }
}

/// Harvests candidates from curated "awesome" list READMEs
pub struct ListScraperSource {
    http: reqwest::Client,
    list_urls: Vec<String>,
    rules: EndpointRules,
}

impl ListScraperSource {
    /// Create a scraper over a fixed set of list URLs
    pub fn new(list_urls: Vec<String>, rules: EndpointRules) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("llmgate-discovery/0.1")
            .build()?;
        Ok(Self { http, list_urls, rules })
    }

    fn list_tag(url: &str) -> String {
        Url::parse(url)
            .ok()
            .and_then(|u| {
                u.path_segments()
                    .and_then(|segments| segments.filter(|s| !s.is_empty()).last().map(String::from))
            })
            .unwrap_or_else(|| "list".to_string())
    }
}

#[async_trait]
impl DiscoverySource for ListScraperSource {
    fn name(&self) -> &str {
        "scraper"
    }

    async fn harvest(&self) -> Result<Vec<Candidate>> {
        let mut candidates = Vec::new();
        let mut seen_urls = HashSet::new();

        for list_url in &self.list_urls {
            let text = match self.http.get(list_url).send().await.and_then(|r| r.error_for_status()) {
                Ok(response) => match response.text().await {
                    Ok(text) => text,
                    Err(error) => {
                        warn!(list = %list_url, %error, "list body read failed");
                        continue;
                    }
                },
                Err(error) => {
                    warn!(list = %list_url, %error, "list fetch failed");
                    continue;
                }
            };

            let tag = format!("scraper:{}", Self::list_tag(list_url));
            // Lines give us just enough context to keyword-filter each link
            for line in text.lines() {
                if !self.rules.passes_keyword_filter(line) {
                    continue;
                }
                let auth = self.rules.classify_auth(line);
                let models = self.rules.extract_models(line);
                for base_url in self.rules.extract_base_urls(line) {
                    if !seen_urls.insert(base_url.clone()) {
                        continue;
                    }
                    candidates.push(Candidate {
                        name: name_from_base_url(&base_url),
                        base_url,
                        auth,
                        source: tag.clone(),
                        repo_url: None,
                        description: None,
                        stars: 0,
                        language: None,
                        last_update: None,
                        models: models.clone(),
                    });
                }
            }
        }

        debug!(count = candidates.len(), "list scrape harvest complete");
        Ok(candidates)
    }
}

fn urlencode(raw: &str) -> String {
    raw.replace(' ', "+").replace(':', "%3A").replace('>', "%3E")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_versioned_endpoint() {
        let rules = EndpointRules::default_rules();
        let text = "Point your client at https://api.fastllm.io/v1/chat/completions to begin.";
        let bases = rules.extract_base_urls(text);
        assert_eq!(bases, vec!["https://api.fastllm.io"]);
    }

    #[test]
    fn test_extract_base_url_assignment() {
        let rules = EndpointRules::default_rules();
        let text = r#"base_url: "https://llm.example.net/api/v2""#;
        let bases = rules.extract_base_urls(text);
        assert_eq!(bases, vec!["https://llm.example.net/api"]);
    }

    #[test]
    fn test_extract_markdown_link() {
        let rules = EndpointRules::default_rules();
        let text = "| FastLLM | [endpoint](https://api.fast.dev/v1) | free |";
        let bases = rules.extract_base_urls(text);
        assert_eq!(bases, vec!["https://api.fast.dev"]);
    }

    #[test]
    fn test_repository_hosts_excluded() {
        let rules = EndpointRules::default_rules();
        let text = "See https://github.com/foo/bar and https://api.real.io/v1/models";
        let bases = rules.extract_base_urls(text);
        assert_eq!(bases, vec!["https://api.real.io"]);
    }

    #[test]
    fn test_duplicate_urls_collapse() {
        let rules = EndpointRules::default_rules();
        let text = "https://api.x.io/v1/models and again https://api.x.io/v1/chat/completions";
        assert_eq!(rules.extract_base_urls(text).len(), 1);
    }

    #[test]
    fn test_auth_classification() {
        let rules = EndpointRules::default_rules();
        assert_eq!(rules.classify_auth("Free to use, no API key required"), AuthMode::None);
        assert_eq!(rules.classify_auth("Pass your API key in the header"), AuthMode::ApiKey);
        assert_eq!(rules.classify_auth("Authorization: Bearer <token>"), AuthMode::Bearer);
        assert_eq!(rules.classify_auth("Sign in with OAuth to get a token"), AuthMode::Oauth2);
    }

    #[test]
    fn test_model_extraction() {
        let rules = EndpointRules::default_rules();
        let models = rules.extract_models("Supports GPT-4o, claude-3-opus-20240229 and llama-3-70b.");
        assert!(models.contains(&"gpt-4o".to_string()));
        assert!(models.contains(&"claude-3-opus-20240229".to_string()));
        assert!(models.contains(&"llama-3-70b".to_string()));
    }

    #[test]
    fn test_keyword_filter() {
        let rules = EndpointRules::default_rules();
        assert!(rules.passes_keyword_filter("A free LLM API gateway"));
        assert!(!rules.passes_keyword_filter("A deprecated free LLM API"));
        assert!(!rules.passes_keyword_filter("a knitting pattern collection"));
    }

    #[test]
    fn test_name_from_base_url() {
        assert_eq!(name_from_base_url("https://api.fastllm.io"), "fastllm-io");
        assert_eq!(name_from_base_url("https://llm.example.net"), "llm-example-net");
    }
}
