//! Configuration for the search service.
//!
//! Values come from an optional TOML file, then environment variables
//! (a `.env` file is honoured), then validation.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use logos_embeddings::{DEFAULT_LIMIT, DEFAULT_THRESHOLD, OpenAIProvider};
use logos_verses::VerseClient;
use logos_verses::client::{DEFAULT_BASE_URL, DEFAULT_CACHE_CAPACITY};

use crate::error::{Result, RetrievalError};

/// Configuration for the search service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Embedding provider configuration.
    pub embedding: EmbeddingConfig,

    /// Query defaults.
    pub search: SearchConfig,

    /// Verse lookup and seeding.
    pub verses: VerseConfig,
}

impl RetrievalConfig {
    /// Load configuration from `path` (if given) and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        // A missing .env file is fine.
        let _ = dotenvy::dotenv();

        let mut config = match path {
            Some(path) => {
                debug!("Loading config from {}", path.display());
                let content = std::fs::read_to_string(path)?;
                toml::from_str(&content)?
            }
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay environment values fetched through `lookup`.
    ///
    /// `OPENAI_API_KEY` only fills an unset key; `LOGOS_*` variables always win.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if self.embedding.api_key.is_none() {
            self.embedding.api_key = lookup("OPENAI_API_KEY");
        }
        if let Some(model) = lookup("LOGOS_EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Some(url) = lookup("LOGOS_EMBEDDING_BASE_URL") {
            self.embedding.base_url = url;
        }
        if let Some(url) = lookup("LOGOS_VERSES_BASE_URL") {
            self.verses.base_url = url;
        }
        if let Some(limit) = lookup("LOGOS_SEARCH_LIMIT") {
            self.search.default_limit = parse_env("LOGOS_SEARCH_LIMIT", &limit)?;
        }
        if let Some(threshold) = lookup("LOGOS_SEARCH_THRESHOLD") {
            self.search.threshold = parse_env("LOGOS_SEARCH_THRESHOLD", &threshold)?;
        }
        Ok(())
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.search.default_limit == 0 {
            return Err(RetrievalError::Config(
                "search.default_limit must be positive".to_string(),
            ));
        }
        if !(-1.0..=1.0).contains(&self.search.threshold) {
            return Err(RetrievalError::Config(format!(
                "search.threshold must be between -1 and 1, got {}",
                self.search.threshold
            )));
        }
        if self.embedding.timeout_secs == 0 || self.verses.timeout_secs == 0 {
            return Err(RetrievalError::Config(
                "timeouts must be at least one second".to_string(),
            ));
        }
        if self.embedding.dimensions == Some(0) {
            return Err(RetrievalError::Config(
                "embedding.dimensions must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Copy with secrets masked, for display.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.embedding.api_key.is_some() {
            config.embedding.api_key = Some("***".to_string());
        }
        config
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| RetrievalError::Config(format!("{key} has an invalid value: {value}")))
}

/// Configuration for the embedding provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Model to use for embeddings.
    pub model: String,

    /// API base URL.
    pub base_url: String,

    /// API key; falls back to `OPENAI_API_KEY`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Reduced output dimension, if the model supports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,

    /// Per-request timeout.
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            dimensions: None,
            timeout_secs: 30,
        }
    }
}

impl EmbeddingConfig {
    /// Build the OpenAI provider described by this config.
    pub fn build_provider(&self) -> OpenAIProvider {
        let mut provider = OpenAIProvider::new()
            .without_api_key()
            .with_base_url(&self.base_url)
            .with_model(&self.model)
            .with_timeout(Duration::from_secs(self.timeout_secs));
        if let Some(key) = &self.api_key {
            provider = provider.with_api_key(key);
        }
        if let Some(dims) = self.dimensions {
            provider = provider.with_dimensions(dims);
        }
        provider
    }
}

/// Configuration for query processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Results returned when the request has no limit.
    pub default_limit: usize,

    /// Minimum similarity (-1.0 to 1.0).
    pub threshold: f32,

    /// Fail batch items whose derived id repeats instead of overwriting.
    pub strict_ids: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            threshold: DEFAULT_THRESHOLD,
            strict_ids: false,
        }
    }
}

/// Configuration for the verse service and seeding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerseConfig {
    pub base_url: String,

    /// Passages kept in the lookup cache.
    pub cache_capacity: usize,

    /// Books sampled when seeding.
    pub sample_books: usize,

    /// Verses taken from chapter 1 of each sampled book.
    pub verses_per_chapter: usize,

    pub timeout_secs: u64,
}

impl Default for VerseConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            sample_books: 50,
            verses_per_chapter: 3,
            timeout_secs: 15,
        }
    }
}

impl VerseConfig {
    /// Build the verse client described by this config.
    pub fn build_client(&self) -> VerseClient {
        VerseClient::new()
            .with_base_url(&self.base_url)
            .with_cache_capacity(self.cache_capacity)
            .with_timeout(Duration::from_secs(self.timeout_secs))
    }
}
