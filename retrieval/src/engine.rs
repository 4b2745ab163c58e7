//! Search service: seeds the semantic index from the verse service and
//! answers queries against it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use logos_embeddings::{
    EmbeddingProvider, IndexRequest, InsertOutcome, SearchResult, SemanticIndex, VerseMetadata,
};
use logos_verses::{Verse, VerseClient, VersePassage};

use crate::config::RetrievalConfig;
use crate::error::{Result, RetrievalError};

/// Body of a search call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,

    /// Overrides the configured similarity floor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f32>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            limit: None,
            threshold: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = Some(threshold);
        self
    }
}

/// Answer to a search call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SearchResult>,
    pub count: usize,
}

/// Readiness of the index for front-ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub stored: usize,

    /// `true` once at least one passage is stored.
    pub ready: bool,
}

/// Summary of a seeding run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitSummary {
    pub message: String,
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub total_stored: usize,
}

/// Service that owns the semantic index for the lifetime of the process.
///
/// Construct once at startup and share behind an `Arc`; all methods take
/// `&self`.
pub struct SearchService {
    config: RetrievalConfig,
    index: Arc<SemanticIndex>,
    verses: VerseClient,
}

impl SearchService {
    /// Create a new service builder.
    pub fn builder() -> SearchServiceBuilder {
        SearchServiceBuilder::new()
    }

    /// Build a service backed by the OpenAI provider described in `config`.
    pub fn new(config: RetrievalConfig) -> Result<Self> {
        Self::builder().with_config(config).build()
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Shared handle to the underlying index.
    pub fn index(&self) -> &Arc<SemanticIndex> {
        &self.index
    }

    /// Run a semantic query.
    pub async fn search(&self, request: SearchRequest) -> Result<SearchResponse> {
        if request.query.trim().is_empty() {
            return Err(RetrievalError::Validation("Query is required".to_string()));
        }

        let limit = request.limit.unwrap_or(self.config.search.default_limit);
        let threshold = request.threshold.unwrap_or(self.config.search.threshold);
        debug!("Searching for {:?} (limit {limit}, threshold {threshold})", request.query);

        let results = self
            .index
            .search(&request.query, limit, threshold)
            .await
            .map_err(|err| match err {
                err if err.is_validation() => RetrievalError::Validation(err.to_string()),
                err => RetrievalError::Embedding(err),
            })?;

        Ok(SearchResponse {
            query: request.query,
            count: results.len(),
            results,
        })
    }

    /// Index size and readiness.
    pub async fn status(&self) -> StatusResponse {
        let stored = self.index.count().await;
        StatusResponse {
            stored,
            ready: stored > 0,
        }
    }

    /// Look up a passage by reference.
    pub async fn lookup(&self, reference: &str) -> Result<VersePassage> {
        Ok(self.verses.get_verse(reference).await?)
    }

    /// Embed and store the given verses, one outcome per verse.
    pub async fn ingest(&self, verses: Vec<Verse>) -> Vec<InsertOutcome> {
        let requests = verses.into_iter().map(verse_request).collect();
        self.index.batch_insert(requests).await
    }

    /// Fetch sample verses and embed them.
    ///
    /// Fails with [`RetrievalError::NoSampleData`] when the verse service
    /// yields nothing; per-verse embedding failures are counted, not raised.
    pub async fn initialize_embeddings(&self) -> Result<InitSummary> {
        info!("Initializing vector embeddings");

        let sample = self
            .verses
            .sample_verses(
                self.config.verses.sample_books,
                self.config.verses.verses_per_chapter,
            )
            .await;

        if sample.is_empty() {
            warn!("Verse service returned no sample verses");
            return Err(RetrievalError::NoSampleData);
        }

        let outcomes = self.ingest(sample).await;
        let successful = outcomes.iter().filter(|o| o.is_success()).count();
        let summary = InitSummary {
            message: "Embeddings initialized successfully".to_string(),
            processed: outcomes.len(),
            successful,
            failed: outcomes.len() - successful,
            total_stored: self.index.count().await,
        };

        info!(
            "Embedded {}/{} verses, {} stored in total",
            summary.successful, summary.processed, summary.total_stored
        );
        Ok(summary)
    }
}

fn verse_request(verse: Verse) -> IndexRequest {
    let mut metadata = VerseMetadata::verse(verse.book_name.clone(), verse.chapter, verse.verse)
        .with_reference(verse.reference());
    if let Some(book_id) = verse.book_id {
        metadata = metadata.with_extra("book_id", book_id);
    }
    IndexRequest::new(verse.text.trim(), metadata)
}

/// Builder for [`SearchService`].
pub struct SearchServiceBuilder {
    config: RetrievalConfig,
    provider: Option<Arc<dyn EmbeddingProvider>>,
    verses: Option<VerseClient>,
}

impl SearchServiceBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: RetrievalConfig::default(),
            provider: None,
            verses: None,
        }
    }

    pub fn with_config(mut self, config: RetrievalConfig) -> Self {
        self.config = config;
        self
    }

    /// Use `provider` instead of the configured OpenAI provider.
    pub fn with_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Use `client` instead of one built from the verse config.
    pub fn with_verse_client(mut self, client: VerseClient) -> Self {
        self.verses = Some(client);
        self
    }

    /// Build the service.
    pub fn build(self) -> Result<SearchService> {
        self.config.validate()?;

        let provider = match self.provider {
            Some(provider) => provider,
            None => {
                let provider = self.config.embedding.build_provider();
                if !provider.is_available() {
                    warn!("No OpenAI API key configured; embedding calls will fail");
                }
                Arc::new(provider)
            }
        };

        let mut index =
            SemanticIndex::new(provider).with_strict_ids(self.config.search.strict_ids);
        if let Some(dims) = self.config.embedding.dimensions {
            index = index.with_dimension(dims);
        }

        let verses = self
            .verses
            .unwrap_or_else(|| self.config.verses.build_client());

        info!("Search service ready");
        Ok(SearchService {
            config: self.config,
            index: Arc::new(index),
            verses,
        })
    }
}

impl Default for SearchServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}
