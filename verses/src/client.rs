//! HTTP client for the reference-text service.

use std::num::NonZeroUsize;
use std::time::Duration;

use lru::LruCache;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::books::BOOKS;
use crate::error::{Result, VerseError};

/// Public endpoint used when no base URL is configured.
pub const DEFAULT_BASE_URL: &str = "https://bible-api.com";

/// Translation reported when the service omits one.
pub const DEFAULT_TRANSLATION: &str = "World English Bible";

/// Default number of passages kept in the lookup cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 512;

/// One verse within a passage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub book_id: Option<String>,
    pub book_name: String,
    pub chapter: u32,
    pub verse: u32,
    pub text: String,
}

impl Verse {
    /// Reference in `Book C:V` form.
    pub fn reference(&self) -> String {
        format!("{} {}:{}", self.book_name, self.chapter, self.verse)
    }
}

/// A resolved reference: one verse, a range, or a whole chapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersePassage {
    pub reference: String,
    pub text: String,
    pub translation: String,
    pub verses: Vec<Verse>,
}

/// Wire format of the service.
#[derive(Debug, Deserialize)]
struct PassageResponse {
    reference: String,
    text: String,
    translation_name: Option<String>,
    #[serde(default)]
    verses: Vec<Verse>,
}

impl From<PassageResponse> for VersePassage {
    fn from(response: PassageResponse) -> Self {
        Self {
            reference: response.reference,
            text: response.text.trim().to_string(),
            translation: response
                .translation_name
                .unwrap_or_else(|| DEFAULT_TRANSLATION.to_string()),
            verses: response.verses,
        }
    }
}

/// Client for looking up passages, with a bounded LRU cache of successes.
pub struct VerseClient {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
    cache: Mutex<LruCache<String, VersePassage>>,
}

impl VerseClient {
    /// Create a client for [`DEFAULT_BASE_URL`].
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(15),
            cache: Mutex::new(LruCache::new(cache_capacity(DEFAULT_CACHE_CAPACITY))),
        }
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the number of cached passages. Zero is treated as one.
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache = Mutex::new(LruCache::new(cache_capacity(capacity)));
        self
    }

    /// Number of passages currently cached.
    pub async fn cached(&self) -> usize {
        self.cache.lock().await.len()
    }

    /// Resolve `reference` (e.g. `John 3:16`, `Psalms 23`).
    pub async fn get_verse(&self, reference: &str) -> Result<VersePassage> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(VerseError::EmptyReference);
        }

        if let Some(passage) = self.cache.lock().await.get(reference) {
            debug!("Cache hit for {reference}");
            return Ok(passage.clone());
        }

        let passage = self.fetch(reference).await?;
        self.cache
            .lock()
            .await
            .put(reference.to_string(), passage.clone());

        Ok(passage)
    }

    async fn fetch(&self, reference: &str) -> Result<VersePassage> {
        let url = format!("{}/{}", self.base_url, urlencoding::encode(reference));
        debug!("Fetching {url}");

        let upstream = |message: String| VerseError::Upstream {
            reference: reference.to_string(),
            message,
        };

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| upstream(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(VerseError::NotFound(reference.to_string()));
        }
        if !status.is_success() {
            warn!("Verse lookup for {reference} failed with status {status}");
            return Err(upstream(format!("status {status}")));
        }

        let body: PassageResponse = response
            .json()
            .await
            .map_err(|e| upstream(e.to_string()))?;

        Ok(body.into())
    }

    /// Resolve a whole chapter.
    pub async fn get_chapter(&self, book: &str, chapter: u32) -> Result<VersePassage> {
        self.get_verse(&format!("{book} {chapter}")).await
    }

    /// Collect the first `verses_per_chapter` verses of chapter 1 for each of
    /// the first `book_count` books.
    ///
    /// Books that fail to load are logged and skipped, so the result may be
    /// empty.
    pub async fn sample_verses(&self, book_count: usize, verses_per_chapter: usize) -> Vec<Verse> {
        let mut verses = Vec::new();

        for book in BOOKS.iter().take(book_count) {
            match self.get_chapter(book, 1).await {
                Ok(chapter) => {
                    verses.extend(chapter.verses.into_iter().take(verses_per_chapter));
                }
                Err(err) => warn!("Skipping sample verses from {book}: {err}"),
            }
        }

        info!("Collected {} sample verses", verses.len());
        verses
    }
}

impl Default for VerseClient {
    fn default() -> Self {
        Self::new()
    }
}

fn cache_capacity(capacity: usize) -> NonZeroUsize {
    NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)
}
