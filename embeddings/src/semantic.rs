//! Text-level semantic index: embeds passages through a provider and keeps
//! them in a shared [`SimilarityIndex`].

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::Embedding;
use crate::error::{EmbeddingError, Result};
use crate::index::{IndexedItem, SearchResult, SimilarityIndex};
use crate::metadata::VerseMetadata;
use crate::provider::{EmbeddingProvider, EmbeddingRequest};

/// Minimum similarity used when the caller has no preference.
pub const DEFAULT_THRESHOLD: f32 = 0.5;

/// Result count used when the caller has no preference.
pub const DEFAULT_LIMIT: usize = 10;

/// One passage to add through [`SemanticIndex::batch_insert`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexRequest {
    /// Explicit id; derived from the metadata when absent.
    #[serde(default)]
    pub id: Option<String>,

    pub text: String,

    #[serde(default)]
    pub metadata: VerseMetadata,
}

impl IndexRequest {
    pub fn new(text: impl Into<String>, metadata: VerseMetadata) -> Self {
        Self {
            id: None,
            text: text.into(),
            metadata,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Acknowledgement of a stored passage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertConfirmation {
    pub id: String,

    /// Whether a previous passage with the same id was overwritten.
    pub replaced: bool,
}

/// Per-item result of a batch insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertOutcome {
    pub success: bool,

    /// `None` only when no id could be derived for the item.
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InsertOutcome {
    fn stored(id: String) -> Self {
        Self {
            success: true,
            id: Some(id),
            error: None,
        }
    }

    fn failed(id: Option<String>, error: &EmbeddingError) -> Self {
        Self {
            success: false,
            id,
            error: Some(error.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }
}

/// In-memory semantic index shared between request handlers.
///
/// Provider calls run without holding the index lock; the lock is taken
/// only to publish a fully built item or to score a query.
pub struct SemanticIndex {
    provider: Arc<dyn EmbeddingProvider>,
    index: RwLock<SimilarityIndex>,
    strict_ids: bool,
}

impl SemanticIndex {
    /// Create an empty index backed by `provider`.
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            index: RwLock::new(SimilarityIndex::new()),
            strict_ids: false,
        }
    }

    /// Require every stored vector to have exactly `dimension` entries.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.index = RwLock::new(SimilarityIndex::with_dimension(dimension));
        self
    }

    /// Reject derived ids that repeat within one batch instead of
    /// overwriting the earlier item.
    pub fn with_strict_ids(mut self, strict: bool) -> Self {
        self.strict_ids = strict;
        self
    }

    /// The provider used for embedding.
    pub fn provider(&self) -> &dyn EmbeddingProvider {
        self.provider.as_ref()
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }
        let response = self.provider.embed(EmbeddingRequest::new(text)).await?;
        Ok(response.embedding)
    }

    /// Embed `text` and store it under `id`, replacing any previous entry.
    ///
    /// Nothing is stored if embedding fails.
    pub async fn insert(
        &self,
        id: impl Into<String>,
        text: impl Into<String>,
        metadata: VerseMetadata,
    ) -> Result<InsertConfirmation> {
        let id = id.into();
        let text = text.into();
        if id.trim().is_empty() {
            return Err(EmbeddingError::MissingId("id must not be empty".to_string()));
        }

        let embedding = self.embed(&text).await?;

        let item = IndexedItem {
            id: id.clone(),
            text,
            embedding,
            metadata,
        };
        let replaced = self.index.write().await.insert(item)?;

        Ok(InsertConfirmation { id, replaced })
    }

    /// Insert passages one at a time, in order.
    ///
    /// A failing item is reported in its outcome and does not stop the rest
    /// of the batch.
    pub async fn batch_insert(&self, requests: Vec<IndexRequest>) -> Vec<InsertOutcome> {
        let total = requests.len();
        let mut outcomes = Vec::with_capacity(total);
        let mut derived_seen = HashSet::new();

        for request in requests {
            let (id, derived) = match request.id {
                Some(id) => (Some(id), false),
                None => (request.metadata.derived_id(), true),
            };

            let Some(id) = id else {
                let err = EmbeddingError::MissingId(
                    "item has no id and no book/chapter/verse to derive one".to_string(),
                );
                warn!("Skipping batch item: {err}");
                outcomes.push(InsertOutcome::failed(None, &err));
                continue;
            };

            if derived && self.strict_ids && derived_seen.contains(&id) {
                let err = EmbeddingError::Validation(format!(
                    "derived id {id} collides with an earlier item in the batch"
                ));
                warn!("Skipping batch item: {err}");
                outcomes.push(InsertOutcome::failed(Some(id), &err));
                continue;
            }

            match self.insert(id.clone(), request.text, request.metadata).await {
                Ok(confirmation) => {
                    if derived {
                        derived_seen.insert(confirmation.id.clone());
                    }
                    outcomes.push(InsertOutcome::stored(confirmation.id));
                }
                Err(err) => {
                    warn!("Failed to store {id}: {err}");
                    outcomes.push(InsertOutcome::failed(Some(id), &err));
                }
            }
        }

        let stored = outcomes.iter().filter(|o| o.is_success()).count();
        info!("Batch insert finished: {stored}/{total} stored");
        outcomes
    }

    /// Find the stored passages most similar to `query`.
    ///
    /// Validation happens before the provider is called: the query must
    /// contain non-whitespace text, `limit` must be positive and `threshold`
    /// must lie in `[-1.0, 1.0]`.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<SearchResult>> {
        if query.trim().is_empty() {
            return Err(EmbeddingError::Validation("query is required".to_string()));
        }
        if limit == 0 {
            return Err(EmbeddingError::Validation(
                "limit must be a positive integer".to_string(),
            ));
        }
        if !(-1.0..=1.0).contains(&threshold) {
            return Err(EmbeddingError::Validation(format!(
                "threshold must be between -1 and 1, got {threshold}"
            )));
        }

        let query_embedding = self.embed(query).await?;

        let results = self
            .index
            .read()
            .await
            .search(&query_embedding, limit, threshold)?;

        debug!("Query matched {} passages", results.len());
        Ok(results)
    }

    /// Number of stored passages.
    pub async fn count(&self) -> usize {
        self.index.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.index.read().await.is_empty()
    }

    /// Copy of the stored item with this id.
    pub async fn get(&self, id: &str) -> Option<IndexedItem> {
        self.index.read().await.get(id).cloned()
    }

    /// All stored ids, oldest insert first.
    pub async fn ids(&self) -> Vec<String> {
        self.index
            .read()
            .await
            .ids()
            .into_iter()
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::StaticProvider;
    use pretty_assertions::assert_eq;

    fn index_with(provider: StaticProvider) -> (Arc<StaticProvider>, SemanticIndex) {
        let provider = Arc::new(provider);
        let index = SemanticIndex::new(provider.clone());
        (provider, index)
    }

    #[tokio::test]
    async fn test_insert_overwrites_same_id() {
        let (_, index) = index_with(
            StaticProvider::new(2)
                .with_vector("old", vec![1.0, 0.0])
                .with_vector("new", vec![0.0, 1.0]),
        );

        let first = index
            .insert("x", "old", VerseMetadata::verse("Genesis", 1, 1))
            .await
            .unwrap();
        assert!(!first.replaced);

        let second = index
            .insert("x", "new", VerseMetadata::verse("John", 3, 16))
            .await
            .unwrap();
        assert!(second.replaced);

        assert_eq!(index.count().await, 1);
        let stored = index.get("x").await.unwrap();
        assert_eq!(stored.text, "new");
        assert_eq!(stored.metadata.book.as_deref(), Some("John"));
    }

    #[tokio::test]
    async fn test_failed_insert_stores_nothing() {
        let (_, index) = index_with(StaticProvider::new(2).fail_on("boom"));

        let err = index
            .insert("x", "boom", VerseMetadata::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EmbeddingError::ApiRequest(_)));
        assert_eq!(index.count().await, 0);
    }

    #[tokio::test]
    async fn test_insert_rejects_empty_text_before_provider() {
        let (provider, index) = index_with(StaticProvider::new(2).with_fallback(vec![1.0, 0.0]));

        let err = index
            .insert("x", "  \n", VerseMetadata::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EmbeddingError::EmptyInput));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_search_validation_skips_provider() {
        let (provider, index) = index_with(StaticProvider::new(2).with_fallback(vec![1.0, 0.0]));

        for query in ["", "   "] {
            let err = index.search(query, 10, 0.5).await.unwrap_err();
            assert!(err.is_validation());
        }
        assert!(index.search("ok", 0, 0.5).await.unwrap_err().is_validation());
        assert!(index.search("ok", 5, 1.5).await.unwrap_err().is_validation());
        assert!(index.search("ok", 5, f32::NAN).await.unwrap_err().is_validation());

        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_index_search() {
        let (_, index) = index_with(StaticProvider::new(2).with_fallback(vec![1.0, 0.0]));

        assert_eq!(index.count().await, 0);
        assert!(index.is_empty().await);
        let results = index.search("anything", 10, DEFAULT_THRESHOLD).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_batch_partial_failure() {
        let (_, index) = index_with(
            StaticProvider::new(2)
                .with_fallback(vec![1.0, 0.0])
                .fail_on("second"),
        );

        let requests = ["first", "second", "third", "fourth", "fifth"]
            .iter()
            .enumerate()
            .map(|(i, text)| {
                IndexRequest::new(*text, VerseMetadata::verse("Psalms", 23, i as u32 + 1))
            })
            .collect();

        let outcomes = index.batch_insert(requests).await;

        assert_eq!(outcomes.len(), 5);
        assert_eq!(outcomes.iter().filter(|o| o.is_success()).count(), 4);
        let failed: Vec<&InsertOutcome> = outcomes.iter().filter(|o| !o.is_success()).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].id.as_deref(), Some("Psalms_23_2"));
        assert!(failed[0].error.is_some());

        assert_eq!(index.count().await, 4);
        assert_eq!(
            index.ids().await,
            vec!["Psalms_23_1", "Psalms_23_3", "Psalms_23_4", "Psalms_23_5"]
        );
    }

    #[tokio::test]
    async fn test_batch_derived_ids_overwrite() {
        let (_, index) = index_with(StaticProvider::new(2).with_fallback(vec![1.0, 0.0]));
        let verse = VerseMetadata::verse("John", 3, 16);

        let outcomes = index
            .batch_insert(vec![
                IndexRequest::new("For God so loved the world", verse.clone()),
                IndexRequest::new("For God so loved the world, that he gave", verse),
            ])
            .await;

        assert!(outcomes.iter().all(InsertOutcome::is_success));
        assert_eq!(index.count().await, 1);
        assert_eq!(
            index.get("John_3_16").await.map(|i| i.text),
            Some("For God so loved the world, that he gave".to_string())
        );
    }

    #[tokio::test]
    async fn test_batch_strict_ids_reports_collision() {
        let provider = Arc::new(StaticProvider::new(2).with_fallback(vec![1.0, 0.0]));
        let index = SemanticIndex::new(provider).with_strict_ids(true);
        let verse = VerseMetadata::verse("John", 3, 16);

        let outcomes = index
            .batch_insert(vec![
                IndexRequest::new("first", verse.clone()),
                IndexRequest::new("second", verse),
                IndexRequest::new("no id", VerseMetadata::default()),
            ])
            .await;

        assert!(outcomes[0].is_success());
        assert!(!outcomes[1].is_success());
        assert_eq!(outcomes[1].id.as_deref(), Some("John_3_16"));
        assert!(!outcomes[2].is_success());
        assert_eq!(outcomes[2].id, None);
        assert_eq!(index.get("John_3_16").await.map(|i| i.text), Some("first".to_string()));
    }

    #[tokio::test]
    async fn test_batch_strict_ids_failed_item_frees_id() {
        let provider = Arc::new(
            StaticProvider::new(2)
                .with_fallback(vec![1.0, 0.0])
                .fail_on("transient"),
        );
        let index = SemanticIndex::new(provider).with_strict_ids(true);
        let verse = VerseMetadata::verse("John", 3, 16);

        let outcomes = index
            .batch_insert(vec![
                IndexRequest::new("transient", verse.clone()),
                IndexRequest::new("good retry", verse),
            ])
            .await;

        assert!(!outcomes[0].is_success());
        assert_eq!(outcomes[0].id.as_deref(), Some("John_3_16"));
        assert_eq!(outcomes[1], InsertOutcome::stored("John_3_16".to_string()));
        assert_eq!(index.count().await, 1);
        assert_eq!(
            index.get("John_3_16").await.map(|i| i.text),
            Some("good retry".to_string())
        );
    }

    #[tokio::test]
    async fn test_outcome_serialization() {
        let stored = InsertOutcome::stored("Gen_1_1".to_string());
        assert_eq!(
            serde_json::to_value(&stored).unwrap(),
            serde_json::json!({"success": true, "id": "Gen_1_1"})
        );
    }
}
