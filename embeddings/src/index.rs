//! Exact, in-memory similarity index.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Embedding;
use crate::error::{EmbeddingError, Result};
use crate::metadata::VerseMetadata;
use crate::similarity::find_top_k;

/// A passage stored in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedItem {
    /// Unique identifier.
    pub id: String,

    /// The embedded text.
    pub text: String,

    /// The embedding vector, as returned by the provider.
    pub embedding: Embedding,

    pub metadata: VerseMetadata,
}

/// A stored item scored against a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub text: String,
    pub metadata: VerseMetadata,

    /// Cosine similarity with the query, in `[-1.0, 1.0]`.
    pub similarity: f32,
}

#[derive(Debug)]
struct Slot {
    item: IndexedItem,
    seq: u64,
}

/// A similarity index keyed by id.
///
/// All stored embeddings share one dimension: either the one given to
/// [`SimilarityIndex::with_dimension`] or the length of the first insert.
#[derive(Debug, Default)]
pub struct SimilarityIndex {
    /// Stored entries.
    entries: HashMap<String, Slot>,

    /// Expected dimension of embeddings.
    dimension: Option<usize>,

    /// Sequence number handed to the next insert.
    next_seq: u64,
}

impl SimilarityIndex {
    /// Create an empty index that adopts the dimension of its first item.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty index with a fixed dimension.
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension: Some(dimension),
            ..Self::default()
        }
    }

    /// Dimension of stored embeddings, if known yet.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    fn check_dimension(&self, actual: usize) -> Result<()> {
        match self.dimension {
            Some(expected) if expected != actual => {
                Err(EmbeddingError::DimensionMismatch { expected, actual })
            }
            _ => Ok(()),
        }
    }

    /// Store an item, replacing any previous item with the same id.
    ///
    /// Returns `true` when an existing item was replaced. A replaced item
    /// counts as the most recent insert for tie-breaking.
    pub fn insert(&mut self, item: IndexedItem) -> Result<bool> {
        if item.embedding.is_empty() {
            return Err(EmbeddingError::InvalidResponse(format!(
                "empty embedding for {}",
                item.id
            )));
        }
        self.check_dimension(item.embedding.len())?;
        if self.dimension.is_none() {
            self.dimension = Some(item.embedding.len());
        }

        let seq = self.next_seq;
        self.next_seq += 1;

        let id = item.id.clone();
        let replaced = self.entries.insert(id.clone(), Slot { item, seq }).is_some();
        debug!("Stored {id} in index (replaced: {replaced})");

        Ok(replaced)
    }

    /// Get an item by ID.
    pub fn get(&self, id: &str) -> Option<&IndexedItem> {
        self.entries.get(id).map(|slot| &slot.item)
    }

    /// Check if an ID exists in the index.
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Get the number of entries in the index.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn in_insertion_order(&self) -> Vec<&Slot> {
        let mut slots: Vec<&Slot> = self.entries.values().collect();
        slots.sort_unstable_by_key(|slot| slot.seq);
        slots
    }

    /// All IDs, oldest insert first.
    pub fn ids(&self) -> Vec<&str> {
        self.in_insertion_order()
            .into_iter()
            .map(|slot| slot.item.id.as_str())
            .collect()
    }

    /// Score every item against `query` and return the best `k` with a
    /// similarity of at least `min_score`, highest first.
    pub fn search(&self, query: &[f32], k: usize, min_score: f32) -> Result<Vec<SearchResult>> {
        if self.entries.is_empty() {
            return Ok(Vec::new());
        }
        self.check_dimension(query.len())?;

        let slots = self.in_insertion_order();
        let candidates = slots
            .iter()
            .map(|slot| (slot.item.id.as_str(), slot.item.embedding.as_slice()));
        let scored = find_top_k(query, candidates, k, min_score)?;

        Ok(scored
            .into_iter()
            .filter_map(|hit| {
                self.get(&hit.id).map(|item| SearchResult {
                    id: item.id.clone(),
                    text: item.text.clone(),
                    metadata: item.metadata.clone(),
                    similarity: hit.score,
                })
            })
            .collect())
    }
}
