//! # Embeddings
//!
//! Semantic embedding generation and exact similarity search over short
//! passages for Logos.
//!
//! ## Features
//!
//! - **Embedding Generation**: Convert text to dense vectors through an [`EmbeddingProvider`]
//! - **Similarity Search**: Cosine-ranked top-K lookups with a similarity floor
//! - **Batch Ingestion**: Per-item outcomes, one failure never aborts a batch
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      SemanticIndex                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  text ──► EmbeddingProvider ──► Embedding ──► SimilarityIndex   │
//! │                 │                                  │            │
//! │                 ▼                                  ▼            │
//! │          OpenAI / Static                 cosine + top-K         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod index;
pub mod metadata;
pub mod provider;
pub mod semantic;
pub mod similarity;

pub use error::{EmbeddingError, Result};
pub use index::{IndexedItem, SearchResult, SimilarityIndex};
pub use metadata::VerseMetadata;
pub use provider::{
    EmbeddingProvider, EmbeddingRequest, EmbeddingResponse, OpenAIProvider, StaticProvider,
};
pub use semantic::{
    DEFAULT_LIMIT, DEFAULT_THRESHOLD, IndexRequest, InsertConfirmation, InsertOutcome,
    SemanticIndex,
};
pub use similarity::{SimilarityResult, cosine_similarity};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;
