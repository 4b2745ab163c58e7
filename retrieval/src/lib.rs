//! # Retrieval
//!
//! The search service an HTTP layer forwards to. It combines:
//!
//! - **Verses**: passage lookup and seed corpus sampling
//! - **Embeddings**: the shared in-memory semantic index
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        SearchService                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  ┌──────────────┐   sample verses   ┌──────────────────┐        │
//! │  │ VerseClient  │ ────────────────► │  SemanticIndex   │        │
//! │  │  (LRU cache) │                   │ (Arc, RwLock)    │        │
//! │  └──────────────┘                   └──────────────────┘        │
//! │                                              │                   │
//! │                     search / status ◄────────┘                   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use logos_retrieval::{RetrievalConfig, SearchRequest, SearchService};
//!
//! let service = SearchService::new(RetrievalConfig::load(None)?)?;
//! service.initialize_embeddings().await?;
//! let response = service.search(SearchRequest::new("the creation of the world")).await?;
//! ```

pub mod config;
pub mod engine;
pub mod error;

pub use config::RetrievalConfig;
pub use engine::{
    InitSummary, SearchRequest, SearchResponse, SearchService, SearchServiceBuilder,
    StatusResponse,
};
pub use error::{Result, RetrievalError};

// Re-export from dependencies for convenience
pub use logos_embeddings::{EmbeddingProvider, SearchResult, SemanticIndex, VerseMetadata};
pub use logos_verses::{Verse, VerseClient, VersePassage};
