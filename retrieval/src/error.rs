//! Error types for the search service.

use thiserror::Error;

use logos_embeddings::EmbeddingError;
use logos_verses::VerseError;

/// Result type alias for retrieval operations.
pub type Result<T> = std::result::Result<T, RetrievalError>;

/// Errors that can occur in the search service.
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// Embedding or index error.
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Verse lookup error.
    #[error("verse error: {0}")]
    Verse(#[from] VerseError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Caller-supplied input was rejected.
    #[error("{0}")]
    Validation(String),

    /// The verse service returned nothing to embed.
    #[error("no verses found to embed")]
    NoSampleData,

    /// Config file could not be parsed.
    #[error("invalid config file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RetrievalError {
    /// HTTP status an HTTP layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::NoSampleData => 400,
            Self::Embedding(err) if err.is_validation() || err.is_configuration() => 400,
            Self::Embedding(EmbeddingError::DimensionMismatch { .. }) => 500,
            Self::Embedding(_) => 502,
            Self::Verse(VerseError::NotFound(_)) => 404,
            Self::Verse(VerseError::EmptyReference) => 400,
            Self::Verse(VerseError::Upstream { .. }) => 502,
            Self::Config(_) | Self::ConfigParse(_) | Self::Io(_) => 500,
        }
    }

    /// Whether the caller is at fault (4xx).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}
