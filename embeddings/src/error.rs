//! Error types for the embeddings system.

use thiserror::Error;

/// Result type alias for embedding operations.
pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Errors that can occur in the embeddings system.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// Provider not configured (no API key present).
    #[error("embedding provider not configured: {0}")]
    ProviderNotConfigured(String),

    /// The provider rejected our credentials.
    #[error("embedding provider rejected credentials (status {status})")]
    Unauthorized { status: u16 },

    /// API request failed.
    #[error("API request failed: {0}")]
    ApiRequest(String),

    /// Invalid response from provider.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Dimension mismatch.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Text to embed was empty or whitespace.
    #[error("cannot embed empty text")]
    EmptyInput,

    /// Caller-supplied input was rejected before any provider call.
    #[error("invalid input: {0}")]
    Validation(String),

    /// A batch item could not be given an id.
    #[error("missing id: {0}")]
    MissingId(String),

    /// HTTP error (connect failure, timeout, body decode).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl EmbeddingError {
    /// Whether the error stems from missing or rejected setup rather than
    /// a failing provider.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::ProviderNotConfigured(_) | Self::Unauthorized { .. }
        )
    }

    /// Whether the error was raised by input validation.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::EmptyInput | Self::Validation(_) | Self::MissingId(_)
        )
    }

    /// Whether a caller may reasonably retry the same request later.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } => true,
            Self::ApiRequest(_) | Self::InvalidResponse(_) => true,
            Self::Http(err) => err.is_timeout() || err.is_connect() || err.is_request(),
            _ => false,
        }
    }
}
