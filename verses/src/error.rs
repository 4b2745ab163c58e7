//! Error types for verse lookups.

use thiserror::Error;

/// Result type alias for verse operations.
pub type Result<T> = std::result::Result<T, VerseError>;

/// Errors that can occur while fetching passages.
#[derive(Error, Debug)]
pub enum VerseError {
    /// The service does not know this reference.
    #[error("verse not found: {0}")]
    NotFound(String),

    /// The service could not be reached or answered with an error.
    #[error("failed to fetch verse {reference}: {message}")]
    Upstream { reference: String, message: String },

    /// Reference was empty.
    #[error("reference must not be empty")]
    EmptyReference,
}
