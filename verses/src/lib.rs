//! # Verses
//!
//! Lookup client for the public reference-text service. Passages are
//! fetched by reference (`John 3:16`, `Psalms 23`) and kept in a bounded
//! LRU cache; [`VerseClient::sample_verses`] gathers a small corpus for
//! seeding a semantic index.

pub mod books;
pub mod client;
pub mod error;

pub use books::BOOKS;
pub use client::{Verse, VerseClient, VersePassage};
pub use error::{Result, VerseError};
