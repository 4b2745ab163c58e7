//! Metadata carried alongside every indexed passage.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Separator used when deriving an id from book/chapter/verse.
pub const ID_DELIMITER: char = '_';

/// Known verse fields plus an open map for anything else a caller attaches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerseMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub book: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verse: Option<u32>,

    /// Human-readable reference, e.g. `John 3:16`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl VerseMetadata {
    /// Metadata for a single verse.
    pub fn verse(book: impl Into<String>, chapter: u32, verse: u32) -> Self {
        Self {
            book: Some(book.into()),
            chapter: Some(chapter),
            verse: Some(verse),
            ..Self::default()
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// Attach an extra key/value pair.
    pub fn with_extra(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Stable id of the form `book_chapter_verse`.
    ///
    /// Returns `None` when none of the three fields is set. Missing parts
    /// render as empty segments, so `Genesis` with no chapter or verse
    /// becomes `Genesis__`.
    pub fn derived_id(&self) -> Option<String> {
        if self.book.is_none() && self.chapter.is_none() && self.verse.is_none() {
            return None;
        }
        let book = self.book.as_deref().unwrap_or_default();
        let chapter = self.chapter.map(|c| c.to_string()).unwrap_or_default();
        let verse = self.verse.map(|v| v.to_string()).unwrap_or_default();
        Some(format!("{book}{ID_DELIMITER}{chapter}{ID_DELIMITER}{verse}"))
    }
}
