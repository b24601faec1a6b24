use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

/// A typed container of items, with the ordered header names it was created
/// with.
///
/// The header list is a private snapshot taken when the document is created.
/// Later edits to the registry never change it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Unique, caller-supplied identifier (e.g. `APP-QL-CNI`).
    pub uid: String,
    /// Human-readable title.
    pub title: String,
    /// The document type label the headers were taken from.
    #[serde(rename = "type")]
    pub document_type: String,
    /// Header names in display and level order.
    pub headers: Vec<String>,
}

impl Document {
    /// Creates a document with its header snapshot.
    #[must_use]
    pub fn new(
        uid: impl Into<String>,
        title: impl Into<String>,
        document_type: impl Into<String>,
        headers: Vec<String>,
    ) -> Self {
        Self {
            uid: uid.into(),
            title: title.into(),
            document_type: document_type.into(),
            headers,
        }
    }

    /// Returns `true` if `name` is one of this document's headers.
    #[must_use]
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h == name)
    }

    /// The 1-based position of `name` in the header list.
    #[must_use]
    pub fn header_ordinal(&self, name: &str) -> Option<NonZeroUsize> {
        self.headers
            .iter()
            .position(|h| h == name)
            .and_then(|i| NonZeroUsize::new(i + 1))
    }
}
