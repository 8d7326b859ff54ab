//! Retrieved documents.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Metadata key holding the crop a document is about.
pub const CROP_KEY: &str = "crop";
/// Metadata key holding the document's origin.
pub const SOURCE_KEY: &str = "source";

/// A unit of retrieved text plus its metadata.
///
/// Metadata is kept in a [`BTreeMap`] so iteration order, and therefore
/// the [canonical form](Document::canonical_form), does not depend on
/// insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Text content.
    pub content: String,
    /// Metadata mapping (at minimum `crop` and `source`).
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl Document {
    /// Creates a document with no metadata.
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Sets the `crop` tag.
    #[must_use]
    pub fn with_crop(self, crop: &str) -> Self {
        self.with_metadata(CROP_KEY, crop)
    }

    /// Sets the `source` identifier.
    #[must_use]
    pub fn with_source(self, source: &str) -> Self {
        self.with_metadata(SOURCE_KEY, source)
    }

    /// Returns the `crop` tag, if present and a string.
    #[must_use]
    pub fn crop(&self) -> Option<&str> {
        self.metadata.get(CROP_KEY).and_then(Value::as_str)
    }

    /// Returns the `source` identifier, if present and a string.
    #[must_use]
    pub fn source(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).and_then(Value::as_str)
    }

    /// Stable string form used for set comparisons.
    ///
    /// Two documents with equal content and equal metadata (in any
    /// insertion order) produce the same string.
    #[must_use]
    pub fn canonical_form(&self) -> String {
        let mut out = Value::String(self.content.clone()).to_string();
        for (key, value) in &self.metadata {
            out.push('\u{1f}');
            out.push_str(&Value::String(key.clone()).to_string());
            out.push('=');
            out.push_str(&value.to_string());
        }
        out
    }
}

/// Joins document contents into a single context block.
#[must_use]
pub fn format_context(documents: &[Document]) -> String {
    documents
        .iter()
        .map(|d| d.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}
