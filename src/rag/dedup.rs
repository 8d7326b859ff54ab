//! Set union of retrieved document groups.

use std::collections::HashMap;

use crate::core::Document;

/// Flattens `groups` and keeps one document per canonical form.
///
/// Two documents are the same when their content and metadata are equal,
/// regardless of metadata insertion order. The output order is
/// unspecified.
#[must_use]
pub fn unique_union<I>(groups: I) -> Vec<Document>
where
    I: IntoIterator<Item = Vec<Document>>,
{
    let mut unique: HashMap<String, Document> = HashMap::new();
    for doc in groups.into_iter().flatten() {
        unique.entry(doc.canonical_form()).or_insert(doc);
    }
    unique.into_values().collect()
}
