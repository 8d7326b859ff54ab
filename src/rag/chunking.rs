//! Fixed-size text chunking for indexing.
//!
//! Splits on grapheme cluster boundaries so multi-byte characters and
//! combining sequences are never cut in half.

use unicode_segmentation::UnicodeSegmentation;

use crate::core::Document;

/// Metadata key holding a chunk's position within its source.
pub const CHUNK_KEY: &str = "chunk";

/// Splits `text` into chunks of at most `chunk_size` graphemes with no
/// overlap. Whitespace-only chunks are dropped.
#[must_use]
pub fn chunk_text(text: &str, chunk_size: usize) -> Vec<String> {
    let size = chunk_size.max(1);
    let graphemes: Vec<&str> = text.graphemes(true).collect();
    graphemes
        .chunks(size)
        .map(<[&str]>::concat)
        .filter(|chunk| !chunk.trim().is_empty())
        .collect()
}

/// Chunks `text` into documents tagged with `crop`, `source` and chunk
/// position.
#[must_use]
pub fn documents_from_text(text: &str, crop: &str, source: &str, chunk_size: usize) -> Vec<Document> {
    chunk_text(text, chunk_size)
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| {
            Document::new(chunk)
                .with_crop(crop)
                .with_source(source)
                .with_metadata(CHUNK_KEY, i)
        })
        .collect()
}
