//! Core domain types shared by the retrieval workflow and the agent loop.

pub mod crop;
pub mod document;
pub mod groundedness;

pub use crop::Crop;
pub use document::{CROP_KEY, Document, SOURCE_KEY, format_context};
pub use groundedness::Groundedness;
