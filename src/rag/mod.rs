//! Retrieval-augmented answering.
//!
//! # Architecture
//!
//! ```text
//! question → RagWorkflow
//!   ├── retrieve: BatchedRetriever (decompose → concurrent index search → unique_union)
//!   ├── web_search: WebSearch fallback when nothing was retrieved
//!   ├── generate: answer prompt → GroundednessGate
//!   └── transform_query: rewrite, then retrieve again
//! ```
//!
//! Documents reach the index through [`BatchedEmbedder`], which paces
//! embedding calls and never fails.

pub mod capability;
pub mod chunking;
pub mod dedup;
pub mod embedding;
pub mod grounding;
pub mod retriever;
pub mod vector;
pub mod web;
pub mod workflow;

pub use capability::{Embedder, GroundednessVerifier, VectorIndex, WebResult, WebSearch};
pub use chunking::{chunk_text, documents_from_text};
pub use dedup::unique_union;
pub use embedding::{BatchSettings, BatchedEmbedder};
pub use grounding::{GroundednessGate, LlmGroundednessVerifier};
pub use retriever::{BatchedRetriever, RetrieverSettings};
pub use vector::{CropCount, IndexStatus, SqliteVectorIndex, read_status};
pub use web::{DisabledWebSearch, TavilySearch};
pub use workflow::{
    RagWorkflow, RetrievalState, RewritePolicy, StateUpdate, WorkflowNode, WorkflowOutcome,
};
