//! Collaborator seams of the retrieval workflow.
//!
//! Every external service the workflow talks to sits behind one of these
//! traits so the state machines can be driven by in-process doubles.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::{Document, Groundedness};
use crate::error::AgentError;

/// Maps text to fixed-length vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Length of every vector this embedder returns.
    fn dimension(&self) -> usize;

    /// Embeds a batch of texts, one vector per input in input order.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Embedding`] if the batch cannot be embedded.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AgentError>;

    /// Embeds a single text.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Embedding`] if the text cannot be embedded.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, AgentError>;
}

/// Nearest-neighbour search over embedded documents.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Returns up to `k` documents most similar to `query`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::VectorIndex`] or [`AgentError::Embedding`] on
    /// backend failure.
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<Document>, AgentError>;

    /// Embeds and stores documents, returning how many were added.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::VectorIndex`] on backend failure.
    async fn add_documents(&self, documents: &[Document]) -> Result<usize, AgentError>;
}

/// Judges whether an answer is supported by its context.
#[async_trait]
pub trait GroundednessVerifier: Send + Sync {
    /// Classifies `answer` against `context`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Verifier`] if the service fails, or
    /// [`AgentError::InvalidGroundedness`] for a label outside the closed set.
    async fn verify(&self, context: &str, answer: &str) -> Result<Groundedness, AgentError>;
}

/// One web search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebResult {
    /// Text snippet of the hit.
    pub content: String,
    /// Page URL, when the provider returns one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Web search provider used when the vector index has nothing.
#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Returns the top results for `query`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::WebSearch`] on failure.
    async fn search(&self, query: &str) -> Result<Vec<WebResult>, AgentError>;
}
