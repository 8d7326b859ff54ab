//! Groundedness gate.
//!
//! Decides whether a generated answer is supported by the documents it
//! was generated from. The verdict drives the workflow's self-correction
//! loop.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::capability::GroundednessVerifier;
use crate::agent::config::AgentConfig;
use crate::agent::message::{ChatRequest, assistant_message, user_message};
use crate::agent::provider::LlmProvider;
use crate::agent::providers::OpenAiProvider;
use crate::core::{Document, Groundedness, format_context};
use crate::error::AgentError;

/// Three-way classification of an answer against its documents.
pub struct GroundednessGate {
    verifier: Arc<dyn GroundednessVerifier>,
}

impl GroundednessGate {
    /// Creates a gate over `verifier`.
    #[must_use]
    pub fn new(verifier: Arc<dyn GroundednessVerifier>) -> Self {
        Self { verifier }
    }

    /// Classifies `answer` against `documents`.
    ///
    /// # Errors
    ///
    /// Verifier failures and unknown labels propagate unchanged.
    pub async fn check(&self, documents: &[Document], answer: &str) -> Result<Groundedness, AgentError> {
        let verdict = self.verifier.verify(&format_context(documents), answer).await?;
        debug!(%verdict, documents = documents.len(), "groundedness check");
        Ok(verdict)
    }
}

impl std::fmt::Debug for GroundednessGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroundednessGate").finish_non_exhaustive()
    }
}

/// Verifier backed by a chat-protocol groundedness model.
///
/// Sends the context as the user turn and the answer as the assistant
/// turn, and reads the label from the reply.
pub struct LlmGroundednessVerifier {
    provider: Arc<dyn LlmProvider>,
    model: String,
}

impl LlmGroundednessVerifier {
    /// Creates a verifier over any provider.
    #[must_use]
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// Creates a verifier for the configured groundedness endpoint.
    #[must_use]
    pub fn from_config(config: &AgentConfig) -> Self {
        let provider = OpenAiProvider::with_endpoint(
            config.groundedness_key(),
            Some(&config.groundedness_base_url),
        );
        Self::new(Arc::new(provider), config.groundedness_model.clone())
    }
}

impl std::fmt::Debug for LlmGroundednessVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmGroundednessVerifier")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl GroundednessVerifier for LlmGroundednessVerifier {
    async fn verify(&self, context: &str, answer: &str) -> Result<Groundedness, AgentError> {
        let request = ChatRequest::new(
            self.model.clone(),
            vec![user_message(context), assistant_message(answer, Vec::new())],
        );
        let response = self
            .provider
            .chat(&request)
            .await
            .map_err(|e| AgentError::Verifier {
                message: e.to_string(),
            })?;
        response.content.parse()
    }
}
