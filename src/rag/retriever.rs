//! Multi-query retrieval.
//!
//! A question is decomposed into sub-questions by the chat model, each
//! sub-question is searched concurrently against the vector index, and
//! the groups are folded into one deduplicated set.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, warn};

use super::capability::VectorIndex;
use super::dedup::unique_union;
use crate::agent::message::{ChatRequest, user_message};
use crate::agent::prompt::PromptSet;
use crate::agent::provider::LlmProvider;
use crate::core::Document;
use crate::error::AgentError;

/// Leading list markers such as `1.`, `2)`, `-` or `*`.
static LIST_MARKER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^\s*(?:\d+\s*[.):]|[-*•])\s*").ok());

/// Splits model output into sub-questions, one per non-empty line, with
/// list numbering removed.
#[must_use]
pub fn parse_sub_questions(output: &str) -> Vec<String> {
    output
        .lines()
        .map(|line| match LIST_MARKER.as_ref() {
            Some(re) => re.replace(line, "").trim().to_string(),
            None => line.trim().to_string(),
        })
        .filter(|line| !line.is_empty())
        .collect()
}

/// Tuning for [`BatchedRetriever`].
#[derive(Debug, Clone)]
pub struct RetrieverSettings {
    /// Chat model used for decomposition.
    pub model: String,
    /// Results per sub-question.
    pub top_k: usize,
    /// Maximum concurrent searches.
    pub max_concurrency: usize,
}

impl Default for RetrieverSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            top_k: 3,
            max_concurrency: 8,
        }
    }
}

/// Decomposes questions and fans similarity searches out over the index.
pub struct BatchedRetriever {
    provider: Arc<dyn LlmProvider>,
    index: Arc<dyn VectorIndex>,
    prompts: PromptSet,
    settings: RetrieverSettings,
}

impl BatchedRetriever {
    /// Creates a retriever.
    #[must_use]
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        index: Arc<dyn VectorIndex>,
        prompts: &PromptSet,
        settings: RetrieverSettings,
    ) -> Self {
        Self {
            provider,
            index,
            prompts: prompts.clone(),
            settings,
        }
    }

    /// Asks the model for sub-questions.
    ///
    /// Falls back to the question itself when the model returns no usable
    /// line.
    ///
    /// # Errors
    ///
    /// Propagates provider errors.
    pub async fn decompose(&self, question: &str, crop: &str) -> Result<Vec<String>, AgentError> {
        let request = ChatRequest::new(
            self.settings.model.clone(),
            vec![user_message(&self.prompts.build_decomposition(question, crop))],
        );
        let response = self.provider.chat(&request).await?;

        let mut questions = parse_sub_questions(&response.content);
        if questions.is_empty() {
            questions.push(question.to_string());
        }
        debug!(count = questions.len(), "decomposed question");
        Ok(questions)
    }

    /// Retrieves the deduplicated union of documents for every sub-question.
    ///
    /// A sub-question whose search fails contributes nothing.
    ///
    /// # Errors
    ///
    /// Propagates decomposition errors only.
    pub async fn retrieve(&self, question: &str, crop: &str) -> Result<Vec<Document>, AgentError> {
        let questions = self.decompose(question, crop).await?;
        let groups = self.search_all(&questions).await;
        let documents = unique_union(groups);
        debug!(documents = documents.len(), "retrieved documents");
        Ok(documents)
    }

    /// Searches every sub-question, concurrently when possible.
    ///
    /// If a search task panics or is cancelled, the whole batch is re-run
    /// sequentially.
    pub async fn search_all(&self, questions: &[String]) -> Vec<Vec<Document>> {
        match self.fan_out(questions).await {
            Ok(groups) => groups,
            Err(e) => {
                warn!(error = %e, "concurrent retrieval failed, using sequential fallback");
                let mut groups = Vec::with_capacity(questions.len());
                for q in questions {
                    groups.push(search_one(self.index.as_ref(), q, self.settings.top_k).await);
                }
                groups
            }
        }
    }

    /// Runs one task per sub-question. On the first failed task every
    /// other task is aborted and drained before returning, so nothing
    /// keeps querying the index behind the sequential fallback.
    async fn fan_out(&self, questions: &[String]) -> Result<Vec<Vec<Document>>, JoinError> {
        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for (slot, question) in questions.iter().enumerate() {
            let sem = Arc::clone(&semaphore);
            let index = Arc::clone(&self.index);
            let q = question.clone();
            let k = self.settings.top_k;

            tasks.spawn(async move {
                let Ok(_permit) = sem.acquire().await else {
                    return (slot, Vec::new());
                };
                (slot, search_one(index.as_ref(), &q, k).await)
            });
        }

        let mut groups = vec![Vec::new(); questions.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((slot, documents)) => groups[slot] = documents,
                Err(e) => {
                    tasks.abort_all();
                    while tasks.join_next().await.is_some() {}
                    return Err(e);
                }
            }
        }
        Ok(groups)
    }
}

impl std::fmt::Debug for BatchedRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchedRetriever")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

async fn search_one(index: &dyn VectorIndex, question: &str, k: usize) -> Vec<Document> {
    match index.similarity_search(question, k).await {
        Ok(documents) => documents,
        Err(e) => {
            warn!(question, error = %e, "sub-question search failed");
            Vec::new()
        }
    }
}
