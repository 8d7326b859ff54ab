//! Self-correcting retrieval workflow.
//!
//! A five-node state machine:
//!
//! ```text
//! retrieve ──(no documents)──▶ web_search ──▶ generate
//!    │                                          │
//!    └──(documents)────────────────────────────▶│
//!                                               ├──(grounded)──▶ end
//!                                               └──(otherwise)──▶ transform_query ──▶ retrieve
//! ```
//!
//! Each node returns a typed [`StateUpdate`]; [`RetrievalState::apply`]
//! folds it into a new state. How many times the loop may go round is
//! governed by [`RewritePolicy`].

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::capability::WebSearch;
use super::dedup::unique_union;
use super::grounding::GroundednessGate;
use super::retriever::BatchedRetriever;
use crate::agent::message::{ChatRequest, system_message, user_message};
use crate::agent::prompt::{PromptSet, build_rewrite_prompt};
use crate::agent::provider::LlmProvider;
use crate::core::{Document, Groundedness, format_context};
use crate::error::AgentError;

/// `source` tag of the synthetic web-search document.
pub const WEB_SEARCH_SOURCE: &str = "web_search";

/// Nodes of the retrieval workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowNode {
    /// Decompose and search the vector index.
    Retrieve,
    /// Fall back to web search.
    WebSearch,
    /// Answer and check groundedness.
    Generate,
    /// Rewrite the question.
    TransformQuery,
    /// Return the generation.
    End,
}

impl WorkflowNode {
    /// Node name as used in logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Retrieve => "retrieve",
            Self::WebSearch => "web_search",
            Self::Generate => "generate",
            Self::TransformQuery => "transform_query",
            Self::End => "end",
        }
    }
}

impl std::fmt::Display for WorkflowNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How often a non-grounded answer may send the workflow back round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewritePolicy {
    /// Loop until the verifier says `grounded`.
    Unbounded,
    /// After `max_rewrites` rewrites, return the latest answer flagged as
    /// not grounded.
    BestEffort {
        /// Rewrites allowed.
        max_rewrites: usize,
    },
    /// After `max_rewrites` rewrites, fail with [`AgentError::NotGrounded`].
    Strict {
        /// Rewrites allowed.
        max_rewrites: usize,
    },
}

impl Default for RewritePolicy {
    fn default() -> Self {
        Self::BestEffort { max_rewrites: 3 }
    }
}

impl RewritePolicy {
    /// Returns `true` if another rewrite is allowed after `rewrites`.
    #[must_use]
    pub const fn allows_rewrite(&self, rewrites: usize) -> bool {
        match self {
            Self::Unbounded => true,
            Self::BestEffort { max_rewrites } | Self::Strict { max_rewrites } => {
                rewrites < *max_rewrites
            }
        }
    }
}

/// Per-query workflow state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalState {
    /// Crop the question is about.
    pub crop: String,
    /// Current question; replaced on every rewrite.
    pub question: String,
    /// Latest answer.
    pub generation: Option<String>,
    /// Whether the web fallback ran.
    pub web_search: bool,
    /// Deduplicated documents gathered so far (plus any web document).
    pub documents: Vec<Document>,
    /// Verdict on the latest answer.
    pub groundedness: Option<Groundedness>,
}

/// Output of one node.
#[derive(Debug, Clone, PartialEq)]
pub enum StateUpdate {
    /// `retrieve`: the union of everything retrieved so far.
    Retrieved {
        /// Replaces the document set.
        documents: Vec<Document>,
    },
    /// `web_search`: one synthetic document to append.
    WebSearched {
        /// Joined web results.
        document: Document,
    },
    /// `generate`: an answer and its verdict.
    Generated {
        /// The answer.
        generation: String,
        /// Its groundedness.
        groundedness: Groundedness,
    },
    /// `transform_query`: a rewritten question.
    Transformed {
        /// Replaces the question.
        question: String,
    },
}

impl RetrievalState {
    /// Initial state for `question` about `crop`.
    #[must_use]
    pub fn new(question: impl Into<String>, crop: impl Into<String>) -> Self {
        Self {
            crop: crop.into(),
            question: question.into(),
            generation: None,
            web_search: false,
            documents: Vec::new(),
            groundedness: None,
        }
    }

    /// Folds a node's update into a new state.
    #[must_use]
    pub fn apply(self, update: StateUpdate) -> Self {
        match update {
            StateUpdate::Retrieved { documents } => Self { documents, ..self },
            StateUpdate::WebSearched { document } => {
                let mut documents = self.documents;
                documents.push(document);
                Self {
                    documents,
                    web_search: true,
                    ..self
                }
            }
            StateUpdate::Generated {
                generation,
                groundedness,
            } => Self {
                generation: Some(generation),
                groundedness: Some(groundedness),
                ..self
            },
            StateUpdate::Transformed { question } => Self { question, ..self },
        }
    }

    /// Routing after `retrieve`.
    #[must_use]
    pub fn route_after_retrieve(&self) -> WorkflowNode {
        if self.documents.is_empty() {
            WorkflowNode::WebSearch
        } else {
            WorkflowNode::Generate
        }
    }

    /// Routing after `generate`, ignoring any rewrite budget.
    #[must_use]
    pub fn route_after_generate(&self) -> WorkflowNode {
        match self.groundedness {
            Some(Groundedness::Grounded) => WorkflowNode::End,
            _ => WorkflowNode::TransformQuery,
        }
    }
}

/// Result of one workflow run.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowOutcome {
    /// Final answer.
    pub answer: String,
    /// Question the final answer responds to.
    pub question: String,
    /// Verdict on the final answer.
    pub groundedness: Groundedness,
    /// Number of question rewrites.
    pub rewrites: usize,
    /// Whether the web fallback ran at least once.
    pub web_search: bool,
    /// Nodes visited, in order.
    pub visits: Vec<WorkflowNode>,
    /// Documents the final answer was generated from.
    pub documents: Vec<Document>,
}

impl WorkflowOutcome {
    /// Returns `true` if the final answer was judged grounded.
    #[must_use]
    pub const fn grounded(&self) -> bool {
        self.groundedness.is_grounded()
    }

    /// Number of visits to `node`.
    #[must_use]
    pub fn visits_to(&self, node: WorkflowNode) -> usize {
        self.visits.iter().filter(|n| **n == node).count()
    }
}

/// The retrieval workflow controller.
pub struct RagWorkflow {
    provider: Arc<dyn LlmProvider>,
    retriever: BatchedRetriever,
    gate: GroundednessGate,
    web: Arc<dyn WebSearch>,
    prompts: PromptSet,
    model: String,
    policy: RewritePolicy,
}

impl RagWorkflow {
    /// Assembles a workflow from its collaborators.
    #[must_use]
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        retriever: BatchedRetriever,
        gate: GroundednessGate,
        web: Arc<dyn WebSearch>,
        prompts: PromptSet,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            retriever,
            gate,
            web,
            prompts,
            model: model.into(),
            policy: RewritePolicy::default(),
        }
    }

    /// Sets the rewrite policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: RewritePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Current rewrite policy.
    #[must_use]
    pub const fn policy(&self) -> RewritePolicy {
        self.policy
    }

    /// Answers `question` and returns only the generation.
    ///
    /// # Errors
    ///
    /// See [`RagWorkflow::run`].
    pub async fn invoke(&self, question: &str, crop: &str) -> Result<String, AgentError> {
        Ok(self.run(question, crop).await?.answer)
    }

    /// Runs the workflow to completion.
    ///
    /// # Errors
    ///
    /// Propagates model, verifier and web-search errors. Under
    /// [`RewritePolicy::Strict`], returns [`AgentError::NotGrounded`] when
    /// the rewrite budget runs out.
    pub async fn run(&self, question: &str, crop: &str) -> Result<WorkflowOutcome, AgentError> {
        let mut state = RetrievalState::new(question, crop);
        let mut node = WorkflowNode::Retrieve;
        let mut visits = Vec::new();
        let mut rewrites = 0;

        loop {
            visits.push(node);
            debug!(node = %node, question = state.question, "entering node");

            node = match node {
                WorkflowNode::Retrieve => {
                    let update = self.retrieve(&state).await?;
                    state = state.apply(update);
                    state.route_after_retrieve()
                }
                WorkflowNode::WebSearch => {
                    let update = self.web_search(&state).await?;
                    state = state.apply(update);
                    WorkflowNode::Generate
                }
                WorkflowNode::Generate => {
                    let update = self.generate(&state).await?;
                    state = state.apply(update);
                    match state.route_after_generate() {
                        WorkflowNode::TransformQuery if !self.policy.allows_rewrite(rewrites) => {
                            self.exhausted(&state, &visits)?;
                            WorkflowNode::End
                        }
                        next => next,
                    }
                }
                WorkflowNode::TransformQuery => {
                    let update = self.transform_query(&state).await?;
                    state = state.apply(update);
                    rewrites += 1;
                    WorkflowNode::Retrieve
                }
                WorkflowNode::End => {
                    let groundedness = state.groundedness.unwrap_or(Groundedness::NotSure);
                    info!(
                        %groundedness,
                        rewrites,
                        web_search = state.web_search,
                        documents = state.documents.len(),
                        "workflow finished"
                    );
                    return Ok(WorkflowOutcome {
                        answer: state.generation.unwrap_or_default(),
                        question: state.question,
                        groundedness,
                        rewrites,
                        web_search: state.web_search,
                        visits,
                        documents: state.documents,
                    });
                }
            };
        }
    }

    /// Handles a non-grounded answer once the rewrite budget is spent.
    fn exhausted(&self, state: &RetrievalState, visits: &[WorkflowNode]) -> Result<(), AgentError> {
        let attempts = visits.iter().filter(|n| **n == WorkflowNode::Generate).count();
        match self.policy {
            RewritePolicy::Strict { .. } => Err(AgentError::NotGrounded {
                attempts,
                last_answer: state.generation.clone().unwrap_or_default(),
            }),
            _ => {
                warn!(attempts, "rewrite budget spent, returning ungrounded answer");
                Ok(())
            }
        }
    }

    async fn retrieve(&self, state: &RetrievalState) -> Result<StateUpdate, AgentError> {
        let retrieved = self.retriever.retrieve(&state.question, &state.crop).await?;
        let documents = unique_union([state.documents.clone(), retrieved]);
        Ok(StateUpdate::Retrieved { documents })
    }

    async fn web_search(&self, state: &RetrievalState) -> Result<StateUpdate, AgentError> {
        let results = self.web.search(&state.question).await?;
        let content = results
            .iter()
            .map(|r| r.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        debug!(results = results.len(), "web fallback");
        Ok(StateUpdate::WebSearched {
            document: Document::new(content)
                .with_source(WEB_SEARCH_SOURCE)
                .with_crop(&state.crop),
        })
    }

    async fn generate(&self, state: &RetrievalState) -> Result<StateUpdate, AgentError> {
        let prompt = self
            .prompts
            .build_answer(&state.question, &format_context(&state.documents));
        let request = ChatRequest::new(self.model.clone(), vec![user_message(&prompt)]);
        let generation = self.provider.chat(&request).await?.content;
        let groundedness = self.gate.check(&state.documents, &generation).await?;
        Ok(StateUpdate::Generated {
            generation,
            groundedness,
        })
    }

    async fn transform_query(&self, state: &RetrievalState) -> Result<StateUpdate, AgentError> {
        let request = ChatRequest::new(
            self.model.clone(),
            vec![
                system_message(&self.prompts.rewrite),
                user_message(&build_rewrite_prompt(&state.question)),
            ],
        );
        let rewritten = self.provider.chat(&request).await?.content;
        let rewritten = rewritten.trim();
        let question = if rewritten.is_empty() {
            state.question.clone()
        } else {
            rewritten.to_string()
        };
        Ok(StateUpdate::Transformed { question })
    }
}

impl std::fmt::Debug for RagWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagWorkflow")
            .field("model", &self.model)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> Document {
        Document::new(text).with_crop("corn")
    }

    #[test]
    fn test_empty_retrieval_routes_to_web_search() {
        let state = RetrievalState::new("q", "corn").apply(StateUpdate::Retrieved {
            documents: Vec::new(),
        });
        assert_eq!(state.route_after_retrieve(), WorkflowNode::WebSearch);
    }

    #[test]
    fn test_non_empty_retrieval_routes_to_generate() {
        let state = RetrievalState::new("q", "corn").apply(StateUpdate::Retrieved {
            documents: vec![doc("a")],
        });
        assert_eq!(state.route_after_retrieve(), WorkflowNode::Generate);
    }

    #[test]
    fn test_grounded_generation_ends_unchanged() {
        let state = RetrievalState::new("q", "corn")
            .apply(StateUpdate::Retrieved {
                documents: vec![doc("a")],
            })
            .apply(StateUpdate::Generated {
                generation: "answer".to_string(),
                groundedness: Groundedness::Grounded,
            });
        assert_eq!(state.route_after_generate(), WorkflowNode::End);
        assert_eq!(state.generation.as_deref(), Some("answer"));
    }

    #[test]
    fn test_ungrounded_generation_rewrites_and_keeps_documents() {
        for verdict in [Groundedness::NotGrounded, Groundedness::NotSure] {
            let before = RetrievalState::new("q", "corn")
                .apply(StateUpdate::Retrieved {
                    documents: vec![doc("a"), doc("b")],
                })
                .apply(StateUpdate::Generated {
                    generation: "answer".to_string(),
                    groundedness: verdict,
                });
            assert_eq!(before.route_after_generate(), WorkflowNode::TransformQuery);

            let after = before.clone().apply(StateUpdate::Transformed {
                question: "better q".to_string(),
            });
            assert_eq!(after.question, "better q");
            assert_eq!(after.documents, before.documents);
        }
    }

    #[test]
    fn test_web_search_appends_and_flags() {
        let state = RetrievalState::new("q", "corn")
            .apply(StateUpdate::Retrieved {
                documents: vec![doc("a")],
            })
            .apply(StateUpdate::WebSearched {
                document: doc("a"),
            });
        assert!(state.web_search);
        // Appended unchecked, even when equal to an existing document.
        assert_eq!(state.documents.len(), 2);
    }

    #[test]
    fn test_rewrite_policy_budget() {
        assert!(RewritePolicy::Unbounded.allows_rewrite(1_000));
        let best = RewritePolicy::BestEffort { max_rewrites: 2 };
        assert!(best.allows_rewrite(1));
        assert!(!best.allows_rewrite(2));
        assert!(!RewritePolicy::Strict { max_rewrites: 0 }.allows_rewrite(0));
        assert_eq!(
            RewritePolicy::default(),
            RewritePolicy::BestEffort { max_rewrites: 3 }
        );
    }

    #[test]
    fn test_node_names() {
        assert_eq!(WorkflowNode::TransformQuery.to_string(), "transform_query");
        assert_eq!(
            serde_json::to_string(&WorkflowNode::WebSearch).unwrap_or_default(),
            "\"web_search\""
        );
    }
}
