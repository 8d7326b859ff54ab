//! End-to-end runs of the retrieval workflow against in-process doubles.

#![allow(clippy::panic, clippy::unwrap_used)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use cropwise::agent::{ChatRequest, ChatResponse, LlmProvider, PromptSet, Role, TokenUsage};
use cropwise::core::{Document, Groundedness};
use cropwise::error::AgentError;
use cropwise::rag::workflow::WEB_SEARCH_SOURCE;
use cropwise::rag::{
    BatchedRetriever, DisabledWebSearch, GroundednessGate, GroundednessVerifier, RagWorkflow,
    RetrieverSettings, RewritePolicy, VectorIndex, WebResult, WebSearch, WorkflowNode,
};

/// Chat model that recognizes the three workflow prompts.
struct Model {
    sub_questions: String,
    rewrites: AtomicUsize,
    answers: AtomicUsize,
}

impl Model {
    fn new(sub_questions: &str) -> Self {
        Self {
            sub_questions: sub_questions.to_string(),
            rewrites: AtomicUsize::new(0),
            answers: AtomicUsize::new(0),
        }
    }
}

fn reply(content: String) -> ChatResponse {
    ChatResponse {
        content,
        usage: TokenUsage::default(),
        tool_calls: Vec::new(),
        finish_reason: Some("stop".to_string()),
    }
}

#[async_trait]
impl LlmProvider for Model {
    fn name(&self) -> &'static str {
        "model"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        let first = &request.messages[0];
        if first.role == Role::System {
            let n = self.rewrites.fetch_add(1, Ordering::SeqCst) + 1;
            return Ok(reply(format!("rewritten question {n}")));
        }
        if first.content.contains("subquestions") {
            return Ok(reply(self.sub_questions.clone()));
        }
        let n = self.answers.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(reply(format!("answer {n}")))
    }
}

/// Index that answers exact queries from a table.
#[derive(Default)]
struct TableIndex {
    hits: HashMap<String, Vec<Document>>,
}

#[async_trait]
impl VectorIndex for TableIndex {
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<Document>, AgentError> {
        Ok(self
            .hits
            .get(query)
            .map(|d| d.iter().take(k).cloned().collect())
            .unwrap_or_default())
    }

    async fn add_documents(&self, documents: &[Document]) -> Result<usize, AgentError> {
        Ok(documents.len())
    }
}

/// Verifier replaying a script of verdicts; the last one repeats.
struct Verdicts {
    script: Mutex<VecDeque<Result<Groundedness, String>>>,
    contexts: Mutex<Vec<String>>,
}

impl Verdicts {
    fn new(script: Vec<Result<Groundedness, &str>>) -> Self {
        Self {
            script: Mutex::new(
                script
                    .into_iter()
                    .map(|r| r.map_err(str::to_string))
                    .collect(),
            ),
            contexts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl GroundednessVerifier for Verdicts {
    async fn verify(&self, context: &str, _answer: &str) -> Result<Groundedness, AgentError> {
        self.contexts.lock().unwrap().push(context.to_string());
        let mut script = self.script.lock().unwrap();
        let next = if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        };
        match next {
            Some(Ok(verdict)) => Ok(verdict),
            Some(Err(message)) => Err(AgentError::Verifier { message }),
            None => Ok(Groundedness::NotSure),
        }
    }
}

#[derive(Default)]
struct Web {
    queries: Mutex<Vec<String>>,
}

#[async_trait]
impl WebSearch for Web {
    async fn search(&self, query: &str) -> Result<Vec<WebResult>, AgentError> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(vec![
            WebResult {
                content: "Armyworms feed at night.".to_string(),
                url: Some("https://extension.example/armyworm".to_string()),
            },
            WebResult {
                content: "Spray at dusk.".to_string(),
                url: None,
            },
        ])
    }
}

fn guide_hits() -> HashMap<String, Vec<Document>> {
    HashMap::from([
        (
            "What is the ideal pH for corn?".to_string(),
            vec![Document::new("Corn prefers pH 5.8 to 7.0.").with_crop("corn")],
        ),
        (
            "How do I raise soil pH?".to_string(),
            vec![
                Document::new("Lime raises pH.").with_crop("corn"),
                Document::new("Corn prefers pH 5.8 to 7.0.").with_crop("corn"),
            ],
        ),
    ])
}

struct Harness {
    workflow: RagWorkflow,
    model: Arc<Model>,
    verifier: Arc<Verdicts>,
    web: Arc<Web>,
}

fn harness(
    sub_questions: &str,
    hits: HashMap<String, Vec<Document>>,
    verdicts: Vec<Result<Groundedness, &str>>,
    policy: RewritePolicy,
) -> Harness {
    let model = Arc::new(Model::new(sub_questions));
    let verifier = Arc::new(Verdicts::new(verdicts));
    let web = Arc::new(Web::default());
    let prompts = PromptSet::defaults();
    let retriever = BatchedRetriever::new(
        model.clone(),
        Arc::new(TableIndex { hits }),
        &prompts,
        RetrieverSettings::default(),
    );
    let workflow = RagWorkflow::new(
        model.clone(),
        retriever,
        GroundednessGate::new(verifier.clone()),
        web.clone(),
        prompts,
        "gpt-4o",
    )
    .with_policy(policy);
    Harness {
        workflow,
        model,
        verifier,
        web,
    }
}

const PH_QUESTIONS: &str = "1. What is the ideal pH for corn?\n2. How do I raise soil pH?";

#[tokio::test]
async fn grounded_answer_from_index_skips_web_search() {
    let h = harness(
        PH_QUESTIONS,
        guide_hits(),
        vec![Ok(Groundedness::Grounded)],
        RewritePolicy::default(),
    );

    let outcome = h
        .workflow
        .run("How do I fix acidic soil for corn?", "corn")
        .await
        .unwrap_or_else(|e| panic!("run failed: {e}"));

    assert_eq!(
        outcome.visits,
        vec![WorkflowNode::Retrieve, WorkflowNode::Generate, WorkflowNode::End]
    );
    assert_eq!(outcome.answer, "answer 1");
    assert!(outcome.grounded());
    assert!(!outcome.web_search);
    assert_eq!(outcome.rewrites, 0);
    // Union of both sub-questions, deduplicated.
    assert_eq!(outcome.documents.len(), 2);
    assert!(h.web.queries.lock().unwrap().is_empty());
    let context = h.verifier.contexts.lock().unwrap()[0].clone();
    let mut parts: Vec<&str> = context.split("\n\n").collect();
    parts.sort_unstable();
    assert_eq!(parts, vec!["Corn prefers pH 5.8 to 7.0.", "Lime raises pH."]);
}

#[tokio::test]
async fn empty_retrieval_goes_through_web_search_once() {
    let h = harness(
        "What eats corn leaves at night?",
        HashMap::new(),
        vec![Ok(Groundedness::Grounded)],
        RewritePolicy::default(),
    );

    let outcome = h
        .workflow
        .run("What is chewing my corn?", "corn")
        .await
        .unwrap_or_else(|e| panic!("run failed: {e}"));

    assert_eq!(
        outcome.visits,
        vec![
            WorkflowNode::Retrieve,
            WorkflowNode::WebSearch,
            WorkflowNode::Generate,
            WorkflowNode::End
        ]
    );
    assert!(outcome.web_search);
    assert_eq!(outcome.documents.len(), 1);
    let web_doc = &outcome.documents[0];
    assert_eq!(web_doc.content, "Armyworms feed at night.\nSpray at dusk.");
    assert_eq!(web_doc.source(), Some(WEB_SEARCH_SOURCE));
    assert_eq!(web_doc.crop(), Some("corn"));
    assert_eq!(
        *h.web.queries.lock().unwrap(),
        vec!["What is chewing my corn?".to_string()]
    );
}

#[tokio::test]
async fn ungrounded_answer_rewrites_question_and_keeps_documents() {
    let h = harness(
        PH_QUESTIONS,
        guide_hits(),
        vec![Ok(Groundedness::NotGrounded), Ok(Groundedness::Grounded)],
        RewritePolicy::default(),
    );

    let outcome = h
        .workflow
        .run("acid soil?", "corn")
        .await
        .unwrap_or_else(|e| panic!("run failed: {e}"));

    assert_eq!(outcome.rewrites, 1);
    assert_eq!(outcome.question, "rewritten question 1");
    assert_eq!(outcome.answer, "answer 2");
    assert_eq!(outcome.visits_to(WorkflowNode::Retrieve), 2);
    assert_eq!(outcome.visits_to(WorkflowNode::Generate), 2);
    assert_eq!(outcome.documents.len(), 2);
    assert_eq!(h.model.rewrites.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn best_effort_returns_last_answer_when_budget_runs_out() {
    let h = harness(
        PH_QUESTIONS,
        guide_hits(),
        vec![Ok(Groundedness::NotSure)],
        RewritePolicy::BestEffort { max_rewrites: 2 },
    );

    let outcome = h
        .workflow
        .run("acid soil?", "corn")
        .await
        .unwrap_or_else(|e| panic!("run failed: {e}"));

    assert!(!outcome.grounded());
    assert_eq!(outcome.groundedness, Groundedness::NotSure);
    assert_eq!(outcome.rewrites, 2);
    assert_eq!(outcome.visits_to(WorkflowNode::Generate), 3);
    assert_eq!(outcome.answer, "answer 3");
    assert_eq!(outcome.visits.last(), Some(&WorkflowNode::End));
}

#[tokio::test]
async fn strict_policy_fails_when_budget_runs_out() {
    let h = harness(
        PH_QUESTIONS,
        guide_hits(),
        vec![Ok(Groundedness::NotGrounded)],
        RewritePolicy::Strict { max_rewrites: 1 },
    );

    let result = h.workflow.run("acid soil?", "corn").await;
    match result {
        Err(AgentError::NotGrounded {
            attempts,
            last_answer,
        }) => {
            assert_eq!(attempts, 2);
            assert_eq!(last_answer, "answer 2");
        }
        other => panic!("expected NotGrounded, got {other:?}"),
    }
}

#[tokio::test]
async fn unbounded_policy_loops_until_grounded() {
    let h = harness(
        PH_QUESTIONS,
        guide_hits(),
        vec![
            Ok(Groundedness::NotGrounded),
            Ok(Groundedness::NotSure),
            Ok(Groundedness::NotGrounded),
            Ok(Groundedness::NotSure),
            Ok(Groundedness::NotGrounded),
            Ok(Groundedness::Grounded),
        ],
        RewritePolicy::Unbounded,
    );

    let outcome = h
        .workflow
        .run("acid soil?", "corn")
        .await
        .unwrap_or_else(|e| panic!("run failed: {e}"));
    assert!(outcome.grounded());
    assert_eq!(outcome.rewrites, 5);
}

#[tokio::test]
async fn verifier_failure_aborts_the_run() {
    let h = harness(
        PH_QUESTIONS,
        guide_hits(),
        vec![Err("service unavailable")],
        RewritePolicy::default(),
    );

    let result = h.workflow.run("acid soil?", "corn").await;
    assert!(matches!(result, Err(AgentError::Verifier { .. })));
}

#[tokio::test]
async fn missing_web_search_fails_only_when_needed() {
    let model = Arc::new(Model::new("anything"));
    let prompts = PromptSet::defaults();
    let retriever = BatchedRetriever::new(
        model.clone(),
        Arc::new(TableIndex::default()),
        &prompts,
        RetrieverSettings::default(),
    );
    let workflow = RagWorkflow::new(
        model,
        retriever,
        GroundednessGate::new(Arc::new(Verdicts::new(vec![Ok(Groundedness::Grounded)]))),
        Arc::new(DisabledWebSearch),
        prompts,
        "gpt-4o",
    );

    let result = workflow.invoke("q", "cotton").await;
    assert!(matches!(result, Err(AgentError::WebSearch { .. })));
}
