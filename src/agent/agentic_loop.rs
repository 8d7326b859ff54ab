//! Agentic tool-calling loop.
//!
//! Drives the LLM ↔ tool execution round-trip as a three-node machine:
//! `llm` calls the model bound to the full tool schema, `action` executes
//! the requested tools in order, and `end` hands back the model's final
//! text. The conversation only ever grows.

use tracing::{debug, warn};

use super::executor::ToolRegistry;
use super::message::{ChatMessage, ChatRequest, ChatResponse, system_message, tool_message};
use super::progress::{FAILED_PERCENT, ProgressSink, percent_complete};
use super::provider::LlmProvider;
use super::tool::{ToolCall, ToolResult};
use crate::error::AgentError;

/// Nodes of the tool-calling machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentNode {
    /// Call the model.
    Llm,
    /// Execute the tool calls of the last model message.
    Action,
    /// Return the last model message.
    End,
}

impl AgentNode {
    /// Routing after an `llm` visit.
    #[must_use]
    pub fn after_llm(message: &ChatMessage) -> Self {
        if message.has_tool_calls() {
            Self::Action
        } else {
            Self::End
        }
    }
}

/// Runs the agent loop: model → tool calls → tool results → model → …
///
/// `request.messages` is the conversation; it is extended in place with
/// every model message and tool result. The system prompt, if any, is
/// prepended to each model call only and never stored in the
/// conversation. `request.tools` is replaced by the registry's schema.
///
/// # Errors
///
/// Returns [`AgentError::ToolLoopExceeded`] if the model is still asking
/// for tools after `max_iterations` calls. Provider and tool errors
/// propagate unchanged; a tool failure is reported to `progress` with
/// [`FAILED_PERCENT`] first.
pub async fn agentic_loop(
    provider: &dyn LlmProvider,
    registry: &ToolRegistry,
    request: &mut ChatRequest,
    system_prompt: Option<&str>,
    progress: &dyn ProgressSink,
    max_iterations: usize,
) -> Result<ChatResponse, AgentError> {
    request.tools = registry.definitions().to_vec();

    let mut node = AgentNode::Llm;
    let mut iterations = 0;
    let mut last: Option<ChatResponse> = None;

    loop {
        match node {
            AgentNode::Llm => {
                if iterations == max_iterations {
                    return Err(AgentError::ToolLoopExceeded { max_iterations });
                }
                iterations += 1;

                let response = provider.chat(&with_system(request, system_prompt)).await?;
                let message = response.clone().into_message();
                node = AgentNode::after_llm(&message);
                debug!(
                    iteration = iterations,
                    tool_count = message.tool_calls.len(),
                    next = ?node,
                    "model call complete"
                );
                request.messages.push(message);
                last = Some(response);
            }
            AgentNode::Action => {
                let calls = last
                    .as_ref()
                    .map(|r| r.tool_calls.clone())
                    .unwrap_or_default();
                let results = run_tools(registry, &calls, progress).await?;
                request
                    .messages
                    .extend(results.iter().map(tool_message));
                node = AgentNode::Llm;
            }
            AgentNode::End => {
                return last.ok_or_else(|| AgentError::ResponseParse {
                    message: "agent loop ended without a model response".to_string(),
                    content: String::new(),
                });
            }
        }
    }
}

/// Copy of `request` with the system prompt in front of the conversation.
fn with_system(request: &ChatRequest, system_prompt: Option<&str>) -> ChatRequest {
    let mut call = request.clone();
    if let Some(prompt) = system_prompt {
        call.messages.insert(0, system_message(prompt));
    }
    call
}

/// Executes tool calls sequentially in emitted order.
///
/// Progress for call `i` of `n` is `(i / n) * 100` with `i` one-based,
/// reported before the call runs.
async fn run_tools(
    registry: &ToolRegistry,
    calls: &[ToolCall],
    progress: &dyn ProgressSink,
) -> Result<Vec<ToolResult>, AgentError> {
    let total = calls.len();
    let mut results = Vec::with_capacity(total);

    for (index, call) in calls.iter().enumerate() {
        progress.report(
            &format!("Using {}", call.name),
            percent_complete(index, total),
            &call.name,
        );

        match registry.invoke(call).await {
            Ok(result) => results.push(result),
            Err(e) => {
                warn!(tool = call.name, error = %e, "tool invocation failed");
                progress.report(
                    &format!("Failed {}", call.name),
                    FAILED_PERCENT,
                    &call.name,
                );
                return Err(e);
            }
        }
    }

    Ok(results)
}
