//! `OpenAI` provider implementation using the `async-openai` crate.
//!
//! Supports any `OpenAI`-compatible API (`OpenAI`, Azure, Upstage, local
//! proxies) via a base URL override. Hosts both the chat provider and the
//! embedding function.

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessage,
    ChatCompletionRequestAssistantMessageContent, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessage, ChatCompletionRequestSystemMessageContent,
    ChatCompletionRequestToolMessage, ChatCompletionRequestToolMessageContent,
    ChatCompletionRequestUserMessage, ChatCompletionRequestUserMessageContent, ChatCompletionTool,
    ChatCompletionToolType, CompletionUsage, CreateChatCompletionRequest,
    CreateChatCompletionResponse, CreateEmbeddingRequestArgs, FunctionCall, FunctionObject,
};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::agent::config::AgentConfig;
use crate::agent::message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
use crate::agent::provider::LlmProvider;
use crate::agent::tool::{ToolCall, ToolDefinition, parse_arguments};
use crate::error::AgentError;
use crate::rag::capability::Embedder;

fn client_for(api_key: &str, base_url: Option<&str>) -> Client<OpenAIConfig> {
    let mut openai_config = OpenAIConfig::new().with_api_key(api_key);
    if let Some(base_url) = base_url {
        openai_config = openai_config.with_api_base(base_url);
    }
    Client::with_config(openai_config)
}

fn sdk_tool_call(call: &ToolCall) -> ChatCompletionMessageToolCall {
    ChatCompletionMessageToolCall {
        id: call.id.clone(),
        r#type: ChatCompletionToolType::Function,
        function: FunctionCall {
            name: call.name.clone(),
            arguments: Value::Object(call.arguments.clone()).to_string(),
        },
    }
}

/// Assistant turns carry either text, tool calls, or both; empty parts
/// are sent as absent.
#[allow(deprecated)]
fn sdk_assistant(msg: &ChatMessage) -> ChatCompletionRequestAssistantMessage {
    ChatCompletionRequestAssistantMessage {
        content: (!msg.content.is_empty()).then(|| {
            ChatCompletionRequestAssistantMessageContent::Text(msg.content.clone())
        }),
        name: None,
        tool_calls: (!msg.tool_calls.is_empty())
            .then(|| msg.tool_calls.iter().map(sdk_tool_call).collect()),
        refusal: None,
        audio: None,
        function_call: None,
    }
}

fn sdk_message(msg: &ChatMessage) -> ChatCompletionRequestMessage {
    let text = msg.content.clone();
    match msg.role {
        Role::System => ChatCompletionRequestSystemMessage {
            content: ChatCompletionRequestSystemMessageContent::Text(text),
            name: None,
        }
        .into(),
        Role::User => ChatCompletionRequestUserMessage {
            content: ChatCompletionRequestUserMessageContent::Text(text),
            name: None,
        }
        .into(),
        Role::Assistant => sdk_assistant(msg).into(),
        Role::Tool => ChatCompletionRequestToolMessage {
            content: ChatCompletionRequestToolMessageContent::Text(text),
            tool_call_id: msg.tool_call_id.clone().unwrap_or_default(),
        }
        .into(),
    }
}

fn sdk_tool(definition: &ToolDefinition) -> ChatCompletionTool {
    ChatCompletionTool {
        r#type: ChatCompletionToolType::Function,
        function: FunctionObject {
            name: definition.name.clone(),
            description: Some(definition.description.clone()),
            parameters: Some(definition.parameters.clone()),
            strict: None,
        },
    }
}

/// Maps a generic request onto a chat completion request.
fn sdk_request(request: &ChatRequest) -> CreateChatCompletionRequest {
    CreateChatCompletionRequest {
        model: request.model.clone(),
        messages: request.messages.iter().map(sdk_message).collect(),
        temperature: request.temperature,
        max_completion_tokens: request.max_tokens,
        tools: (!request.tools.is_empty()).then(|| request.tools.iter().map(sdk_tool).collect()),
        ..Default::default()
    }
}

fn token_usage(usage: Option<CompletionUsage>) -> TokenUsage {
    usage.map_or_else(TokenUsage::default, |u| TokenUsage {
        prompt_tokens: u.prompt_tokens,
        completion_tokens: u.completion_tokens,
        total_tokens: u.total_tokens,
    })
}

/// Reads the first choice of a completion.
///
/// # Errors
///
/// Returns [`AgentError::ResponseParse`] when a tool call carries arguments
/// that are not a JSON object.
fn parse_response(response: CreateChatCompletionResponse) -> Result<ChatResponse, AgentError> {
    let usage = token_usage(response.usage);
    let Some(choice) = response.choices.into_iter().next() else {
        debug!("completion returned no choices");
        return Ok(ChatResponse {
            content: String::new(),
            usage,
            tool_calls: Vec::new(),
            finish_reason: None,
        });
    };

    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| {
            let arguments = parse_arguments(&tc.function.name, &tc.function.arguments)?;
            Ok(ToolCall {
                id: tc.id,
                name: tc.function.name,
                arguments,
            })
        })
        .collect::<Result<Vec<_>, AgentError>>()?;

    Ok(ChatResponse {
        content: choice.message.content.unwrap_or_default(),
        usage,
        tool_calls,
        finish_reason: choice
            .finish_reason
            .map(|reason| format!("{reason:?}").to_lowercase()),
    })
}

/// `OpenAI`-compatible chat provider.
pub struct OpenAiProvider {
    client: Client<OpenAIConfig>,
}

impl OpenAiProvider {
    /// Creates a new provider from agent configuration.
    #[must_use]
    pub fn new(config: &AgentConfig) -> Self {
        Self::with_endpoint(&config.api_key, config.base_url.as_deref())
    }

    /// Creates a provider for an explicit key and endpoint.
    ///
    /// Used for secondary services that speak the chat protocol, such as
    /// the groundedness checker.
    #[must_use]
    pub fn with_endpoint(api_key: &str, base_url: Option<&str>) -> Self {
        Self {
            client: client_for(api_key, base_url),
        }
    }
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider").finish_non_exhaustive()
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        let response = self
            .client
            .chat()
            .create(sdk_request(request))
            .await
            .map_err(|e| AgentError::ApiRequest {
                message: e.to_string(),
                status: None,
            })?;
        parse_response(response)
    }
}

/// `OpenAI`-compatible embedding function.
///
/// One call per [`Embedder::embed_documents`] invocation; batching and
/// pacing are the caller's concern (see
/// [`BatchedEmbedder`](crate::rag::embedding::BatchedEmbedder)).
pub struct OpenAiEmbedder {
    client: Client<OpenAIConfig>,
    model: String,
    dimension: usize,
}

impl OpenAiEmbedder {
    /// Creates an embedder from agent configuration.
    #[must_use]
    pub fn new(config: &AgentConfig) -> Self {
        Self {
            client: client_for(&config.api_key, config.base_url.as_deref()),
            model: config.embedding_model.clone(),
            dimension: config.embedding_dimension,
        }
    }
}

impl std::fmt::Debug for OpenAiEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbedder")
            .field("model", &self.model)
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AgentError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = CreateEmbeddingRequestArgs::default()
            .model(self.model.as_str())
            .input(texts.to_vec())
            .build()
            .map_err(|e| AgentError::Embedding {
                message: e.to_string(),
            })?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| AgentError::Embedding {
                message: e.to_string(),
            })?;

        let mut data = response.data;
        data.sort_by_key(|e| e.index);
        if data.len() != texts.len() {
            return Err(AgentError::Embedding {
                message: format!(
                    "expected {} embeddings, provider returned {}",
                    texts.len(),
                    data.len()
                ),
            });
        }
        Ok(data.into_iter().map(|e| e.embedding).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, AgentError> {
        let mut vectors = self.embed_documents(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| AgentError::Embedding {
            message: "provider returned no embedding".to_string(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::agent::message;
    use crate::agent::tool::ToolResult;
    use serde_json::{Map, json};

    #[test]
    fn test_system_and_user_messages() {
        assert!(matches!(
            sdk_message(&message::system_message("test")),
            ChatCompletionRequestMessage::System(_)
        ));
        assert!(matches!(
            sdk_message(&message::user_message("hello")),
            ChatCompletionRequestMessage::User(_)
        ));
    }

    #[test]
    fn test_tool_message_keeps_call_id() {
        let msg = message::tool_message(&ToolResult {
            tool_call_id: "call_123".to_string(),
            name: "get_crop_info".to_string(),
            content: "result data".to_string(),
        });
        let ChatCompletionRequestMessage::Tool(t) = sdk_message(&msg) else {
            panic!("expected tool message");
        };
        assert_eq!(t.tool_call_id, "call_123");
    }

    #[test]
    fn test_assistant_tool_calls_serialize_arguments() {
        let mut arguments = Map::new();
        arguments.insert("crop".to_string(), json!("corn"));
        let msg = message::assistant_message(
            "",
            vec![ToolCall {
                id: "call_1".to_string(),
                name: "get_crop_info".to_string(),
                arguments,
            }],
        );
        let ChatCompletionRequestMessage::Assistant(a) = sdk_message(&msg) else {
            panic!("expected assistant message");
        };
        assert!(a.content.is_none());
        let calls = a.tool_calls.unwrap_or_default();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.arguments, r#"{"crop":"corn"}"#);
    }

    #[test]
    fn test_request_keeps_zero_temperature_and_omits_empty_tools() {
        let request = ChatRequest::new("gpt-4o", vec![message::user_message("test")]);
        assert_eq!(request.temperature, Some(0.0));
        let built = sdk_request(&request);
        assert_eq!(built.temperature, Some(0.0));
        assert!(built.tools.is_none());
    }

    #[test]
    fn test_request_without_temperature_leaves_it_unset() {
        let mut request = ChatRequest::new("o3-mini", vec![message::user_message("test")]);
        request.temperature = None;
        assert!(sdk_request(&request).temperature.is_none());
    }

    #[test]
    fn test_request_with_tools() {
        let mut request = ChatRequest::new("gpt-4o", vec![message::user_message("test")]);
        request.temperature = Some(0.7);
        request.tools = vec![ToolDefinition {
            name: "get_crop_info".to_string(),
            description: "Crop profile".to_string(),
            parameters: json!({"type": "object", "properties": {}}),
        }];
        let built = sdk_request(&request);
        assert_eq!(built.temperature, Some(0.7));
        assert_eq!(built.tools.as_ref().map_or(0, Vec::len), 1);
    }

    fn completion(message: serde_json::Value) -> CreateChatCompletionResponse {
        serde_json::from_value(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 0,
            "model": "gpt-4o",
            "choices": [{"index": 0, "message": message, "finish_reason": "tool_calls"}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }))
        .unwrap_or_else(|e| panic!("fixture: {e}"))
    }

    #[test]
    fn test_parse_response_tool_calls() {
        let response = completion(json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": "call_9",
                "type": "function",
                "function": {"name": "get_crop_info", "arguments": "{\"crop\":\"cotton\"}"}
            }]
        }));
        let parsed = parse_response(response).unwrap_or_else(|e| panic!("parse: {e}"));
        assert!(parsed.content.is_empty());
        assert_eq!(parsed.usage.total_tokens, 15);
        assert_eq!(parsed.finish_reason.as_deref(), Some("toolcalls"));
        assert_eq!(parsed.tool_calls[0].arguments.get("crop"), Some(&json!("cotton")));
    }

    #[test]
    fn test_parse_response_rejects_malformed_arguments() {
        let response = completion(json!({
            "role": "assistant",
            "tool_calls": [{
                "id": "call_9",
                "type": "function",
                "function": {"name": "get_crop_info", "arguments": "not json"}
            }]
        }));
        assert!(matches!(
            parse_response(response),
            Err(AgentError::ResponseParse { .. })
        ));
    }

    #[test]
    fn test_embedder_dimension_from_config() {
        let config = AgentConfig::builder()
            .api_key("test")
            .embedding_dimension(8)
            .build()
            .unwrap_or_else(|e| panic!("config: {e}"));
        let embedder = OpenAiEmbedder::new(&config);
        assert_eq!(embedder.dimension(), 8);
    }
}
