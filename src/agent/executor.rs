//! Tool registry that dispatches model tool calls to [`Tool`] implementations.
//!
//! Maps tool names to shared tool handles and keeps the advertised schema
//! in registration order, so the model always sees the same tool list.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::tool::{Tool, ToolCall, ToolDefinition, ToolResult, stringify_result};
use crate::error::AgentError;

/// Name-indexed set of tools available to the agent loop.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    definitions: Vec<ToolDefinition>,
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool under its definition name.
    ///
    /// Registering a second tool with the same name replaces the first,
    /// keeping its position in the schema.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let definition = tool.definition();
        let name = definition.name.clone();
        if let Some(existing) = self.definitions.iter_mut().find(|d| d.name == name) {
            *existing = definition;
        } else {
            self.definitions.push(definition);
        }
        self.tools.insert(name, tool);
    }

    /// Builder-style [`register`](Self::register).
    #[must_use]
    pub fn with(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    /// Full tool schema, in registration order.
    #[must_use]
    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    /// Returns `true` if a tool with this name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Number of registered tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns `true` if no tools are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Executes a single tool call.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::UnknownTool`] if the name is not registered,
    /// or whatever the tool itself returns.
    pub async fn invoke(&self, call: &ToolCall) -> Result<ToolResult, AgentError> {
        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| AgentError::UnknownTool {
                name: call.name.clone(),
            })?;

        let value = tool.invoke(&call.arguments).await?;
        let content = stringify_result(&value);
        debug!(
            tool = call.name,
            call_id = call.id,
            result_len = content.len(),
            "tool execution complete"
        );

        Ok(ToolResult {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            content,
        })
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field(
                "tools",
                &self.definitions.iter().map(|d| &d.name).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{Map, Value, json};

    struct Echo(&'static str);

    #[async_trait]
    impl Tool for Echo {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: self.0.to_string(),
                description: "echo".to_string(),
                parameters: json!({"type": "object", "properties": {}}),
            }
        }

        async fn invoke(&self, arguments: &Map<String, Value>) -> Result<Value, AgentError> {
            Ok(arguments.get("value").cloned().unwrap_or(Value::Null))
        }
    }

    fn call(name: &str, args: Value) -> ToolCall {
        ToolCall {
            id: format!("call_{name}"),
            name: name.to_string(),
            arguments: match args {
                Value::Object(m) => m,
                _ => Map::new(),
            },
        }
    }

    #[tokio::test]
    async fn test_invoke_stringifies_results() {
        let registry = ToolRegistry::new().with(Arc::new(Echo("echo")));

        let text = registry
            .invoke(&call("echo", json!({"value": "plain"})))
            .await
            .unwrap_or_else(|e| panic!("invoke failed: {e}"));
        assert_eq!(text.content, "plain");
        assert_eq!(text.tool_call_id, "call_echo");
        assert_eq!(text.name, "echo");

        let object = registry
            .invoke(&call("echo", json!({"value": {"tons": 2.5}})))
            .await
            .unwrap_or_else(|e| panic!("invoke failed: {e}"));
        assert_eq!(object.content, r#"{"tons":2.5}"#);
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let registry = ToolRegistry::new().with(Arc::new(Echo("echo")));
        let err = registry.invoke(&call("missing", json!({}))).await;
        assert!(matches!(err, Err(AgentError::UnknownTool { name }) if name == "missing"));
    }

    #[test]
    fn test_registration_order_and_replacement() {
        let mut registry = ToolRegistry::new()
            .with(Arc::new(Echo("b")))
            .with(Arc::new(Echo("a")));
        registry.register(Arc::new(Echo("b")));
        let names: Vec<_> = registry.definitions().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(registry.len(), 2);
        assert!(registry.contains("a"));
        assert!(!ToolRegistry::new().contains("a"));
    }
}
