//! Tool type definitions for function-calling.
//!
//! Provides provider-agnostic types for tool definitions, calls and
//! results, plus the [`Tool`] capability trait every registered tool
//! implements.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AgentError;

/// A tool definition that can be sent to an LLM for function-calling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name (must match the registry key).
    pub name: String,
    /// Human-readable description of what the tool does.
    pub description: String,
    /// JSON Schema object describing the tool's parameters.
    pub parameters: Value,
}

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this call (assigned by the provider).
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// Decoded argument mapping.
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

/// The result of executing a tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// ID of the tool call this result corresponds to.
    pub tool_call_id: String,
    /// Name of the tool that produced the result.
    pub name: String,
    /// Stringified result payload.
    pub content: String,
}

/// A named capability the model can invoke.
///
/// Implementations validate their own arguments and report bad input as
/// [`AgentError::ToolExecution`].
#[async_trait]
pub trait Tool: Send + Sync {
    /// Schema advertised to the model. `definition().name` is the
    /// registry key.
    fn definition(&self) -> ToolDefinition;

    /// Runs the tool.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on invalid arguments or collaborator failure.
    async fn invoke(&self, arguments: &Map<String, Value>) -> Result<Value, AgentError>;
}

/// Renders a tool result as the string payload sent back to the model.
///
/// JSON strings are passed through verbatim; every other value is
/// serialized.
#[must_use]
pub fn stringify_result(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Decodes the JSON-encoded arguments string a provider returns.
///
/// An empty string decodes to an empty mapping.
///
/// # Errors
///
/// Returns [`AgentError::ResponseParse`] if the arguments are not a JSON
/// object.
pub fn parse_arguments(tool: &str, raw: &str) -> Result<Map<String, Value>, AgentError> {
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(AgentError::ResponseParse {
            message: format!("arguments for tool '{tool}' are not a JSON object"),
            content: other.to_string(),
        }),
        Err(e) => Err(AgentError::ResponseParse {
            message: format!("invalid JSON arguments for tool '{tool}': {e}"),
            content: raw.to_string(),
        }),
    }
}

/// Reads a required numeric argument.
pub(crate) fn required_f64(
    tool: &str,
    args: &Map<String, Value>,
    key: &str,
) -> Result<f64, AgentError> {
    optional_f64(tool, args, key)?.ok_or_else(|| AgentError::ToolExecution {
        name: tool.to_string(),
        message: format!("missing required argument '{key}'"),
    })
}

/// Reads an optional numeric argument, accepting numeric strings.
pub(crate) fn optional_f64(
    tool: &str,
    args: &Map<String, Value>,
    key: &str,
) -> Result<Option<f64>, AgentError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) => {
            s.trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_| AgentError::ToolExecution {
                    name: tool.to_string(),
                    message: format!("argument '{key}' is not a number: {s:?}"),
                })
        }
        Some(other) => Err(AgentError::ToolExecution {
            name: tool.to_string(),
            message: format!("argument '{key}' is not a number: {other}"),
        }),
    }
}

/// Reads a required string argument.
pub(crate) fn required_str<'a>(
    tool: &str,
    args: &'a Map<String, Value>,
    key: &str,
) -> Result<&'a str, AgentError> {
    optional_str(args, key).ok_or_else(|| AgentError::ToolExecution {
        name: tool.to_string(),
        message: format!("missing required string argument '{key}'"),
    })
}

/// Reads an optional, non-empty string argument.
pub(crate) fn optional_str<'a>(args: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_stringify_result() {
        assert_eq!(stringify_result(&json!("plain text")), "plain text");
        assert_eq!(stringify_result(&json!(42)), "42");
        assert_eq!(stringify_result(&json!({"a": 1})), r#"{"a":1}"#);
    }

    #[test]
    fn test_parse_arguments() {
        let map = parse_arguments("t", r#"{"crop":"corn"}"#).unwrap_or_default();
        assert_eq!(map.get("crop"), Some(&json!("corn")));
        assert!(parse_arguments("t", "").unwrap_or_default().is_empty());
        assert!(matches!(
            parse_arguments("t", "[1,2]"),
            Err(AgentError::ResponseParse { .. })
        ));
        assert!(parse_arguments("t", "{not json").is_err());
    }

    #[test]
    fn test_numeric_arguments() {
        let a = args(json!({"ph": 6.5, "acres": "10", "bad": true}));
        assert!((required_f64("t", &a, "ph").unwrap_or_default() - 6.5).abs() < f64::EPSILON);
        assert!((required_f64("t", &a, "acres").unwrap_or_default() - 10.0).abs() < f64::EPSILON);
        assert!(required_f64("t", &a, "missing").is_err());
        assert!(required_f64("t", &a, "bad").is_err());
        assert_eq!(optional_f64("t", &a, "missing").ok(), Some(None));
    }

    #[test]
    fn test_string_arguments() {
        let a = args(json!({"crop": " corn ", "empty": ""}));
        assert_eq!(required_str("t", &a, "crop").ok(), Some("corn"));
        assert!(required_str("t", &a, "empty").is_err());
        assert_eq!(optional_str(&a, "nope"), None);
    }

    #[test]
    fn test_tool_call_serialization() {
        let call = ToolCall {
            id: "call_123".to_string(),
            name: "get_crop_info".to_string(),
            arguments: args(json!({"crop": "corn"})),
        };
        let json = serde_json::to_string(&call).unwrap_or_default();
        assert!(json.contains("call_123"));
        assert!(json.contains("get_crop_info"));
        assert!(json.contains("corn"));
    }
}
