//! Common types for LLM interactions
//!
//! Both backends are normalized into these shapes so the orchestration loop
//! never sees provider-specific correlation or argument encodings.

use crate::catalog::FunctionSpec;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// LLM request
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<FunctionSpec>,
    pub sampling: SamplingParams,
}

/// Sampling parameters forwarded to the backend
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SamplingParams {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

/// Message in conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Only present on assistant messages
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
    /// Only present on tool messages, and only when the backend supplied ids
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Tool name on tool messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn assistant_with_tools(content: impl Into<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            tool_calls,
            ..Self::new(Role::Assistant, content)
        }
    }

    pub fn tool(
        content: impl Into<String>,
        tool_call_id: Option<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            tool_call_id,
            name: Some(name.into()),
            ..Self::new(Role::Tool, content)
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Absent for backends that correlate results by position
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub arguments: ToolArguments,
}

impl ToolCallRequest {
    pub fn new(id: Option<String>, name: impl Into<String>, arguments: ToolArguments) -> Self {
        Self {
            id,
            name: name.into(),
            arguments,
        }
    }
}

/// Arguments as delivered by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolArguments {
    /// Already parsed into a JSON object
    Structured(Map<String, Value>),
    /// Serialized JSON text that still needs parsing
    Raw(String),
}

/// Raw argument text that is not a JSON object
#[derive(Debug, Error)]
#[error("tool arguments are not a JSON object: {reason}")]
pub struct ArgumentParseError {
    pub reason: String,
}

impl ToolArguments {
    pub fn empty() -> Self {
        ToolArguments::Structured(Map::new())
    }

    /// Parse into a JSON object
    pub fn normalize(&self) -> Result<Map<String, Value>, ArgumentParseError> {
        match self {
            ToolArguments::Structured(map) => Ok(map.clone()),
            ToolArguments::Raw(text) if text.trim().is_empty() => Ok(Map::new()),
            ToolArguments::Raw(text) => match serde_json::from_str::<Value>(text) {
                Ok(Value::Object(map)) => Ok(map),
                Ok(other) => Err(ArgumentParseError {
                    reason: format!("expected object, got {other}"),
                }),
                Err(e) => Err(ArgumentParseError {
                    reason: e.to_string(),
                }),
            },
        }
    }

    /// Parse into a JSON object, degrading to an empty mapping
    pub fn normalize_or_empty(&self) -> Map<String, Value> {
        self.normalize().unwrap_or_default()
    }

    /// Encoding used by backends that expect argument strings
    pub fn to_json_string(&self) -> String {
        match self {
            ToolArguments::Structured(map) => {
                serde_json::to_string(map).unwrap_or_else(|_| "{}".to_string())
            }
            ToolArguments::Raw(text) => text.clone(),
        }
    }

    /// Encoding used by backends that expect argument objects
    pub fn to_value(&self) -> Value {
        Value::Object(self.normalize_or_empty())
    }
}

impl From<Map<String, Value>> for ToolArguments {
    fn from(map: Map<String, Value>) -> Self {
        ToolArguments::Structured(map)
    }
}

/// LLM response
#[derive(Debug, Clone)]
pub struct LlmResponse {
    /// Always an assistant message
    pub message: Message,
    pub usage: Usage,
}

impl LlmResponse {
    pub fn tool_calls(&self) -> &[ToolCallRequest] {
        &self.message.tool_calls
    }

    pub fn text(&self) -> &str {
        &self.message.content
    }

    pub fn has_tool_use(&self) -> bool {
        self.message.has_tool_calls()
    }
}

/// Usage statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_raw_arguments_parse() {
        let args = ToolArguments::Raw(r#"{"function_name": "sphere"}"#.to_string());
        let map = args.normalize().unwrap();
        assert_eq!(map.get("function_name"), Some(&json!("sphere")));
    }

    #[test]
    fn test_raw_arguments_invalid_falls_back_to_empty() {
        let args = ToolArguments::Raw("{not json".to_string());
        assert!(args.normalize().is_err());
        assert!(args.normalize_or_empty().is_empty());
    }

    #[test]
    fn test_raw_arguments_non_object_rejected() {
        let args = ToolArguments::Raw("[1, 2]".to_string());
        assert!(args.normalize().is_err());
    }

    #[test]
    fn test_blank_raw_arguments_are_empty_object() {
        let args = ToolArguments::Raw("  ".to_string());
        assert!(args.normalize().unwrap().is_empty());
    }

    #[test]
    fn test_structured_arguments_encode_as_string() {
        let mut map = Map::new();
        map.insert("x".to_string(), json!(1));
        let args = ToolArguments::from(map);
        assert_eq!(args.to_json_string(), r#"{"x":1}"#);
    }

    #[test]
    fn test_tool_message_carries_correlation() {
        let msg = Message::tool("5.0", Some("call_1".to_string()), "evaluate_benchmark");
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(msg.name.as_deref(), Some("evaluate_benchmark"));
    }
}
