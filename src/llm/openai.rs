//! `OpenAI`-compatible chat completions provider
//!
//! Works against llama.cpp's server, vLLM and `OpenAI` itself. Tool calls
//! carry ids and their arguments arrive as JSON text.

use super::types::{
    LlmRequest, LlmResponse, Message, Role, ToolArguments, ToolCallRequest, Usage,
};
use super::{LlmError, LlmService};
use crate::catalog::FunctionSpec;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// OpenAI-compatible service implementation
pub struct OpenAiService {
    client: Client,
    api_key: Option<String>,
    endpoint: String,
    model_id: String,
}

impl OpenAiService {
    pub fn new(
        base_url: &str,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            endpoint: format!("{}/v1/chat/completions", base_url.trim_end_matches('/')),
            model_id: model.into(),
        })
    }

    pub(super) fn translate_request(&self, request: &LlmRequest) -> OpenAiRequest {
        let tools: Vec<OpenAiTool> = request.tools.iter().map(OpenAiTool::from).collect();
        let has_tools = !tools.is_empty();

        OpenAiRequest {
            model: self.model_id.clone(),
            messages: request.messages.iter().map(translate_message).collect(),
            tools: has_tools.then_some(tools),
            tool_choice: has_tools.then(|| "auto".to_string()),
            max_tokens: request.sampling.max_tokens,
            temperature: request.sampling.temperature,
            stream: false,
        }
    }

    async fn send(&self, body: &OpenAiRequest) -> Result<String, LlmError> {
        let mut builder = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json");
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .json(body)
            .send()
            .await
            .map_err(|e| LlmError::from_reqwest(&e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            let message = serde_json::from_str::<OpenAiErrorResponse>(&text)
                .map_or_else(|_| text.clone(), |err| err.error.message);
            return Err(LlmError::from_status(status.as_u16(), &message));
        }
        Ok(text)
    }
}

/// Translate one history message to the wire format
pub(super) fn translate_message(msg: &Message) -> OpenAiMessage {
    let tool_calls: Vec<OpenAiToolCall> = msg
        .tool_calls
        .iter()
        .map(|call| OpenAiToolCall {
            id: call.id.clone(),
            r#type: "function".to_string(),
            function: OpenAiFunctionCall {
                name: call.name.clone(),
                arguments: Value::String(call.arguments.to_json_string()),
            },
        })
        .collect();

    // Assistant messages that only call tools carry null content
    let content = if msg.content.is_empty() && !tool_calls.is_empty() {
        None
    } else {
        Some(msg.content.clone())
    };

    OpenAiMessage {
        role: msg.role.as_str().to_string(),
        content,
        tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
        tool_call_id: msg.tool_call_id.clone(),
        name: if msg.role == Role::Tool {
            msg.name.clone()
        } else {
            None
        },
    }
}

/// Normalize a completion into an assistant message
pub(super) fn normalize_response(resp: OpenAiResponse) -> Result<LlmResponse, LlmError> {
    let choice = resp
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::unknown("No choices in response"))?;

    let tool_calls: Vec<ToolCallRequest> = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .filter(|tc| !tc.function.name.is_empty())
        .map(|tc| {
            let arguments = match tc.function.arguments {
                Value::String(text) => ToolArguments::Raw(text),
                Value::Object(map) => ToolArguments::Structured(map),
                Value::Null => ToolArguments::empty(),
                other => ToolArguments::Raw(other.to_string()),
            };
            // Tool results are matched by id on this wire, so the id must live in history
            let id = tc
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple()));
            ToolCallRequest::new(Some(id), tc.function.name, arguments)
        })
        .collect();

    let content = choice.message.content.unwrap_or_default();
    if content.is_empty() && tool_calls.is_empty() {
        tracing::warn!(finish_reason = ?choice.finish_reason, "Model returned an empty message");
    }

    let usage = resp.usage.unwrap_or_default();
    Ok(LlmResponse {
        message: Message::assistant_with_tools(content, tool_calls),
        usage: Usage {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        },
    })
}

#[async_trait]
impl LlmService for OpenAiService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let body = self.translate_request(request);
        let text = self.send(&body).await?;

        let response: OpenAiResponse = serde_json::from_str(&text).map_err(|e| {
            LlmError::unknown(format!("Failed to parse response: {e} - body: {text}"))
        })?;

        normalize_response(response)
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// OpenAI API types

#[derive(Debug, Serialize)]
pub(super) struct OpenAiRequest {
    pub model: String,
    pub messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<OpenAiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    pub stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct OpenAiMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<OpenAiToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct OpenAiTool {
    pub r#type: String,
    pub function: FunctionSpec,
}

impl From<&FunctionSpec> for OpenAiTool {
    fn from(spec: &FunctionSpec) -> Self {
        Self {
            r#type: "function".to_string(),
            function: spec.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct OpenAiToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default = "function_type")]
    pub r#type: String,
    pub function: OpenAiFunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct OpenAiFunctionCall {
    pub name: String,
    /// A JSON string per the API; some servers send an object instead
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Deserialize)]
pub(super) struct OpenAiResponse {
    pub choices: Vec<OpenAiChoice>,
    #[serde(default)]
    pub usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
pub(super) struct OpenAiChoice {
    pub message: OpenAiMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[allow(clippy::struct_field_names)]
pub(super) struct OpenAiUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorResponse {
    error: OpenAiError,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    message: String,
}
