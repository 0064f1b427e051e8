//! Ollama chat provider
//!
//! Tool calls come back without ids and with arguments already parsed into
//! objects, so results are correlated by position.

use super::types::{LlmRequest, LlmResponse, Message, Role, ToolArguments, ToolCallRequest, Usage};
use super::{LlmError, LlmService};
use crate::catalog::FunctionSpec;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub struct OllamaService {
    client: Client,
    endpoint: String,
    model_id: String,
}

impl OllamaService {
    pub fn new(base_url: &str, model: impl Into<String>, timeout: Duration) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/api/chat", base_url.trim_end_matches('/')),
            model_id: model.into(),
        })
    }

    pub(super) fn translate_request(&self, request: &LlmRequest) -> OllamaRequest {
        let options = OllamaOptions {
            temperature: request.sampling.temperature,
            num_predict: request.sampling.max_tokens,
        };

        OllamaRequest {
            model: self.model_id.clone(),
            messages: request.messages.iter().map(translate_message).collect(),
            tools: request.tools.iter().map(FunctionSpec::to_tool_json).collect(),
            stream: false,
            options: (!options.is_empty()).then_some(options),
        }
    }
}

pub(super) fn translate_message(msg: &Message) -> OllamaMessage {
    OllamaMessage {
        role: msg.role.as_str().to_string(),
        content: msg.content.clone(),
        tool_calls: msg
            .tool_calls
            .iter()
            .map(|call| OllamaToolCall {
                function: OllamaFunctionCall {
                    name: call.name.clone(),
                    arguments: call.arguments.to_value(),
                },
            })
            .collect(),
        tool_name: if msg.role == Role::Tool {
            msg.name.clone()
        } else {
            None
        },
    }
}

pub(super) fn normalize_response(resp: OllamaResponse) -> LlmResponse {
    let tool_calls = resp
        .message
        .tool_calls
        .into_iter()
        .filter(|tc| !tc.function.name.is_empty())
        .map(|tc| {
            let arguments = match tc.function.arguments {
                Value::Object(map) => ToolArguments::Structured(map),
                Value::String(text) => ToolArguments::Raw(text),
                Value::Null => ToolArguments::empty(),
                other => ToolArguments::Raw(other.to_string()),
            };
            ToolCallRequest::new(None, tc.function.name, arguments)
        })
        .collect();

    LlmResponse {
        message: Message::assistant_with_tools(resp.message.content, tool_calls),
        usage: Usage {
            input_tokens: resp.prompt_eval_count,
            output_tokens: resp.eval_count,
        },
    }
}

#[async_trait]
impl LlmService for OllamaService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let body = self.translate_request(request);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::from_reqwest(&e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            let message = serde_json::from_str::<OllamaErrorResponse>(&text)
                .map_or_else(|_| text.clone(), |err| err.error);
            return Err(LlmError::from_status(status.as_u16(), &message));
        }

        let parsed: OllamaResponse = serde_json::from_str(&text).map_err(|e| {
            LlmError::unknown(format!("Failed to parse response: {e} - body: {text}"))
        })?;
        Ok(normalize_response(parsed))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// Ollama API types

#[derive(Debug, Serialize)]
pub(super) struct OllamaRequest {
    pub model: String,
    pub messages: Vec<OllamaMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Value>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<OllamaOptions>,
}

#[derive(Debug, Serialize)]
pub(super) struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<u32>,
}

impl OllamaOptions {
    fn is_empty(&self) -> bool {
        self.temperature.is_none() && self.num_predict.is_none()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct OllamaMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<OllamaToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct OllamaToolCall {
    pub function: OllamaFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct OllamaFunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Deserialize)]
pub(super) struct OllamaResponse {
    pub message: OllamaMessage,
    #[serde(default)]
    pub prompt_eval_count: u64,
    #[serde(default)]
    pub eval_count: u64,
}

#[derive(Debug, Deserialize)]
struct OllamaErrorResponse {
    error: String,
}
