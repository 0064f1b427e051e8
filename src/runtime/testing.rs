//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::traits::*;
use crate::llm::{LlmError, LlmRequest, LlmResponse, Message, ToolCallRequest, Usage};
use crate::tools::ToolOutput;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// A plain text answer
pub fn text_response(text: &str) -> LlmResponse {
    LlmResponse {
        message: Message::assistant(text),
        usage: Usage {
            input_tokens: 10,
            output_tokens: 5,
        },
    }
}

/// An answer requesting the given tool calls
pub fn tool_response(calls: Vec<ToolCallRequest>) -> LlmResponse {
    LlmResponse {
        message: Message::assistant_with_tools("", calls),
        usage: Usage {
            input_tokens: 10,
            output_tokens: 5,
        },
    }
}

// ============================================================================
// Mock LLM Client
// ============================================================================

/// Mock LLM client that returns queued responses
pub struct MockLlmClient {
    responses: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    model_id: String,
    /// Record of all requests made
    pub requests: Mutex<Vec<LlmRequest>>,
}

impl MockLlmClient {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            model_id: model_id.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful response
    pub fn queue_response(&self, response: LlmResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    /// Queue an error response
    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_response(&self) -> Result<LlmResponse, LlmError> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.next_response()
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// ============================================================================
// Mock Tool Executor
// ============================================================================

/// Mock tool executor with predefined outputs. Unregistered tools fail with
/// `UnknownTool`.
#[derive(Default)]
pub struct MockToolExecutor {
    outputs: HashMap<String, ToolOutput>,
    /// Record of tool executions
    pub executions: Mutex<Vec<(String, Value)>>,
}

impl MockToolExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool with a predefined output
    #[must_use]
    pub fn with_tool(mut self, name: impl Into<String>, output: ToolOutput) -> Self {
        self.outputs.insert(name.into(), output);
        self
    }

    /// Get recorded executions
    pub fn recorded_executions(&self) -> Vec<(String, Value)> {
        self.executions.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolExecutor for MockToolExecutor {
    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolOutput, ToolExecutionError> {
        self.executions
            .lock()
            .unwrap()
            .push((name.to_string(), Value::Object(arguments)));
        self.outputs
            .get(name)
            .cloned()
            .ok_or_else(|| ToolExecutionError::UnknownTool(name.to_string()))
    }
}

// ============================================================================
// Delayed Mock LLM Client (for cancellation testing)
// ============================================================================

/// Mock LLM client with configurable delay (for testing cancellation)
pub struct DelayedMockLlmClient {
    inner: MockLlmClient,
    delay: Duration,
    /// Notified when request starts (for test synchronization)
    pub request_started: Arc<Notify>,
}

impl DelayedMockLlmClient {
    pub fn new(model_id: impl Into<String>, delay: Duration) -> Self {
        Self {
            inner: MockLlmClient::new(model_id),
            delay,
            request_started: Arc::new(Notify::new()),
        }
    }

    pub fn queue_response(&self, response: LlmResponse) {
        self.inner.queue_response(response);
    }
}

#[async_trait]
impl LlmClient for DelayedMockLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.inner.requests.lock().unwrap().push(request.clone());
        // notify_one stores a permit if nobody is waiting yet
        self.request_started.notify_one();
        tokio::time::sleep(self.delay).await;
        self.inner.next_response()
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}

// ============================================================================
// Delayed Mock Tool Executor (for cancellation testing)
// ============================================================================

/// Mock tool executor with configurable delay
pub struct DelayedMockToolExecutor {
    inner: MockToolExecutor,
    delay: Duration,
    /// Notified when execution starts
    pub execution_started: Arc<Notify>,
}

impl DelayedMockToolExecutor {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MockToolExecutor::new(),
            delay,
            execution_started: Arc::new(Notify::new()),
        }
    }

    #[must_use]
    pub fn with_tool(mut self, name: impl Into<String>, output: ToolOutput) -> Self {
        self.inner = self.inner.with_tool(name, output);
        self
    }
}

#[async_trait]
impl ToolExecutor for DelayedMockToolExecutor {
    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolOutput, ToolExecutionError> {
        self.execution_started.notify_one();
        tokio::time::sleep(self.delay).await;
        self.inner.call_tool(name, arguments).await
    }
}
