//! Conversation state types

use crate::llm::{Message, ToolCallRequest};
use serde::{Deserialize, Serialize};

/// Default cap on tool rounds within one user turn
pub const DEFAULT_MAX_TOOL_ROUNDS: u32 = 16;

// ============================================================================
// Tool Call - A tool invocation with its position in the request
// ============================================================================

/// A tool call from the LLM, tagged with its position in the assistant
/// message so results can be correlated even when the backend sends no ids
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub position: usize,
    pub request: ToolCallRequest,
}

impl ToolCall {
    pub fn new(position: usize, request: ToolCallRequest) -> Self {
        Self { position, request }
    }

    pub fn name(&self) -> &str {
        &self.request.name
    }

    pub fn id(&self) -> Option<&str> {
        self.request.id.as_deref()
    }

    /// Tag every request of an assistant message with its position
    pub fn from_message(message: &Message) -> Vec<ToolCall> {
        message
            .tool_calls
            .iter()
            .cloned()
            .enumerate()
            .map(|(position, request)| ToolCall::new(position, request))
            .collect()
    }

    /// A tool message answering this call without running it
    pub fn error_message(&self, reason: &str) -> Message {
        Message::tool(
            format!("Error: {reason}"),
            self.request.id.clone(),
            self.request.name.clone(),
        )
    }
}

// ============================================================================
// Conversation State
// ============================================================================

/// Why the conversation is in the error state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The model backend failed
    Llm,
    /// The model kept requesting tools past the round cap
    RoundLimit,
}

/// Conversation state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConvState {
    /// Ready for user input, no pending operations
    #[default]
    AwaitingInput,

    /// Waiting for the model. `round` counts tool rounds already run in
    /// this turn.
    LlmRequesting { round: u32 },

    /// Running tool calls one at a time, in request order
    ToolExecuting {
        round: u32,
        current: ToolCall,
        remaining: Vec<ToolCall>,
    },

    /// The last turn failed; accepts new input like `AwaitingInput`
    Error { message: String, kind: ErrorKind },
}

impl ConvState {
    /// Check if the conversation can take a user message
    pub fn accepts_input(&self) -> bool {
        matches!(self, ConvState::AwaitingInput | ConvState::Error { .. })
    }

    /// Check if agent is currently working
    pub fn is_busy(&self) -> bool {
        !self.accepts_input()
    }
}

/// Context for a conversation (immutable configuration)
#[derive(Debug, Clone)]
pub struct ConvContext {
    pub conversation_id: String,
    /// Maximum tool rounds per user turn
    pub max_tool_rounds: u32,
}

impl ConvContext {
    pub fn new(max_tool_rounds: u32) -> Self {
        Self {
            conversation_id: uuid::Uuid::new_v4().to_string(),
            max_tool_rounds,
        }
    }
}

impl Default for ConvContext {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TOOL_ROUNDS)
    }
}
