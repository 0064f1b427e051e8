//! Effects produced by state transitions

use crate::llm::Message;
use crate::state_machine::state::ToolCall;

/// Effects to be executed after state transition, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Append a message to the conversation history
    AppendMessage { message: Message },

    /// Send the full history to the model
    RequestLlm,

    /// Run one tool call through the invoker
    ExecuteTool { tool: ToolCall },

    /// The model asked for tools
    NotifyToolsRequested { count: usize },

    /// Hand the final answer of the turn to the caller
    EmitResponse { text: String },

    /// Surface a recoverable failure to the caller
    ReportError { message: String },

    /// The in-flight turn was abandoned
    NotifyCancelled,
}

impl Effect {
    pub fn append(message: Message) -> Self {
        Effect::AppendMessage { message }
    }

    pub fn execute_tool(tool: ToolCall) -> Self {
        Effect::ExecuteTool { tool }
    }

    pub fn report_error(message: impl Into<String>) -> Self {
        Effect::ReportError {
            message: message.into(),
        }
    }
}
