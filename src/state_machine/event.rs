//! Events that can occur in a conversation

use crate::llm::{LlmErrorKind, Message, Usage};

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    UserMessage {
        text: String,
    },
    Cancel,

    // LLM events
    LlmResponse {
        /// Assistant message, possibly carrying tool call requests
        message: Message,
        usage: Usage,
    },
    LlmError {
        message: String,
        kind: LlmErrorKind,
    },

    // Tool events
    ToolComplete {
        /// Position of the request within its assistant message
        position: usize,
        /// The framed tool message, success or error alike
        message: Message,
    },
}
