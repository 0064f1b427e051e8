//! Runtime for executing conversations
//!
//! Drives the pure state machine: feeds events in, executes the effects it
//! returns, and turns their results into the next events.

mod executor;
mod invoker;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::ConversationRuntime;
pub use invoker::ToolInvoker;
pub use traits::*;

use crate::conversation::ConversationError;
use crate::mcp::McpSession;
use crate::state_machine::TransitionError;
use std::sync::Arc;
use thiserror::Error;

/// Runtime wired to a real model backend and tool server
pub type BridgeRuntime = ConversationRuntime<ServiceLlmClient, Arc<McpSession>>;

/// How a user turn ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The model produced a tool-free answer
    Response(String),
    /// The turn failed recoverably; the next message starts a new turn
    Failed(String),
    /// The turn was abandoned on request
    Cancelled,
}

/// Progress notifications for whoever is watching the conversation
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeEvent {
    ToolsRequested { count: usize },
    ToolStarted { name: String, arguments: String },
    ToolFinished { name: String, success: bool, preview: String },
    Response { text: String },
    Error { message: String },
    Cancelled,
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("conversation history rejected a message: {0}")]
    Conversation(#[from] ConversationError),
    #[error("turn ended without an outcome")]
    NoOutcome,
}
