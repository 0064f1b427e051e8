//! Append-only conversation history
//!
//! The full history is resent on every model call. Nothing is ever removed
//! or rewritten once appended.

use crate::llm::{Message, Role};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConversationError {
    #[error("tool message without a preceding assistant tool request")]
    OrphanToolMessage,
    #[error("assistant requested {requested} tool calls but result {index} was appended")]
    TooManyToolResults { requested: usize, index: usize },
    #[error("tool result id `{got}` does not match request id `{expected}` at position {index}")]
    CorrelationMismatch {
        index: usize,
        expected: String,
        got: String,
    },
    #[error("system prompt must be the first message")]
    LateSystemPrompt,
}

/// Ordered message log for one session
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a history whose first message is the given system prompt
    pub fn with_system_prompt(prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(prompt)],
        }
    }

    /// Append a message, checking tool result correlation
    pub fn append(&mut self, message: Message) -> Result<(), ConversationError> {
        match message.role {
            Role::System if !self.messages.is_empty() => {
                return Err(ConversationError::LateSystemPrompt);
            }
            Role::Tool => self.check_tool_correlation(&message)?,
            _ => {}
        }
        self.messages.push(message);
        Ok(())
    }

    fn check_tool_correlation(&self, message: &Message) -> Result<(), ConversationError> {
        // Walk back over the tool results already answering the latest request
        let prior_results = self
            .messages
            .iter()
            .rev()
            .take_while(|m| m.role == Role::Tool)
            .count();
        let assistant = self
            .messages
            .iter()
            .rev()
            .nth(prior_results)
            .filter(|m| m.role == Role::Assistant && m.has_tool_calls())
            .ok_or(ConversationError::OrphanToolMessage)?;

        let request = assistant.tool_calls.get(prior_results).ok_or(
            ConversationError::TooManyToolResults {
                requested: assistant.tool_calls.len(),
                index: prior_results,
            },
        )?;

        if let (Some(expected), Some(got)) = (&request.id, &message.tool_call_id) {
            if expected != got {
                return Err(ConversationError::CorrelationMismatch {
                    index: prior_results,
                    expected: expected.clone(),
                    got: got.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn tool_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.role == Role::Tool)
    }
}
