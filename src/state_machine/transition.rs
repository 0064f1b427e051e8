//! Pure state transition function

use super::state::{ErrorKind, ToolCall};
use super::{ConvContext, ConvState, Effect, Event};
use crate::llm::{Message, Role};
use thiserror::Error;

const CANCELLED_REASON: &str = "cancelled by user before completion";

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ConvState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ConvState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Agent is busy, cannot accept message (cancel current operation first)")]
    AgentBusy,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
///
/// Given the same inputs it always produces the same outputs, with no I/O.
/// Every `RequestLlm` is preceded in the same result by at least one
/// `AppendMessage`, so the model never sees an unchanged history twice.
pub fn transition(
    state: &ConvState,
    context: &ConvContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // User Message Handling
        // ============================================================

        // AwaitingInput/Error + UserMessage -> LlmRequesting
        (ConvState::AwaitingInput | ConvState::Error { .. }, Event::UserMessage { text }) => {
            Ok(TransitionResult::new(ConvState::LlmRequesting { round: 0 })
                .with_effect(Effect::append(Message::user(text)))
                .with_effect(Effect::RequestLlm))
        }

        (ConvState::LlmRequesting { .. } | ConvState::ToolExecuting { .. }, Event::UserMessage { .. }) => {
            Err(TransitionError::AgentBusy)
        }

        // ============================================================
        // LLM Response Processing
        // ============================================================
        (ConvState::LlmRequesting { round }, Event::LlmResponse { message, .. }) => {
            if message.role != Role::Assistant {
                return Err(TransitionError::InvalidTransition(format!(
                    "model response has role {}",
                    message.role.as_str()
                )));
            }

            if !message.has_tool_calls() {
                let text = message.content.clone();
                return Ok(TransitionResult::new(ConvState::AwaitingInput)
                    .with_effect(Effect::append(message))
                    .with_effect(Effect::EmitResponse { text }));
            }

            let calls = ToolCall::from_message(&message);

            if *round >= context.max_tool_rounds {
                // Answer every request with an error so the history stays correlated
                let reason = format!(
                    "tool round limit ({}) reached, call was not executed",
                    context.max_tool_rounds
                );
                let report = format!(
                    "Stopped after {} tool rounds without a final answer",
                    context.max_tool_rounds
                );
                return Ok(TransitionResult::new(ConvState::Error {
                    message: report.clone(),
                    kind: ErrorKind::RoundLimit,
                })
                .with_effect(Effect::append(message))
                .with_effects(calls.iter().map(|c| Effect::append(c.error_message(&reason))))
                .with_effect(Effect::report_error(report)));
            }

            let count = calls.len();
            let mut calls = calls.into_iter();
            let Some(first) = calls.next() else {
                return Err(TransitionError::InvalidTransition(
                    "tool request list vanished".to_string(),
                ));
            };

            Ok(TransitionResult::new(ConvState::ToolExecuting {
                round: round + 1,
                current: first.clone(),
                remaining: calls.collect(),
            })
            .with_effect(Effect::append(message))
            .with_effect(Effect::NotifyToolsRequested { count })
            .with_effect(Effect::execute_tool(first)))
        }

        // LlmRequesting + LlmError -> Error (recoverable on next input)
        (ConvState::LlmRequesting { .. }, Event::LlmError { message, kind }) => {
            let report = if kind.is_retryable() {
                format!("{message} (send another message to try again)")
            } else {
                message
            };
            Ok(TransitionResult::new(ConvState::Error {
                message: report.clone(),
                kind: ErrorKind::Llm,
            })
            .with_effect(Effect::report_error(report)))
        }

        // ============================================================
        // Tool Execution
        // ============================================================
        (
            ConvState::ToolExecuting {
                round,
                current,
                remaining,
            },
            Event::ToolComplete { position, message },
        ) => {
            if position != current.position {
                return Err(TransitionError::InvalidTransition(format!(
                    "result for tool position {position}, expected {}",
                    current.position
                )));
            }
            if message.role != Role::Tool {
                return Err(TransitionError::InvalidTransition(format!(
                    "tool result has role {}",
                    message.role.as_str()
                )));
            }

            let result = TransitionResult::new(ConvState::AwaitingInput)
                .with_effect(Effect::append(message));

            match remaining.split_first() {
                Some((next, rest)) => Ok(TransitionResult {
                    new_state: ConvState::ToolExecuting {
                        round: *round,
                        current: next.clone(),
                        remaining: rest.to_vec(),
                    },
                    ..result
                }
                .with_effect(Effect::execute_tool(next.clone()))),
                None => Ok(TransitionResult {
                    new_state: ConvState::LlmRequesting { round: *round },
                    ..result
                }
                .with_effect(Effect::RequestLlm)),
            }
        }

        // ============================================================
        // Cancellation
        // ============================================================

        // In-flight response is discarded; nothing was appended for it
        (ConvState::LlmRequesting { .. }, Event::Cancel) => {
            Ok(TransitionResult::new(ConvState::AwaitingInput).with_effect(Effect::NotifyCancelled))
        }

        // Unfinished calls still get a result each
        (ConvState::ToolExecuting { current, remaining, .. }, Event::Cancel) => {
            Ok(TransitionResult::new(ConvState::AwaitingInput)
                .with_effects(
                    std::iter::once(current)
                        .chain(remaining.iter())
                        .map(|c| Effect::append(c.error_message(CANCELLED_REASON))),
                )
                .with_effect(Effect::NotifyCancelled))
        }

        (ConvState::AwaitingInput | ConvState::Error { .. }, Event::Cancel) => {
            Ok(TransitionResult::new(state.clone()))
        }

        // ============================================================
        // Invalid Transitions
        // ============================================================
        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "No transition from {state:?} with event {event:?}"
        ))),
    }
}
