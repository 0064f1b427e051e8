//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::state::*;
use super::transition::*;
use super::*;
use crate::llm::{LlmErrorKind, Message, Role, ToolArguments, ToolCallRequest, Usage};
use proptest::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

fn test_context() -> ConvContext {
    ConvContext::new(4)
}

fn appended(result: &TransitionResult) -> Vec<&Message> {
    result
        .effects
        .iter()
        .filter_map(|e| match e {
            Effect::AppendMessage { message } => Some(message),
            _ => None,
        })
        .collect()
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_request() -> impl Strategy<Value = ToolCallRequest> {
    (
        proptest::option::of("call_[a-z0-9]{6}"),
        prop_oneof![
            Just("evaluate_benchmark"),
            Just("create_study"),
            Just("provide_best_parameters"),
        ],
        prop_oneof![
            Just(ToolArguments::empty()),
            "[a-z{}\":, 0-9]{0,20}".prop_map(ToolArguments::Raw),
        ],
    )
        .prop_map(|(id, name, arguments)| ToolCallRequest::new(id, name, arguments))
}

fn arb_assistant_message() -> impl Strategy<Value = Message> {
    (
        "[a-zA-Z .]{0,30}",
        proptest::collection::vec(arb_request(), 0..5),
    )
        .prop_map(|(text, calls)| Message::assistant_with_tools(text, calls))
}

fn arb_error_kind() -> impl Strategy<Value = LlmErrorKind> {
    prop_oneof![
        Just(LlmErrorKind::Network),
        Just(LlmErrorKind::RateLimit),
        Just(LlmErrorKind::ServerError),
        Just(LlmErrorKind::Auth),
        Just(LlmErrorKind::InvalidRequest),
        Just(LlmErrorKind::Unknown),
    ]
}

fn arb_tool_executing_state() -> impl Strategy<Value = ConvState> {
    (1u32..4, proptest::collection::vec(arb_request(), 1..5)).prop_map(|(round, requests)| {
        let mut calls = requests
            .into_iter()
            .enumerate()
            .map(|(i, r)| ToolCall::new(i, r));
        let current = calls.next().expect("at least one request");
        ConvState::ToolExecuting {
            round,
            current,
            remaining: calls.collect(),
        }
    })
}

fn arb_state() -> impl Strategy<Value = ConvState> {
    prop_oneof![
        Just(ConvState::AwaitingInput),
        (0u32..6).prop_map(|round| ConvState::LlmRequesting { round }),
        arb_tool_executing_state(),
        "[a-zA-Z ]{1,30}".prop_map(|message| ConvState::Error {
            message,
            kind: ErrorKind::Llm,
        }),
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        "[a-zA-Z ]{1,30}".prop_map(|text| Event::UserMessage { text }),
        Just(Event::Cancel),
        arb_assistant_message().prop_map(|message| Event::LlmResponse {
            message,
            usage: Usage::default(),
        }),
        ("[a-zA-Z ]{1,30}", arb_error_kind())
            .prop_map(|(message, kind)| Event::LlmError { message, kind }),
        (0usize..5, "[a-z0-9 ]{0,20}").prop_map(|(position, content)| Event::ToolComplete {
            position,
            message: Message::tool(content, None, "evaluate_benchmark"),
        }),
    ]
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Any event sequence either transitions or is rejected; nothing panics
    #[test]
    fn prop_transitions_preserve_validity(events in proptest::collection::vec(arb_event(), 0..30)) {
        let ctx = test_context();
        let mut state = ConvState::AwaitingInput;
        for event in events {
            if let Ok(result) = transition(&state, &ctx, event) {
                state = result.new_state;
            }
        }
    }

    /// A model request is never issued without appending something first
    #[test]
    fn prop_no_request_without_new_history(state in arb_state(), event in arb_event()) {
        if let Ok(result) = transition(&state, &test_context(), event) {
            if let Some(idx) = result.effects.iter().position(|e| *e == Effect::RequestLlm) {
                let has_prior_append = result.effects[..idx]
                    .iter()
                    .any(|e| matches!(e, Effect::AppendMessage { .. }));
                prop_assert!(has_prior_append);
            }
        }
    }

    #[test]
    fn prop_input_states_accept_messages(
        state in prop_oneof![
            Just(ConvState::AwaitingInput),
            Just(ConvState::Error { message: "x".into(), kind: ErrorKind::RoundLimit }),
        ],
        text in "[a-zA-Z ]{1,30}",
    ) {
        let result = transition(&state, &test_context(), Event::UserMessage { text }).unwrap();
        prop_assert_eq!(result.new_state, ConvState::LlmRequesting { round: 0 });
    }

    #[test]
    fn prop_busy_rejects_messages(
        state in prop_oneof![
            (0u32..6).prop_map(|round| ConvState::LlmRequesting { round }),
            arb_tool_executing_state(),
        ],
    ) {
        let result = transition(&state, &test_context(), Event::UserMessage { text: "hi".into() });
        prop_assert_eq!(result.unwrap_err(), TransitionError::AgentBusy);
    }

    #[test]
    fn prop_llm_error_always_recoverable(
        round in 0u32..5,
        message in "[a-zA-Z ]{1,30}",
        kind in arb_error_kind(),
    ) {
        let result = transition(
            &ConvState::LlmRequesting { round },
            &test_context(),
            Event::LlmError { message, kind },
        ).unwrap();
        prop_assert!(result.new_state.accepts_input());
        prop_assert!(appended(&result).is_empty());
    }

    /// Cancel always lands in an input-accepting state with every started
    /// tool call answered
    #[test]
    fn prop_cancel_stops_work(state in arb_state()) {
        let result = transition(&state, &test_context(), Event::Cancel).unwrap();
        prop_assert!(result.new_state.accepts_input());
        prop_assert!(!result.effects.contains(&Effect::RequestLlm));

        if let ConvState::ToolExecuting { remaining, .. } = &state {
            let tool_msgs = appended(&result);
            prop_assert_eq!(tool_msgs.len(), remaining.len() + 1);
            prop_assert!(tool_msgs.iter().all(|m| m.role == Role::Tool && m.content.starts_with("Error:")));
        }
    }

    /// Walking a full tool round appends exactly one result per request, in
    /// request order, before the next model call
    #[test]
    fn prop_tool_round_appends_in_order(message in arb_assistant_message()) {
        prop_assume!(message.has_tool_calls());
        let ctx = test_context();
        let expected: Vec<_> = message.tool_calls.iter().map(|c| c.name.clone()).collect();

        let mut result = transition(
            &ConvState::LlmRequesting { round: 0 },
            &ctx,
            Event::LlmResponse { message, usage: Usage::default() },
        ).unwrap();

        let mut seen = Vec::new();
        loop {
            let tool = match result.effects.iter().find_map(|e| match e {
                Effect::ExecuteTool { tool } => Some(tool.clone()),
                _ => None,
            }) {
                Some(tool) => tool,
                None => break,
            };
            prop_assert_eq!(tool.position, seen.len());
            let reply = Message::tool(format!("result {}", tool.position), tool.request.id.clone(), tool.name());
            result = transition(
                &result.new_state,
                &ctx,
                Event::ToolComplete { position: tool.position, message: reply },
            ).unwrap();
            for m in appended(&result) {
                seen.push(m.name.clone().unwrap_or_default());
            }
        }

        prop_assert_eq!(seen, expected);
        prop_assert_eq!(result.new_state, ConvState::LlmRequesting { round: 1 });
        prop_assert_eq!(result.effects.last(), Some(&Effect::RequestLlm));
    }

    #[test]
    fn prop_round_limit_never_executes(message in arb_assistant_message(), extra in 0u32..3) {
        prop_assume!(message.has_tool_calls());
        let ctx = test_context();
        let n = message.tool_calls.len();
        let result = transition(
            &ConvState::LlmRequesting { round: ctx.max_tool_rounds + extra },
            &ctx,
            Event::LlmResponse { message, usage: Usage::default() },
        ).unwrap();

        let is_round_limit = matches!(result.new_state, ConvState::Error { kind: ErrorKind::RoundLimit, .. });
        prop_assert!(is_round_limit);
        let executes_tool = result.effects.iter().any(|e| matches!(e, Effect::ExecuteTool { .. }));
        prop_assert!(!executes_tool);
        // assistant message plus one error per request
        prop_assert_eq!(appended(&result).len(), n + 1);
    }

    #[test]
    fn prop_tool_complete_wrong_position_fails(state in arb_tool_executing_state(), offset in 1usize..4) {
        let ConvState::ToolExecuting { current, .. } = &state else { unreachable!() };
        let result = transition(
            &state,
            &test_context(),
            Event::ToolComplete {
                position: current.position + offset,
                message: Message::tool("x", None, "evaluate_benchmark"),
            },
        );
        prop_assert!(matches!(result, Err(TransitionError::InvalidTransition(_))));
    }
}

// ============================================================================
// Scenario Tests
// ============================================================================

#[test]
fn test_complete_tool_cycle() {
    let ctx = test_context();

    let r = transition(
        &ConvState::AwaitingInput,
        &ctx,
        Event::UserMessage {
            text: "evaluate sphere at x=1,y=2".to_string(),
        },
    )
    .unwrap();

    let mut args = serde_json::Map::new();
    args.insert("function_name".into(), "sphere".into());
    let request = ToolCallRequest::new(None, "evaluate_benchmark", args.into());
    let r = transition(
        &r.new_state,
        &ctx,
        Event::LlmResponse {
            message: Message::assistant_with_tools("", vec![request]),
            usage: Usage::default(),
        },
    )
    .unwrap();
    assert!(matches!(r.new_state, ConvState::ToolExecuting { .. }));

    let r = transition(
        &r.new_state,
        &ctx,
        Event::ToolComplete {
            position: 0,
            message: Message::tool("5.0", None, "evaluate_benchmark"),
        },
    )
    .unwrap();
    assert_eq!(r.new_state, ConvState::LlmRequesting { round: 1 });

    let r = transition(
        &r.new_state,
        &ctx,
        Event::LlmResponse {
            message: Message::assistant("The result is 5.0"),
            usage: Usage::default(),
        },
    )
    .unwrap();
    assert_eq!(r.new_state, ConvState::AwaitingInput);
    assert_eq!(
        r.effects.last(),
        Some(&Effect::EmitResponse {
            text: "The result is 5.0".to_string()
        })
    );
}

#[test]
fn test_error_state_recovers_on_next_message() {
    let ctx = test_context();
    let r = transition(
        &ConvState::LlmRequesting { round: 0 },
        &ctx,
        Event::LlmError {
            message: "boom".into(),
            kind: LlmErrorKind::ServerError,
        },
    )
    .unwrap();
    let r = transition(
        &r.new_state,
        &ctx,
        Event::UserMessage {
            text: "try again".into(),
        },
    )
    .unwrap();
    assert_eq!(r.new_state, ConvState::LlmRequesting { round: 0 });
}
