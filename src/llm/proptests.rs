//! Property-based tests for the backend translation layers
//!
//! These verify that translating history to each wire format and
//! normalizing responses back preserves:
//! - message count, order and roles
//! - tool call ids and argument objects
//! - usage counters
//! - rejection of tool calls without names

use super::ollama::{self, OllamaFunctionCall, OllamaMessage, OllamaResponse, OllamaToolCall};
use super::openai::{
    self, OpenAiChoice, OpenAiFunctionCall, OpenAiMessage, OpenAiResponse, OpenAiToolCall,
    OpenAiUsage,
};
use super::types::{Message, Role, ToolArguments, ToolCallRequest};
use proptest::prelude::*;
use serde_json::{Map, Value};

// ============================================================================
// Strategies
// ============================================================================

/// Flat argument object with scalar values
fn arb_arguments() -> impl Strategy<Value = Map<String, Value>> {
    proptest::collection::btree_map(
        "[a-z_]{1,10}",
        prop_oneof![
            "[a-zA-Z0-9 ]{0,20}".prop_map(Value::String),
            (-1000i64..1000).prop_map(|n| Value::Number(n.into())),
            any::<bool>().prop_map(Value::Bool),
        ],
        0..5,
    )
    .prop_map(|m| m.into_iter().collect())
}

fn arb_tool_call() -> impl Strategy<Value = ToolCallRequest> {
    (
        proptest::option::of("call_[a-z0-9]{4,12}"),
        "[a-z_]{3,24}",
        arb_arguments(),
        any::<bool>(),
    )
        .prop_map(|(id, name, args, raw)| {
            let arguments = if raw {
                ToolArguments::Raw(Value::Object(args).to_string())
            } else {
                ToolArguments::Structured(args)
            };
            ToolCallRequest::new(id, name, arguments)
        })
}

fn arb_message() -> impl Strategy<Value = Message> {
    let text = "[a-zA-Z0-9 _.!?,]{0,80}";
    prop_oneof![
        text.prop_map(Message::system),
        text.prop_map(Message::user),
        text.prop_map(Message::assistant),
        (text, proptest::collection::vec(arb_tool_call(), 1..4))
            .prop_map(|(t, calls)| Message::assistant_with_tools(t, calls)),
        (text, proptest::option::of("call_[a-z0-9]{4,12}"), "[a-z_]{3,24}")
            .prop_map(|(t, id, name)| Message::tool(t, id, name)),
    ]
}

fn openai_response(message: OpenAiMessage) -> OpenAiResponse {
    OpenAiResponse {
        choices: vec![OpenAiChoice {
            message,
            finish_reason: Some("stop".to_string()),
        }],
        usage: Some(OpenAiUsage {
            prompt_tokens: 10,
            completion_tokens: 5,
        }),
    }
}

// ============================================================================
// History translation
// ============================================================================

proptest! {
    #[test]
    fn prop_openai_history_preserves_roles(messages in proptest::collection::vec(arb_message(), 0..10)) {
        let wire: Vec<_> = messages.iter().map(openai::translate_message).collect();
        prop_assert_eq!(wire.len(), messages.len());
        for (msg, out) in messages.iter().zip(&wire) {
            prop_assert_eq!(out.role.as_str(), msg.role.as_str());
        }
    }

    #[test]
    fn prop_ollama_history_preserves_roles(messages in proptest::collection::vec(arb_message(), 0..10)) {
        let wire: Vec<_> = messages.iter().map(ollama::translate_message).collect();
        prop_assert_eq!(wire.len(), messages.len());
        for (msg, out) in messages.iter().zip(&wire) {
            prop_assert_eq!(out.role.as_str(), msg.role.as_str());
            prop_assert_eq!(&out.content, &msg.content);
        }
    }

    /// Outgoing tool calls carry exactly the ids stored in history
    #[test]
    fn prop_openai_tool_call_ids_preserved(calls in proptest::collection::vec(arb_tool_call(), 1..5)) {
        let msg = Message::assistant_with_tools("", calls.clone());
        let wire = openai::translate_message(&msg);
        let wire_calls = wire.tool_calls.unwrap_or_default();
        prop_assert_eq!(wire_calls.len(), calls.len());
        prop_assert!(wire.content.is_none());
        for (call, out) in calls.iter().zip(&wire_calls) {
            prop_assert_eq!(&out.id, &call.id);
        }
    }

    /// Server ids survive normalization; missing ones get fresh distinct ids
    #[test]
    fn prop_openai_normalized_calls_always_have_ids(calls in proptest::collection::vec(arb_tool_call(), 1..5)) {
        let wire = openai::translate_message(&Message::assistant_with_tools("", calls.clone()));
        let response = openai::normalize_response(openai_response(OpenAiMessage {
            role: "assistant".into(),
            content: None,
            tool_calls: wire.tool_calls,
            tool_call_id: None,
            name: None,
        })).unwrap();
        let ids: Vec<String> = response.tool_calls().iter().filter_map(|c| c.id.clone()).collect();
        prop_assert_eq!(ids.len(), calls.len());
        for (i, (call, id)) in calls.iter().zip(&ids).enumerate() {
            match &call.id {
                Some(original) => prop_assert_eq!(id, original),
                None => {
                    let clashes = ids.iter().enumerate().any(|(j, other)| j != i && other == id);
                    prop_assert!(!clashes);
                }
            }
        }
    }

    /// Arguments survive the string encoding used on the OpenAI wire
    #[test]
    fn prop_openai_arguments_round_trip(args in arb_arguments()) {
        let call = ToolCallRequest::new(Some("call_1".into()), "evaluate_benchmark", args.clone().into());
        let wire = openai::translate_message(&Message::assistant_with_tools("", vec![call]));
        let out = wire.tool_calls.unwrap_or_default().remove(0);
        let response = openai::normalize_response(openai_response(OpenAiMessage {
            role: "assistant".into(),
            content: None,
            tool_calls: Some(vec![out]),
            tool_call_id: None,
            name: None,
        })).unwrap();
        prop_assert_eq!(response.tool_calls()[0].arguments.normalize().unwrap(), args);
    }

    /// Arguments survive the object encoding used on the Ollama wire
    #[test]
    fn prop_ollama_arguments_round_trip(args in arb_arguments()) {
        let call = ToolCallRequest::new(None, "evaluate_benchmark", ToolArguments::Raw(Value::Object(args.clone()).to_string()));
        let wire = ollama::translate_message(&Message::assistant_with_tools("", vec![call]));
        let response = ollama::normalize_response(OllamaResponse {
            message: wire,
            prompt_eval_count: 3,
            eval_count: 4,
        });
        prop_assert_eq!(response.tool_calls()[0].arguments.normalize().unwrap(), args);
        prop_assert_eq!(response.usage.input_tokens, 3);
    }

    /// Tool calls without a name are dropped rather than executed
    #[test]
    fn prop_nameless_tool_calls_dropped(names in proptest::collection::vec(prop_oneof!["", "[a-z_]{3,12}"], 1..6)) {
        let expected = names.iter().filter(|n| !n.is_empty()).count();

        let openai_calls = names.iter().enumerate().map(|(i, name)| OpenAiToolCall {
            id: Some(format!("call_{i}")),
            r#type: "function".into(),
            function: OpenAiFunctionCall { name: name.clone(), arguments: Value::String("{}".into()) },
        }).collect();
        let normalized = openai::normalize_response(openai_response(OpenAiMessage {
            role: "assistant".into(),
            content: None,
            tool_calls: Some(openai_calls),
            tool_call_id: None,
            name: None,
        })).unwrap();
        prop_assert_eq!(normalized.tool_calls().len(), expected);

        let ollama_calls = names.iter().map(|name| OllamaToolCall {
            function: OllamaFunctionCall { name: name.clone(), arguments: Value::Object(Map::new()) },
        }).collect();
        let normalized = ollama::normalize_response(OllamaResponse {
            message: OllamaMessage {
                role: "assistant".into(),
                content: String::new(),
                tool_calls: ollama_calls,
                tool_name: None,
            },
            prompt_eval_count: 0,
            eval_count: 0,
        });
        prop_assert_eq!(normalized.tool_calls().len(), expected);
        prop_assert_eq!(normalized.message.role, Role::Assistant);
    }

    /// Text-only completions normalize to a plain assistant message
    #[test]
    fn prop_openai_text_preserved(text in "[a-zA-Z0-9 _.!?,]{1,100}") {
        let normalized = openai::normalize_response(openai_response(OpenAiMessage {
            role: "assistant".into(),
            content: Some(text.clone()),
            tool_calls: None,
            tool_call_id: None,
            name: None,
        })).unwrap();
        prop_assert_eq!(normalized.text(), text.as_str());
        prop_assert!(!normalized.has_tool_use());
        prop_assert_eq!(normalized.usage.output_tokens, 5);
    }
}
