//! Runs a single tool call and frames its outcome as a tool message
//!
//! Nothing below this boundary escapes as an error: argument problems
//! degrade to an empty mapping and execution failures become `Error: ...`
//! content the model can react to.

use super::traits::ToolExecutor;
use crate::llm::Message;
use crate::state_machine::ToolCall;
use std::sync::Arc;

const PREVIEW_CHARS: usize = 100;
const ERROR_PREFIX: &str = "Error:";

pub struct ToolInvoker<T: ToolExecutor> {
    executor: Arc<T>,
}

impl<T: ToolExecutor> ToolInvoker<T> {
    pub fn new(executor: Arc<T>) -> Self {
        Self { executor }
    }

    /// Execute one call; always yields a tool message
    pub async fn invoke(&self, call: &ToolCall) -> Message {
        self.invoke_tracked(call).await.0
    }

    /// Like `invoke`, also reporting whether the tool succeeded
    pub async fn invoke_tracked(&self, call: &ToolCall) -> (Message, bool) {
        let name = call.name();
        let arguments = match call.request.arguments.normalize() {
            Ok(map) => map,
            Err(e) => {
                tracing::warn!(tool = %name, error = %e, "Unparseable tool arguments, using {{}}");
                serde_json::Map::new()
            }
        };

        tracing::info!(
            tool = %name,
            position = call.position,
            arguments = %serde_json::Value::Object(arguments.clone()),
            "Executing tool"
        );

        let (content, success) = match self.executor.call_tool(name, arguments).await {
            Ok(output) if output.success => (output.output, true),
            Ok(output) if output.output.starts_with(ERROR_PREFIX) => (output.output, false),
            Ok(output) => (format!("{ERROR_PREFIX} {}", output.output), false),
            Err(e) => (format!("{ERROR_PREFIX} executing {name}: {e}"), false),
        };

        tracing::info!(
            tool = %name,
            success,
            preview = %preview(&content),
            "Tool finished"
        );

        let message = Message::tool(content, call.request.id.clone(), name);
        (message, success)
    }
}

/// First characters of a tool result, for logs and progress output
pub fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
