//! System prompt construction with tool catalog injection
//!
//! The base prompt sets the scientist role; `AX_SYSTEM_PROMPT` replaces it.
//! The discovered tool catalog is appended so the model sees tool names even
//! when a backend ignores the `tools` field.

use crate::catalog::ToolCatalog;
use crate::config::env_var;
use std::fmt::Write;

/// Base system prompt establishing the agent's role
pub const BASE_PROMPT: &str =
    "You are an autonomous scientist optimized for Ax experiments. Use the provided tools to run benchmarks.";

/// Base prompt, honoring the `AX_SYSTEM_PROMPT` override
pub fn base_prompt_from_env() -> String {
    env_var("AX_SYSTEM_PROMPT").unwrap_or_else(|| BASE_PROMPT.to_string())
}

/// Build the complete system prompt for a session.
pub fn build_system_prompt(base: &str, catalog: &ToolCatalog) -> String {
    let mut prompt = String::from(base.trim_end());

    if !catalog.is_empty() {
        prompt.push_str("\n\n<available_tools>\n");
        for spec in catalog.specs() {
            if spec.description.is_empty() {
                let _ = writeln!(prompt, "- {}", spec.name);
            } else {
                let _ = writeln!(prompt, "- {}: {}", spec.name, spec.description);
            }
        }
        prompt.push_str("</available_tools>");
    }

    prompt
}
