//! `ax_bridge` - connects a tool-calling chat model to an Ax optimization
//! tool server over stdio JSON-RPC.
//!
//! The conversation loop is a pure state machine (`state_machine`) driven by
//! an effect executor (`runtime`). The tool server side (`server`, `tools`,
//! `optimizer`, `benchmarks`) ships as the `ax-tool-server` binary.

pub mod benchmarks;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod conversation;
pub mod llm;
pub mod mcp;
pub mod optimizer;
pub mod runtime;
pub mod server;
pub mod state_machine;
pub mod system_prompt;
pub mod tools;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber, writing to stderr
///
/// `RUST_LOG` overrides `default_filter`; `AX_LOG_FORMAT=json` selects
/// JSON lines.
pub fn init_logging(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());
    let json = config::env_var("AX_LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_span_list(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
