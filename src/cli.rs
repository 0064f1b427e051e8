//! Interactive line-input loop
//!
//! Each non-blank line is one user turn. `quit`/`exit` ends the loop, as
//! does end of input or Ctrl-C at the prompt. Ctrl-C during a turn cancels
//! just that turn.

use crate::config::{env_parse, ConfigError};
use crate::llm::LlmConfig;
use crate::mcp::ServerConfig;
use crate::runtime::{ConversationRuntime, LlmClient, RuntimeEvent, ToolExecutor, TurnOutcome};
use crate::state_machine::state::DEFAULT_MAX_TOOL_ROUNDS;
use crate::system_prompt::base_prompt_from_env;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast::{self, error::RecvError};

pub const PROMPT: &str = "You: ";

/// Everything the bridge reads from the environment
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub max_tool_rounds: u32,
    /// Base prompt before the tool catalog is appended
    pub system_prompt: String,
}

impl BridgeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            server: ServerConfig::from_env()?,
            llm: LlmConfig::from_env()?,
            max_tool_rounds: env_parse("AX_MAX_TOOL_ROUNDS", DEFAULT_MAX_TOOL_ROUNDS)?,
            system_prompt: base_prompt_from_env(),
        })
    }
}

/// Why the loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplExit {
    Quit,
    EndOfInput,
    Interrupted,
}

pub fn is_quit_command(line: &str) -> bool {
    let line = line.trim();
    line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit")
}

pub async fn run_repl<R, W, L, T>(
    input: R,
    output: &mut W,
    runtime: &mut ConversationRuntime<L, T>,
) -> std::io::Result<ReplExit>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    L: LlmClient + 'static,
    T: ToolExecutor + 'static,
{
    let mut events = runtime.subscribe();
    let mut lines = input.lines();

    loop {
        output.write_all(PROMPT.as_bytes()).await?;
        output.flush().await?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                output.write_all(b"\n").await?;
                return Ok(ReplExit::Interrupted);
            }
        };
        let Some(line) = line else {
            return Ok(ReplExit::EndOfInput);
        };

        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if is_quit_command(text) {
            tracing::info!("Quit requested");
            return Ok(ReplExit::Quit);
        }

        run_turn(text, output, runtime, &mut events).await?;
    }
}

async fn run_turn<W, L, T>(
    text: &str,
    output: &mut W,
    runtime: &mut ConversationRuntime<L, T>,
    events: &mut broadcast::Receiver<RuntimeEvent>,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
    L: LlmClient + 'static,
    T: ToolExecutor + 'static,
{
    let cancel = runtime.cancel_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, cancelling turn");
            cancel.cancel();
        }
    });

    let turn = runtime.submit(text.to_string());
    tokio::pin!(turn);

    let mut events_open = true;
    let result = loop {
        tokio::select! {
            biased;
            event = events.recv(), if events_open => match event {
                Ok(event) => write_event(output, &event).await?,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Dropped progress events");
                }
                Err(RecvError::Closed) => events_open = false,
            },
            result = &mut turn => break result,
        }
    };
    interrupt.abort();

    while let Ok(event) = events.try_recv() {
        write_event(output, &event).await?;
    }

    let line = match result {
        Ok(TurnOutcome::Response(answer)) => format!("Scientist: {answer}\n"),
        Ok(TurnOutcome::Failed(message)) => format!("! Error: {message}\n"),
        Ok(TurnOutcome::Cancelled) => "! Cancelled\n".to_string(),
        Err(e) => {
            tracing::error!(error = %e, "Turn failed");
            format!("! Error: {e}\n")
        }
    };
    output.write_all(line.as_bytes()).await?;
    output.flush().await
}

/// Print tool progress; outcomes are printed from the turn result
async fn write_event<W: AsyncWrite + Unpin>(output: &mut W, event: &RuntimeEvent) -> std::io::Result<()> {
    let line = match event {
        RuntimeEvent::ToolStarted { name, arguments } => format!("> Executing: {name}({arguments})\n"),
        RuntimeEvent::ToolFinished {
            success: true,
            preview,
            ..
        } => format!("< Result: {preview}\n"),
        RuntimeEvent::ToolFinished { preview, .. } => format!("! {preview}\n"),
        RuntimeEvent::ToolsRequested { count } => {
            tracing::debug!(count, "Model requested tools");
            return Ok(());
        }
        RuntimeEvent::Response { .. } | RuntimeEvent::Error { .. } | RuntimeEvent::Cancelled => {
            return Ok(());
        }
    };
    output.write_all(line.as_bytes()).await?;
    output.flush().await
}
