//! Client session with a tool server subprocess

use super::protocol::{
    self, method, CallToolResult, InitializeResult, ToolDefinition, ToolsListResult,
    PROTOCOL_VERSION,
};
use super::transport::StdioTransport;
use super::McpError;
use crate::config::{env_parse_opt, env_var, ConfigError};
use crate::tools::ToolOutput;
use serde_json::{Map, Value};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, Command};

#[cfg(unix)]
use nix::sys::signal::{kill, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

const DEFAULT_COMMAND: &str = "ax-tool-server";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(180);
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// How to launch the tool server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub command: String,
    pub args: Vec<String>,
    /// Added on top of the inherited environment
    pub env: Vec<(String, String)>,
    pub request_timeout: Duration,
}

impl ServerConfig {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: Vec::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let command = env_var("AX_SERVER_COMMAND").unwrap_or_else(|| DEFAULT_COMMAND.to_string());
        let args = env_var("AX_SERVER_ARGS")
            .map(|a| a.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
        let request_timeout = env_parse_opt::<u64>("AX_REQUEST_TIMEOUT_SECS")?
            .map_or(DEFAULT_REQUEST_TIMEOUT, Duration::from_secs);

        Ok(Self {
            command,
            args,
            env: Vec::new(),
            request_timeout,
        })
    }
}

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Initialized,
    Closed,
}

/// A live tool server process and its message channel.
///
/// `close` consumes the session, so it runs at most once. A session that is
/// dropped without being closed still kills its child.
pub struct McpSession {
    child: Option<Child>,
    transport: StdioTransport,
    state: SessionState,
}

impl McpSession {
    /// Spawn the server and attach to its stdin/stdout
    pub fn open(config: &ServerConfig) -> Result<Self, McpError> {
        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .envs(config.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        // Terminal Ctrl-C cancels a turn; it must not reach the server
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|source| McpError::Spawn {
            command: config.command.clone(),
            source,
        })?;

        let stdin = child.stdin.take().ok_or_else(|| McpError::Spawn {
            command: config.command.clone(),
            source: std::io::Error::other("child stdin unavailable"),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| McpError::Spawn {
            command: config.command.clone(),
            source: std::io::Error::other("child stdout unavailable"),
        })?;

        tracing::info!(
            command = %config.command,
            args = ?config.args,
            pid = child.id(),
            "Spawned tool server"
        );

        Ok(Self {
            child: Some(child),
            transport: StdioTransport::new(stdout, stdin, config.request_timeout),
            state: SessionState::Open,
        })
    }

    /// Attach to an already-running server over arbitrary streams
    pub fn from_streams<R, W>(reader: R, writer: W, request_timeout: Duration) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            child: None,
            transport: StdioTransport::new(reader, writer, request_timeout),
            state: SessionState::Open,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Perform the handshake
    pub async fn initialize(&mut self) -> Result<InitializeResult, McpError> {
        let handshake = |e: McpError| McpError::Handshake {
            reason: e.to_string(),
        };

        let value = self
            .transport
            .request(method::INITIALIZE, Some(protocol::initialize_params()))
            .await
            .map_err(handshake)?;
        let result: InitializeResult = protocol::parse_result(value).map_err(handshake)?;

        if result.protocol_version != PROTOCOL_VERSION {
            tracing::warn!(
                server = %result.protocol_version,
                client = PROTOCOL_VERSION,
                "Protocol version mismatch, continuing"
            );
        }

        self.transport
            .notify(method::INITIALIZED, None)
            .await
            .map_err(handshake)?;

        tracing::info!(
            server = %result.server_info.name,
            version = %result.server_info.version,
            "Tool server initialized"
        );
        self.state = SessionState::Initialized;
        Ok(result)
    }

    fn ensure_initialized(&self) -> Result<(), McpError> {
        match self.state {
            SessionState::Initialized => Ok(()),
            SessionState::Open => Err(McpError::NotInitialized),
            SessionState::Closed => Err(McpError::Closed),
        }
    }

    /// Discover every tool the server offers, following pagination
    pub async fn list_tools(&self) -> Result<Vec<ToolDefinition>, McpError> {
        self.ensure_initialized()?;

        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let value = self
                .transport
                .request(method::TOOLS_LIST, protocol::tools_list_params(cursor.as_deref()))
                .await?;
            let page: ToolsListResult = protocol::parse_result(value)?;
            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        tracing::debug!(count = tools.len(), "Discovered tools");
        Ok(tools)
    }

    /// Invoke one tool. Tool-level failures come back as an unsuccessful
    /// output; only transport and protocol failures are errors.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolOutput, McpError> {
        self.ensure_initialized()?;

        let value = self
            .transport
            .request(method::TOOLS_CALL, Some(protocol::tools_call_params(name, arguments)))
            .await?;
        let result: CallToolResult = protocol::parse_result(value)?;
        let text = result.joined_text();

        Ok(if result.is_error {
            ToolOutput::error(text)
        } else {
            ToolOutput::success(text)
        })
    }

    /// Terminate the server and release the channel
    pub async fn close(mut self) -> Result<(), McpError> {
        self.state = SessionState::Closed;
        self.transport.shutdown().await;

        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        // The server normally exits on stdin EOF; nudge it if not
        if let Ok(Some(status)) = child.try_wait() {
            tracing::info!(%status, "Tool server already exited");
            return Ok(());
        }
        Self::terminate(&child);

        match tokio::time::timeout(CLOSE_GRACE, child.wait()).await {
            Ok(Ok(status)) => {
                tracing::info!(%status, "Tool server exited");
                Ok(())
            }
            Ok(Err(e)) => Err(McpError::Io(e)),
            Err(_) => {
                tracing::warn!("Tool server did not exit in time, killing");
                child.kill().await?;
                Ok(())
            }
        }
    }

    #[cfg(unix)]
    fn terminate(child: &Child) {
        let Some(pid) = child.id().and_then(|id| i32::try_from(id).ok()) else {
            return;
        };
        if let Err(e) = kill(Pid::from_raw(pid), Signal::SIGTERM) {
            tracing::debug!(error = %e, pid, "SIGTERM failed");
        }
    }

    #[cfg(not(unix))]
    fn terminate(_child: &Child) {}
}
