//! Stdio tool server
//!
//! Serves the registry's tools over newline-delimited JSON-RPC. Requests are
//! handled one at a time in arrival order. Nothing but protocol messages may
//! be written to the output stream.

use crate::mcp::protocol::{
    method, CallToolParams, CallToolResult, Implementation, InitializeResult, JsonRpcError,
    JsonRpcMessage, JsonRpcRequest, JsonRpcResponse, ToolsListResult, INTERNAL_ERROR,
    INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR, PROTOCOL_VERSION,
};
use crate::mcp::{write_line, McpError};
use crate::tools::ToolRegistry;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};

pub const SERVER_NAME: &str = "AxOptimizationAgent";

pub struct ToolServer {
    registry: ToolRegistry,
}

impl ToolServer {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    /// Serve until the input stream closes
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<(), McpError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = BufReader::new(reader).lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(response) = self.handle_line(line).await {
                write_line(&mut writer, &response).await?;
            }
        }
        tracing::info!("Client closed the connection");
        Ok(())
    }

    /// Handle one line; `None` when no response is owed
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let value: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "Unparseable line");
                return Some(JsonRpcResponse::error(
                    Value::Null,
                    PARSE_ERROR,
                    format!("Parse error: {e}"),
                ));
            }
        };

        match JsonRpcMessage::from_value(value) {
            Ok(JsonRpcMessage::Request(request)) => Some(self.handle_request(request).await),
            Ok(JsonRpcMessage::Notification(notification)) => {
                if notification.method == method::INITIALIZED {
                    tracing::info!("Client initialized");
                } else {
                    tracing::debug!(method = %notification.method, "Ignoring notification");
                }
                None
            }
            Ok(JsonRpcMessage::Response(response)) => {
                tracing::warn!(id = %response.id, "Ignoring unexpected response");
                None
            }
            Err(e) => Some(JsonRpcResponse::error(
                Value::Null,
                INVALID_REQUEST,
                e.to_string(),
            )),
        }
    }

    async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let JsonRpcRequest {
            id, method, params, ..
        } = request;
        tracing::debug!(%id, %method, "Request");

        match self.dispatch(&method, params).await {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => {
                tracing::warn!(%id, %method, code = error.code, message = %error.message, "Request failed");
                JsonRpcResponse::failure(id, error)
            }
        }
    }

    async fn dispatch(&self, name: &str, params: Option<Value>) -> Result<Value, JsonRpcError> {
        match name {
            method::INITIALIZE => encode(&InitializeResult {
                protocol_version: PROTOCOL_VERSION.to_string(),
                capabilities: json!({ "tools": {} }),
                server_info: Implementation {
                    name: SERVER_NAME.to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                },
                instructions: None,
            }),
            method::PING => Ok(json!({})),
            method::TOOLS_LIST => encode(&ToolsListResult {
                tools: self.registry.definitions(),
                next_cursor: None,
            }),
            method::TOOLS_CALL => self.call_tool(params).await,
            other => Err(rpc_error(
                METHOD_NOT_FOUND,
                format!("Method not found: {other}"),
            )),
        }
    }

    async fn call_tool(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: CallToolParams = serde_json::from_value(params.unwrap_or(Value::Null))
            .map_err(|e| rpc_error(INVALID_PARAMS, format!("Invalid params: {e}")))?;

        let start = std::time::Instant::now();
        let output = self
            .registry
            .execute(&params.name, Value::Object(params.arguments))
            .await
            .ok_or_else(|| rpc_error(INVALID_PARAMS, format!("Unknown tool: {}", params.name)))?;

        tracing::info!(
            tool = %params.name,
            success = output.success,
            duration_ms = %start.elapsed().as_millis(),
            "Tool executed"
        );
        encode(&CallToolResult::text(output.output, !output.success))
    }
}

fn rpc_error(code: i64, message: impl Into<String>) -> JsonRpcError {
    JsonRpcError {
        code,
        message: message.into(),
        data: None,
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|e| rpc_error(INTERNAL_ERROR, e.to_string()))
}
