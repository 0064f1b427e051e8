//! Transport and protocol errors

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum McpError {
    #[error("failed to spawn tool server `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("handshake with tool server failed: {reason}")]
    Handshake { reason: String },

    #[error("session is not initialized")]
    NotInitialized,

    #[error("server returned error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("request `{method}` timed out after {timeout:?}")]
    Timeout { method: String, timeout: Duration },

    #[error("channel to tool server closed")]
    Closed,

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl McpError {
    /// Whether this error ends the session rather than a single request
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            McpError::Spawn { .. } | McpError::Handshake { .. } | McpError::Closed
        )
    }
}
