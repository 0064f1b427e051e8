//! Client side of the tool server channel
//!
//! Spawns the server as a subprocess and talks JSON-RPC 2.0 over its
//! stdin/stdout, one message per line.

mod error;
pub mod protocol;
mod session;
mod transport;

pub use error::McpError;
pub use protocol::{CallToolResult, ToolDefinition};
pub use session::{McpSession, ServerConfig, SessionState};
pub use transport::write_line;
