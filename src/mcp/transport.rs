//! Newline-delimited JSON-RPC over a pair of byte streams
//!
//! One JSON message per line. A background reader routes each response to
//! the request waiting on its id.

use super::protocol::{JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};
use super::McpError;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

type ResponseWaiter = oneshot::Sender<JsonRpcResponse>;
type PendingMap = Arc<std::sync::Mutex<HashMap<u64, ResponseWaiter>>>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Never held across an await
fn lock_pending(pending: &PendingMap) -> MutexGuard<'_, HashMap<u64, ResponseWaiter>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drops the waiter for `id` however the request ends, including when the
/// caller abandons the future
struct PendingEntry<'a> {
    pending: &'a PendingMap,
    id: u64,
}

impl Drop for PendingEntry<'_> {
    fn drop(&mut self) {
        lock_pending(self.pending).remove(&self.id);
    }
}

/// Write one message as a single line
pub async fn write_line<W, T>(writer: &mut W, message: &T) -> Result<(), McpError>
where
    W: AsyncWrite + Unpin + ?Sized,
    T: Serialize,
{
    let mut line = serde_json::to_vec(message)
        .map_err(|e| McpError::Protocol(format!("failed to encode message: {e}")))?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}

pub struct StdioTransport {
    writer: Mutex<Option<BoxedWriter>>,
    pending: PendingMap,
    next_id: AtomicU64,
    request_timeout: Duration,
    reader_task: JoinHandle<()>,
}

impl StdioTransport {
    pub fn new<R, W>(reader: R, writer: W, request_timeout: Duration) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let pending: PendingMap = Arc::new(std::sync::Mutex::new(HashMap::new()));
        let reader_task = tokio::spawn(Self::read_loop(reader, pending.clone()));

        Self {
            writer: Mutex::new(Some(Box::new(writer))),
            pending,
            next_id: AtomicU64::new(1),
            request_timeout,
            reader_task,
        }
    }

    async fn read_loop<R>(reader: R, pending: PendingMap)
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match JsonRpcMessage::parse(line) {
                        Ok(JsonRpcMessage::Response(response)) => {
                            Self::route_response(&pending, response);
                        }
                        Ok(JsonRpcMessage::Notification(notification)) => {
                            tracing::debug!(method = %notification.method, "Tool server notification");
                        }
                        Ok(JsonRpcMessage::Request(request)) => {
                            tracing::warn!(method = %request.method, "Ignoring request from tool server");
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Discarding unreadable line from tool server");
                        }
                    }
                }
                Ok(None) => {
                    tracing::debug!("Tool server closed its output");
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed reading from tool server");
                    break;
                }
            }
        }
        // Dropping the waiters wakes every in-flight request with `Closed`
        lock_pending(&pending).clear();
    }

    fn route_response(pending: &PendingMap, response: JsonRpcResponse) {
        let Some(id) = response.id.as_u64() else {
            tracing::warn!(id = %response.id, "Response with non-numeric id");
            return;
        };
        let waiter = lock_pending(pending).remove(&id);
        match waiter {
            Some(waiter) => {
                let _ = waiter.send(response);
            }
            None => tracing::warn!(id, "Received response for unknown request id"),
        }
    }

    async fn write_message<T: Serialize>(&self, message: &T) -> Result<(), McpError> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(McpError::Closed)?;
        write_line(writer.as_mut(), message).await
    }

    /// Send a request and wait for its result
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        if self.reader_task.is_finished() {
            return Err(McpError::Closed);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        lock_pending(&self.pending).insert(id, tx);
        let _entry = PendingEntry {
            pending: &self.pending,
            id,
        };

        let request = JsonRpcRequest::new(id, method, params);
        self.write_message(&request).await?;
        tracing::trace!(id, method, "Sent request");

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(response)) => response.into_result(),
            Ok(Err(_)) => Err(McpError::Closed),
            Err(_) => Err(McpError::Timeout {
                method: method.to_string(),
                timeout: self.request_timeout,
            }),
        }
    }

    /// Send a notification; no response is expected
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<(), McpError> {
        self.write_message(&JsonRpcNotification::new(method, params)).await
    }

    /// Close the outgoing stream and stop reading
    pub async fn shutdown(&self) {
        if let Some(mut writer) = self.writer.lock().await.take() {
            let _ = writer.shutdown().await;
        }
        self.reader_task.abort();
    }
}

impl Drop for StdioTransport {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}
