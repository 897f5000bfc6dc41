//! Stdio transport: one JSON-RPC message per line.
//!
//! On connect the transport announces itself with
//! `{"jsonrpc":"2.0","result":{"status":"ready"}}`, then answers each line in
//! order until the input closes. Anything written to stdout that is not a
//! protocol message would corrupt the stream, so binaries using this
//! transport must log to stderr.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::McpError;
use crate::registry::McpServer;
use crate::transport::{LineIo, StdioLines, Transport};
use crate::types::JsonRpcResponse;

pub struct StdioTransport<L: LineIo = StdioLines> {
    io: Option<L>,
    task: Option<JoinHandle<()>>,
    closed_tx: watch::Sender<bool>,
}

impl StdioTransport<StdioLines> {
    /// A transport over the process's own stdin and stdout.
    pub fn new() -> Self {
        Self::with_io(StdioLines::new())
    }
}

impl Default for StdioTransport<StdioLines> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: LineIo + 'static> StdioTransport<L> {
    pub fn with_io(io: L) -> Self {
        let (closed_tx, _) = watch::channel(false);
        Self {
            io: Some(io),
            task: None,
            closed_tx,
        }
    }

    /// Flips to `true` once the input side has closed and the loop has ended.
    pub fn closed_signal(&self) -> watch::Receiver<bool> {
        self.closed_tx.subscribe()
    }
}

/// The announcement written before any response.
pub fn ready_message() -> JsonRpcResponse {
    JsonRpcResponse::success(None, json!({ "status": "ready" }))
}

async fn serve_lines<L: LineIo>(server: Arc<McpServer>, mut io: L) -> Result<(), McpError> {
    while let Some(line) = io.receive().await? {
        tracing::debug!(bytes = line.len(), "received line");
        let response = server.handle_message(&line, None).await;
        let json = serde_json::to_string(&response)?;
        io.send(&json).await?;
    }
    Ok(())
}

#[async_trait]
impl<L: LineIo + 'static> Transport for StdioTransport<L> {
    async fn connect(&mut self, server: Arc<McpServer>) -> Result<(), McpError> {
        let mut io = self
            .io
            .take()
            .ok_or_else(|| McpError::Transport("stdio transport cannot be reconnected".into()))?;

        io.send(&serde_json::to_string(&ready_message())?).await?;
        tracing::info!("stdio transport ready");

        let closed_tx = self.closed_tx.clone();
        self.task = Some(tokio::spawn(async move {
            match serve_lines(server, io).await {
                Ok(()) => tracing::info!("stdin closed, stdio transport stopping"),
                Err(e) => tracing::error!(error = %e, "stdio transport failed"),
            }
            closed_tx.send_replace(true);
        }));
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), McpError> {
        if let Some(task) = self.task.take() {
            task.abort();
            self.closed_tx.send_replace(true);
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}
