//! Transport layer.
//!
//! [`Transport`] is what [`McpServer::connect`](crate::McpServer::connect)
//! accepts. [`LineIo`] is the lower-level newline-delimited message channel
//! used by line-oriented transports, with a process stdio implementation
//! and an in-memory pair for tests.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use crate::error::McpError;
use crate::registry::McpServer;

/// Something that exposes an [`McpServer`] to clients.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Start serving `server`. Returns once the transport is accepting input.
    async fn connect(&mut self, server: Arc<McpServer>) -> Result<(), McpError>;

    /// Stop serving and release the server.
    async fn disconnect(&mut self) -> Result<(), McpError>;

    fn is_connected(&self) -> bool;

    /// The transport-wide session, if it has one. None of the built-in
    /// transports do: their sessions, if any, are per connection.
    fn session_id(&self) -> Option<String> {
        None
    }
}

/// Newline-delimited message IO.
#[async_trait]
pub trait LineIo: Send + Sync {
    /// Read the next non-empty line, without its terminator.
    /// Returns `None` when the peer closes.
    async fn receive(&mut self) -> Result<Option<String>, McpError>;

    /// Write one message followed by a newline.
    async fn send(&mut self, message: &str) -> Result<(), McpError>;
}

/// Line IO over the process's stdin and stdout.
pub struct StdioLines {
    reader: BufReader<tokio::io::Stdin>,
    writer: tokio::io::Stdout,
}

impl StdioLines {
    pub fn new() -> Self {
        Self {
            reader: BufReader::new(tokio::io::stdin()),
            writer: tokio::io::stdout(),
        }
    }
}

impl Default for StdioLines {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LineIo for StdioLines {
    async fn receive(&mut self) -> Result<Option<String>, McpError> {
        loop {
            let mut line = String::new();
            if self.reader.read_line(&mut line).await? == 0 {
                return Ok(None);
            }
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                return Ok(Some(trimmed.to_string()));
            }
        }
    }

    async fn send(&mut self, message: &str) -> Result<(), McpError> {
        self.writer.write_all(message.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }
}

/// In-memory line IO backed by a channel pair.
pub struct ChannelLines {
    rx: mpsc::Receiver<String>,
    tx: mpsc::Sender<String>,
}

impl ChannelLines {
    /// Two connected ends: what one sends, the other receives.
    pub fn pair() -> (Self, Self) {
        let (tx_a, rx_b) = mpsc::channel(32);
        let (tx_b, rx_a) = mpsc::channel(32);
        (Self { rx: rx_a, tx: tx_a }, Self { rx: rx_b, tx: tx_b })
    }
}

#[async_trait]
impl LineIo for ChannelLines {
    async fn receive(&mut self) -> Result<Option<String>, McpError> {
        while let Some(msg) = self.rx.recv().await {
            let trimmed = msg.trim();
            if !trimmed.is_empty() {
                return Ok(Some(trimmed.to_string()));
            }
        }
        Ok(None)
    }

    async fn send(&mut self, message: &str) -> Result<(), McpError> {
        self.tx
            .send(message.to_string())
            .await
            .map_err(|_| McpError::Transport("channel closed".into()))
    }
}
