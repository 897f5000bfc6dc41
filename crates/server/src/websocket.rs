//! WebSocket transport.
//!
//! Each upgraded socket gets its own session, announced first with an
//! `mcp_session` notification. Every text frame is one request; responses go
//! back on the same socket in order. The socket is pinged every 30 seconds
//! and its session is deleted when it closes. `GET /health` answers as on
//! the other transports.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant};

use toolwire_mcp::{JsonRpcNotification, McpError, McpServer, Transport};

use crate::http::health;
use crate::hub::Hub;
use crate::listener::Listener;

const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Method of the notification that tells a client its session id.
pub const SESSION_NOTIFICATION: &str = "mcp_session";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebSocketTransportConfig {
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl Default for WebSocketTransportConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 3000,
            path: "/ws".into(),
        }
    }
}

/// Cloneable handle; clones share the listener and the open sockets.
#[derive(Clone)]
pub struct WebSocketTransport {
    config: WebSocketTransportConfig,
    listener: Listener,
    hub: Hub,
}

#[derive(Clone)]
struct WsState {
    server: Arc<McpServer>,
    hub: Hub,
}

impl WebSocketTransport {
    pub fn new(config: WebSocketTransportConfig) -> Self {
        Self {
            config,
            listener: Listener::default(),
            hub: Hub::default(),
        }
    }

    pub fn config(&self) -> &WebSocketTransportConfig {
        &self.config
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr()
    }

    /// Number of open sockets.
    pub fn open_sockets(&self) -> usize {
        self.hub.len()
    }

    pub fn send_to_session(&self, session_id: &str, method: &str, params: Option<Value>) -> bool {
        self.hub.notify(session_id, method, params)
    }

    pub fn broadcast(&self, method: &str, params: Option<Value>) -> usize {
        self.hub.broadcast(method, params)
    }

    pub fn router(&self, server: Arc<McpServer>) -> Router {
        let state = WsState {
            server,
            hub: self.hub.clone(),
        };
        Router::new()
            .route(&self.config.path, get(ws_upgrade))
            .route("/health", get(health))
            .with_state(state)
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new(WebSocketTransportConfig::default())
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&mut self, server: Arc<McpServer>) -> Result<(), McpError> {
        let router = self.router(server);
        let addr = self.listener.start(&self.config.host, self.config.port, router).await?;
        tracing::info!(%addr, path = %self.config.path, "WebSocket transport listening");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), McpError> {
        // Closing every outbound queue makes each writer send a close frame.
        self.hub.clear();
        self.listener.stop().await;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.listener.is_running()
    }
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<WsState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: WsState) {
    let session = state.server.sessions().create_session(None).await;
    let session_id = session.id;
    let (mut sender, mut receiver) = socket.split();

    let hello = JsonRpcNotification::new(SESSION_NOTIFICATION, Some(json!({ "sessionId": session_id })));
    let hello = match serde_json::to_string(&hello) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "failed to encode session notification");
            state.server.sessions().delete_session(&session_id).await;
            return;
        }
    };
    if sender.send(Message::Text(hello.into())).await.is_err() {
        state.server.sessions().delete_session(&session_id).await;
        return;
    }

    let outbound = state.hub.register(&session_id);
    tracing::info!(session_id = %session_id, "WebSocket connected");

    let mut send_task = tokio::spawn(write_loop(sender, outbound));

    let recv_state = state.clone();
    let recv_session = session_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            let text = match msg {
                Message::Text(t) => t.as_str().to_string(),
                Message::Binary(b) => String::from_utf8_lossy(&b).into_owned(),
                Message::Close(_) => break,
                _ => continue,
            };
            let response = recv_state.server.handle_message(&text, Some(&recv_session)).await;
            let json = match serde_json::to_string(&response) {
                Ok(json) => json,
                Err(e) => {
                    tracing::error!(error = %e, "failed to encode response");
                    continue;
                }
            };
            let Some(tx) = recv_state.hub.sender(&recv_session) else {
                break;
            };
            if tx.send(json).await.is_err() {
                break;
            }
        }
    });

    // Removing the hub entry below ends the writer once the reader is done.
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => {},
    }

    state.hub.remove(&session_id);
    state.server.sessions().delete_session(&session_id).await;
    tracing::info!(session_id = %session_id, "WebSocket closed");
}

async fn write_loop(
    mut sender: futures::stream::SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<String>,
) {
    let mut ping = interval_at(Instant::now() + PING_INTERVAL, PING_INTERVAL);
    loop {
        tokio::select! {
            msg = outbound.recv() => match msg {
                Some(text) => {
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                None => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
            },
            _ = ping.tick() => {
                if sender.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
        }
    }
}
