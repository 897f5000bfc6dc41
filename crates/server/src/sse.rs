//! Server-sent events transport.
//!
//! `GET {path}` opens a stream and creates a session; the first event is
//! `{"sessionId": ...}`. Requests are POSTed to `{message_path}?sessionId=...`
//! and answered in the POST body. The stream itself carries keep-alive
//! comments and any notifications pushed with [`SseTransport::send_to_session`]
//! or [`SseTransport::broadcast`]. Dropping the stream deletes the session.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::CorsLayer;

use toolwire_mcp::{McpError, McpServer, Transport};

use crate::http::{health, rpc_reply};
use crate::hub::Hub;
use crate::listener::Listener;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseTransportConfig {
    pub host: String,
    pub port: u16,
    pub path: String,
    pub message_path: String,
}

impl Default for SseTransportConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 3000,
            path: "/sse".into(),
            message_path: "/messages".into(),
        }
    }
}

/// Cloneable handle; clones share the listener and the open streams.
#[derive(Clone)]
pub struct SseTransport {
    config: SseTransportConfig,
    listener: Listener,
    hub: Hub,
}

#[derive(Clone)]
struct SseState {
    server: Arc<McpServer>,
    hub: Hub,
}

#[derive(Debug, Deserialize)]
struct MessageQuery {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

impl SseTransport {
    pub fn new(config: SseTransportConfig) -> Self {
        Self {
            config,
            listener: Listener::default(),
            hub: Hub::default(),
        }
    }

    pub fn config(&self) -> &SseTransportConfig {
        &self.config
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr()
    }

    /// Number of open event streams.
    pub fn open_streams(&self) -> usize {
        self.hub.len()
    }

    /// Push a notification down one session's stream.
    pub fn send_to_session(&self, session_id: &str, method: &str, params: Option<Value>) -> bool {
        self.hub.notify(session_id, method, params)
    }

    /// Push a notification to every open stream.
    pub fn broadcast(&self, method: &str, params: Option<Value>) -> usize {
        self.hub.broadcast(method, params)
    }

    pub fn router(&self, server: Arc<McpServer>) -> Router {
        let state = SseState {
            server,
            hub: self.hub.clone(),
        };
        Router::new()
            .route(&self.config.path, get(open_stream))
            .route(&self.config.message_path, post(handle_message))
            .route("/health", get(health))
            .layer(CorsLayer::permissive())
            .with_state(state)
    }
}

impl Default for SseTransport {
    fn default() -> Self {
        Self::new(SseTransportConfig::default())
    }
}

#[async_trait]
impl Transport for SseTransport {
    async fn connect(&mut self, server: Arc<McpServer>) -> Result<(), McpError> {
        let router = self.router(server);
        let addr = self.listener.start(&self.config.host, self.config.port, router).await?;
        tracing::info!(%addr, path = %self.config.path, message_path = %self.config.message_path, "SSE transport listening");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), McpError> {
        // Ending every stream lets graceful shutdown finish.
        self.hub.clear();
        self.listener.stop().await;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.listener.is_running()
    }
}

/// Removes the session when the client's stream is dropped.
struct StreamGuard {
    session_id: String,
    state: SseState,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.state.hub.remove(&self.session_id);
        let server = Arc::clone(&self.state.server);
        let session_id = std::mem::take(&mut self.session_id);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                server.sessions().delete_session(&session_id).await;
                tracing::debug!(session_id = %session_id, "SSE stream closed");
            });
        }
    }
}

async fn open_stream(
    State(state): State<SseState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let session = state.server.sessions().create_session(None).await;
    let rx = state.hub.register(&session.id);
    tracing::info!(session_id = %session.id, "SSE stream opened");

    let first = Event::default().data(json!({ "sessionId": session.id }).to_string());
    let guard = StreamGuard {
        session_id: session.id,
        state,
    };

    let events = stream::once(async move { first })
        .chain(ReceiverStream::new(rx).map(|msg| Event::default().data(msg)))
        .map(move |event| {
            let _ = &guard;
            Ok::<_, Infallible>(event)
        });

    Sse::new(events).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
}

async fn handle_message(
    State(state): State<SseState>,
    Query(query): Query<MessageQuery>,
    body: Bytes,
) -> Response {
    let Some(session_id) = query.session_id.filter(|id| !id.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Session ID is required" })),
        )
            .into_response();
    };

    if state.server.sessions().get_session(&session_id).await.is_none() {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Session not found" })),
        )
            .into_response();
    }

    let response = state
        .server
        .handle_message(&String::from_utf8_lossy(&body), Some(&session_id))
        .await;
    rpc_reply(response)
}
