//! Stateless HTTP transport: one JSON-RPC request per POST.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::CorsLayer;

use toolwire_mcp::types::error_codes;
use toolwire_mcp::{JsonRpcResponse, McpError, McpServer, Transport};

use crate::listener::Listener;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpTransportConfig {
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 3000,
            path: "/mcp".into(),
        }
    }
}

/// Serves `POST {path}` and `GET /health`.
///
/// Cloning yields another handle to the same listener, so a clone kept
/// after [`McpServer::connect`] can still report [`local_addr`](Self::local_addr).
#[derive(Clone)]
pub struct HttpTransport {
    config: HttpTransportConfig,
    listener: Listener,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Self {
        Self {
            config,
            listener: Listener::default(),
        }
    }

    pub fn config(&self) -> &HttpTransportConfig {
        &self.config
    }

    /// The bound address once connected. Useful with port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr()
    }

    /// The routes this transport serves, without binding a socket.
    pub fn router(&self, server: Arc<McpServer>) -> Router {
        Router::new()
            .route(&self.config.path, post(handle_rpc))
            .route("/health", get(health))
            .layer(CorsLayer::permissive())
            .with_state(server)
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(HttpTransportConfig::default())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn connect(&mut self, server: Arc<McpServer>) -> Result<(), McpError> {
        let router = self.router(server);
        let addr = self.listener.start(&self.config.host, self.config.port, router).await?;
        tracing::info!(%addr, path = %self.config.path, "HTTP transport listening");
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), McpError> {
        self.listener.stop().await;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.listener.is_running()
    }
}

async fn handle_rpc(State(server): State<Arc<McpServer>>, body: Bytes) -> Response {
    let response = server.handle_message(&String::from_utf8_lossy(&body), None).await;
    rpc_reply(response)
}

pub(crate) async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// HTTP status for a JSON-RPC response: 200 on success, 400 for malformed
/// input, 500 for everything else.
pub(crate) fn status_for(response: &JsonRpcResponse) -> StatusCode {
    match &response.error {
        None => StatusCode::OK,
        Some(err) if err.code == error_codes::INVALID_REQUEST || err.code == error_codes::PARSE_ERROR => {
            StatusCode::BAD_REQUEST
        }
        Some(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn rpc_reply(response: JsonRpcResponse) -> Response {
    (status_for(&response), Json(response)).into_response()
}
