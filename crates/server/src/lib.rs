//! Network transports for toolwire.
//!
//! HTTP, SSE and WebSocket implementations of [`toolwire_mcp::Transport`],
//! built on axum, plus the settings and built-in capabilities used by the
//! `toolwire-server` binary.

pub mod config;
pub mod demo;
pub mod error;
pub mod http;
pub mod sse;
pub mod websocket;

mod hub;
mod listener;

pub use config::{ServerSettings, TransportKind};
pub use error::ServerError;
pub use http::{HttpTransport, HttpTransportConfig};
pub use sse::{SseTransport, SseTransportConfig};
pub use websocket::{WebSocketTransport, WebSocketTransportConfig};
