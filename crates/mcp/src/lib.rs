//! Protocol core for toolwire.
//!
//! A JSON-RPC 2.0 style protocol for exposing tools, resources and prompt
//! templates to LLM applications. This crate holds everything that does not
//! depend on a network stack; the HTTP, SSE and WebSocket transports live in
//! `toolwire-server`.
//!
//! # Architecture
//!
//! - **types**: envelopes, content blocks, discovery descriptors
//! - **error**: `McpError` and its JSON-RPC error mapping
//! - **validation**: JSON Schema parameter checks and envelope checks
//! - **registry**: `McpServer`, the tool/resource/prompt registry
//! - **dispatch**: method routing shared by all transports
//! - **session**: per-connection sessions with an idle sweep
//! - **transport**: the `Transport` contract and line IO
//! - **stdio**: newline-delimited transport over stdin/stdout
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use serde_json::{json, Value};
//! use toolwire_mcp::{McpError, McpServer, McpServerConfig, ParamSchema, StdioTransport, ToolResponse};
//!
//! # async fn example() -> Result<(), McpError> {
//! let mut server = McpServer::new(McpServerConfig::new("demo", "1.0.0"))?;
//! server.tool(
//!     "echo",
//!     ParamSchema::new(json!({
//!         "type": "object",
//!         "properties": {"message": {"type": "string"}},
//!         "required": ["message"]
//!     }))?,
//!     |params: Value| async move {
//!         Ok::<_, McpError>(ToolResponse::text(params["message"].as_str().unwrap_or_default()))
//!     },
//! )?;
//!
//! let server = Arc::new(server);
//! server.connect(StdioTransport::new()).await?;
//! # Ok(())
//! # }
//! ```

pub mod dispatch;
pub mod error;
pub mod registry;
pub mod session;
pub mod stdio;
pub mod transport;
pub mod types;
pub mod validation;

pub use dispatch::McpMethod;
pub use error::{FieldIssue, McpError};
pub use registry::{McpServer, PromptHandler, ResourceHandler, ToolHandler};
pub use session::{Session, SessionManager, SessionManagerConfig};
pub use stdio::StdioTransport;
pub use transport::{ChannelLines, LineIo, StdioLines, Transport};
pub use types::*;
pub use validation::{validate_params, validate_request, ParamSchema};
