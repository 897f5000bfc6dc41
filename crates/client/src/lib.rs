//! Client side of toolwire.
//!
//! - [`config`]: providers declared in `mcp.config.json`
//! - [`executor`]: run raw tool input against any provider transport
//! - [`stdio_client`]: typed JSON-RPC client for a server child process

pub mod config;
pub mod error;
pub mod executor;
pub mod stdio_client;

pub use config::{AppConfig, LlmConfig, ProviderConfig, ProviderKind};
pub use error::{ConfigError, ExecutionError};
pub use executor::{ExecutionResult, ToolExecutor};
pub use stdio_client::StdioClient;
