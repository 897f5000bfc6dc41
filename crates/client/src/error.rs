use std::path::PathBuf;

/// Errors raised while loading `mcp.config.json`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("mcpProviders is missing or not an object")]
    MissingProviders,

    #[error("provider \"{provider}\": {field} {reason}")]
    Provider {
        provider: String,
        field: &'static str,
        reason: String,
    },

    #[error("unknown provider type \"{kind}\" for \"{provider}\"")]
    UnknownProviderType { provider: String, kind: String },

    #[error("llm.{field} {reason}")]
    Llm { field: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn provider(provider: &str, field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Provider {
            provider: provider.to_string(),
            field,
            reason: reason.into(),
        }
    }
}

/// Why a tool execution failed. Surfaced to callers as the `error` string of
/// an [`ExecutionResult`](crate::executor::ExecutionResult).
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("MCP provider with ID '{0}' not found in configuration")]
    ProviderNotFound(String),

    #[error("MCP provider '{0}' is disabled")]
    ProviderDisabled(String),

    #[error("failed to start STDIO process for \"{provider}\": {source}")]
    Spawn {
        provider: String,
        #[source]
        source: std::io::Error,
    },

    #[error("STDIO process for \"{provider}\" failed: {source}")]
    Process {
        provider: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP provider {provider} has an invalid method '{method}'")]
    InvalidMethod { provider: String, method: String },

    #[error("HTTP provider {provider} request to {url} failed with status {status}: {body}")]
    HttpStatus {
        provider: String,
        url: String,
        status: u16,
        body: String,
    },

    #[error("request to {provider} failed: {source}")]
    Http {
        provider: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid input for {provider}: {reason}")]
    InvalidInput { provider: String, reason: String },

    #[error("SSE stream for {provider} ended before a session id was received")]
    MissingSession { provider: String },

    #[error("{provider} timed out after {timeout:?}")]
    Timeout { provider: String, timeout: std::time::Duration },

    #[error("WebSocket connection to {provider} at {url} failed: {source}")]
    WebSocket {
        provider: String,
        url: String,
        #[source]
        source: tokio_tungstenite::tungstenite::Error,
    },

    #[error("connection to {provider} closed before a response arrived")]
    Closed { provider: String },

    #[error("{0}")]
    Rpc(String),
}
