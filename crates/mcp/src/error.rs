//! Error types for the MCP crate.

use serde::Serialize;
use serde_json::Value;

use crate::types::{error_codes, JsonRpcError};

/// One rejected field in a parameter or envelope check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    /// Dot-joined path of the offending field; empty for the value itself.
    pub path: String,
    pub message: String,
}

/// Errors that can occur during MCP operations.
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("Tool '{0}' is already registered")]
    DuplicateTool(String),

    #[error("Resource '{0}' is already registered")]
    DuplicateResource(String),

    #[error("Prompt '{0}' is already registered")]
    DuplicatePrompt(String),

    #[error("Server is already connected to a transport")]
    AlreadyConnected,

    /// Parameters did not match the declared schema.
    #[error("Invalid parameters")]
    Validation(Vec<FieldIssue>),

    /// The JSON-RPC envelope itself is malformed.
    #[error("Invalid request")]
    InvalidRequest(Vec<FieldIssue>),

    #[error("Tool '{0}' not found")]
    ToolNotFound(String),

    #[error("Resource '{0}' not found")]
    ResourceNotFound(String),

    #[error("Prompt '{0}' not found")]
    PromptNotFound(String),

    #[error("Unknown method: {0}")]
    MethodNotFound(String),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid resource URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("Invalid parameter schema: {0}")]
    InvalidSchema(String),

    #[error("Invalid server config: {0}")]
    InvalidConfig(String),

    /// A handler failed with a caller-chosen code and optional payload.
    #[error("{message}")]
    Handler {
        code: i64,
        message: String,
        data: Option<Value>,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl McpError {
    /// A handler failure reported with the default server error code.
    pub fn handler(message: impl Into<String>) -> Self {
        McpError::Handler {
            code: error_codes::SERVER_ERROR,
            message: message.into(),
            data: None,
        }
    }

    /// A handler failure with an explicit code and data payload.
    pub fn custom(code: i64, message: impl Into<String>, data: Option<Value>) -> Self {
        McpError::Handler {
            code,
            message: message.into(),
            data,
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            McpError::Parse(_) => error_codes::PARSE_ERROR,
            McpError::InvalidRequest(_) => error_codes::INVALID_REQUEST,
            McpError::Validation(_) => error_codes::INVALID_PARAMS,
            McpError::ToolNotFound(_)
            | McpError::ResourceNotFound(_)
            | McpError::PromptNotFound(_)
            | McpError::MethodNotFound(_) => error_codes::METHOD_NOT_FOUND,
            McpError::Handler { code, .. } => *code,
            _ => error_codes::SERVER_ERROR,
        }
    }

    /// Structured payload carried in the `data` field, if any.
    pub fn data(&self) -> Option<Value> {
        match self {
            McpError::Validation(issues) | McpError::InvalidRequest(issues) => {
                Some(serde_json::json!({ "errors": issues }))
            }
            McpError::Handler { data, .. } => data.clone(),
            _ => None,
        }
    }

    /// Convert to a JSON-RPC error object.
    pub fn to_rpc_error(&self) -> JsonRpcError {
        JsonRpcError {
            code: self.code(),
            message: self.to_string(),
            data: self.data(),
        }
    }
}

impl From<JsonRpcError> for McpError {
    fn from(err: JsonRpcError) -> Self {
        McpError::Handler {
            code: err.code,
            message: err.message,
            data: err.data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_carries_field_detail() {
        let err = McpError::Validation(vec![FieldIssue {
            path: "message".into(),
            message: "\"message\" is a required property".into(),
        }]);
        let rpc = err.to_rpc_error();
        assert_eq!(rpc.code, error_codes::INVALID_PARAMS);
        assert_eq!(rpc.message, "Invalid parameters");
        let data = rpc.data.unwrap();
        assert_eq!(data["errors"][0]["path"], "message");
    }

    #[test]
    fn test_not_found_codes() {
        for err in [
            McpError::ToolNotFound("x".into()),
            McpError::ResourceNotFound("x".into()),
            McpError::PromptNotFound("x".into()),
            McpError::MethodNotFound("x".into()),
        ] {
            assert_eq!(err.code(), error_codes::METHOD_NOT_FOUND);
        }
    }

    #[test]
    fn test_registration_errors_use_default_code() {
        let err = McpError::DuplicateTool("echo".into());
        assert_eq!(err.code(), error_codes::SERVER_ERROR);
        assert_eq!(err.to_string(), "Tool 'echo' is already registered");
        assert!(err.data().is_none());
    }

    #[test]
    fn test_custom_handler_error_keeps_code_and_data() {
        let err = McpError::custom(-32042, "quota exceeded", Some(serde_json::json!({"limit": 5})));
        let rpc = err.to_rpc_error();
        assert_eq!(rpc.code, -32042);
        assert_eq!(rpc.message, "quota exceeded");
        assert_eq!(rpc.data.unwrap()["limit"], 5);
    }
}
