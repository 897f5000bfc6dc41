//! JSON-RPC 2.0 envelopes and MCP payload types.
//!
//! The wire format mirrors JSON-RPC conventions without being fully
//! compliant: there is no batching, and methods are routed by name prefix
//! (see [`crate::dispatch::McpMethod`]).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::error::McpError;

/// The only protocol tag accepted in the `jsonrpc` field.
pub const JSONRPC_VERSION: &str = "2.0";

// ── JSON-RPC 2.0 Base Types ─────────────────────────────────────────

/// A JSON-RPC request. `id` is optional; requests without one are still answered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RpcId>,
}

/// A JSON-RPC response message (success or error).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RpcId>,
}

/// A JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// A server-pushed message that expects no reply (e.g. `mcp_session`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// JSON-RPC request ID. Can be a number or a string. Numbers keep their
/// exact JSON form so fractional and out-of-range ids echo back unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum RpcId {
    Number(serde_json::Number),
    String(String),
}

impl RpcId {
    /// Recover an id from an arbitrary JSON value, if it has a usable shape.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(RpcId::String(s.clone())),
            Value::Number(n) => Some(RpcId::Number(n.clone())),
            _ => None,
        }
    }
}

/// Standard JSON-RPC error codes plus the generic server error.
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    /// Default code for anything that is not a protocol-level failure.
    pub const SERVER_ERROR: i64 = -32000;
}

impl JsonRpcRequest {
    /// Create a new request.
    pub fn new(id: Option<RpcId>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id,
        }
    }
}

impl JsonRpcResponse {
    /// Create a successful response.
    pub fn success(id: Option<RpcId>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Create an error response from an [`McpError`].
    pub fn failure(id: Option<RpcId>, err: &McpError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(err.to_rpc_error()),
            id,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

// ── Content ─────────────────────────────────────────────────────────

/// A single content block returned by tools and prompts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text {
        text: String,
        #[serde(default, rename = "mimeType", skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },
    Json {
        json: Value,
        #[serde(default, rename = "mimeType", skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },
    Binary {
        #[serde(with = "base64_bytes")]
        binary: Vec<u8>,
        #[serde(default, rename = "mimeType", skip_serializing_if = "Option::is_none")]
        mime_type: Option<String>,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text {
            text: text.into(),
            mime_type: None,
        }
    }

    pub fn json(json: Value) -> Self {
        ContentBlock::Json {
            json,
            mime_type: None,
        }
    }

    pub fn binary(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        ContentBlock::Binary {
            binary: bytes,
            mime_type: Some(mime_type.into()),
        }
    }
}

/// Result of a tool invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub content: Vec<ContentBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl ToolResponse {
    /// A response holding a single text block.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(text)],
            metadata: None,
        }
    }
}

/// One piece of resource content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContent {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, with = "base64_bytes_opt", skip_serializing_if = "Option::is_none")]
    pub binary: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// Result of reading a resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceResponse {
    pub contents: Vec<ResourceContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

/// Speaker of a prompt message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: ContentBlock,
}

/// Result of rendering a prompt template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptResponse {
    pub messages: Vec<PromptMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

// ── Discovery ───────────────────────────────────────────────────────

/// Describes a registered tool in discovery results.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Describes a registered resource in discovery results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceInfo {
    pub name: String,
    pub uri: String,
}

/// Describes a registered prompt template in discovery results.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptInfo {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

// ── Server config ───────────────────────────────────────────────────

/// Identity of an MCP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpServerConfig {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<Url>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_documentation_url: Option<Url>,
}

impl McpServerConfig {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            base_url: None,
            service_documentation_url: None,
        }
    }

    /// Reject configs with an empty name or version.
    pub fn validate(&self) -> Result<(), McpError> {
        if self.name.trim().is_empty() {
            return Err(McpError::InvalidConfig("server name must not be empty".into()));
        }
        if self.version.trim().is_empty() {
            return Err(McpError::InvalidConfig("server version must not be empty".into()));
        }
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(d)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

mod base64_bytes_opt {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => s.serialize_some(&STANDARD.encode(b)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(d)?
            .map(|encoded| STANDARD.decode(encoded).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_omits_absent_fields() {
        let resp = JsonRpcResponse::success(None, json!({"status": "ready"}));
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json, json!({"jsonrpc": "2.0", "result": {"status": "ready"}}));
    }

    #[test]
    fn test_rpc_id_from_value() {
        assert_eq!(RpcId::from_value(&json!(7)), Some(RpcId::Number(7.into())));
        assert_eq!(RpcId::from_value(&json!("a")), Some(RpcId::String("a".into())));
        assert_eq!(RpcId::from_value(&json!(1.5)), Some(RpcId::Number(json!(1.5).as_number().unwrap().clone())));
        assert_eq!(RpcId::from_value(&json!(u64::MAX)), Some(RpcId::Number(u64::MAX.into())));
        assert_eq!(RpcId::from_value(&json!(true)), None);
        assert_eq!(RpcId::from_value(&json!(null)), None);
    }

    #[test]
    fn test_content_block_wire_shape() {
        let block = ContentBlock::text("hi");
        assert_eq!(
            serde_json::to_value(&block).unwrap(),
            json!({"type": "text", "text": "hi"})
        );

        let block = ContentBlock::binary(vec![1, 2, 3], "application/octet-stream");
        assert_eq!(
            serde_json::to_value(&block).unwrap(),
            json!({"type": "binary", "binary": "AQID", "mimeType": "application/octet-stream"})
        );
    }

    #[test]
    fn test_binary_content_decodes() {
        let block: ContentBlock =
            serde_json::from_value(json!({"type": "binary", "binary": "AQID"})).unwrap();
        match block {
            ContentBlock::Binary { binary, mime_type } => {
                assert_eq!(binary, vec![1, 2, 3]);
                assert!(mime_type.is_none());
            }
            other => panic!("unexpected block: {other:?}"),
        }
    }

    #[test]
    fn test_resource_content_optional_binary() {
        let content = ResourceContent {
            uri: "file:///a.txt".into(),
            text: Some("body".into()),
            binary: None,
            mime_type: Some("text/plain".into()),
        };
        let json = serde_json::to_value(&content).unwrap();
        assert_eq!(
            json,
            json!({"uri": "file:///a.txt", "text": "body", "mimeType": "text/plain"})
        );
        let parsed: ResourceContent = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, content);
    }

    #[test]
    fn test_server_config_rejects_blank_name() {
        assert!(McpServerConfig::new("", "1.0.0").validate().is_err());
        assert!(McpServerConfig::new("srv", " ").validate().is_err());
        assert!(McpServerConfig::new("srv", "1.0.0").validate().is_ok());
    }
}
