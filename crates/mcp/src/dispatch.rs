//! Method routing shared by every transport.
//!
//! Method names are parsed once into [`McpMethod`] and matched in a single
//! place, so HTTP, SSE, WebSocket and stdio all answer identically.

use std::fmt;

use serde_json::{Map, Value};

use crate::error::McpError;
use crate::registry::McpServer;
use crate::types::{JsonRpcRequest, JsonRpcResponse, RpcId};
use crate::validation::validate_request;

const TOOL_PREFIX: &str = "tool_";
const RESOURCE_PREFIX: &str = "resource_";
const PROMPT_PREFIX: &str = "prompt_";

/// A routed method name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum McpMethod {
    ToolDiscovery,
    ResourceDiscovery,
    PromptDiscovery,
    Tool(String),
    Resource(String),
    Prompt(String),
}

impl McpMethod {
    /// Parse a wire method name. Anything unrecognised is an unknown-method error.
    pub fn parse(method: &str) -> Result<Self, McpError> {
        match method {
            "mcp_toolDiscovery" => return Ok(McpMethod::ToolDiscovery),
            "mcp_resourceDiscovery" => return Ok(McpMethod::ResourceDiscovery),
            "mcp_promptDiscovery" => return Ok(McpMethod::PromptDiscovery),
            _ => {}
        }
        if let Some(name) = method.strip_prefix(TOOL_PREFIX) {
            Ok(McpMethod::Tool(name.to_string()))
        } else if let Some(uri) = method.strip_prefix(RESOURCE_PREFIX) {
            Ok(McpMethod::Resource(uri.to_string()))
        } else if let Some(name) = method.strip_prefix(PROMPT_PREFIX) {
            Ok(McpMethod::Prompt(name.to_string()))
        } else {
            Err(McpError::MethodNotFound(method.to_string()))
        }
    }
}

impl fmt::Display for McpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            McpMethod::ToolDiscovery => f.write_str("mcp_toolDiscovery"),
            McpMethod::ResourceDiscovery => f.write_str("mcp_resourceDiscovery"),
            McpMethod::PromptDiscovery => f.write_str("mcp_promptDiscovery"),
            McpMethod::Tool(name) => write!(f, "{TOOL_PREFIX}{name}"),
            McpMethod::Resource(uri) => write!(f, "{RESOURCE_PREFIX}{uri}"),
            McpMethod::Prompt(name) => write!(f, "{PROMPT_PREFIX}{name}"),
        }
    }
}

impl McpServer {
    /// Answer a validated request.
    ///
    /// When `session_id` names a live session, a successful call records
    /// `lastMethod` and `lastRequestTime` in that session's metadata.
    pub async fn handle_request(&self, request: JsonRpcRequest, session_id: Option<&str>) -> JsonRpcResponse {
        let JsonRpcRequest { method, params, id, .. } = request;
        match self.dispatch(&method, params).await {
            Ok(result) => {
                if let Some(session_id) = session_id {
                    let mut meta = Map::new();
                    meta.insert("lastMethod".into(), Value::String(method.clone()));
                    meta.insert("lastRequestTime".into(), Value::String(chrono::Utc::now().to_rfc3339()));
                    self.sessions().update_session(session_id, meta).await;
                }
                JsonRpcResponse::success(id, result)
            }
            Err(err) => {
                tracing::warn!(method = %method, code = err.code(), error = %err, "request failed");
                JsonRpcResponse::failure(id, &err)
            }
        }
    }

    /// Answer a raw message: parse, check the envelope, then dispatch.
    ///
    /// Parse failures answer with no id. Envelope failures echo the id when
    /// it has a usable shape.
    pub async fn handle_message(&self, raw: &str, session_id: Option<&str>) -> JsonRpcResponse {
        let value: Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "failed to parse message");
                return JsonRpcResponse::failure(None, &McpError::Parse(e));
            }
        };
        self.handle_value(value, session_id).await
    }

    /// As [`handle_message`](Self::handle_message), for an already-parsed body.
    pub async fn handle_value(&self, value: Value, session_id: Option<&str>) -> JsonRpcResponse {
        let fallback_id = value.get("id").and_then(RpcId::from_value);
        match validate_request(value) {
            Ok(request) => self.handle_request(request, session_id).await,
            Err(err) => {
                tracing::warn!(error = %err, "invalid request envelope");
                JsonRpcResponse::failure(fallback_id, &err)
            }
        }
    }

    async fn dispatch(&self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        tracing::debug!(method = %method, "dispatching");
        let value = match McpMethod::parse(method)? {
            McpMethod::ToolDiscovery => serde_json::to_value(self.tools())?,
            McpMethod::ResourceDiscovery => serde_json::to_value(self.resources())?,
            McpMethod::PromptDiscovery => serde_json::to_value(self.prompts())?,
            McpMethod::Tool(name) => serde_json::to_value(self.execute_tool(&name, params).await?)?,
            McpMethod::Resource(uri) => serde_json::to_value(self.get_resource(&uri).await?)?,
            McpMethod::Prompt(name) => serde_json::to_value(self.execute_prompt(&name, params).await?)?,
        };
        Ok(value)
    }
}
