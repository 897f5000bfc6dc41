//! Built-in capabilities registered by the `toolwire-server` binary.

use serde_json::{json, Value};
use url::Url;

use toolwire_mcp::{
    ContentBlock, McpError, McpServer, ParamSchema, PromptMessage, PromptResponse,
    ResourceContent, ResourceResponse, Role, ToolResponse,
};

pub const INFO_URI: &str = "server://info";

/// Register the `echo` tool, the `server://info` resource and the
/// `greeting` prompt.
pub fn register(server: &mut McpServer) -> Result<(), McpError> {
    server.tool(
        "echo",
        ParamSchema::new(json!({
            "type": "object",
            "description": "Echo a message back to the caller",
            "properties": {"message": {"type": "string"}},
            "required": ["message"]
        }))?,
        |params: Value| async move {
            let message = params["message"].as_str().unwrap_or_default();
            Ok::<_, McpError>(ToolResponse::text(format!("Echo: {message}")))
        },
    )?;

    let info = json!({
        "name": server.config().name,
        "version": server.config().version,
        "startedAt": chrono::Utc::now().to_rfc3339(),
    });
    server.resource("info", INFO_URI, move |uri: Url| {
        let info = info.clone();
        async move {
            Ok::<_, McpError>(ResourceResponse {
                contents: vec![ResourceContent {
                    uri: uri.to_string(),
                    text: Some(info.to_string()),
                    binary: None,
                    mime_type: Some("application/json".into()),
                }],
                metadata: None,
            })
        }
    })?;

    server.prompt(
        "greeting",
        ParamSchema::new(json!({
            "type": "object",
            "description": "Greet someone by name",
            "properties": {
                "name": {"type": "string", "minLength": 1},
                "style": {"type": "string", "enum": ["formal", "casual"]}
            },
            "required": ["name"]
        }))?,
        |params: Value| async move {
            let name = params["name"].as_str().unwrap_or_default();
            let style = params["style"].as_str().unwrap_or("casual");
            Ok::<_, McpError>(PromptResponse {
                messages: vec![
                    PromptMessage {
                        role: Role::System,
                        content: ContentBlock::text(format!("Respond in a {style} tone.")),
                    },
                    PromptMessage {
                        role: Role::User,
                        content: ContentBlock::text(format!("Please greet {name}.")),
                    },
                ],
                metadata: None,
            })
        },
    )?;

    Ok(())
}
