//! End-to-end protocol checks over an in-memory line transport.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use toolwire_mcp::{
    ChannelLines, ContentBlock, LineIo, McpError, McpServer, McpServerConfig, ParamSchema,
    PromptMessage, PromptResponse, ResourceContent, ResourceResponse, Role, SessionManagerConfig,
    StdioTransport, ToolResponse,
};
use url::Url;

fn build_server() -> McpServer {
    let mut server = McpServer::new(McpServerConfig::new("protocol-test", "1.0.0")).unwrap();

    server
        .tool(
            "add",
            ParamSchema::new(json!({
                "type": "object",
                "description": "Add two integers",
                "properties": {
                    "a": {"type": "integer"},
                    "b": {"type": "integer"}
                },
                "required": ["a", "b"]
            }))
            .unwrap(),
            |p: Value| async move {
                let sum = p["a"].as_i64().unwrap_or(0) + p["b"].as_i64().unwrap_or(0);
                Ok::<_, McpError>(ToolResponse {
                    content: vec![ContentBlock::json(json!({ "sum": sum }))],
                    metadata: None,
                })
            },
        )
        .unwrap();

    server
        .resource("logo", "asset://logo.png", |uri: Url| async move {
            Ok::<_, McpError>(ResourceResponse {
                contents: vec![ResourceContent {
                    uri: uri.to_string(),
                    text: None,
                    binary: Some(vec![0x89, b'P', b'N', b'G']),
                    mime_type: Some("image/png".into()),
                }],
                metadata: None,
            })
        })
        .unwrap();

    server
        .prompt(
            "summarize",
            ParamSchema::new(json!({
                "type": "object",
                "properties": {"topic": {"type": "string"}},
                "required": ["topic"]
            }))
            .unwrap(),
            |p: Value| async move {
                let topic = p["topic"].as_str().unwrap_or_default().to_string();
                Ok::<_, McpError>(PromptResponse {
                    messages: vec![
                        PromptMessage {
                            role: Role::System,
                            content: ContentBlock::text("Be brief."),
                        },
                        PromptMessage {
                            role: Role::User,
                            content: ContentBlock::text(format!("Summarize {topic}")),
                        },
                    ],
                    metadata: None,
                })
            },
        )
        .unwrap();

    server
}

async fn call(io: &mut ChannelLines, request: Value) -> Value {
    io.send(&request.to_string()).await.unwrap();
    let line = io.receive().await.unwrap().unwrap();
    serde_json::from_str(&line).unwrap()
}

#[tokio::test]
async fn test_full_session_over_lines() {
    let (ours, mut client) = ChannelLines::pair();
    let server = Arc::new(build_server());
    server.connect(StdioTransport::with_io(ours)).await.unwrap();
    assert!(server.is_connected().await);
    assert!(server.current_session_id().await.is_none());

    let ready = client.receive().await.unwrap().unwrap();
    assert_eq!(ready, r#"{"jsonrpc":"2.0","result":{"status":"ready"}}"#);

    let resp = call(&mut client, json!({"jsonrpc": "2.0", "method": "tool_add", "params": {"a": 2, "b": 3}, "id": 1})).await;
    assert_eq!(resp["result"]["content"][0], json!({"type": "json", "json": {"sum": 5}}));

    let resp = call(&mut client, json!({"jsonrpc": "2.0", "method": "tool_add", "params": {"a": "x"}, "id": 2})).await;
    assert_eq!(resp["error"]["code"], -32602);
    let mut paths: Vec<String> = resp["error"]["data"]["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["path"].as_str().unwrap().to_string())
        .collect();
    paths.sort();
    assert_eq!(paths, vec!["a", "b"]);

    let resp = call(&mut client, json!({"jsonrpc": "2.0", "method": "resource_asset://logo.png", "id": 3})).await;
    let content = &resp["result"]["contents"][0];
    assert_eq!(content["mimeType"], "image/png");
    assert_eq!(content["binary"], "iVBORw==");

    let resp = call(&mut client, json!({"jsonrpc": "2.0", "method": "prompt_summarize", "params": {"topic": "rust"}, "id": 4})).await;
    assert_eq!(resp["result"]["messages"][1]["content"]["text"], "Summarize rust");
    assert_eq!(resp["result"]["messages"][0]["role"], "system");

    let resp = call(&mut client, json!({"jsonrpc": "2.0", "method": "mcp_resourceDiscovery", "id": 5})).await;
    assert_eq!(resp["result"], json!([{"name": "logo", "uri": "asset://logo.png"}]));

    let resp = call(&mut client, json!({"jsonrpc": "2.0", "method": "mcp_promptDiscovery", "id": 6})).await;
    assert_eq!(resp["result"][0]["name"], "summarize");

    let resp = call(&mut client, json!({"jsonrpc": "2.0", "method": "resource_asset://missing", "id": 7})).await;
    assert_eq!(resp["error"]["code"], -32601);
    assert_eq!(resp["error"]["message"], "Resource 'asset://missing' not found");

    server.disconnect().await.unwrap();
    assert!(!server.is_connected().await);
}

#[tokio::test]
async fn test_reconnect_after_disconnect() {
    let server = Arc::new(build_server());
    let (first, _a) = ChannelLines::pair();
    server.connect(StdioTransport::with_io(first)).await.unwrap();
    server.disconnect().await.unwrap();

    let (second, mut client) = ChannelLines::pair();
    server.connect(StdioTransport::with_io(second)).await.unwrap();
    assert!(client.receive().await.unwrap().is_some());
    server.disconnect().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_connect_starts_session_sweep() {
    let config = SessionManagerConfig {
        cleanup_interval: Duration::from_secs(10),
        session_timeout: Duration::from_secs(30),
    };
    let server = Arc::new(
        McpServer::with_session_config(McpServerConfig::new("sweep", "1.0.0"), config).unwrap(),
    );
    let (io, _client) = ChannelLines::pair();
    server.connect(StdioTransport::with_io(io)).await.unwrap();
    assert!(server.sessions().is_sweeping());

    server.sessions().create_session(None).await;
    tokio::time::sleep(Duration::from_secs(45)).await;
    assert_eq!(server.sessions().len().await, 0);

    server.disconnect().await.unwrap();
    assert!(!server.sessions().is_sweeping());
}
