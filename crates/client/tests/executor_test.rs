//! Executor tests against in-process toolwire servers on ephemeral ports.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use toolwire_client::{AppConfig, ToolExecutor};
use toolwire_mcp::{McpServer, McpServerConfig};
use toolwire_server::{
    demo, HttpTransport, HttpTransportConfig, SseTransport, SseTransportConfig, WebSocketTransport,
    WebSocketTransportConfig,
};

fn demo_server() -> Arc<McpServer> {
    let mut server = McpServer::new(McpServerConfig::new("executor-test", "0.1.0")).unwrap();
    demo::register(&mut server).unwrap();
    Arc::new(server)
}

fn executor(providers: Value) -> ToolExecutor {
    let config = AppConfig::from_json(&json!({ "mcpProviders": providers }).to_string()).unwrap();
    ToolExecutor::new(config).with_timeout(Duration::from_secs(5))
}

async fn http_server() -> (Arc<McpServer>, SocketAddr) {
    let server = demo_server();
    let transport = HttpTransport::new(HttpTransportConfig {
        host: "127.0.0.1".into(),
        port: 0,
        ..HttpTransportConfig::default()
    });
    server.connect(transport.clone()).await.unwrap();
    (server, transport.local_addr().unwrap())
}

#[tokio::test]
async fn test_http_provider() {
    let (server, addr) = http_server().await;
    let executor = executor(json!({
        "web": {
            "name": "Web",
            "type": "http",
            "config": {
                "url": format!("http://{addr}/mcp"),
                "method": "post",
                "headers": {"Content-Type": "application/json"}
            }
        }
    }));

    let input = json!({"jsonrpc": "2.0", "method": "tool_echo", "params": {"message": "hi"}, "id": 1});
    let result = executor.execute("web", &input.to_string()).await;
    assert_eq!(result.provider_id, "web");
    assert!(result.error.is_none(), "{result:?}");
    let body: Value = serde_json::from_str(result.output.as_deref().unwrap()).unwrap();
    assert_eq!(body["result"]["content"][0]["text"], "Echo: hi");

    let input = json!({"jsonrpc": "2.0", "method": "tool_missing", "id": 2});
    let result = executor.execute("web", &input.to_string()).await;
    let error = result.error.unwrap();
    assert!(error.starts_with("HTTP provider web request to"), "{error}");
    assert!(error.contains("failed with status 500"), "{error}");
    assert!(error.contains("Tool 'missing' not found"), "{error}");

    server.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_sse_provider() {
    let server = demo_server();
    let transport = SseTransport::new(SseTransportConfig {
        host: "127.0.0.1".into(),
        port: 0,
        ..SseTransportConfig::default()
    });
    server.connect(transport.clone()).await.unwrap();
    let addr = transport.local_addr().unwrap();

    let executor = executor(json!({
        "events": {"name": "Events", "type": "sse", "config": {"url": format!("http://{addr}/sse")}}
    }));

    let input = json!({"tool_name": "echo", "arguments": {"message": "streamed"}});
    let result = executor.execute("events", &input.to_string()).await;
    assert!(result.error.is_none(), "{result:?}");
    let output: Value = serde_json::from_str(result.output.as_deref().unwrap()).unwrap();
    assert_eq!(output["content"][0]["text"], "Echo: streamed");

    let input = json!({"tool_name": "echo", "arguments": {}});
    let result = executor.execute("events", &input.to_string()).await;
    assert_eq!(result.error.as_deref(), Some("Invalid parameters"));

    let result = executor.execute("events", r#"{"arguments": {}}"#).await;
    assert_eq!(
        result.error.as_deref(),
        Some("invalid input for events: 'tool_name' missing")
    );

    server.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_websocket_provider_skips_session_notification() {
    let server = demo_server();
    let transport = WebSocketTransport::new(WebSocketTransportConfig {
        host: "127.0.0.1".into(),
        port: 0,
        ..WebSocketTransportConfig::default()
    });
    server.connect(transport.clone()).await.unwrap();
    let addr = transport.local_addr().unwrap();

    let executor = executor(json!({
        "socket": {"name": "Socket", "type": "websocket", "config": {"url": format!("ws://{addr}/ws")}}
    }));

    let input = json!({"jsonrpc": "2.0", "method": "mcp_promptDiscovery", "id": 9});
    let result = executor.execute("socket", &input.to_string()).await;
    assert!(result.error.is_none(), "{result:?}");
    let response: Value = serde_json::from_str(result.output.as_deref().unwrap()).unwrap();
    assert_eq!(response["id"], 9);
    assert_eq!(response["result"][0]["name"], "greeting");

    server.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_unreachable_websocket_provider() {
    let executor = executor(json!({
        "socket": {"name": "Socket", "type": "websocket", "config": {"url": "ws://127.0.0.1:1/ws"}}
    }));
    let result = executor.execute("socket", "{}").await;
    let error = result.error.unwrap();
    assert!(error.starts_with("WebSocket connection to socket at ws://127.0.0.1:1/ws failed"), "{error}");
}

#[cfg(unix)]
mod stdio {
    use super::*;

    fn sh(script: &str) -> Value {
        json!({"name": "Shell", "command": "sh", "args": ["-c", script]})
    }

    #[tokio::test]
    async fn test_stdio_output_and_env() {
        let executor = executor(json!({
            "cat": sh("cat"),
            "env": {"name": "Env", "command": "sh", "args": ["-c", "printf %s \"$GREETING\""], "env": {"GREETING": "hello"}},
        }));

        let result = executor.execute("cat", "ping").await;
        assert_eq!(result.output.as_deref(), Some("ping\n"));
        assert!(result.error.is_none());

        let result = executor.execute("env", "").await;
        assert_eq!(result.output.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_stdio_large_input_does_not_block() {
        let executor = executor(json!({"cat": {"name": "Cat", "command": "cat"}}));
        let input = "x".repeat(1 << 20);

        let result = tokio::time::timeout(Duration::from_secs(20), executor.execute("cat", &input))
            .await
            .expect("stdio exchange should finish while the child echoes");
        assert!(result.error.is_none(), "{:?}", result.error);
        assert_eq!(result.output.map(|o| o.len()), Some((1 << 20) + 1));
    }

    #[tokio::test]
    async fn test_stdio_empty_input_sends_newline() {
        let executor = executor(json!({
            "line": sh("if read -r line; then echo \"got [$line]\"; else echo eof; fi"),
        }));
        let result = executor.execute("line", "").await;
        assert_eq!(result.output.as_deref(), Some("got []\n"));
    }

    #[tokio::test]
    async fn test_stdio_timeout() {
        let config = AppConfig::from_json(&json!({"mcpProviders": {"slow": sh("exec sleep 10")}}).to_string()).unwrap();
        let executor = ToolExecutor::new(config).with_timeout(Duration::from_millis(200));

        let result = executor.execute("slow", "").await;
        assert_eq!(result.error.as_deref(), Some("slow timed out after 200ms"));
        assert!(result.output.is_none());
    }

    #[tokio::test]
    async fn test_stdio_cwd() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "here").unwrap();
        let executor = executor(json!({
            "pwd": {"name": "Pwd", "command": "cat", "args": ["marker.txt"], "cwd": dir.path()}
        }));
        assert_eq!(executor.execute("pwd", "").await.output.as_deref(), Some("here"));
    }

    #[tokio::test]
    async fn test_stdio_failures() {
        let executor = executor(json!({
            "loud": sh("echo partial; echo boom >&2; exit 3"),
            "quiet": sh("exit 2"),
            "warns": sh("echo note >&2; echo fine"),
            "missing": {"name": "Missing", "command": "/no/such/binary"},
        }));

        let result = executor.execute("loud", "").await;
        assert_eq!(result.error.as_deref(), Some("boom\n"));
        assert_eq!(result.output.as_deref(), Some("partial\n"));

        let result = executor.execute("quiet", "").await;
        assert_eq!(
            result.error.as_deref(),
            Some("STDIO process for \"quiet\" exited with code 2")
        );

        let result = executor.execute("warns", "").await;
        assert!(result.error.is_none());
        assert_eq!(result.output.as_deref(), Some("fine\n"));

        let result = executor.execute("missing", "").await;
        assert!(result
            .error
            .unwrap()
            .starts_with("failed to start STDIO process for \"missing\""));
    }
}
