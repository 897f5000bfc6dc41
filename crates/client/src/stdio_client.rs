//! JSON-RPC client for a toolwire server running as a child process.
//!
//! Spawns the server with stdin/stdout piped, waits for its ready line and
//! then exchanges one request line for one response line. Requests are
//! serialized over the single pipe pair.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;

use toolwire_mcp::{
    JsonRpcRequest, JsonRpcResponse, McpError, McpMethod, PromptInfo, PromptResponse, ResourceInfo,
    ResourceResponse, RpcId, ToolInfo, ToolResponse,
};

/// How long [`StdioClient::shutdown`] waits for the process to exit after
/// closing its stdin.
const EXIT_GRACE: Duration = Duration::from_secs(5);

struct Pipes {
    reader: BufReader<ChildStdout>,
    writer: ChildStdin,
    next_id: i64,
}

/// A client connected to a server subprocess over stdio.
pub struct StdioClient {
    child: Child,
    pipes: Mutex<Pipes>,
}

impl StdioClient {
    /// Spawn a server process and wait until it reports ready.
    pub async fn spawn(program: &str, args: &[&str]) -> Result<Self, McpError> {
        tracing::info!(program = %program, "spawning MCP server process");

        let mut child = Command::new(program)
            .args(args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let writer = child
            .stdin
            .take()
            .ok_or_else(|| McpError::Transport("failed to capture server stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::Transport("failed to capture server stdout".into()))?;

        let client = Self {
            child,
            pipes: Mutex::new(Pipes {
                reader: BufReader::new(stdout),
                writer,
                next_id: 1,
            }),
        };
        client.wait_ready().await?;
        Ok(client)
    }

    async fn wait_ready(&self) -> Result<(), McpError> {
        let mut pipes = self.pipes.lock().await;
        let line = read_message(&mut pipes.reader)
            .await?
            .ok_or_else(|| McpError::Transport("server exited before it was ready".into()))?;
        let ready: JsonRpcResponse = serde_json::from_str(&line)?;
        match ready.result.as_ref().and_then(|r| r.get("status")).and_then(Value::as_str) {
            Some("ready") => {
                tracing::info!("MCP server ready");
                Ok(())
            }
            _ => Err(McpError::Transport(format!("unexpected first message from server: {line}"))),
        }
    }

    /// Send one request and return its `result`. Error responses come back
    /// as [`McpError::Handler`] carrying the server's code and data.
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        let mut pipes = self.pipes.lock().await;
        let id = pipes.next_id;
        pipes.next_id += 1;

        let request = JsonRpcRequest::new(Some(RpcId::Number(id.into())), method, params);
        let json = serde_json::to_string(&request)?;
        tracing::debug!(method = %method, id = %id, "sending request");

        pipes.writer.write_all(json.as_bytes()).await?;
        pipes.writer.write_all(b"\n").await?;
        pipes.writer.flush().await?;

        loop {
            let line = read_message(&mut pipes.reader)
                .await?
                .ok_or_else(|| McpError::Transport("server closed stdout".into()))?;
            let response: JsonRpcResponse = serde_json::from_str(&line)?;
            match &response.id {
                Some(RpcId::Number(got)) if got.as_i64() == Some(id) => {}
                None => {}
                other => {
                    tracing::warn!(expected = id, got = ?other, "skipping response for another request");
                    continue;
                }
            }
            if let Some(err) = response.error {
                return Err(err.into());
            }
            return response
                .result
                .ok_or_else(|| McpError::Transport("response has neither result nor error".into()));
        }
    }

    async fn call<T: DeserializeOwned>(&self, method: McpMethod, params: Option<Value>) -> Result<T, McpError> {
        let result = self.request(&method.to_string(), params).await?;
        Ok(serde_json::from_value(result)?)
    }

    pub async fn discover_tools(&self) -> Result<Vec<ToolInfo>, McpError> {
        let tools: Vec<ToolInfo> = self.call(McpMethod::ToolDiscovery, None).await?;
        tracing::info!(count = tools.len(), "tool discovery complete");
        Ok(tools)
    }

    pub async fn discover_resources(&self) -> Result<Vec<ResourceInfo>, McpError> {
        self.call(McpMethod::ResourceDiscovery, None).await
    }

    pub async fn discover_prompts(&self) -> Result<Vec<PromptInfo>, McpError> {
        self.call(McpMethod::PromptDiscovery, None).await
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolResponse, McpError> {
        self.call(McpMethod::Tool(name.to_string()), Some(arguments)).await
    }

    pub async fn read_resource(&self, uri: &str) -> Result<ResourceResponse, McpError> {
        self.call(McpMethod::Resource(uri.to_string()), None).await
    }

    pub async fn get_prompt(&self, name: &str, arguments: Value) -> Result<PromptResponse, McpError> {
        self.call(McpMethod::Prompt(name.to_string()), Some(arguments)).await
    }

    /// Close the server's stdin and wait for it to exit, killing it if it
    /// takes longer than a few seconds.
    pub async fn shutdown(mut self) -> Result<(), McpError> {
        tracing::info!("shutting down MCP server process");
        drop(self.pipes.into_inner());
        match tokio::time::timeout(EXIT_GRACE, self.child.wait()).await {
            Ok(status) => {
                let status = status?;
                tracing::debug!(%status, "MCP server exited");
            }
            Err(_) => {
                tracing::warn!("MCP server did not exit, killing it");
                self.child.kill().await?;
            }
        }
        Ok(())
    }
}

/// Next non-blank line, or `None` at EOF.
async fn read_message(reader: &mut BufReader<ChildStdout>) -> Result<Option<String>, McpError> {
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        let line = line.trim();
        if !line.is_empty() {
            return Ok(Some(line.to_string()));
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serde_json::json;

    /// A canned server: ready line, then one scripted reply per request.
    const FAKE_SERVER: &str = r#"
echo '{"jsonrpc":"2.0","result":{"status":"ready"}}'
while read -r line; do
  case "$line" in
    *mcp_toolDiscovery*) echo '{"jsonrpc":"2.0","result":[{"name":"echo","description":"Echo","inputSchema":{"type":"object"}}],"id":1}' ;;
    *tool_echo*) echo ''; echo '{"jsonrpc":"2.0","result":{"content":[{"type":"text","text":"Echo: hi"}]},"id":2}' ;;
    *) echo '{"jsonrpc":"2.0","error":{"code":-32601,"message":"Unknown method: nope","data":{"hint":"x"}},"id":3}' ;;
  esac
done
"#;

    #[tokio::test]
    async fn test_request_cycle_against_scripted_server() {
        let client = StdioClient::spawn("sh", &["-c", FAKE_SERVER]).await.unwrap();

        let tools = client.discover_tools().await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "echo");

        let resp = client.call_tool("echo", json!({"message": "hi"})).await.unwrap();
        assert_eq!(resp, ToolResponse::text("Echo: hi"));

        let err = client.request("nope", None).await.unwrap_err();
        assert_eq!(err.code(), -32601);
        assert_eq!(err.to_string(), "Unknown method: nope");
        assert_eq!(err.data(), Some(json!({"hint": "x"})));

        client.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_spawn_requires_ready_line() {
        let err = StdioClient::spawn("sh", &["-c", "echo '{\"jsonrpc\":\"2.0\",\"result\":42}'"])
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("unexpected first message"));

        let err = StdioClient::spawn("sh", &["-c", "exit 0"]).await.err().unwrap();
        assert!(err.to_string().contains("exited before it was ready"));
    }

    #[tokio::test]
    async fn test_spawn_missing_program() {
        let err = StdioClient::spawn("/definitely/not/a/program", &[]).await.err().unwrap();
        assert!(matches!(err, McpError::Io(_)));
    }
}
