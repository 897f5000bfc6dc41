//! Run a tool call against a configured provider, whatever its transport.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;

use toolwire_mcp::{JsonRpcRequest, JsonRpcResponse, RpcId};

use crate::config::{AppConfig, HttpConfig, ProviderConfig, ProviderKind, SseConfig, StdioProvider, WebSocketConfig};
use crate::error::ExecutionError;

/// Default limit on one provider exchange: a stdio process run, an SSE
/// session or a WebSocket round trip.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

/// Notification the WebSocket server sends before any response.
const SESSION_NOTIFICATION: &str = "mcp_session";

/// Outcome of one execution. At least one of `output` and `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub provider_id: String,
}

impl ExecutionResult {
    fn success(provider_id: &str, output: String) -> Self {
        Self {
            output: Some(output),
            error: None,
            provider_id: provider_id.to_string(),
        }
    }

    fn failed(provider_id: &str, error: &ExecutionError) -> Self {
        Self {
            output: None,
            error: Some(error.to_string()),
            provider_id: provider_id.to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Executes raw tool input against the providers of an [`AppConfig`].
#[derive(Debug, Clone)]
pub struct ToolExecutor {
    config: Arc<AppConfig>,
    http: reqwest::Client,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Arc::new(config),
            http: reqwest::Client::new(),
            timeout: RESPONSE_TIMEOUT,
        }
    }

    /// Override the stdio/SSE/WebSocket timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Send `input` to the provider. Never fails: every failure is reported
    /// in [`ExecutionResult::error`].
    pub async fn execute(&self, provider_id: &str, input: &str) -> ExecutionResult {
        let Some(provider) = self.config.provider(provider_id) else {
            let err = ExecutionError::ProviderNotFound(provider_id.to_string());
            tracing::warn!(provider = %provider_id, "{err}");
            return ExecutionResult::failed(provider_id, &err);
        };
        if !provider.enabled {
            return ExecutionResult::failed(provider_id, &ExecutionError::ProviderDisabled(provider_id.to_string()));
        }

        tracing::info!(provider = %provider_id, kind = provider.kind.type_name(), "executing tool");
        let result = match &provider.kind {
            ProviderKind::Stdio(stdio) => self.execute_stdio(provider, stdio, input).await,
            ProviderKind::Http { config } => self
                .execute_http(provider, config, input)
                .await
                .map(|out| ExecutionResult::success(&provider.id, out)),
            ProviderKind::Sse { config } => self
                .execute_sse(provider, config, input)
                .await
                .map(|out| ExecutionResult::success(&provider.id, out)),
            ProviderKind::Websocket { config } => self
                .execute_websocket(provider, config, input)
                .await
                .map(|out| ExecutionResult::success(&provider.id, out)),
        };

        result.unwrap_or_else(|err| {
            tracing::error!(provider = %provider_id, error = %err, "tool execution failed");
            ExecutionResult::failed(provider_id, &err)
        })
    }

    // ── stdio ───────────────────────────────────────────────────────

    async fn execute_stdio(
        &self,
        provider: &ProviderConfig,
        stdio: &StdioProvider,
        input: &str,
    ) -> Result<ExecutionResult, ExecutionError> {
        let id = provider.id.as_str();
        let mut command = Command::new(&stdio.command);
        command
            .args(&stdio.args)
            .envs(&stdio.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &stdio.cwd {
            command.current_dir(cwd);
        }

        let mut child = command.spawn().map_err(|source| ExecutionError::Spawn {
            provider: id.to_string(),
            source,
        })?;

        // stdin is fed while stdout/stderr drain, otherwise a child that
        // echoes as it reads blocks on a full pipe.
        let stdin = child.stdin.take();
        let feed = async move {
            let Some(mut stdin) = stdin else { return };
            let written = async {
                stdin.write_all(input.as_bytes()).await?;
                stdin.write_all(b"\n").await?;
                stdin.flush().await
            }
            .await;
            if let Err(e) = written {
                tracing::warn!(provider = %id, error = %e, "could not write input to process");
            }
        };
        let exchange = async {
            let ((), output) = tokio::join!(feed, child.wait_with_output());
            output
        };

        let output = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| ExecutionError::Timeout {
                provider: id.to_string(),
                timeout: self.timeout,
            })?
            .map_err(|source| ExecutionError::Process {
                provider: id.to_string(),
                source,
            })?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        tracing::debug!(provider = %id, status = %output.status, "process exited");

        if output.status.success() {
            if !stderr.is_empty() {
                tracing::info!(provider = %id, stderr = %stderr.trim_end(), "process wrote to stderr");
            }
            return Ok(ExecutionResult::success(id, stdout));
        }

        let error = if stderr.is_empty() {
            match output.status.code() {
                Some(code) => format!("STDIO process for \"{id}\" exited with code {code}"),
                None => format!("STDIO process for \"{id}\" was terminated by a signal"),
            }
        } else {
            stderr
        };
        Ok(ExecutionResult {
            output: Some(stdout),
            error: Some(error),
            provider_id: id.to_string(),
        })
    }

    // ── http ────────────────────────────────────────────────────────

    async fn execute_http(
        &self,
        provider: &ProviderConfig,
        config: &HttpConfig,
        input: &str,
    ) -> Result<String, ExecutionError> {
        let method = reqwest::Method::from_bytes(config.method.to_ascii_uppercase().as_bytes()).map_err(|_| {
            ExecutionError::InvalidMethod {
                provider: provider.id.clone(),
                method: config.method.clone(),
            }
        })?;

        let mut request = self.http.request(method, config.url.clone()).body(input.to_string());
        for (name, value) in &config.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let http_err = |source| ExecutionError::Http {
            provider: provider.id.clone(),
            source,
        };
        let response = request.send().await.map_err(http_err)?;
        let status = response.status();
        let body = response.text().await.map_err(http_err)?;
        if !status.is_success() {
            return Err(ExecutionError::HttpStatus {
                provider: provider.id.clone(),
                url: config.url.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    // ── sse ─────────────────────────────────────────────────────────

    /// Input is `{"tool_name": ..., "arguments": ...}`. Opens the event
    /// stream for a session id, then posts `tool_<tool_name>` for it.
    async fn execute_sse(
        &self,
        provider: &ProviderConfig,
        config: &SseConfig,
        input: &str,
    ) -> Result<String, ExecutionError> {
        let id = provider.id.as_str();
        let invalid = |reason: &str| ExecutionError::InvalidInput {
            provider: id.to_string(),
            reason: reason.to_string(),
        };
        let parsed: Value = serde_json::from_str(input).map_err(|e| invalid(&e.to_string()))?;
        let tool_name = parsed
            .get("tool_name")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid("'tool_name' missing"))?;
        let arguments = parsed.get("arguments").cloned();

        let exchange = async {
            let http_err = |source| ExecutionError::Http {
                provider: id.to_string(),
                source,
            };

            let stream = self
                .http
                .get(config.url.clone())
                .header(reqwest::header::ACCEPT, "text/event-stream")
                .send()
                .await
                .and_then(reqwest::Response::error_for_status)
                .map_err(http_err)?;
            let mut events = EventReader::new(stream);
            let session_id = events
                .next_data()
                .await
                .map_err(http_err)?
                .and_then(|data| serde_json::from_str::<Value>(&data).ok())
                .and_then(|hello| hello.get("sessionId").and_then(Value::as_str).map(str::to_string))
                .ok_or_else(|| ExecutionError::MissingSession { provider: id.to_string() })?;
            tracing::debug!(provider = %id, session_id = %session_id, "SSE session opened");

            let mut post_url = config.url.clone();
            post_url.set_path(&config.message_path);
            post_url.set_query(None);
            post_url.query_pairs_mut().append_pair("sessionId", &session_id);

            let request_id = format!("sse-tool-{}", uuid::Uuid::new_v4());
            let request = JsonRpcRequest::new(
                Some(RpcId::String(request_id)),
                format!("tool_{tool_name}"),
                arguments,
            );
            let reply: JsonRpcResponse = self
                .http
                .post(post_url)
                .json(&request)
                .send()
                .await
                .map_err(http_err)?
                .json()
                .await
                .map_err(http_err)?;
            drop(events);
            rpc_output(reply)
        };

        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| ExecutionError::Timeout {
                provider: id.to_string(),
                timeout: self.timeout,
            })?
    }

    // ── websocket ───────────────────────────────────────────────────

    /// Sends the input as one text frame and returns the first frame that
    /// is not the session notification.
    async fn execute_websocket(
        &self,
        provider: &ProviderConfig,
        config: &WebSocketConfig,
        input: &str,
    ) -> Result<String, ExecutionError> {
        let id = provider.id.as_str();
        let ws_err = |source| ExecutionError::WebSocket {
            provider: id.to_string(),
            url: config.url.to_string(),
            source,
        };

        let exchange = async {
            let mut request = config.url.as_str().into_client_request().map_err(ws_err)?;
            if !config.protocols.is_empty() {
                let protocols = HeaderValue::from_str(&config.protocols.join(", ")).map_err(|_| {
                    ExecutionError::InvalidInput {
                        provider: id.to_string(),
                        reason: "protocols must be valid header text".into(),
                    }
                })?;
                request.headers_mut().insert("Sec-WebSocket-Protocol", protocols);
            }

            let (mut socket, _) = tokio_tungstenite::connect_async(request).await.map_err(ws_err)?;
            socket.send(Message::Text(input.to_string().into())).await.map_err(ws_err)?;

            while let Some(frame) = socket.next().await {
                let text = match frame.map_err(ws_err)? {
                    Message::Text(text) => text.as_str().to_string(),
                    Message::Binary(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                    Message::Close(_) => break,
                    _ => continue,
                };
                if is_session_notification(&text) {
                    continue;
                }
                if let Err(e) = socket.close(None).await {
                    tracing::debug!(provider = %id, error = %e, "WebSocket close failed");
                }
                return Ok(text);
            }
            Err::<String, _>(ExecutionError::Closed { provider: id.to_string() })
        };

        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| ExecutionError::Timeout {
                provider: id.to_string(),
                timeout: self.timeout,
            })?
    }
}

fn is_session_notification(text: &str) -> bool {
    serde_json::from_str::<Value>(text)
        .ok()
        .is_some_and(|v| v.get("method").and_then(Value::as_str) == Some(SESSION_NOTIFICATION))
}

fn rpc_output(reply: JsonRpcResponse) -> Result<String, ExecutionError> {
    if let Some(err) = reply.error {
        return Err(ExecutionError::Rpc(err.message));
    }
    let result = reply.result.unwrap_or(Value::Null);
    Ok(result.to_string())
}

/// Pulls `data:` payloads out of a `text/event-stream` body.
struct EventReader {
    body: futures::stream::BoxStream<'static, reqwest::Result<bytes::Bytes>>,
    buffer: Vec<u8>,
}

impl EventReader {
    fn new(response: reqwest::Response) -> Self {
        Self::from_stream(response.bytes_stream().boxed())
    }

    fn from_stream(body: futures::stream::BoxStream<'static, reqwest::Result<bytes::Bytes>>) -> Self {
        Self {
            body,
            buffer: Vec::new(),
        }
    }

    /// Next event's data, or `None` once the stream ends. Comment-only
    /// events (keep-alives) are skipped.
    async fn next_data(&mut self) -> reqwest::Result<Option<String>> {
        loop {
            while let Some((end, sep)) = event_end(&self.buffer) {
                let raw: Vec<u8> = self.buffer.drain(..end + sep).collect();
                // Only whole events are decoded, so a character split
                // across chunks arrives intact.
                let event = String::from_utf8_lossy(&raw[..end]);
                let data: Vec<&str> = event
                    .lines()
                    .filter_map(|line| line.strip_prefix("data:"))
                    .map(|d| d.strip_prefix(' ').unwrap_or(d))
                    .collect();
                if !data.is_empty() {
                    return Ok(Some(data.join("\n")));
                }
            }
            match self.body.next().await {
                Some(chunk) => self.buffer.extend_from_slice(&chunk?),
                None => return Ok(None),
            }
        }
    }
}

/// Offset and length of the first blank-line event terminator, `\n\n` or
/// `\r\n\r\n`.
fn event_end(buf: &[u8]) -> Option<(usize, usize)> {
    let find = |pat: &[u8]| buf.windows(pat.len()).position(|w| w == pat).map(|at| (at, pat.len()));
    match (find(&b"\n\n"[..]), find(&b"\r\n\r\n"[..])) {
        (Some(lf), Some(crlf)) => Some(if crlf.0 < lf.0 { crlf } else { lf }),
        (lf, crlf) => lf.or(crlf),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_notification_detection() {
        assert!(is_session_notification(
            r#"{"jsonrpc":"2.0","method":"mcp_session","params":{"sessionId":"s"}}"#
        ));
        assert!(!is_session_notification(r#"{"jsonrpc":"2.0","result":[],"id":1}"#));
        assert!(!is_session_notification("plain text"));
    }

    #[test]
    fn test_rpc_output() {
        let ok = JsonRpcResponse::success(None, serde_json::json!({"content": []}));
        assert_eq!(rpc_output(ok).unwrap(), r#"{"content":[]}"#);

        let err = JsonRpcResponse::failure(None, &toolwire_mcp::McpError::ToolNotFound("x".into()));
        assert_eq!(rpc_output(err).unwrap_err().to_string(), "Tool 'x' not found");
    }

    fn reader(chunks: &[&[u8]]) -> EventReader {
        let chunks: Vec<reqwest::Result<bytes::Bytes>> =
            chunks.iter().map(|c| Ok(bytes::Bytes::copy_from_slice(c))).collect();
        EventReader::from_stream(futures::stream::iter(chunks).boxed())
    }

    #[tokio::test]
    async fn test_event_reader_joins_split_characters() {
        let text = "data: {\"name\":\"caf\u{e9}\"}\n\n".as_bytes();
        let split = text.iter().position(|b| *b == 0xc3).unwrap() + 1;
        let (head, tail) = text.split_at(split);

        let mut events = reader(&[head, tail]);
        assert_eq!(events.next_data().await.unwrap().as_deref(), Some("{\"name\":\"caf\u{e9}\"}"));
        assert_eq!(events.next_data().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_event_reader_crlf_split_across_chunks() {
        let mut events = reader(&[b": keep-alive\r\n\r", b"\ndata: one\r\ndata: two\r", b"\n\r\n", b"data: three\n\n"]);
        assert_eq!(events.next_data().await.unwrap().as_deref(), Some("one\ntwo"));
        assert_eq!(events.next_data().await.unwrap().as_deref(), Some("three"));
        assert_eq!(events.next_data().await.unwrap(), None);
    }

    #[test]
    fn test_event_end_picks_first_terminator() {
        assert_eq!(event_end(b"a\n\nb\r\n\r\n"), Some((1, 2)));
        assert_eq!(event_end(b"a\r\n\r\nb\n\n"), Some((1, 4)));
        assert_eq!(event_end(b"a\r\n\r"), None);
    }

    #[tokio::test]
    async fn test_unknown_and_disabled_providers() {
        let config = AppConfig::from_json(
            r#"{"mcpProviders": {"off": {"name": "Off", "command": "true", "enabled": false}}}"#,
        )
        .unwrap();
        let executor = ToolExecutor::new(config);

        let result = executor.execute("nope", "{}").await;
        assert_eq!(result.provider_id, "nope");
        assert_eq!(
            result.error.as_deref(),
            Some("MCP provider with ID 'nope' not found in configuration")
        );

        let result = executor.execute("off", "{}").await;
        assert_eq!(result.error.as_deref(), Some("MCP provider 'off' is disabled"));
        assert!(result.output.is_none());
    }
}
