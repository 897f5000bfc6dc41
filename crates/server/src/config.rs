use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use toolwire_mcp::{McpServerConfig, SessionManagerConfig};

use crate::error::ServerError;
use crate::http::HttpTransportConfig;
use crate::sse::SseTransportConfig;
use crate::websocket::WebSocketTransportConfig;

/// Which transport the server binary exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Http,
    Sse,
    Websocket,
    Stdio,
}

impl TransportKind {
    /// Route the transport serves when no path is configured.
    pub fn default_path(self) -> &'static str {
        match self {
            TransportKind::Http => "/mcp",
            TransportKind::Sse => "/sse",
            TransportKind::Websocket => "/ws",
            TransportKind::Stdio => "",
        }
    }
}

impl FromStr for TransportKind {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(TransportKind::Http),
            "sse" => Ok(TransportKind::Sse),
            "websocket" | "ws" => Ok(TransportKind::Websocket),
            "stdio" => Ok(TransportKind::Stdio),
            other => Err(ServerError::Config(format!(
                "unknown transport '{other}' (expected http, sse, websocket or stdio)"
            ))),
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransportKind::Http => "http",
            TransportKind::Sse => "sse",
            TransportKind::Websocket => "websocket",
            TransportKind::Stdio => "stdio",
        };
        f.write_str(s)
    }
}

// ── Settings ────────────────────────────────────────────────────────

/// Server binary settings.
///
/// Parsed from `toolwire.toml`; every key can be overridden with a
/// `TOOLWIRE_<KEY>` environment variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub name: String,
    pub version: String,
    pub transport: TransportKind,
    pub host: String,
    pub port: u16,
    /// Endpoint path; defaults per transport (`/mcp`, `/sse`, `/ws`).
    pub path: Option<String>,
    /// SSE only: where requests are POSTed.
    pub message_path: String,
    pub cleanup_interval_secs: u64,
    pub session_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            name: "toolwire".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            transport: TransportKind::Http,
            host: "localhost".into(),
            port: 3000,
            path: None,
            message_path: "/messages".into(),
            cleanup_interval_secs: 5 * 60,
            session_timeout_secs: 30 * 60,
        }
    }
}

impl ServerSettings {
    /// Parse settings from a TOML string, apply environment overrides, validate.
    pub fn from_toml(toml_str: &str) -> Result<Self, ServerError> {
        let mut settings: Self = toml::from_str(toml_str)?;
        settings.apply_env_overrides()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ServerError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Load from `path` if it exists, otherwise start from defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ServerError> {
        let path = path.as_ref();
        if path.exists() {
            tracing::debug!(path = %path.display(), "loading settings file");
            return Self::from_file(path);
        }
        let mut settings = Self::default();
        settings.apply_env_overrides()?;
        settings.validate()?;
        Ok(settings)
    }

    // ── Environment variable overrides ──────────────────────────────

    /// Convention: `TOOLWIRE_KEY` overrides `key`, e.g. `TOOLWIRE_PORT` -> `port`.
    fn apply_env_overrides(&mut self) -> Result<(), ServerError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ServerError> {
        if let Some(v) = lookup("TOOLWIRE_NAME") {
            self.name = v;
        }
        if let Some(v) = lookup("TOOLWIRE_VERSION") {
            self.version = v;
        }
        if let Some(v) = lookup("TOOLWIRE_TRANSPORT") {
            self.transport = v.parse()?;
        }
        if let Some(v) = lookup("TOOLWIRE_HOST") {
            self.host = v;
        }
        if let Some(v) = lookup("TOOLWIRE_PORT") {
            self.port = parse_number("TOOLWIRE_PORT", &v)?;
        }
        if let Some(v) = lookup("TOOLWIRE_PATH") {
            self.path = Some(v);
        }
        if let Some(v) = lookup("TOOLWIRE_MESSAGE_PATH") {
            self.message_path = v;
        }
        if let Some(v) = lookup("TOOLWIRE_CLEANUP_INTERVAL_SECS") {
            self.cleanup_interval_secs = parse_number("TOOLWIRE_CLEANUP_INTERVAL_SECS", &v)?;
        }
        if let Some(v) = lookup("TOOLWIRE_SESSION_TIMEOUT_SECS") {
            self.session_timeout_secs = parse_number("TOOLWIRE_SESSION_TIMEOUT_SECS", &v)?;
        }
        Ok(())
    }

    // ── Validation ──────────────────────────────────────────────────

    pub fn validate(&self) -> Result<(), ServerError> {
        if self.name.trim().is_empty() {
            return Err(ServerError::Config("name must not be empty".into()));
        }
        if self.version.trim().is_empty() {
            return Err(ServerError::Config("version must not be empty".into()));
        }
        if self.transport != TransportKind::Stdio {
            check_route("path", &self.endpoint_path())?;
        }
        if self.transport == TransportKind::Sse {
            check_route("message_path", &self.message_path)?;
            if self.message_path == self.endpoint_path() {
                return Err(ServerError::Config(
                    "message_path must differ from the SSE stream path".into(),
                ));
            }
        }
        if self.cleanup_interval_secs == 0 {
            return Err(ServerError::Config("cleanup_interval_secs must be positive".into()));
        }
        if self.session_timeout_secs == 0 {
            return Err(ServerError::Config("session_timeout_secs must be positive".into()));
        }
        Ok(())
    }

    // ── Derived configs ─────────────────────────────────────────────

    pub fn endpoint_path(&self) -> String {
        self.path
            .clone()
            .unwrap_or_else(|| self.transport.default_path().to_string())
    }

    pub fn server_config(&self) -> McpServerConfig {
        McpServerConfig::new(&self.name, &self.version)
    }

    pub fn session_config(&self) -> SessionManagerConfig {
        SessionManagerConfig {
            cleanup_interval: Duration::from_secs(self.cleanup_interval_secs),
            session_timeout: Duration::from_secs(self.session_timeout_secs),
        }
    }

    pub fn http_config(&self) -> HttpTransportConfig {
        HttpTransportConfig {
            host: self.host.clone(),
            port: self.port,
            path: self.endpoint_path(),
        }
    }

    pub fn sse_config(&self) -> SseTransportConfig {
        SseTransportConfig {
            host: self.host.clone(),
            port: self.port,
            path: self.endpoint_path(),
            message_path: self.message_path.clone(),
        }
    }

    pub fn websocket_config(&self) -> WebSocketTransportConfig {
        WebSocketTransportConfig {
            host: self.host.clone(),
            port: self.port,
            path: self.endpoint_path(),
        }
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T, ServerError> {
    value
        .trim()
        .parse()
        .map_err(|_| ServerError::Config(format!("{key} must be a number, got '{value}'")))
}

fn check_route(field: &str, route: &str) -> Result<(), ServerError> {
    if !route.starts_with('/') || route.len() < 2 {
        return Err(ServerError::Config(format!(
            "{field} must be an absolute route like '/mcp', got '{route}'"
        )));
    }
    if route == "/health" {
        return Err(ServerError::Config(format!("{field} must not be '/health'")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let settings = ServerSettings::default();
        settings.validate().unwrap();
        assert_eq!(settings.http_config(), HttpTransportConfig::default());
        assert_eq!(settings.session_config(), SessionManagerConfig::default());
    }

    #[test]
    fn test_parse_toml() {
        let settings: ServerSettings = toml::from_str(
            r#"
            name = "tools"
            transport = "sse"
            port = 8080
            session_timeout_secs = 60
            "#,
        )
        .unwrap();
        settings.validate().unwrap();
        assert_eq!(settings.transport, TransportKind::Sse);
        assert_eq!(settings.endpoint_path(), "/sse");
        assert_eq!(settings.sse_config().message_path, "/messages");
        assert_eq!(settings.sse_config().port, 8080);
        assert_eq!(settings.session_config().session_timeout, Duration::from_secs(60));
        assert_eq!(settings.host, "localhost");
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("TOOLWIRE_TRANSPORT", "ws"),
            ("TOOLWIRE_PORT", "9001"),
            ("TOOLWIRE_PATH", "/socket"),
        ]);
        let mut settings = ServerSettings::default();
        settings
            .apply_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(settings.transport, TransportKind::Websocket);
        assert_eq!(settings.websocket_config().port, 9001);
        assert_eq!(settings.websocket_config().path, "/socket");
    }

    #[test]
    fn test_bad_override_is_an_error() {
        let mut settings = ServerSettings::default();
        let err = settings
            .apply_overrides(|k| (k == "TOOLWIRE_PORT").then(|| "lots".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("TOOLWIRE_PORT"));
    }

    #[test]
    fn test_validation_rules() {
        let mut settings = ServerSettings {
            path: Some("mcp".into()),
            ..ServerSettings::default()
        };
        assert!(settings.validate().is_err());

        settings.path = None;
        settings.transport = TransportKind::Sse;
        settings.message_path = "/sse".into();
        assert!(settings.validate().is_err());

        settings.message_path = "/messages".into();
        settings.session_timeout_secs = 0;
        assert!(settings.validate().is_err());

        let stdio = ServerSettings {
            transport: TransportKind::Stdio,
            ..ServerSettings::default()
        };
        stdio.validate().unwrap();
    }

    #[test]
    fn test_transport_kind_parse() {
        assert_eq!("HTTP".parse::<TransportKind>().unwrap(), TransportKind::Http);
        assert_eq!("websocket".parse::<TransportKind>().unwrap(), TransportKind::Websocket);
        assert!("grpc".parse::<TransportKind>().is_err());
        assert_eq!(TransportKind::Stdio.to_string(), "stdio");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("toolwire.toml");
        std::fs::write(&path, "name = \"from-file\"\nport = 0\n").unwrap();
        let settings = ServerSettings::from_file(&path).unwrap();
        assert_eq!(settings.name, "from-file");
        assert_eq!(settings.port, 0);

        std::fs::write(&path, "port = \"nope\"\n").unwrap();
        assert!(matches!(
            ServerSettings::from_file(&path),
            Err(ServerError::ConfigParse(_))
        ));
    }
}
