//! Provider configuration loaded from `mcp.config.json`.
//!
//! ```json
//! {
//!   "llm": { "provider": "bedrock", "model": "claude", "temperature": 0.2 },
//!   "mcpProviders": {
//!     "echo":  { "name": "Echo", "command": "toolwire-server", "args": ["--transport", "stdio"] },
//!     "tools": { "name": "Tools", "type": "sse", "config": { "url": "http://localhost:3000/sse" } }
//!   }
//! }
//! ```
//!
//! Providers without a `type` but with a string `command` are treated as stdio.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_FILE: &str = "mcp.config.json";

/// Root of `mcp.config.json`.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub llm: Option<LlmConfig>,
    pub mcp_providers: BTreeMap<String, ProviderConfig>,
    pub schema: Option<String>,
    pub version: Option<String>,
}

/// Model settings passed through to whatever drives the tools.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_system_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_steps: Option<u32>,
}

/// One entry of `mcpProviders`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderConfig {
    /// Key of the entry in `mcpProviders`.
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<String>,
    pub enabled: bool,
    #[serde(flatten)]
    pub kind: ProviderKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderKind {
    Stdio(StdioProvider),
    Http { config: HttpConfig },
    Sse { config: SseConfig },
    Websocket { config: WebSocketConfig },
}

impl ProviderKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ProviderKind::Stdio(_) => "stdio",
            ProviderKind::Http { .. } => "http",
            ProviderKind::Sse { .. } => "sse",
            ProviderKind::Websocket { .. } => "websocket",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StdioProvider {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
    /// Added on top of the parent environment.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    pub url: Url,
    pub method: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SseConfig {
    /// The event stream endpoint, e.g. `http://localhost:3000/sse`.
    pub url: Url,
    #[serde(default)]
    pub with_credentials: bool,
    /// Route requests are POSTed to, on the same origin as `url`.
    #[serde(default = "default_message_path")]
    pub message_path: String,
}

fn default_message_path() -> String {
    "/messages".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebSocketConfig {
    pub url: Url,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub protocols: Vec<String>,
}

// ── Loading ─────────────────────────────────────────────────────────

impl AppConfig {
    /// Load and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "loading provider config");
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Parse and validate config JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let root: Value = serde_json::from_str(json)?;
        let providers = root
            .get("mcpProviders")
            .and_then(Value::as_object)
            .ok_or(ConfigError::MissingProviders)?;

        let mut mcp_providers = BTreeMap::new();
        for (id, raw) in providers {
            mcp_providers.insert(id.clone(), parse_provider(id, raw)?);
        }

        let llm = match root.get("llm") {
            None | Some(Value::Null) => None,
            Some(raw) => Some(parse_llm(raw)?),
        };

        let config = Self {
            llm,
            mcp_providers,
            schema: optional_string(&root, "$schema"),
            version: optional_string(&root, "version"),
        };
        tracing::info!(
            providers = config.mcp_providers.len(),
            llm = config.llm.is_some(),
            "provider config loaded"
        );
        Ok(config)
    }

    pub fn provider(&self, id: &str) -> Option<&ProviderConfig> {
        self.mcp_providers.get(id)
    }
}

fn optional_string(obj: &Value, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

fn parse_provider(id: &str, raw: &Value) -> Result<ProviderConfig, ConfigError> {
    let obj = raw
        .as_object()
        .ok_or_else(|| ConfigError::provider(id, "entry", "must be an object"))?;

    let name = match obj.get("name") {
        Some(Value::String(name)) if !name.is_empty() => name.clone(),
        _ => return Err(ConfigError::provider(id, "name", "is required")),
    };

    let kind_name = match obj.get("type") {
        Some(Value::String(kind)) => kind.clone(),
        Some(_) => return Err(ConfigError::provider(id, "type", "must be a string")),
        None if obj.get("command").is_some_and(Value::is_string) => "stdio".to_string(),
        None => {
            return Err(ConfigError::provider(
                id,
                "type",
                "is missing and cannot be inferred as stdio",
            ))
        }
    };

    let kind = match kind_name.as_str() {
        "stdio" => {
            if !obj.get("command").is_some_and(Value::is_string) {
                return Err(ConfigError::provider(id, "command", "(string) is required"));
            }
            let stdio: StdioProvider = serde_json::from_value(raw.clone())
                .map_err(|e| ConfigError::provider(id, "stdio settings", e.to_string()))?;
            ProviderKind::Stdio(stdio)
        }
        "http" => ProviderKind::Http {
            config: parse_section(id, obj)?,
        },
        "sse" => ProviderKind::Sse {
            config: parse_section(id, obj)?,
        },
        "websocket" => ProviderKind::Websocket {
            config: parse_section(id, obj)?,
        },
        other => {
            return Err(ConfigError::UnknownProviderType {
                provider: id.to_string(),
                kind: other.to_string(),
            })
        }
    };

    let capabilities = match obj.get("capabilities") {
        None | Some(Value::Null) => Vec::new(),
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|_| ConfigError::provider(id, "capabilities", "must be a list of strings"))?,
    };

    let enabled = match obj.get("enabled") {
        None | Some(Value::Null) => true,
        Some(Value::Bool(enabled)) => *enabled,
        Some(_) => return Err(ConfigError::provider(id, "enabled", "must be a boolean")),
    };

    Ok(ProviderConfig {
        id: id.to_string(),
        name,
        description: obj.get("description").and_then(Value::as_str).map(str::to_string),
        capabilities,
        enabled,
        kind,
    })
}

fn parse_section<T: serde::de::DeserializeOwned>(
    id: &str,
    obj: &Map<String, Value>,
) -> Result<T, ConfigError> {
    let section = obj
        .get("config")
        .filter(|v| v.is_object())
        .ok_or_else(|| ConfigError::provider(id, "config", "object is required"))?;
    serde_json::from_value(section.clone()).map_err(|e| ConfigError::provider(id, "config", e.to_string()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLlm {
    provider: Option<String>,
    model: Option<String>,
    default_system_prompt: Option<String>,
    temperature: Option<f64>,
    max_tokens: Option<f64>,
    max_steps: Option<f64>,
}

fn parse_llm(raw: &Value) -> Result<LlmConfig, ConfigError> {
    let raw: RawLlm = serde_json::from_value(raw.clone()).map_err(|e| ConfigError::Llm {
        field: "*",
        reason: e.to_string(),
    })?;

    let provider = raw.provider.ok_or(ConfigError::Llm {
        field: "provider",
        reason: "is required".into(),
    })?;
    let model = raw.model.ok_or(ConfigError::Llm {
        field: "model",
        reason: "is required".into(),
    })?;

    if let Some(t) = raw.temperature {
        if !(0.0..=1.0).contains(&t) {
            return Err(ConfigError::Llm {
                field: "temperature",
                reason: format!("must be between 0 and 1, got {t}"),
            });
        }
    }

    Ok(LlmConfig {
        provider,
        model,
        default_system_prompt: raw.default_system_prompt,
        temperature: raw.temperature,
        max_tokens: positive_count("maxTokens", raw.max_tokens)?,
        max_steps: positive_count("maxSteps", raw.max_steps)?,
    })
}

fn positive_count(field: &'static str, value: Option<f64>) -> Result<Option<u32>, ConfigError> {
    let Some(v) = value else {
        return Ok(None);
    };
    if v <= 0.0 || v.fract() != 0.0 || v > f64::from(u32::MAX) {
        return Err(ConfigError::Llm {
            field,
            reason: format!("must be a positive integer, got {v}"),
        });
    }
    Ok(Some(v as u32))
}
