//! The server registry: tools, resources and prompt templates.
//!
//! An [`McpServer`] is populated with `&mut self` registration calls, then
//! wrapped in an `Arc` and handed to a transport with [`McpServer::connect`].
//! Registration keys are unique; a duplicate is rejected and leaves the
//! registry exactly as it was.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use url::Url;

use crate::error::McpError;
use crate::session::{SessionManager, SessionManagerConfig};
use crate::transport::Transport;
use crate::types::{
    McpServerConfig, PromptInfo, PromptResponse, ResourceInfo, ResourceResponse, ToolInfo,
    ToolResponse,
};
use crate::validation::{validate_params, ParamSchema};

// ── Handlers ────────────────────────────────────────────────────────

/// Executes a tool with already-validated parameters.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, params: Value) -> Result<ToolResponse, McpError>;
}

/// Produces the contents of a resource. Receives the parsed URI.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    async fn read(&self, uri: Url) -> Result<ResourceResponse, McpError>;
}

/// Renders a prompt template with already-validated parameters.
#[async_trait]
pub trait PromptHandler: Send + Sync {
    async fn render(&self, params: Value) -> Result<PromptResponse, McpError>;
}

#[async_trait]
impl<F, Fut> ToolHandler for F
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ToolResponse, McpError>> + Send,
{
    async fn call(&self, params: Value) -> Result<ToolResponse, McpError> {
        (self)(params).await
    }
}

#[async_trait]
impl<F, Fut> ResourceHandler for F
where
    F: Fn(Url) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ResourceResponse, McpError>> + Send,
{
    async fn read(&self, uri: Url) -> Result<ResourceResponse, McpError> {
        (self)(uri).await
    }
}

#[async_trait]
impl<F, Fut> PromptHandler for F
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<PromptResponse, McpError>> + Send,
{
    async fn render(&self, params: Value) -> Result<PromptResponse, McpError> {
        (self)(params).await
    }
}

struct RegisteredTool {
    schema: ParamSchema,
    handler: Arc<dyn ToolHandler>,
}

struct RegisteredResource {
    name: String,
    uri: Url,
    handler: Arc<dyn ResourceHandler>,
}

struct RegisteredPrompt {
    schema: ParamSchema,
    handler: Arc<dyn PromptHandler>,
}

// ── Server ──────────────────────────────────────────────────────────

/// Registry of capabilities plus the transport currently serving them.
pub struct McpServer {
    config: McpServerConfig,
    tools: HashMap<String, RegisteredTool>,
    // Keyed by the URI string exactly as registered.
    resources: HashMap<String, RegisteredResource>,
    prompts: HashMap<String, RegisteredPrompt>,
    sessions: Arc<SessionManager>,
    transport: Mutex<Option<Box<dyn Transport>>>,
}

impl McpServer {
    /// Create an empty server. Fails if the config has a blank name or version.
    pub fn new(config: McpServerConfig) -> Result<Self, McpError> {
        Self::with_session_config(config, SessionManagerConfig::default())
    }

    pub fn with_session_config(
        config: McpServerConfig,
        session_config: SessionManagerConfig,
    ) -> Result<Self, McpError> {
        config.validate()?;
        Ok(Self {
            config,
            tools: HashMap::new(),
            resources: HashMap::new(),
            prompts: HashMap::new(),
            sessions: Arc::new(SessionManager::new(session_config)),
            transport: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &McpServerConfig {
        &self.config
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Register a tool. Its description is taken from the schema.
    pub fn tool(
        &mut self,
        name: impl Into<String>,
        schema: ParamSchema,
        handler: impl ToolHandler + 'static,
    ) -> Result<(), McpError> {
        let name = name.into();
        if self.tools.contains_key(&name) {
            return Err(McpError::DuplicateTool(name));
        }
        tracing::debug!(tool = %name, "registered tool");
        self.tools.insert(
            name,
            RegisteredTool {
                schema,
                handler: Arc::new(handler),
            },
        );
        Ok(())
    }

    /// Register a resource under `uri`, which must parse as a URL.
    pub fn resource(
        &mut self,
        name: impl Into<String>,
        uri: &str,
        handler: impl ResourceHandler + 'static,
    ) -> Result<(), McpError> {
        if self.resources.contains_key(uri) {
            return Err(McpError::DuplicateResource(uri.to_string()));
        }
        let parsed = Url::parse(uri).map_err(|e| McpError::InvalidUri {
            uri: uri.to_string(),
            reason: e.to_string(),
        })?;
        tracing::debug!(uri = %uri, "registered resource");
        self.resources.insert(
            uri.to_string(),
            RegisteredResource {
                name: name.into(),
                uri: parsed,
                handler: Arc::new(handler),
            },
        );
        Ok(())
    }

    pub fn prompt(
        &mut self,
        name: impl Into<String>,
        schema: ParamSchema,
        handler: impl PromptHandler + 'static,
    ) -> Result<(), McpError> {
        let name = name.into();
        if self.prompts.contains_key(&name) {
            return Err(McpError::DuplicatePrompt(name));
        }
        tracing::debug!(prompt = %name, "registered prompt");
        self.prompts.insert(
            name,
            RegisteredPrompt {
                schema,
                handler: Arc::new(handler),
            },
        );
        Ok(())
    }

    /// Registered tools, sorted by name.
    pub fn tools(&self) -> Vec<ToolInfo> {
        let mut tools: Vec<ToolInfo> = self
            .tools
            .iter()
            .map(|(name, tool)| ToolInfo {
                name: name.clone(),
                description: tool.schema.description().unwrap_or_default().to_string(),
                input_schema: tool.schema.schema().clone(),
            })
            .collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    /// Registered resources, sorted by URI.
    pub fn resources(&self) -> Vec<ResourceInfo> {
        let mut resources: Vec<ResourceInfo> = self
            .resources
            .iter()
            .map(|(uri, res)| ResourceInfo {
                name: res.name.clone(),
                uri: uri.clone(),
            })
            .collect();
        resources.sort_by(|a, b| a.uri.cmp(&b.uri));
        resources
    }

    /// Registered prompt templates, sorted by name.
    pub fn prompts(&self) -> Vec<PromptInfo> {
        let mut prompts: Vec<PromptInfo> = self
            .prompts
            .iter()
            .map(|(name, prompt)| PromptInfo {
                name: name.clone(),
                description: prompt.schema.description().unwrap_or_default().to_string(),
                input_schema: prompt.schema.schema().clone(),
            })
            .collect();
        prompts.sort_by(|a, b| a.name.cmp(&b.name));
        prompts
    }

    /// Look up, validate, then run a tool.
    pub async fn execute_tool(&self, name: &str, params: Option<Value>) -> Result<ToolResponse, McpError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| McpError::ToolNotFound(name.to_string()))?;
        let params = validate_params(&tool.schema, params)?;
        let handler = Arc::clone(&tool.handler);
        tracing::debug!(tool = %name, "executing tool");
        handler.call(params).await
    }

    pub async fn get_resource(&self, uri: &str) -> Result<ResourceResponse, McpError> {
        let resource = self
            .resources
            .get(uri)
            .ok_or_else(|| McpError::ResourceNotFound(uri.to_string()))?;
        let handler = Arc::clone(&resource.handler);
        tracing::debug!(uri = %uri, "reading resource");
        handler.read(resource.uri.clone()).await
    }

    pub async fn execute_prompt(
        &self,
        name: &str,
        params: Option<Value>,
    ) -> Result<PromptResponse, McpError> {
        let prompt = self
            .prompts
            .get(name)
            .ok_or_else(|| McpError::PromptNotFound(name.to_string()))?;
        let params = validate_params(&prompt.schema, params)?;
        let handler = Arc::clone(&prompt.handler);
        tracing::debug!(prompt = %name, "rendering prompt");
        handler.render(params).await
    }

    // ── Transport lifecycle ─────────────────────────────────────────

    /// Attach `transport` and start serving. Only one transport may be
    /// connected at a time. Also starts the session sweeper.
    pub async fn connect(self: &Arc<Self>, transport: impl Transport + 'static) -> Result<(), McpError> {
        let mut slot = self.transport.lock().await;
        if slot.is_some() {
            return Err(McpError::AlreadyConnected);
        }
        let mut transport: Box<dyn Transport> = Box::new(transport);
        transport.connect(Arc::clone(self)).await?;
        self.sessions.start();
        *slot = Some(transport);
        tracing::info!(server = %self.config.name, version = %self.config.version, "transport connected");
        Ok(())
    }

    /// Detach the current transport, if any, and stop the session sweeper.
    pub async fn disconnect(&self) -> Result<(), McpError> {
        let transport = self.transport.lock().await.take();
        self.sessions.stop();
        if let Some(mut transport) = transport {
            transport.disconnect().await?;
            tracing::info!(server = %self.config.name, "transport disconnected");
        }
        Ok(())
    }

    pub async fn is_connected(&self) -> bool {
        self.transport
            .lock()
            .await
            .as_ref()
            .is_some_and(|t| t.is_connected())
    }

    pub async fn current_session_id(&self) -> Option<String> {
        self.transport.lock().await.as_ref().and_then(|t| t.session_id())
    }
}

impl std::fmt::Debug for McpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpServer")
            .field("config", &self.config)
            .field("tools", &self.tools.len())
            .field("resources", &self.resources.len())
            .field("prompts", &self.prompts.len())
            .finish()
    }
}
