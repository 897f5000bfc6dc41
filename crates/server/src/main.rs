//! toolwire-server: expose the built-in tools, resources and prompts over
//! HTTP, SSE, WebSocket or stdio.
//!
//! # Usage
//!
//! ```bash
//! # HTTP on localhost:3000/mcp (default)
//! toolwire-server
//!
//! # SSE on all interfaces
//! toolwire-server --transport sse --host 0.0.0.0 --port 8080
//!
//! # stdio, for spawning as a child process
//! toolwire-server --transport stdio
//!
//! # Via environment variables
//! TOOLWIRE_TRANSPORT=websocket TOOLWIRE_PORT=9000 toolwire-server
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;

use toolwire_mcp::{McpServer, StdioTransport};
use toolwire_server::{
    demo, HttpTransport, ServerSettings, SseTransport, TransportKind, WebSocketTransport,
};

/// Serve toolwire capabilities over the selected transport.
#[derive(Parser, Debug)]
#[command(name = "toolwire-server", version, about)]
struct Cli {
    /// Settings file. Missing files fall back to defaults.
    #[arg(long, env = "TOOLWIRE_CONFIG", default_value = "toolwire.toml")]
    config: PathBuf,

    /// Transport: http, sse, websocket or stdio. Overrides the settings file.
    #[arg(long)]
    transport: Option<TransportKind>,

    /// Host to bind. Overrides the settings file.
    #[arg(long)]
    host: Option<String>,

    /// Port to bind. Overrides the settings file.
    #[arg(long)]
    port: Option<u16>,

    /// Endpoint path. Overrides the settings file.
    #[arg(long)]
    path: Option<String>,
}

impl Cli {
    fn into_settings(self) -> anyhow::Result<ServerSettings> {
        let mut settings = ServerSettings::load(&self.config)?;
        if let Some(transport) = self.transport {
            settings.transport = transport;
        }
        if let Some(host) = self.host {
            settings.host = host;
        }
        if let Some(port) = self.port {
            settings.port = port;
        }
        if let Some(path) = self.path {
            settings.path = Some(path);
        }
        settings.validate()?;
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // stdout carries protocol traffic for the stdio transport, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::info!(?cli, "starting toolwire-server");
    let settings = cli.into_settings()?;

    let mut server = McpServer::with_session_config(settings.server_config(), settings.session_config())?;
    demo::register(&mut server)?;
    let server = Arc::new(server);

    let mut stdin_closed: Option<watch::Receiver<bool>> = None;
    match settings.transport {
        TransportKind::Http => server.connect(HttpTransport::new(settings.http_config())).await?,
        TransportKind::Sse => server.connect(SseTransport::new(settings.sse_config())).await?,
        TransportKind::Websocket => {
            server
                .connect(WebSocketTransport::new(settings.websocket_config()))
                .await?
        }
        TransportKind::Stdio => {
            let transport = StdioTransport::new();
            stdin_closed = Some(transport.closed_signal());
            server.connect(transport).await?;
        }
    }

    tracing::info!(
        transport = %settings.transport,
        tools = server.tools().len(),
        resources = server.resources().len(),
        prompts = server.prompts().len(),
        "toolwire-server ready"
    );

    match stdin_closed {
        Some(mut closed) => {
            tokio::select! {
                _ = shutdown_signal() => tracing::info!("shutdown signal received"),
                _ = closed.wait_for(|c| *c) => tracing::info!("stdin closed"),
            }
        }
        None => {
            shutdown_signal().await;
            tracing::info!("shutdown signal received");
        }
    }

    server.disconnect().await?;
    tracing::info!("toolwire-server exited cleanly");
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl_c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to register SIGTERM handler");
                ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
    }
}
