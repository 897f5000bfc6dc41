mod cli;

use std::io::Read;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::Value;

use toolwire_client::{AppConfig, StdioClient, ToolExecutor};

use crate::cli::{CliArgs, Command};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();

    match args.command {
        Command::Providers => {
            let config = AppConfig::load(&args.config).context("failed to load provider config")?;
            for provider in config.mcp_providers.values() {
                let state = if provider.enabled { "" } else { " (disabled)" };
                println!("{:<20} {:<10} {}{state}", provider.id, provider.kind.type_name(), provider.name);
            }
        }
        Command::Exec { provider, input } => {
            let config = AppConfig::load(&args.config).context("failed to load provider config")?;
            let input = match input.as_deref() {
                None | Some("-") => {
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf).context("failed to read stdin")?;
                    buf.trim_end_matches('\n').to_string()
                }
                Some(text) => text.to_string(),
            };
            let result = ToolExecutor::new(config).execute(&provider, &input).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
            if result.is_error() {
                std::process::exit(1);
            }
        }
        Command::Inspect { server } => {
            let client = spawn(&server).await?;
            let report = serde_json::json!({
                "tools": client.discover_tools().await?,
                "resources": client.discover_resources().await?,
                "prompts": client.discover_prompts().await?,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
            client.shutdown().await?;
        }
        Command::Call { tool, args, server } => {
            let arguments: Value = serde_json::from_str(&args).context("--args must be valid JSON")?;
            let client = spawn(&server).await?;
            let outcome = client.call_tool(&tool, arguments).await;
            client.shutdown().await?;
            println!("{}", serde_json::to_string_pretty(&outcome?)?);
        }
    }

    Ok(())
}

async fn spawn(command: &[String]) -> Result<StdioClient> {
    let Some((program, rest)) = command.split_first() else {
        bail!("a server command is required after --");
    };
    let rest: Vec<&str> = rest.iter().map(String::as_str).collect();
    StdioClient::spawn(program, &rest)
        .await
        .with_context(|| format!("failed to start {program}"))
}
