use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Call tools on toolwire providers.
///
/// Providers are read from `mcp.config.json`; a stdio server can also be
/// inspected directly by giving its command line after `--`.
#[derive(Parser, Debug)]
#[command(name = "toolwire", version, about = "Call tools on toolwire providers")]
pub struct CliArgs {
    /// Provider config file
    #[arg(long, env = "TOOLWIRE_MCP_CONFIG", default_value = "mcp.config.json")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List configured providers
    Providers,

    /// Send raw input to a provider and print the result as JSON
    Exec {
        provider: String,
        /// Input text; read from stdin when omitted or `-`
        input: Option<String>,
    },

    /// List the tools, resources and prompts of a stdio server
    Inspect {
        #[arg(last = true, required = true)]
        server: Vec<String>,
    },

    /// Call one tool on a stdio server
    Call {
        tool: String,
        /// Tool arguments as JSON
        #[arg(long, default_value = "{}")]
        args: String,
        #[arg(last = true, required = true)]
        server: Vec<String>,
    },
}
