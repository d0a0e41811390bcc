//! # ConceptKit CLI Module
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `run` - Execute a JSON script of invocations against a fresh store
//! - `config` - Print the effective configuration

mod commands;

use crate::config::AppConfig;
use clap::{Parser, Subcommand};
use conceptkit_core::KernelError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// ConceptKit - relation-store kernel with graph, workflow and tag concepts.
#[derive(Parser, Debug)]
#[command(name = "conceptkit")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to (overrides config)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Execute a JSON array of invocations against a fresh in-memory store
    Run {
        /// Path to the script file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Print the effective configuration
    Config,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), KernelError> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { host, port }) => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            cmd_server(config).await
        }
        Some(Commands::Run { file }) => cmd_run(&config, &file, json_mode),
        Some(Commands::Config) | None => cmd_config(&config, json_mode),
    }
}
