//! # ConceptKit
//!
//! The main binary for the ConceptKit relation-store kernel.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │               apps/conceptkit (THE BINARY)           │
//! │                                                      │
//! │   ┌─────────────┐            ┌─────────────┐         │
//! │   │    CLI      │            │  HTTP API   │         │
//! │   │   (clap)    │            │   (axum)    │         │
//! │   └──────┬──────┘            └──────┬──────┘         │
//! │          └──────────┬───────────────┘                │
//! │                     ▼                                │
//! │            ┌──────────────────┐                      │
//! │            │  conceptkit-core │                      │
//! │            │   (THE LOGIC)    │                      │
//! │            └──────────────────┘                      │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! conceptkit server --host 0.0.0.0 --port 8080
//!
//! # Run a script of invocations against a fresh store
//! conceptkit run -f script.json
//!
//! # Show the effective configuration
//! conceptkit --config conceptkit.toml config
//! ```

use clap::Parser;
use conceptkit::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // CONCEPTKIT_LOG_FORMAT=json enables machine-parseable output.
    let log_format =
        std::env::var("CONCEPTKIT_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "conceptkit=info,conceptkit_core=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the ConceptKit startup banner.
fn print_banner() {
    println!(
        r#"
   ___                      _   _  ___ _
  / __|___ _ _  __ ___ _ __| |_| |/ (_) |_
 | (__/ _ \ ' \/ _/ -_) '_ \  _| ' <| |  _|
  \___\___/_||_\__\___| .__/\__|_|\_\_|\__|
                      |_|

  Relation-store kernel v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
