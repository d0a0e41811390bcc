//! # CLI Command Implementations

use crate::api::{self, AppState};
use crate::config::AppConfig;
use crate::dispatch::{Invocation, InvokeResponse, Kernel};
use conceptkit_core::KernelError;
use std::path::{Path, PathBuf};

/// Maximum script file size (10 MB).
const MAX_SCRIPT_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Canonicalize and check that `path` is a regular file within the size limit.
fn validate_script_path(path: &Path) -> Result<PathBuf, KernelError> {
    let canonical = path.canonicalize().map_err(|e| {
        KernelError::Io(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(KernelError::Io(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    let metadata = std::fs::metadata(&canonical)
        .map_err(|e| KernelError::Io(format!("Cannot read file metadata: {}", e)))?;
    if metadata.len() > MAX_SCRIPT_FILE_SIZE {
        return Err(KernelError::Io(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            MAX_SCRIPT_FILE_SIZE
        )));
    }

    Ok(canonical)
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(config: AppConfig) -> Result<(), KernelError> {
    println!("ConceptKit Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:       {}", config.server.host);
    println!("  Port:       {}", config.server.port);
    println!(
        "  Rate limit: {}",
        match config.security.rate_limit {
            0 => "disabled".to_string(),
            n => format!("{} req/s", n),
        }
    );
    println!(
        "  Auth:       {}",
        if config.security.api_key.is_some() {
            "API key"
        } else {
            "disabled"
        }
    );
    println!();
    println!("Endpoints:");
    println!("  GET  /health - Health check");
    println!("  GET  /status - Record counts per relation");
    println!("  POST /invoke - Execute an action");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let kernel = Kernel::new(&config.kernel);
    api::run_server(AppState::new(kernel, config)).await
}

// =============================================================================
// RUN COMMAND
// =============================================================================

/// Parse a script: a JSON array of invocations.
pub fn parse_script(contents: &str) -> Result<Vec<Invocation>, KernelError> {
    serde_json::from_str(contents).map_err(|e| KernelError::Encoding(format!("Invalid script: {}", e)))
}

/// Execute every invocation in order against one fresh kernel.
///
/// Domain failures do not stop the script; a kernel abort does.
pub fn run_script(
    kernel: &Kernel,
    script: Vec<Invocation>,
) -> Result<Vec<InvokeResponse>, KernelError> {
    script
        .into_iter()
        .map(|invocation| kernel.invoke(invocation))
        .collect()
}

/// Execute a script file and print each output.
pub fn cmd_run(config: &AppConfig, file: &Path, json_mode: bool) -> Result<(), KernelError> {
    let path = validate_script_path(file)?;
    let contents = std::fs::read_to_string(&path)
        .map_err(|e| KernelError::Io(format!("Cannot read '{}': {}", path.display(), e)))?;
    let script = parse_script(&contents)?;
    tracing::info!("Running {} invocations from {}", script.len(), path.display());

    let kernel = Kernel::new(&config.kernel);
    let responses = run_script(&kernel, script)?;

    if json_mode {
        let rendered = serde_json::to_string_pretty(&responses)?;
        println!("{}", rendered);
    } else {
        for (i, response) in responses.iter().enumerate() {
            let variant = response.variant().unwrap_or("?");
            match response.message() {
                Some(message) => {
                    println!("[{}] {} -> {}: {}", i + 1, response.action, variant, message);
                }
                None => println!("[{}] {} -> {}", i + 1, response.action, variant),
            }
        }
        let stats = kernel.stats();
        println!();
        println!("Store: {} records in {} relations", stats.total_records, stats.relations.len());
    }

    Ok(())
}

// =============================================================================
// CONFIG COMMAND
// =============================================================================

/// Print the effective configuration (API key masked).
pub fn cmd_config(config: &AppConfig, json_mode: bool) -> Result<(), KernelError> {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(&config.masked())?);
    } else {
        print!("{}", config.to_display_toml()?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KernelConfig;

    #[test]
    fn script_runs_in_order() {
        let script = parse_script(
            r#"[
                {"action": "graph.add_node", "entity_id": "a"},
                {"action": "graph.add_node", "entity_id": "a"},
                {"action": "tag.add_tag", "node_id": "a", "tag_name": "t"},
                {"action": "tag.get_by_tag", "tag_name": "t"}
            ]"#,
        )
        .expect("parse");

        let kernel = Kernel::new(&KernelConfig::default());
        let responses = run_script(&kernel, script).expect("run");

        let variants: Vec<_> = responses.iter().filter_map(|r| r.variant()).collect();
        assert_eq!(variants, vec!["ok", "alreadyExists", "ok", "ok"]);
        assert_eq!(responses[3].output["node_ids"], serde_json::json!(["a"]));
    }

    #[test]
    fn malformed_script_is_encoding_error() {
        let result = parse_script(r#"[{"action": "nope"}]"#);
        assert!(matches!(result, Err(KernelError::Encoding(_))));
    }

    #[test]
    fn cmd_run_reads_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("script.json");
        std::fs::write(
            &path,
            r#"[{"action": "password.validate", "password": "12345678"}]"#,
        )
        .expect("write");

        cmd_run(&AppConfig::default(), &path, true).expect("run");
    }

    #[test]
    fn cmd_run_rejects_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = cmd_run(&AppConfig::default(), dir.path(), false);
        assert!(matches!(result, Err(KernelError::Io(_))));
    }
}
