//! # Configuration
//!
//! Effective settings are layered, later sources winning:
//!
//! 1. Built-in defaults
//! 2. Optional TOML file (`--config <path>`)
//! 3. `CONCEPTKIT_*` environment variables
//! 4. CLI flags
//!
//! ## Environment Variables
//!
//! - `CONCEPTKIT_HOST`, `CONCEPTKIT_PORT`: bind address
//! - `CONCEPTKIT_CORS_ORIGINS`: comma-separated origins, or "*" for all
//! - `CONCEPTKIT_RATE_LIMIT`: requests per second (0 disables)
//! - `CONCEPTKIT_API_KEY`: if set, every endpoint except `/health` requires it
//! - `CONCEPTKIT_MAX_DEPTH`: upper bound on `graph.get_neighbors` depth

use conceptkit_core::KernelError;
use conceptkit_core::primitives::MAX_TRAVERSAL_DEPTH;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default rate limit, requests per second.
pub const DEFAULT_RATE_LIMIT: u32 = 100;

/// Maximum accepted config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

// =============================================================================
// SECTIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// `None` means localhost only.
    pub cors_origins: Option<String>,
    pub rate_limit: u32,
    pub api_key: Option<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            cors_origins: None,
            rate_limit: DEFAULT_RATE_LIMIT,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Depth requests above this are clamped before reaching the kernel.
    pub max_traversal_depth: u32,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            max_traversal_depth: MAX_TRAVERSAL_DEPTH,
        }
    }
}

// =============================================================================
// APP CONFIG
// =============================================================================

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub security: SecurityConfig,
    pub kernel: KernelConfig,
}

impl AppConfig {
    /// Load from `path` (defaults if `None`), then apply the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, KernelError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Parse a TOML file. Missing sections and keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, KernelError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            KernelError::Config(format!("Cannot read '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(KernelError::Config(format!(
                "Config file size {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_CONFIG_FILE_SIZE
            )));
        }

        let contents = std::fs::read_to_string(path).map_err(|e| {
            KernelError::Config(format!("Cannot read '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, KernelError> {
        toml::from_str(contents).map_err(|e| KernelError::Config(e.to_string()))
    }

    /// Apply `CONCEPTKIT_*` overrides read through `lookup`.
    ///
    /// Unparseable numeric values are ignored with a warning. An empty
    /// `CONCEPTKIT_API_KEY` disables authentication.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("CONCEPTKIT_HOST") {
            self.server.host = host;
        }
        if let Some(port) = parse_var(&lookup, "CONCEPTKIT_PORT") {
            self.server.port = port;
        }
        if let Some(origins) = lookup("CONCEPTKIT_CORS_ORIGINS") {
            self.security.cors_origins = Some(origins);
        }
        if let Some(rate) = parse_var(&lookup, "CONCEPTKIT_RATE_LIMIT") {
            self.security.rate_limit = rate;
        }
        if let Some(key) = lookup("CONCEPTKIT_API_KEY") {
            self.security.api_key = Some(key).filter(|k| !k.is_empty());
        }
        if let Some(depth) = parse_var(&lookup, "CONCEPTKIT_MAX_DEPTH") {
            self.kernel.max_traversal_depth = depth;
        }
    }

    /// Copy with the API key masked, for display.
    pub fn masked(&self) -> Self {
        let mut shown = self.clone();
        if shown.security.api_key.is_some() {
            shown.security.api_key = Some("********".to_string());
        }
        shown
    }

    /// Render as TOML with the API key masked.
    pub fn to_display_toml(&self) -> Result<String, KernelError> {
        toml::to_string(&self.masked()).map_err(|e| KernelError::Config(e.to_string()))
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Option<T> {
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring {}: cannot parse '{}'", name, raw);
            None
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.security.rate_limit, DEFAULT_RATE_LIMIT);
        assert!(config.security.api_key.is_none());
        assert_eq!(config.kernel.max_traversal_depth, MAX_TRAVERSAL_DEPTH);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml("[server]\nport = 9090\n").expect("parse");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.security, SecurityConfig::default());
    }

    #[test]
    fn invalid_toml_is_config_error() {
        let result = AppConfig::from_toml("[server\nport = ");
        assert!(matches!(result, Err(KernelError::Config(_))));
    }

    #[test]
    fn env_overrides_file() {
        let mut config = AppConfig::from_toml("[security]\nrate_limit = 5\n").expect("parse");
        config.apply_env(env(&[
            ("CONCEPTKIT_RATE_LIMIT", "0"),
            ("CONCEPTKIT_API_KEY", "secret"),
            ("CONCEPTKIT_PORT", "not-a-port"),
        ]));

        assert_eq!(config.security.rate_limit, 0);
        assert_eq!(config.security.api_key.as_deref(), Some("secret"));
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn empty_api_key_disables_auth() {
        let mut config = AppConfig::from_toml("[security]\napi_key = \"x\"\n").expect("parse");
        config.apply_env(env(&[("CONCEPTKIT_API_KEY", "")]));
        assert!(config.security.api_key.is_none());
    }

    #[test]
    fn display_masks_api_key() {
        let mut config = AppConfig::default();
        config.security.api_key = Some("hunter2".to_string());

        let shown = config.to_display_toml().expect("render");
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains("********"));
    }

    #[test]
    fn from_file_reads_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("conceptkit.toml");
        std::fs::write(&path, "[server]\nhost = \"0.0.0.0\"\n").expect("write");

        let config = AppConfig::from_file(&path).expect("load");
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn missing_file_is_config_error() {
        let result = AppConfig::from_file(Path::new("/nonexistent/conceptkit.toml"));
        assert!(matches!(result, Err(KernelError::Config(_))));
    }
}
