//! Configuration loading
//!
//! Resolution order for every setting:
//! 1. Command-line argument (applied by the binary, highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "PIQ_CONFIG";
pub const GITHUB_TOKEN_ENV: &str = "PIQ_GITHUB_TOKEN";
pub const GITHUB_API_URL_ENV: &str = "PIQ_GITHUB_API_URL";
pub const DATABASE_ENV: &str = "PIQ_DATABASE";
pub const PORT_ENV: &str = "PIQ_PORT";

pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
pub const DEFAULT_IDENTITY_HEADER: &str = "x-authenticated-user";

/// Full TOML configuration for a PortfolioIQ service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub github: GitHubConfig,
    pub analysis: AnalysisConfig,
    pub progress: ProgressConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Header carrying the user id authenticated by the upstream gateway
    pub identity_header: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5810,
            identity_header: DEFAULT_IDENTITY_HEADER.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_data_dir().join("piq.db"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    pub api_url: String,
    pub token: Option<String>,
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    pub requests_per_second: u32,
    pub timeout_secs: u64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_GITHUB_API_URL.to_string(),
            token: None,
            max_attempts: 2,
            retry_backoff_ms: 1000,
            requests_per_second: 10,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub lock_ttl_secs: u64,
    pub max_repository_size_kb: u64,
    pub workers: usize,
    pub queue_capacity: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            lock_ttl_secs: 300,
            max_repository_size_kb: 1_000_000,
            workers: 16,
            queue_capacity: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    pub idle_timeout_secs: u64,
    pub reap_interval_secs: u64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 30 * 60,
            reap_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// EnvFilter directive used when RUST_LOG is not set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl TomlConfig {
    /// Check values that have no usable default
    pub fn validate(&self) -> Result<()> {
        match self.github.token.as_deref() {
            Some(token) if is_valid_token(token) => {}
            _ => {
                return Err(Error::Config(format!(
                    "GitHub token missing: set [github] token or {}",
                    GITHUB_TOKEN_ENV
                )))
            }
        }
        if self.github.max_attempts == 0 {
            return Err(Error::Config("github.max_attempts must be at least 1".to_string()));
        }
        if self.github.requests_per_second == 0 {
            return Err(Error::Config(
                "github.requests_per_second must be at least 1".to_string(),
            ));
        }
        if self.analysis.workers == 0 || self.analysis.queue_capacity == 0 {
            return Err(Error::Config(
                "analysis.workers and analysis.queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.analysis.lock_ttl_secs == 0 {
            return Err(Error::Config("analysis.lock_ttl_secs must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Apply environment overrides on top of file values
    pub fn apply_env_overrides(&mut self) {
        if let Some(token) = env_value(GITHUB_TOKEN_ENV) {
            debug!("GitHub token taken from environment");
            self.github.token = Some(token);
        }
        if let Some(url) = env_value(GITHUB_API_URL_ENV) {
            self.github.api_url = url;
        }
        if let Some(path) = env_value(DATABASE_ENV) {
            self.database.path = PathBuf::from(path);
        }
        if let Some(port) = env_value(PORT_ENV) {
            match port.parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(_) => warn!(value = %port, "Ignoring invalid {}", PORT_ENV),
            }
        }
    }
}

/// Token is usable if non-empty after trimming
pub fn is_valid_token(token: &str) -> bool {
    !token.trim().is_empty()
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Load a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Locate the config file: CLI path, then `PIQ_CONFIG`, then the per-user default
///
/// An explicitly named file must exist; the per-user default is optional.
pub fn resolve_config_path(cli_arg: Option<&Path>, module_name: &str) -> Result<Option<PathBuf>> {
    if let Some(path) = cli_arg {
        return require_exists(path.to_path_buf());
    }

    if let Some(path) = env_value(CONFIG_PATH_ENV) {
        return require_exists(PathBuf::from(path));
    }

    let default = dirs::config_dir().map(|d| d.join("piq").join(format!("{}.toml", module_name)));
    Ok(default.filter(|p| p.exists()))
}

fn require_exists(path: PathBuf) -> Result<Option<PathBuf>> {
    if path.exists() {
        Ok(Some(path))
    } else {
        Err(Error::Config(format!("Config file not found: {}", path.display())))
    }
}

/// Resolve the complete configuration for a module (file, then environment)
pub fn load_config(cli_config: Option<&Path>, module_name: &str) -> Result<TomlConfig> {
    let mut config = match resolve_config_path(cli_config, module_name)? {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            load_toml_config(&path)?
        }
        None => {
            info!("No config file found, using defaults");
            TomlConfig::default()
        }
    };
    config.apply_env_overrides();
    Ok(config)
}

/// OS-dependent default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("piq"))
        .unwrap_or_else(|| PathBuf::from("./piq_data"))
}
