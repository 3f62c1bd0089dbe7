//! Configuration management for Image Harvester
//!
//! This module provides unified configuration loading with zero-config
//! defaults, an optional TOML file and environment overrides.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::client::{ClientConfig, RetryPolicy};
use crate::app::scheduler::validate_concurrency;
use crate::constants::{batch, env, files, logging, server};
use crate::errors::{ConfigError, ConfigResult};

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Outbound HTTP client settings
    pub client: ClientConfig,
    /// Retry and backoff settings
    pub retry: RetryPolicy,
    /// Batch scheduling settings
    pub batch: BatchConfig,
    /// HTTP API settings
    pub server: ServerConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Batch scheduling configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Concurrent retrievals per batch
    pub concurrency: usize,
    /// Largest accepted number of locators per batch
    pub max_locators: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: batch::DEFAULT_CONCURRENCY,
            max_locators: batch::MAX_LOCATORS,
        }
    }
}

impl BatchConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        validate_concurrency(self.concurrency)?;
        if self.max_locators == 0 {
            return Err(ConfigError::InvalidValue {
                field: "batch.max_locators".to_string(),
                value: "0".to_string(),
                reason: "At least one locator must be accepted".to_string(),
            });
        }
        Ok(())
    }
}

/// HTTP API server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind
    pub bind: String,
    /// Port to listen on
    pub port: u16,
    /// Restrict CORS to `allowed_origins`
    pub production: bool,
    /// Origins accepted by CORS in production
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: server::DEFAULT_BIND.to_string(),
            port: server::DEFAULT_PORT,
            production: false,
            allowed_origins: server::DEFAULT_ALLOWED_ORIGINS
                .iter()
                .map(|origin| origin.to_string())
                .collect(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.bind.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "server.bind".to_string(),
                value: self.bind.clone(),
                reason: "Bind address must not be empty".to_string(),
            });
        }

        if let Some(origin) = self
            .allowed_origins
            .iter()
            .find(|origin| origin.parse::<axum::http::HeaderValue>().is_err())
        {
            return Err(ConfigError::InvalidValue {
                field: "server.allowed_origins".to_string(),
                value: origin.clone(),
                reason: "Origin is not a valid header value".to_string(),
            });
        }

        Ok(())
    }

    /// `bind:port` string for the listener
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log level for the application
    pub level: String,
    /// Enable colored output
    pub colored_output: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: logging::DEFAULT_LOG_LEVEL.to_string(),
            colored_output: true,
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        match self.level.to_ascii_lowercase().as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => Ok(()),
            _ => Err(ConfigError::InvalidValue {
                field: "logging.level".to_string(),
                value: self.level.clone(),
                reason: "Expected one of error, warn, info, debug, trace".to_string(),
            }),
        }
    }
}

impl AppConfig {
    /// Load configuration with multi-source precedence:
    /// 1. Default values
    /// 2. Config file (if exists)
    /// 3. Environment variables
    ///
    /// CLI flags are applied on top by the caller.
    pub async fn load(config_file_override: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = match config_file_override {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound { path });
                }
                Self::load_from_file(&path).await?
            }
            None => match Self::find_config_file() {
                Some(path) => Self::load_from_file(&path).await?,
                None => Self::default(),
            },
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every section
    pub fn validate(&self) -> ConfigResult<()> {
        self.client.validate()?;
        self.retry.validate()?;
        self.batch.validate()?;
        self.server.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Apply environment overrides using `lookup` to read variables
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = lookup(env::PORT)
            .map(|value| (env::PORT, value))
            .or_else(|| lookup(env::FALLBACK_PORT).map(|value| (env::FALLBACK_PORT, value)));

        if let Some((key, value)) = port {
            self.server.port = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                field: key.to_string(),
                value: value.clone(),
                reason: "Port must be a number between 0 and 65535".to_string(),
            })?;
            debug!("Port overridden from {}: {}", key, self.server.port);
        }

        if let Some(environment) = lookup(env::ENVIRONMENT) {
            self.server.production = environment.eq_ignore_ascii_case(env::PRODUCTION);
        }

        Ok(())
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut search_paths = vec![PathBuf::from(files::LOCAL_CONFIG)];
        if let Some(path) = Self::default_config_path() {
            search_paths.push(path);
        }

        let found = search_paths.into_iter().find(|path| path.exists());
        match &found {
            Some(path) => debug!("Found config file: {}", path.display()),
            None => debug!("No config file found in standard locations"),
        }
        found
    }

    /// Default config file path for the current user
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(files::CONFIG_DIR).join(files::CONFIG_FILE))
    }

    /// Load configuration from a TOML file
    async fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let config: AppConfig = toml::from_str(&content)?;
        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Default configuration content with comments
    pub fn generate_default_config_content() -> String {
        format!(
            r#"# Image Harvester Configuration
# Every setting is optional; omitted values use the defaults shown here.

[client]
user_agent = "{user_agent}"
tcp_keepalive = "30s"
tcp_nodelay = true
pool_idle_timeout = "90s"
pool_max_per_host = 8
request_timeout = "30s"
connect_timeout = "10s"
max_redirects = 5
# rate_limit_rps = 10  # Uncomment to throttle outbound requests

[retry]
max_attempts = 3
base_delay = "1s"
max_delay = "10s"
attempt_timeout = "30s"

[batch]
concurrency = {concurrency}  # 1 to {max_concurrency}
max_locators = {max_locators}

[server]
bind = "{bind}"
port = {port}
production = false  # Also enabled by {env_var}=production
allowed_origins = ["http://localhost", "http://127.0.0.1"]

[logging]
level = "info"  # error, warn, info, debug, trace
colored_output = true
"#,
            user_agent = crate::constants::http::USER_AGENT,
            concurrency = batch::DEFAULT_CONCURRENCY,
            max_concurrency = batch::MAX_CONCURRENCY,
            max_locators = batch::MAX_LOCATORS,
            bind = server::DEFAULT_BIND,
            port = server::DEFAULT_PORT,
            env_var = env::ENVIRONMENT,
        )
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.batch.concurrency, 5);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.server.port, 3000);
        assert!(!config.server.production);
    }

    #[test]
    fn test_config_file_generation_round_trips() {
        let content = AppConfig::generate_default_config_content();
        let parsed: AppConfig = toml::from_str(&content).unwrap();

        assert_eq!(parsed, AppConfig::default());
        assert!(content.contains("[retry]"));
    }

    #[test]
    fn test_serialized_defaults_round_trip() {
        let config = AppConfig::default();
        let text = toml::to_string(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [("PORT", "8080"), ("IMAGE_HARVESTER_ENV", "production")]
            .into_iter()
            .collect();
        let mut config = AppConfig::default();
        config
            .apply_env_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.server.port, 8080);
        assert!(config.server.production);
    }

    #[test]
    fn test_explicit_port_wins_over_fallback() {
        let vars: HashMap<&str, &str> = [("PORT", "8080"), ("IMAGE_HARVESTER_PORT", "9090")]
            .into_iter()
            .collect();
        let mut config = AppConfig::default();
        config
            .apply_env_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.server.port, 9090);
    }

    #[test]
    fn test_invalid_port_rejected() {
        let mut config = AppConfig::default();
        let result = config.apply_env_overrides(|key| (key == "PORT").then(|| "http".to_string()));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_section_validation() {
        let mut config = AppConfig::default();
        config.batch.concurrency = 64;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_config_loading_nonexistent_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let result = AppConfig::load(Some(config_path)).await;
        assert!(matches!(result, Err(ConfigError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_config_loading_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test_config.toml");

        let test_config = r#"
[retry]
max_attempts = 5
base_delay = "250ms"

[batch]
concurrency = 12

[logging]
level = "debug"
"#;
        tokio::fs::write(&config_path, test_config).await.unwrap();

        let config = AppConfig::load_from_file(&config_path).await.unwrap();

        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay, Duration::from_millis(250));
        assert_eq!(config.batch.concurrency, 12);
        assert_eq!(config.logging.level, "debug");

        // Unspecified values keep their defaults
        assert_eq!(config.retry.max_delay, Duration::from_secs(10));
        assert_eq!(config.client.max_redirects, 5);
    }

    #[tokio::test]
    async fn test_malformed_file_is_invalid_format() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("broken.toml");
        tokio::fs::write(&config_path, "[batch\nconcurrency = ")
            .await
            .unwrap();

        let result = AppConfig::load(Some(config_path)).await;
        assert!(matches!(result, Err(ConfigError::InvalidFormat(_))));
    }
}
