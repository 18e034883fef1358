//! Configuration module for the IP changer service
//!
//! Supports loading configuration from a TOML file.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Service configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    /// IPC endpoint settings
    #[serde(default)]
    pub endpoint: EndpointConfig,

    /// Listener loop tuning
    #[serde(default)]
    pub listener: ListenerConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Windows service settings
    #[serde(default)]
    pub service: ServiceConfig,
}

/// IPC endpoint configuration
#[derive(Debug, Deserialize, Clone)]
pub struct EndpointConfig {
    /// Well-known endpoint name (default: IpChangerPipe)
    #[serde(default = "default_endpoint_name")]
    pub name: String,
}

/// Listener loop configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ListenerConfig {
    /// Delay before retrying after an endpoint or accept failure (default: 1000)
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Pause between writing a response and closing the connection (default: 100)
    #[serde(default = "default_response_linger_ms")]
    pub response_linger_ms: u64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level filter (default: "ipchanger=info,netcfg=info")
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Windows service configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    /// Service name (default: IpChangerService)
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Service display name (default: IP Changer Service)
    #[serde(default = "default_display_name")]
    pub display_name: String,

    /// Service description
    #[serde(default = "default_description")]
    pub description: String,
}

fn default_endpoint_name() -> String {
    "IpChangerPipe".to_string()
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

fn default_response_linger_ms() -> u64 {
    100
}

fn default_log_level() -> String {
    "ipchanger=info,netcfg=info".to_string()
}

fn default_service_name() -> String {
    "IpChangerService".to_string()
}

fn default_display_name() -> String {
    "IP Changer Service".to_string()
}

fn default_description() -> String {
    "Applies network adapter configuration on behalf of unprivileged clients".to_string()
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            name: default_endpoint_name(),
        }
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            retry_backoff_ms: default_retry_backoff_ms(),
            response_linger_ms: default_response_linger_ms(),
        }
    }
}

impl ListenerConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn response_linger(&self) -> Duration {
        Duration::from_millis(self.response_linger_ms)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            display_name: default_display_name(),
            description: default_description(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// If the file doesn't exist, returns default configuration.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(path.display().to_string(), e.to_string()))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.display().to_string(), e.to_string()))
    }

    /// Load configuration, falling back to defaults on any error
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            eprintln!("Warning: {}", e);
            Self::default()
        })
    }
}

/// Get the configuration file path
///
/// Looks for config.toml in:
/// 1. Same directory as the executable
/// 2. Falls back to current directory
pub fn get_config_path() -> PathBuf {
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            let config_path = exe_dir.join("config.toml");
            if config_path.exists() {
                return config_path;
            }
        }
    }
    PathBuf::from("config.toml")
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{0}': {1}")]
    ReadError(String, String),

    #[error("Failed to parse config file '{0}': {1}")]
    ParseError(String, String),
}
