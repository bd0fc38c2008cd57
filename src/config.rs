//! Configuration management for the anti-bruteforce service.
//!
//! Values are layered: built-in defaults, then an optional YAML file, then
//! `ANTIBRUTE__`-prefixed environment variables (`ANTIBRUTE__POLICY__SAME_IP=5`).

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::error::{GuardError, Result};
use crate::ratelimit::{Policy, WindowSettings};

/// Main configuration for the service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Per-namespace attempt limits
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Sliding window timing
    #[serde(default)]
    pub window: WindowConfig,

    /// List storage
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// gRPC server address
    #[serde(default = "default_grpc_addr")]
    pub grpc_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            grpc_addr: default_grpc_addr(),
        }
    }
}

fn default_grpc_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 50051))
}

/// Maximum estimated attempts per trailing window, per namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default = "default_same_ip")]
    pub same_ip: u64,

    #[serde(default = "default_same_login")]
    pub same_login: u64,

    #[serde(default = "default_same_password")]
    pub same_password: u64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            same_ip: default_same_ip(),
            same_login: default_same_login(),
            same_password: default_same_password(),
        }
    }
}

fn default_same_ip() -> u64 {
    1000
}

fn default_same_login() -> u64 {
    10
}

fn default_same_password() -> u64 {
    100
}

/// Sliding window timing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Window length in milliseconds
    #[serde(default = "default_window_length_ms")]
    pub length_ms: u64,

    /// Rotation tick in milliseconds
    #[serde(default = "default_window_tick_ms")]
    pub tick_ms: u64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            length_ms: default_window_length_ms(),
            tick_ms: default_window_tick_ms(),
        }
    }
}

fn default_window_length_ms() -> u64 {
    60_000
}

fn default_window_tick_ms() -> u64 {
    1_000
}

/// List storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite URL, or `memory` for in-process lists
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Pool size
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_database_url() -> String {
    "sqlite://antibrute.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from an optional file plus the environment.
    ///
    /// Without an explicit path, `config.{yaml,toml,json}` in the working
    /// directory is used if it exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name("config").required(false),
        };

        let config: AppConfig = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix("ANTIBRUTE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: AppConfig =
            serde_yaml::from_str(yaml).map_err(|e| GuardError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the limiter cannot work with.
    pub fn validate(&self) -> Result<()> {
        let policy = &self.policy;
        for (name, value) in [
            ("same_ip", policy.same_ip),
            ("same_login", policy.same_login),
            ("same_password", policy.same_password),
        ] {
            if value == 0 {
                return Err(GuardError::Config(format!("policy.{} must be positive", name)));
            }
        }

        if self.window.tick_ms == 0 || self.window.tick_ms > self.window.length_ms {
            return Err(GuardError::Config(format!(
                "window.tick_ms must be between 1 and window.length_ms ({})",
                self.window.length_ms
            )));
        }

        if self.database.max_connections == 0 {
            return Err(GuardError::Config(
                "database.max_connections must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Limits for the rate limiter.
    pub fn policy(&self) -> Policy {
        Policy {
            limit_ip: self.policy.same_ip,
            limit_login: self.policy.same_login,
            limit_password: self.policy.same_password,
        }
    }

    /// Timing for the window registry.
    pub fn window_settings(&self) -> WindowSettings {
        WindowSettings {
            length: Duration::from_millis(self.window.length_ms),
            tick: Duration::from_millis(self.window.tick_ms),
        }
    }
}
