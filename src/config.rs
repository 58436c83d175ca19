//! Client configuration module
//!
//! Handles loading and parsing of the client configuration from a TOML file
//! and `MAPLE_*` environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Default configuration file location
const DEFAULT_CONFIG_PATH: &str = "config/client.toml";

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Path to the configuration file
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Game server host
    #[serde(default = "default_host")]
    pub host: String,

    /// Game server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Protocol version the server must announce (0 accepts any)
    #[serde(default = "default_version")]
    pub version: u16,

    /// Network poll interval in milliseconds
    #[serde(default = "default_tick_rate")]
    pub tick_rate_ms: u64,

    /// Connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Enable debug logging
    #[serde(default)]
    pub debug: bool,
}

// Default value functions
fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8484
}

fn default_version() -> u16 {
    83
}

fn default_tick_rate() -> u64 {
    8 // about 120 polls per second
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            host: default_host(),
            port: default_port(),
            version: default_version(),
            tick_rate_ms: default_tick_rate(),
            connect_timeout_secs: default_connect_timeout(),
            debug: false,
        }
    }
}

impl ClientConfig {
    /// Load configuration from file and environment variables
    pub async fn load() -> Result<Self> {
        let config_path = env::var("MAPLE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        let mut config = if config_path.exists() {
            let content = tokio::fs::read_to_string(&config_path)
                .await
                .with_context(|| {
                    format!("Failed to read config file: {}", config_path.display())
                })?;

            Self::from_toml(&content).with_context(|| {
                format!("Failed to parse config file: {}", config_path.display())
            })?
        } else {
            tracing::warn!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            Self::default()
        };

        config.config_path = config_path;
        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parse a configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("MAPLE_HOST") {
            self.host = val;
        }
        if let Ok(val) = env::var("MAPLE_PORT") {
            if let Ok(port) = val.parse() {
                self.port = port;
            }
        }
        if let Ok(val) = env::var("MAPLE_VERSION") {
            if let Ok(version) = val.parse() {
                self.version = version;
            }
        }
        if let Ok(val) = env::var("MAPLE_TICK_RATE_MS") {
            if let Ok(rate) = val.parse() {
                self.tick_rate_ms = rate;
            }
        }
        if let Ok(val) = env::var("MAPLE_CONNECT_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                self.connect_timeout_secs = secs;
            }
        }
        if let Ok(val) = env::var("MAPLE_DEBUG") {
            self.debug = val.to_lowercase() == "true" || val == "1";
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            anyhow::bail!("Host must not be empty");
        }

        if self.port == 0 {
            anyhow::bail!("Port must be between 1 and 65535");
        }

        if !(5..=1000).contains(&self.tick_rate_ms) {
            anyhow::bail!("Tick rate must be between 5ms and 1000ms");
        }

        if self.connect_timeout_secs == 0 {
            anyhow::bail!("Connect timeout must be at least 1 second");
        }

        Ok(())
    }

    /// Server address as `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Version to require from the server hello, if any
    pub fn expected_version(&self) -> Option<u16> {
        (self.version != 0).then_some(self.version)
    }

    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.tick_rate_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
