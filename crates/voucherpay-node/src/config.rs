//! Node configuration loading and management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use voucherpay_notify::NotifierConfig;

/// Full configuration for the Voucherpay node.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VoucherpayConfig {
    /// API server settings.
    #[serde(default)]
    pub api: ApiConfig,

    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Payment provider notification settings.
    #[serde(default)]
    pub notifier: NotifierConfig,
}

/// The node serves two listeners. The operator API (manual settlement,
/// audit) must stay private; the public API carries the provider callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Operator API listen address.
    #[serde(default = "default_api_addr")]
    pub listen_addr: String,
    /// Operator API port.
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// Public API listen address (provider notifications, voucher lookups).
    #[serde(default = "default_public_addr")]
    pub public_listen_addr: String,
    /// Public API port.
    #[serde(default = "default_public_port")]
    pub public_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the data directory.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_api_addr() -> String {
    "127.0.0.1".into()
}
fn default_api_port() -> u16 {
    8640
}
fn default_public_addr() -> String {
    "0.0.0.0".into()
}
fn default_public_port() -> u16 {
    8641
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "text".into()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_api_addr(),
            port: default_api_port(),
            public_listen_addr: default_public_addr(),
            public_port: default_public_port(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl VoucherpayConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: VoucherpayConfig = toml::from_str(&contents)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save the current config to a TOML file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Socket address string the operator API binds to.
    pub fn api_addr(&self) -> String {
        format!("{}:{}", self.api.listen_addr, self.api.port)
    }

    /// Socket address string the public API binds to.
    pub fn public_addr(&self) -> String {
        format!("{}:{}", self.api.public_listen_addr, self.api.public_port)
    }

    /// Reject settings that would expose the operator routes publicly.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api.port != 0 && self.api_addr() == self.public_addr() {
            anyhow::bail!(
                "operator API and public API cannot share {}",
                self.api_addr()
            );
        }
        self.notifier.validate()?;
        Ok(())
    }

    pub fn json_logs(&self) -> bool {
        self.logging.format.eq_ignore_ascii_case("json")
    }
}
