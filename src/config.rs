//! Configuration module for the spaces client
//!
//! Handles configuration loading from TOML files with environment
//! variable overrides, and provides structured configuration types.

use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Ledger RPC configuration
    pub rpc: RpcConfig,

    /// Wallet configuration
    pub wallet: WalletConfig,

    /// Monitoring and metrics
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Ledger JSON-RPC endpoint
    pub endpoint: String,

    /// Request timeout in seconds
    #[serde(default = "default_rpc_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Path to the signing key file (32-byte hex seed)
    pub keypair_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Enable Prometheus metrics endpoint
    #[serde(default)]
    pub enable_metrics: bool,

    /// Metrics port
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Enable tracing output
    #[serde(default = "default_true")]
    pub enable_tracing: bool,
}

// Default value functions
fn default_rpc_timeout() -> u64 {
    30
}
fn default_metrics_port() -> u16 {
    9090
}
fn default_true() -> bool {
    true
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enable_metrics: false,
            metrics_port: default_metrics_port(),
            enable_tracing: default_true(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides applied first
    pub fn from_file_with_env(path: &str) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_file(path)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc: RpcConfig {
                endpoint: "http://127.0.0.1:9650/ext/bc/spacesvm/public".to_string(),
                timeout_secs: default_rpc_timeout(),
            },
            wallet: WalletConfig {
                keypair_path: "~/.config/spaces/key.hex".to_string(),
            },
            monitoring: MonitoringConfig::default(),
        }
    }
}
