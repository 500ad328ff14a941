//! Configuration management
//!
//! This module handles loading and managing configuration from:
//! - Command-line arguments
//! - Environment variables
//! - Configuration files (TOML)
//! - Defaults

use crate::error::{Error, Result};
use crate::session::SyncSettings;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_RPC_URL: &str = "https://api.mainnet-beta.solana.com";

/// Longest accepted polling period (one day)
pub const MAX_POLL_INTERVAL_SECS: u64 = 86_400;
/// Longest accepted balance query or HTTP request timeout (one hour)
pub const MAX_TIMEOUT_SECS: u64 = 3_600;
/// Longest accepted base retry delay (one minute)
pub const MAX_RETRY_DELAY_MS: u64 = 60_000;

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub rpc: RpcConfig,

    #[serde(default)]
    pub token: TokenConfig,

    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub wallet: WalletConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// JSON-RPC endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Endpoint URL
    pub url: Option<String>,

    /// Maximum number of retries for RPC requests
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay between retries
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Per-request HTTP timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Token of interest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Mint address of the tracked token
    pub mint: Option<String>,

    /// Decimals reported when the owner holds no account for the mint
    #[serde(default = "default_decimals")]
    pub decimals: u8,
}

/// Balance synchronization settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Polling period while connected
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Upper bound on a single balance query
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
}

/// Wallet used by the watch-only provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Public key of the wallet to follow
    pub address: Option<String>,

    /// Whether the wallet is pre-authorized (silent connect succeeds)
    #[serde(default = "default_trusted")]
    pub trusted: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_decimals() -> u8 {
    6
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_query_timeout_secs() -> u64 {
    15
}

fn default_trusted() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

// Default implementations

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            mint: None,
            decimals: default_decimals(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            query_timeout_secs: default_query_timeout_secs(),
        }
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            address: None,
            trusted: default_trusted(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl RpcConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let contents = std::fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("Failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&contents).map_err(|e| Error::ConfigParse {
            file: path.clone(),
            message: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default locations
    ///
    /// Searches in order:
    /// 1. ./wallet-sync.toml
    /// 2. ~/.wallet-sync/config.toml
    /// 3. /etc/wallet-sync/config.toml
    pub fn load() -> Result<Self> {
        let paths = vec![
            PathBuf::from("wallet-sync.toml"),
            dirs::home_dir()
                .map(|h| h.join(".wallet-sync").join("config.toml"))
                .unwrap_or_else(|| PathBuf::from("/dev/null")),
            PathBuf::from("/etc/wallet-sync/config.toml"),
        ];

        for path in paths {
            if path.exists() {
                tracing::info!("Loading config from {:?}", path);
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Config::default())
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        crate::ensure!(
            self.sync.poll_interval_secs > 0,
            "sync.poll_interval_secs must be greater than zero"
        );
        crate::ensure!(
            self.sync.query_timeout_secs > 0,
            "sync.query_timeout_secs must be greater than zero"
        );
        crate::ensure!(
            self.rpc.request_timeout_secs > 0,
            "rpc.request_timeout_secs must be greater than zero"
        );
        crate::ensure!(
            self.sync.poll_interval_secs <= MAX_POLL_INTERVAL_SECS,
            "sync.poll_interval_secs must be at most {}",
            MAX_POLL_INTERVAL_SECS
        );
        crate::ensure!(
            self.sync.query_timeout_secs <= MAX_TIMEOUT_SECS,
            "sync.query_timeout_secs must be at most {}",
            MAX_TIMEOUT_SECS
        );
        crate::ensure!(
            self.rpc.request_timeout_secs <= MAX_TIMEOUT_SECS,
            "rpc.request_timeout_secs must be at most {}",
            MAX_TIMEOUT_SECS
        );
        crate::ensure!(
            self.rpc.retry_delay_ms <= MAX_RETRY_DELAY_MS,
            "rpc.retry_delay_ms must be at most {}",
            MAX_RETRY_DELAY_MS
        );
        Ok(())
    }

    /// Get the RPC endpoint from config, environment, or the public default
    pub fn rpc_url(&self) -> String {
        if let Some(url) = &self.rpc.url {
            return url.clone();
        }

        std::env::var("SOLANA_RPC_URL").unwrap_or_else(|_| DEFAULT_RPC_URL.to_string())
    }

    /// Get the tracked token mint from config or environment
    pub fn token_mint(&self) -> Result<String> {
        if let Some(mint) = &self.token.mint {
            return Ok(mint.clone());
        }

        std::env::var("WALLET_SYNC_MINT").map_err(|_| {
            Error::MissingConfig(
                "Token mint not found. Set WALLET_SYNC_MINT environment variable or configure [token] mint".to_string(),
            )
        })
    }

    /// Get the followed wallet address, if any
    pub fn wallet_address(&self) -> Option<String> {
        self.wallet
            .address
            .clone()
            .or_else(|| std::env::var("WALLET_SYNC_ADDRESS").ok())
    }

    /// Engine settings derived from this configuration
    pub fn sync_settings(&self) -> Result<SyncSettings> {
        self.validate()?;
        Ok(SyncSettings {
            mint: self.token_mint()?,
            poll_interval: Duration::from_secs(self.sync.poll_interval_secs),
            query_timeout: Duration::from_secs(self.sync.query_timeout_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.sync.poll_interval_secs, 10);
        assert_eq!(config.sync.query_timeout_secs, 15);
        assert_eq!(config.rpc.max_retries, 3);
        assert!(config.wallet.trusted);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml_config() {
        let toml = r#"
[rpc]
url = "http://localhost:8899"
max_retries = 1

[token]
mint = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"
decimals = 6

[sync]
poll_interval_secs = 30

[wallet]
address = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM"
trusted = false

[logging]
level = "debug"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.rpc_url(), "http://localhost:8899");
        assert_eq!(config.rpc.max_retries, 1);
        assert_eq!(config.rpc.retry_delay_ms, 500);
        assert_eq!(config.sync.poll_interval_secs, 30);
        assert_eq!(config.sync.query_timeout_secs, 15);
        assert!(!config.wallet.trusted);
        assert_eq!(config.logging.level, "debug");

        let settings = config.sync_settings().unwrap();
        assert_eq!(settings.poll_interval, Duration::from_secs(30));
        assert_eq!(settings.mint, "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v");
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = Config::default();
        config.sync.poll_interval_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("poll_interval_secs"));
    }

    #[test]
    fn test_validate_rejects_oversized_values() {
        let mut config = Config::default();
        config.sync.poll_interval_secs = u64::MAX;
        assert!(config.validate().unwrap_err().to_string().contains("poll_interval_secs"));
        assert!(config.sync_settings().is_err());

        let mut config = Config::default();
        config.sync.query_timeout_secs = MAX_TIMEOUT_SECS + 1;
        assert!(config.validate().unwrap_err().to_string().contains("query_timeout_secs"));

        let mut config = Config::default();
        config.rpc.retry_delay_ms = u64::MAX;
        assert!(config.validate().unwrap_err().to_string().contains("retry_delay_ms"));

        let mut config = Config::default();
        config.sync.poll_interval_secs = MAX_POLL_INTERVAL_SECS;
        config.rpc.retry_delay_ms = MAX_RETRY_DELAY_MS;
        assert!(config.validate().is_ok());
    }
}
