//! This module defines all error types used throughout the application.

use crate::provider::ProviderError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    /// IO errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Wallet provider errors
    #[error("Wallet provider error: {0}")]
    Provider(#[from] ProviderError),

    /// JSON-RPC transport or protocol errors
    #[error("RPC error: {0}")]
    Rpc(String),

    /// The RPC node answered with a JSON-RPC error object
    #[error("RPC node returned error {code}: {message}")]
    RpcResponse { code: i64, message: String },

    /// A balance query failed or timed out
    #[error("Balance query failed: {0}")]
    BalanceQueryFailed(String),

    /// Response payload could not be decoded
    #[error("Parser error: {0}")]
    Parser(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file parsing errors
    #[error("Configuration parse error in {file:?}: {message}")]
    ConfigParse { file: PathBuf, message: String },

    /// Invalid wallet address format
    #[error("Invalid wallet address: {0}")]
    InvalidAddress(String),

    /// Missing configuration
    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    /// The session engine has stopped and no longer accepts commands
    #[error("Session engine is not running")]
    EngineStopped,

    /// Generic error with custom message
    #[error("{0}")]
    Custom(String),

    /// Wrapped anyhow errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a custom error with a message
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    /// Create an RPC error
    pub fn rpc(msg: impl Into<String>) -> Self {
        Self::Rpc(msg.into())
    }

    /// Create a parser error
    pub fn parser(msg: impl Into<String>) -> Self {
        Self::Parser(msg.into())
    }

    /// Create a balance query failure
    pub fn balance_query(msg: impl Into<String>) -> Self {
        Self::BalanceQueryFailed(msg.into())
    }

    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Rpc(_) | Error::BalanceQueryFailed(_) => true,
            Error::RpcResponse { code, .. } => matches!(code, -32005 | -32603),
            _ => false,
        }
    }
}

// Implement From traits for common external error types

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::ConfigParse {
            file: PathBuf::from("unknown"),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::Config(format!("TOML serialization error: {}", err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Parser(format!("JSON error: {}", err))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Rpc(format!("request timed out: {}", err))
        } else {
            Error::Rpc(err.to_string())
        }
    }
}

// Helper macros for creating errors

/// Create a custom error with formatting
#[macro_export]
macro_rules! custom_error {
    ($($arg:tt)*) => {
        $crate::error::Error::Custom(format!($($arg)*))
    };
}

/// Bail with a custom error message
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::custom_error!($($arg)*))
    };
}

/// Ensure a condition is true or return error
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($arg:tt)*) => {
        if !($cond) {
            $crate::bail!($($arg)*);
        }
    };
}
