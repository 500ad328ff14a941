//! CLI module
//!
//! This module defines the command-line interface using clap and implements
//! the command execution logic.

use crate::rpc::SourceType;
use crate::{Config, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

pub mod commands;
pub mod output;

/// Wallet Sync CLI
#[derive(Parser, Debug)]
#[command(name = "wallet-sync")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (overrides config)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Follow a wallet session and its token balance until interrupted
    Watch {
        /// Wallet public key to follow (overrides config)
        #[arg(short, long)]
        address: Option<String>,

        /// Token mint to track (overrides config)
        #[arg(short, long)]
        mint: Option<String>,

        /// JSON-RPC endpoint (overrides config)
        #[arg(long)]
        rpc_url: Option<String>,

        /// Polling interval in seconds (overrides config)
        #[arg(long)]
        interval: Option<u64>,

        /// Treat the wallet as not pre-authorized and request a connection
        #[arg(long)]
        untrusted: bool,

        /// Backend for wallet and balances
        #[arg(short, long, value_enum, default_value = "rpc")]
        source: SourceType,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        output: OutputFormat,
    },

    /// Query a token balance once
    Balance {
        /// Wallet public key (overrides config)
        #[arg(short, long)]
        address: Option<String>,

        /// Token mint (overrides config)
        #[arg(short, long)]
        mint: Option<String>,

        /// JSON-RPC endpoint (overrides config)
        #[arg(long)]
        rpc_url: Option<String>,

        /// Backend for balances
        #[arg(short, long, value_enum, default_value = "rpc")]
        source: SourceType,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        output: OutputFormat,
    },

    /// Print the effective configuration
    Config,
}

/// Output format types
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Plain text table
    Table,
    /// One JSON object per line
    Json,
}

/// Execute the CLI command
pub async fn execute(args: Cli, config: Config) -> Result<()> {
    match args.command {
        Commands::Watch { .. } => commands::watch::execute(args, config).await,
        Commands::Balance { .. } => commands::balance::execute(args, config).await,
        Commands::Config => commands::config::execute(&config),
    }
}
