//! CLI command implementations
//!
//! This module contains the implementation for each CLI command.

use crate::models::WalletAddress;
use crate::rpc::{DEMO_MINT, DEMO_WALLET, SourceType};
use crate::session::SyncSettings;
use crate::{Config, Error, Result, cli::Cli};

/// Fold command-line overrides into the loaded configuration
fn apply_overrides(
    config: &mut Config,
    mint: Option<String>,
    rpc_url: Option<String>,
    interval: Option<u64>,
) -> Result<()> {
    if let Some(mint) = mint {
        config.token.mint = Some(mint);
    }
    if let Some(url) = rpc_url {
        config.rpc.url = Some(url);
    }
    if let Some(secs) = interval {
        config.sync.poll_interval_secs = secs;
    }
    config.validate()
}

/// Wallet to follow: explicit argument, then config/environment, then the
/// demo wallet when running against the demo source
fn resolve_address(
    explicit: Option<String>,
    config: &Config,
    source: SourceType,
) -> Result<WalletAddress> {
    let address = match (explicit.or_else(|| config.wallet_address()), source) {
        (Some(address), _) => address,
        (None, SourceType::Demo) => DEMO_WALLET.to_string(),
        (None, SourceType::Rpc) => {
            return Err(Error::MissingConfig(
                "Wallet address not found. Pass --address, set WALLET_SYNC_ADDRESS or configure [wallet] address".to_string(),
            ));
        }
    };
    address.parse()
}

/// Tracked mint, falling back to the demo mint for the demo source
fn resolve_mint(config: &Config, source: SourceType) -> Result<String> {
    match (config.token_mint(), source) {
        (Ok(mint), _) => Ok(mint),
        (Err(_), SourceType::Demo) => Ok(DEMO_MINT.to_string()),
        (Err(e), SourceType::Rpc) => Err(e),
    }
}

/// Engine settings for `watch`, with the demo mint filled in when needed
fn watch_settings(config: &mut Config, source: SourceType) -> Result<SyncSettings> {
    config.token.mint = Some(resolve_mint(config, source)?);
    config.sync_settings()
}

/// Watch command implementation
pub mod watch {
    use super::*;
    use crate::cli::{Commands, output};
    use crate::provider::{ConnectBehavior, MockProvider, ProviderAdapter, WalletProvider, WatchOnlyProvider};
    use crate::rpc::create_balance_source;
    use crate::session::{self, SessionStatus};
    use chrono::Utc;
    use std::sync::Arc;
    use std::time::Duration;

    /// How long to wait for the session to wind down after Ctrl+C
    const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

    /// Execute the watch command
    pub async fn execute(args: Cli, config: Config) -> Result<()> {
        let (address, mint, rpc_url, interval, untrusted, source, output_format) =
            match args.command {
                Commands::Watch {
                    address,
                    mint,
                    rpc_url,
                    interval,
                    untrusted,
                    source,
                    output,
                } => (address, mint, rpc_url, interval, untrusted, source, output),
                _ => unreachable!("watch::execute called with wrong command"),
            };

        let mut config = config;
        apply_overrides(&mut config, mint, rpc_url, interval)?;

        let address = resolve_address(address, &config, source)?;
        let settings = watch_settings(&mut config, source)?;
        let trusted = config.wallet.trusted && !untrusted;

        let provider: Arc<dyn WalletProvider> = match source {
            SourceType::Rpc => Arc::new(WatchOnlyProvider::new(address.clone(), trusted)),
            SourceType::Demo => {
                let provider = MockProvider::new();
                if trusted {
                    provider.set_trusted(Some(address.clone()));
                }
                provider.set_interactive(ConnectBehavior::Approve(address.clone()));
                Arc::new(provider)
            }
        };
        let balances = create_balance_source(source, &config)?;

        tracing::info!(
            address = %address,
            mint = %settings.mint,
            interval = ?settings.poll_interval,
            "Watching wallet"
        );

        let (handle, engine) =
            session::spawn(settings, ProviderAdapter::with_provider(provider), balances);
        let mut reader = handle.subscribe();
        let mut stdout = std::io::stdout();

        output::write_header(&mut stdout, output_format)?;
        let mut connect_requested = false;

        loop {
            tokio::select! {
                changed = reader.changed() => {
                    let Some(snapshot) = changed else {
                        break;
                    };
                    output::write_snapshot(&mut stdout, output_format, &snapshot, Utc::now())?;

                    // Without pre-authorization the silent attempt leaves us
                    // disconnected; ask once, like a user pressing "connect".
                    if !trusted && !connect_requested && snapshot.status == SessionStatus::Disconnected {
                        connect_requested = true;
                        handle.request_connect()?;
                    }
                }
                result = tokio::signal::ctrl_c() => {
                    result?;
                    tracing::info!("Interrupted, disconnecting wallet");
                    handle.request_disconnect()?;

                    let closed = tokio::time::timeout(
                        SHUTDOWN_GRACE,
                        reader.wait_for(|s| !s.is_connected()),
                    )
                    .await;
                    if let Ok(Some(snapshot)) = closed {
                        output::write_snapshot(&mut stdout, output_format, &snapshot, Utc::now())?;
                    }
                    break;
                }
            }
        }

        drop(reader);
        drop(handle);
        engine
            .await
            .map_err(|e| Error::custom(format!("Session engine task failed: {}", e)))?;

        Ok(())
    }
}

/// Balance command implementation
pub mod balance {
    use super::*;
    use crate::cli::{Commands, output};
    use crate::rpc::create_balance_source;
    use chrono::Utc;

    /// Execute the balance command
    pub async fn execute(args: Cli, config: Config) -> Result<()> {
        let (address, mint, rpc_url, source, output_format) = match args.command {
            Commands::Balance {
                address,
                mint,
                rpc_url,
                source,
                output,
            } => (address, mint, rpc_url, source, output),
            _ => unreachable!("balance::execute called with wrong command"),
        };

        let mut config = config;
        apply_overrides(&mut config, mint, rpc_url, None)?;

        let owner = resolve_address(address, &config, source)?;
        let mint = resolve_mint(&config, source)?;
        let balances = create_balance_source(source, &config)?;

        tracing::info!(owner = %owner, mint = %mint, "Querying token balance");
        let amount = balances.token_balance(&owner, &mint).await?;

        output::write_balance(
            &mut std::io::stdout(),
            output_format,
            &owner,
            &mint,
            &amount,
            Utc::now(),
        )
    }
}

/// Config command implementation
pub mod config {
    use super::*;

    /// Print the effective configuration as TOML
    pub fn execute(config: &Config) -> Result<()> {
        let mut effective = config.clone();
        effective.rpc.url = Some(config.rpc_url());
        if effective.token.mint.is_none() {
            effective.token.mint = config.token_mint().ok();
        }
        if effective.wallet.address.is_none() {
            effective.wallet.address = config.wallet_address();
        }

        print!("{}", toml::to_string_pretty(&effective)?);
        Ok(())
    }
}
