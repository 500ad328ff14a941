//! Output formatting module
//!
//! This module formats session snapshots and balance readings as table rows
//! or JSON lines.

use crate::cli::OutputFormat;
use crate::models::{TokenAmount, WalletAddress};
use crate::session::SessionSnapshot;
use crate::Result;
use chrono::{DateTime, Utc};
use serde_json::json;

/// Column header for table output of snapshots
pub fn write_header(w: &mut impl std::io::Write, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Table {
        writeln!(
            w,
            "{:<10} {:<13} {:<12} {:>24}  {}",
            "Time", "Status", "Address", "Balance", "Note"
        )?;
        writeln!(w, "{:-<80}", "")?;
    }
    Ok(())
}

/// One line per snapshot
pub fn write_snapshot(
    w: &mut impl std::io::Write,
    format: OutputFormat,
    snapshot: &SessionSnapshot,
    at: DateTime<Utc>,
) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let output = json!({
                "time": at.to_rfc3339(),
                "status": snapshot.status,
                "address": snapshot.address,
                "amount": snapshot.amount.map(|a| a.to_string()),
                "raw_amount": snapshot.amount.map(|a| a.raw),
                "error_message": snapshot.error_message,
                "balance_error": snapshot.balance_error,
                "queried_at": snapshot.queried_at,
            });
            serde_json::to_writer(&mut *w, &output)?;
            writeln!(w)?;
        }
        OutputFormat::Table => {
            let address = snapshot
                .address
                .as_ref()
                .map(WalletAddress::short)
                .unwrap_or_else(|| "-".to_string());
            let balance = match (&snapshot.amount, snapshot.is_connected()) {
                (Some(amount), _) => amount.to_string(),
                (None, true) => "unknown".to_string(),
                (None, false) => "-".to_string(),
            };
            let note = snapshot
                .error_message
                .as_deref()
                .or(snapshot.balance_error.as_deref())
                .unwrap_or("");

            writeln!(
                w,
                "{:<10} {:<13} {:<12} {:>24}  {}",
                at.format("%H:%M:%S").to_string(),
                snapshot.status.name(),
                address,
                balance,
                note
            )?;
        }
    }
    Ok(())
}

/// Result of a one-shot balance query
pub fn write_balance(
    w: &mut impl std::io::Write,
    format: OutputFormat,
    owner: &WalletAddress,
    mint: &str,
    amount: &TokenAmount,
    at: DateTime<Utc>,
) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let output = json!({
                "time": at.to_rfc3339(),
                "owner": owner,
                "mint": mint,
                "amount": amount.to_string(),
                "raw_amount": amount.raw,
                "decimals": amount.decimals,
            });
            serde_json::to_writer_pretty(&mut *w, &output)?;
            writeln!(w)?;
        }
        OutputFormat::Table => {
            writeln!(w, "Token Balance")?;
            writeln!(w, "{}", "=".repeat(60))?;
            writeln!(w, "  Owner:    {}", owner)?;
            writeln!(w, "  Mint:     {}", mint)?;
            writeln!(w, "  Balance:  {}", amount)?;
            writeln!(w, "  Queried:  {}", at.format("%Y-%m-%d %H:%M:%S UTC"))?;
        }
    }
    Ok(())
}
