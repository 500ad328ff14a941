//! Solana JSON-RPC balance source
//!
//! Issues `getTokenAccountsByOwner` with a mint filter and `jsonParsed`
//! encoding, then sums the base-unit amounts of every returned account.

use super::BalanceSource;
use crate::models::{TokenAmount, WalletAddress};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug, Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// `{"context": {...}, "value": ...}` wrapper used by most account queries
#[derive(Debug, Deserialize)]
struct Contextual<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
pub(crate) struct KeyedTokenAccount {
    pub pubkey: String,
    pub account: TokenAccount,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenAccount {
    pub data: TokenAccountData,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenAccountData {
    pub parsed: ParsedTokenAccount,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ParsedTokenAccount {
    pub info: TokenAccountInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TokenAccountInfo {
    pub mint: String,
    pub token_amount: UiTokenAmount,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UiTokenAmount {
    pub amount: String,
    pub decimals: u8,
}

/// Upper bound on the wait between two attempts
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Exponential backoff before retry number `attempt` (1-based), capped
pub(crate) fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    base.saturating_mul(factor).min(MAX_BACKOFF)
}

/// Sum parsed token accounts into a single amount.
///
/// Accounts of other mints are skipped; an empty list is a zero balance
/// reported with `fallback_decimals`.
pub(crate) fn sum_token_accounts(
    accounts: &[KeyedTokenAccount],
    mint: &str,
    fallback_decimals: u8,
) -> Result<TokenAmount> {
    let mut total: Option<TokenAmount> = None;

    for keyed in accounts {
        let info = &keyed.account.data.parsed.info;
        if info.mint != mint {
            tracing::debug!(account = %keyed.pubkey, mint = %info.mint, "Skipping account of another mint");
            continue;
        }

        let raw: u64 = info.token_amount.amount.parse().map_err(|e| {
            Error::parser(format!(
                "invalid token amount {:?} in account {}: {}",
                info.token_amount.amount, keyed.pubkey, e
            ))
        })?;
        let amount = TokenAmount::new(raw, info.token_amount.decimals);

        total = Some(match total {
            None => amount,
            Some(acc) => acc.checked_add(amount).ok_or_else(|| {
                Error::parser(format!(
                    "cannot add balance of account {} (overflow or decimals mismatch)",
                    keyed.pubkey
                ))
            })?,
        });
    }

    Ok(total.unwrap_or_else(|| TokenAmount::zero(fallback_decimals)))
}

/// Solana JSON-RPC client with retry logic
#[derive(Debug)]
pub struct SolanaRpcClient {
    http: reqwest::Client,
    url: String,
    max_retries: u32,
    retry_delay: Duration,
    fallback_decimals: u8,
    next_id: AtomicU64,
}

impl SolanaRpcClient {
    /// Create a new client bound to one endpoint
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(request_timeout.min(Duration::from_secs(5)))
            .build()?;

        Ok(Self {
            http,
            url: url.into(),
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
            fallback_decimals: 6,
            next_id: AtomicU64::new(1),
        })
    }

    /// Set maximum retry attempts
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set base delay between retries
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Decimals reported for owners without any account of the mint
    pub fn with_fallback_decimals(mut self, decimals: u8) -> Self {
        self.fallback_decimals = decimals;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Execute a JSON-RPC call with retry logic
    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(self.retry_delay, attempt)
                    .saturating_add(Duration::from_millis(rand::random::<u64>() % 250));
                tracing::debug!("Retrying {} after {:?} (attempt {})", method, delay, attempt);
                sleep(delay).await;
            }

            match self.call_once(method, &params).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_transient() => {
                    tracing::warn!("RPC {} failed (attempt {}): {}", method, attempt + 1, e);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(Error::rpc(format!(
            "{} failed after {} attempts: {}",
            method,
            self.max_retries + 1,
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    async fn call_once<T: DeserializeOwned>(&self, method: &str, params: &Value) -> Result<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response = self
            .http
            .post(&self.url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(Error::rpc(format!("{} returned {}", method, status)));
        }
        if !status.is_success() {
            return Err(Error::RpcResponse {
                code: status.as_u16() as i64,
                message: format!("HTTP status {}", status),
            });
        }

        let bytes = response.bytes().await?;
        let envelope: RpcEnvelope<T> = serde_json::from_slice(&bytes)?;
        unwrap_envelope(envelope)
    }
}

fn unwrap_envelope<T>(envelope: RpcEnvelope<T>) -> Result<T> {
    if let Some(err) = envelope.error {
        return Err(Error::RpcResponse {
            code: err.code,
            message: err.message,
        });
    }
    envelope
        .result
        .ok_or_else(|| Error::parser("JSON-RPC response has neither result nor error"))
}

#[async_trait]
impl BalanceSource for SolanaRpcClient {
    async fn token_balance(&self, owner: &WalletAddress, mint: &str) -> Result<TokenAmount> {
        tracing::debug!(owner = %owner, mint, "Fetching token accounts");

        let accounts: Contextual<Vec<KeyedTokenAccount>> = self
            .call(
                "getTokenAccountsByOwner",
                json!([owner.as_str(), { "mint": mint }, { "encoding": "jsonParsed" }]),
            )
            .await?;

        let amount = sum_token_accounts(&accounts.value, mint, self.fallback_decimals)?;
        tracing::debug!(
            owner = %owner,
            accounts = accounts.value.len(),
            %amount,
            "Token balance resolved"
        );
        Ok(amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

    fn fixture() -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {
                "context": { "slot": 1114 },
                "value": [
                    {
                        "pubkey": "C2gJg6tKpQs41PRS1nC8aw3ZKNZK3HQQZGVrDFDup5nx",
                        "account": {
                            "lamports": 1726080,
                            "owner": "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA",
                            "executable": false,
                            "data": {
                                "program": "spl-token",
                                "parsed": {
                                    "type": "account",
                                    "info": {
                                        "isNative": false,
                                        "mint": MINT,
                                        "owner": "4Qkev8aNZcqFNSRhQzwyLMFSsi94jHqE8WNVTJzTP99F",
                                        "state": "initialized",
                                        "tokenAmount": {
                                            "amount": "1500000",
                                            "decimals": 6,
                                            "uiAmount": 1.5,
                                            "uiAmountString": "1.5"
                                        }
                                    }
                                },
                                "space": 165
                            }
                        }
                    },
                    {
                        "pubkey": "5d6rqSfrZnD4DHUMGMY4pnYJQ8fFKkVEPxCRrLQmwdJN",
                        "account": {
                            "data": {
                                "parsed": {
                                    "info": {
                                        "mint": MINT,
                                        "tokenAmount": { "amount": "250000", "decimals": 6 }
                                    }
                                }
                            }
                        }
                    }
                ]
            }
        })
    }

    #[test]
    fn test_sum_parsed_accounts() {
        let envelope: RpcEnvelope<Contextual<Vec<KeyedTokenAccount>>> =
            serde_json::from_value(fixture()).unwrap();
        let accounts = unwrap_envelope(envelope).unwrap();

        let amount = sum_token_accounts(&accounts.value, MINT, 9).unwrap();
        assert_eq!(amount, TokenAmount::new(1_750_000, 6));
        assert_eq!(amount.to_string(), "1.750000");
    }

    #[test]
    fn test_empty_result_is_zero() {
        let amount = sum_token_accounts(&[], MINT, 9).unwrap();
        assert_eq!(amount, TokenAmount::zero(9));
        assert!(amount.is_zero());
    }

    #[test]
    fn test_other_mints_are_skipped() {
        let envelope: RpcEnvelope<Contextual<Vec<KeyedTokenAccount>>> =
            serde_json::from_value(fixture()).unwrap();
        let accounts = unwrap_envelope(envelope).unwrap();

        let amount = sum_token_accounts(&accounts.value, "So11111111111111111111111111111111111111112", 9)
            .unwrap();
        assert_eq!(amount, TokenAmount::zero(9));
    }

    #[test]
    fn test_invalid_amount_is_parser_error() {
        let accounts: Vec<KeyedTokenAccount> = serde_json::from_value(json!([{
            "pubkey": "acct",
            "account": { "data": { "parsed": { "info": {
                "mint": MINT,
                "tokenAmount": { "amount": "-3", "decimals": 6 }
            }}}}
        }]))
        .unwrap();

        let err = sum_token_accounts(&accounts, MINT, 6).unwrap_err();
        assert!(matches!(err, Error::Parser(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_error_envelope() {
        let envelope: RpcEnvelope<Value> = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 7,
            "error": { "code": -32602, "message": "Invalid param: could not find mint" }
        }))
        .unwrap();

        match unwrap_envelope(envelope) {
            Err(Error::RpcResponse { code, message }) => {
                assert_eq!(code, -32602);
                assert!(message.contains("could not find mint"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_fails_after_retries() {
        let client = SolanaRpcClient::new("http://127.0.0.1:9", Duration::from_millis(200))
            .unwrap()
            .with_max_retries(1)
            .with_retry_delay(Duration::from_millis(1));
        let owner: WalletAddress = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM".parse().unwrap();

        let err = client.token_balance(&owner, MINT).await.unwrap_err();
        assert!(err.to_string().contains("failed after 2 attempts"));
    }

    #[test]
    fn test_backoff_grows_and_saturates() {
        let base = Duration::from_millis(500);
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(500));
        assert_eq!(backoff_delay(base, 3), Duration::from_secs(2));
        assert_eq!(backoff_delay(base, 40), MAX_BACKOFF);

        // Huge configured delays must not overflow
        assert_eq!(backoff_delay(Duration::from_millis(u64::MAX), 5), MAX_BACKOFF);
        assert_eq!(backoff_delay(Duration::MAX, u32::MAX), MAX_BACKOFF);
    }
}
