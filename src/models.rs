//! Core value types shared by the provider, RPC and session layers

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Length of an ed25519 public key
pub const PUBKEY_LEN: usize = 32;

/// Public key of a wallet, in its base58 text form
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WalletAddress(String);

impl WalletAddress {
    /// Address of the given raw public key
    pub fn from_bytes(bytes: &[u8; PUBKEY_LEN]) -> Self {
        Self(bs58::encode(bytes).into_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shortened form for log lines and tables, e.g. `9WzD…AWWM`
    pub fn short(&self) -> String {
        if self.0.len() > 10 {
            format!("{}…{}", &self.0[..4], &self.0[self.0.len() - 4..])
        } else {
            self.0.clone()
        }
    }
}

impl FromStr for WalletAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| Error::InvalidAddress(format!("{} ({})", s, e)))?;
        if bytes.len() != PUBKEY_LEN {
            return Err(Error::InvalidAddress(format!(
                "{} (decodes to {} bytes, expected {})",
                s,
                bytes.len(),
                PUBKEY_LEN
            )));
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for WalletAddress {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<WalletAddress> for String {
    fn from(address: WalletAddress) -> Self {
        address.0
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Deterministic address for tests, derived from a short seed
#[cfg(test)]
pub(crate) fn test_address(seed: &str) -> WalletAddress {
    let mut bytes = [0u8; PUBKEY_LEN];
    for (slot, b) in bytes.iter_mut().zip(seed.bytes().cycle()) {
        *slot = b;
    }
    WalletAddress::from_bytes(&bytes)
}

/// Token quantity in integer base units plus the mint's decimals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAmount {
    pub raw: u64,
    pub decimals: u8,
}

impl TokenAmount {
    pub fn new(raw: u64, decimals: u8) -> Self {
        Self { raw, decimals }
    }

    pub fn zero(decimals: u8) -> Self {
        Self::new(0, decimals)
    }

    pub fn is_zero(&self) -> bool {
        self.raw == 0
    }

    /// Value in whole tokens, for display
    pub fn ui_amount(&self) -> f64 {
        self.raw as f64 / 10f64.powi(self.decimals as i32)
    }

    /// Add another holding of the same mint
    pub fn checked_add(self, other: TokenAmount) -> Option<TokenAmount> {
        if self.decimals != other.decimals {
            return None;
        }
        self.raw
            .checked_add(other.raw)
            .map(|raw| TokenAmount::new(raw, self.decimals))
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.decimals == 0 {
            return write!(f, "{}", self.raw);
        }
        let scale = 10u128.pow(self.decimals as u32);
        let raw = self.raw as u128;
        write!(
            f,
            "{}.{:0width$}",
            raw / scale,
            raw % scale,
            width = self.decimals as usize
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";

    #[test]
    fn test_address_parse() {
        let address: WalletAddress = ADDR.parse().unwrap();
        assert_eq!(address.as_str(), ADDR);
        assert_eq!(address.short(), "9WzD…AWWM");
    }

    #[test]
    fn test_address_rejects_bad_input() {
        assert!("ABC".parse::<WalletAddress>().is_err());
        // '0' and 'O' are not in the base58 alphabet
        assert!("0WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM".parse::<WalletAddress>().is_err());
        assert!("OWzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM".parse::<WalletAddress>().is_err());
    }

    #[test]
    fn test_address_requires_32_byte_key() {
        // Valid alphabet and length, but 33 bytes once decoded
        let err = "z".repeat(44).parse::<WalletAddress>().unwrap_err();
        assert!(matches!(err, Error::InvalidAddress(ref m) if m.contains("33 bytes")));
        // 31 bytes
        assert!("DemoWa11etXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXX".parse::<WalletAddress>().is_err());
        assert!(" 9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM ".parse::<WalletAddress>().is_ok());
    }

    #[test]
    fn test_address_from_bytes_round_trips() {
        let address = WalletAddress::from_bytes(&[7u8; PUBKEY_LEN]);
        let parsed: WalletAddress = address.as_str().parse().unwrap();
        assert_eq!(parsed, address);
        assert_eq!(WalletAddress::from_bytes(&[0u8; PUBKEY_LEN]).as_str(), "1".repeat(32));
    }

    #[test]
    fn test_address_serde() {
        let json = format!("\"{}\"", ADDR);
        let address: WalletAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(serde_json::to_string(&address).unwrap(), json);
        assert!(serde_json::from_str::<WalletAddress>("\"short\"").is_err());
    }

    #[test]
    fn test_amount_display() {
        assert_eq!(TokenAmount::new(5_000_000, 6).to_string(), "5.000000");
        assert_eq!(TokenAmount::new(1_234_567, 6).to_string(), "1.234567");
        assert_eq!(TokenAmount::new(42, 3).to_string(), "0.042");
        assert_eq!(TokenAmount::new(12, 0).to_string(), "12");
        assert_eq!(TokenAmount::new(u64::MAX, 19).to_string(), "1.8446744073709551615");
    }

    #[test]
    fn test_amount_add() {
        let a = TokenAmount::new(1_500, 3);
        let b = TokenAmount::new(500, 3);
        assert_eq!(a.checked_add(b), Some(TokenAmount::new(2_000, 3)));
        assert_eq!(a.checked_add(TokenAmount::new(1, 2)), None);
        assert_eq!(TokenAmount::new(u64::MAX, 0).checked_add(TokenAmount::new(1, 0)), None);
        assert!((TokenAmount::new(2_000, 3).ui_amount() - 2.0).abs() < f64::EPSILON);
    }
}
