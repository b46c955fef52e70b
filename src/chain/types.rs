//! Chain-specific types and error definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Bitcoin network selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Network {
    #[serde(rename = "mainnet", alias = "main", alias = "bitcoin")]
    Main,
    #[default]
    #[serde(rename = "testnet", alias = "test")]
    Test,
}

impl Network {
    /// Name used in cache keys and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Main => "mainnet",
            Network::Test => "testnet",
        }
    }

    /// Matching rust-bitcoin network (address prefixes, WIF version).
    pub fn to_bitcoin(self) -> bitcoin::Network {
        match self {
            Network::Main => bitcoin::Network::Bitcoin,
            Network::Test => bitcoin::Network::Testnet,
        }
    }

    /// Block explorer base URL, with trailing slash.
    pub fn explorer_base(&self) -> &'static str {
        match self {
            Network::Main => "https://blockstream.info/",
            Network::Test => "https://blockstream.info/testnet/",
        }
    }

    /// Explorer page for a transaction.
    pub fn explorer_tx_url(&self, txid: &str) -> String {
        format!("{}tx/{}", self.explorer_base(), txid)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" | "main" | "bitcoin" => Ok(Network::Main),
            "testnet" | "test" => Ok(Network::Test),
            other => Err(format!("unknown network '{}'", other)),
        }
    }
}

/// An unspent output owned by an address, in canonical shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub txid: String,
    pub vout: u32,
    /// Value in satoshis.
    pub value: u64,
    /// Locking script as hex; empty when the source omits it.
    #[serde(default)]
    pub script: String,
    #[serde(default)]
    pub confirmations: u32,
    #[serde(default)]
    pub address: String,
}

/// Confirmed and unconfirmed balance in satoshis.
///
/// Signed because a mempool spend can make the unconfirmed part negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub confirmed: i64,
    pub unconfirmed: i64,
}

impl Balance {
    pub fn is_zero(&self) -> bool {
        self.confirmed == 0 && self.unconfirmed == 0
    }
}

/// Where a gateway answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    /// Cache entry within its TTL.
    FreshCache,
    /// Fetched from the upstream source just now.
    Live,
    /// Expired cache entry served offline or after an upstream failure.
    StaleCache,
    /// Nothing available; zero/empty placeholder.
    Default,
}

/// What a caller may conclude from a gateway answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    /// Real data with something in it.
    Data,
    /// Real data saying the address holds nothing.
    ConfirmedEmpty,
    /// No data could be obtained; the value is a placeholder.
    Unknown,
}

/// Values that can be empty, for availability classification.
pub trait Emptiness {
    fn is_empty_value(&self) -> bool;
}

impl Emptiness for Balance {
    fn is_empty_value(&self) -> bool {
        self.is_zero()
    }
}

impl<T> Emptiness for Vec<T> {
    fn is_empty_value(&self) -> bool {
        self.is_empty()
    }
}

/// A gateway answer tagged with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lookup<T> {
    pub value: T,
    pub source: DataSource,
}

impl<T: Emptiness> Lookup<T> {
    pub fn new(value: T, source: DataSource) -> Self {
        Self { value, source }
    }

    /// Distinguish "genuinely empty" from "no data".
    pub fn availability(&self) -> Availability {
        match self.source {
            DataSource::Default => Availability::Unknown,
            _ if self.value.is_empty_value() => Availability::ConfirmedEmpty,
            _ => Availability::Data,
        }
    }

    /// True when the value came from anywhere but a live or fresh read.
    pub fn is_degraded(&self) -> bool {
        matches!(self.source, DataSource::StaleCache | DataSource::Default)
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

/// Confirmation state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxState {
    /// Six or more confirmations.
    Confirmed,
    /// One to five confirmations.
    Confirming,
    /// Seen but unconfirmed.
    Pending,
    /// Status could not be determined.
    Unknown,
}

impl TxState {
    /// Confirmations needed before a transaction counts as settled.
    pub const SETTLED_CONFIRMATIONS: u32 = 6;

    pub fn from_confirmations(confirmations: u32) -> Self {
        if confirmations >= Self::SETTLED_CONFIRMATIONS {
            TxState::Confirmed
        } else if confirmations > 0 {
            TxState::Confirming
        } else {
            TxState::Pending
        }
    }
}

/// Transaction status as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionStatus {
    pub txid: String,
    pub status: TxState,
    pub confirmations: u32,
    pub block_height: Option<u64>,
    pub block_hash: Option<String>,
    pub timestamp: Option<String>,
    pub explorer_url: String,
}

impl TransactionStatus {
    /// Status used whenever the source cannot be consulted.
    pub fn unknown(txid: &str, network: Network) -> Self {
        Self {
            txid: txid.to_string(),
            status: TxState::Unknown,
            confirmations: 0,
            block_height: None,
            block_hash: None,
            timestamp: None,
            explorer_url: network.explorer_tx_url(txid),
        }
    }
}

/// Errors talking to an external data source. Never leaves the crate's
/// degradation boundaries.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// Connection or request failed.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Non-success status code.
    #[error("Upstream returned status {status} for {url}")]
    Status { status: u16, url: String },

    /// Request exceeded its deadline.
    #[error("Upstream timeout after {0} seconds")]
    Timeout(u64),

    /// Response body did not match the expected shape.
    #[error("Malformed upstream response: {0}")]
    Decode(String),
}

/// Result type for upstream calls.
pub type UpstreamResult<T> = Result<T, UpstreamError>;

/// Check that a string is a 64-character hex transaction id.
pub fn is_txid(value: &str) -> bool {
    value.len() == 64 && value.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_parsing() {
        assert_eq!("mainnet".parse::<Network>().unwrap(), Network::Main);
        assert_eq!("TEST".parse::<Network>().unwrap(), Network::Test);
        assert!("regtest".parse::<Network>().is_err());

        let parsed: Network = serde_json::from_str("\"main\"").unwrap();
        assert_eq!(parsed, Network::Main);
        assert_eq!(serde_json::to_string(&Network::Test).unwrap(), "\"testnet\"");
    }

    #[test]
    fn test_explorer_urls() {
        assert_eq!(
            Network::Test.explorer_tx_url("ab"),
            "https://blockstream.info/testnet/tx/ab"
        );
        assert_eq!(Network::Main.explorer_tx_url("ab"), "https://blockstream.info/tx/ab");
    }

    #[test]
    fn test_availability() {
        let empty = Lookup::new(Balance::default(), DataSource::Live);
        assert_eq!(empty.availability(), Availability::ConfirmedEmpty);

        let unknown = Lookup::new(Balance::default(), DataSource::Default);
        assert_eq!(unknown.availability(), Availability::Unknown);
        assert!(unknown.is_degraded());

        let stale = Lookup::new(vec![1u8], DataSource::StaleCache);
        assert_eq!(stale.availability(), Availability::Data);
        assert!(stale.is_degraded());
    }

    #[test]
    fn test_tx_state_thresholds() {
        assert_eq!(TxState::from_confirmations(0), TxState::Pending);
        assert_eq!(TxState::from_confirmations(1), TxState::Confirming);
        assert_eq!(TxState::from_confirmations(5), TxState::Confirming);
        assert_eq!(TxState::from_confirmations(6), TxState::Confirmed);
    }

    #[test]
    fn test_is_txid() {
        assert!(is_txid(&"a".repeat(64)));
        assert!(!is_txid(&"a".repeat(63)));
        assert!(!is_txid(&"g".repeat(64)));
    }
}
